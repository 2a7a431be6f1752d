//! The hero: a map entity held outside the registry, driven by a single
//! active [`HeroState`].

pub mod sprites;
pub mod state;

use tracing::{debug, warn};

use crate::entities::kinds::{ARROW_SPEED, BOOMERANG_MAX_DISTANCE, BOOMERANG_SPEED};
use crate::entities::registry::draw_sprites;
use crate::entities::{
    shop, Entity, EntityBase, EntityId, EntityKind, EntityStore, EntityType, ObstacleRules,
    HERO_NAME,
};
use crate::game::{ActionKeyEffect, Command, Services, Treasure};
use crate::geometry::{direction4_to_xy, direction8_to_angle, opposite_direction4, Layer, Point, Rect};
use crate::map::Ground;
use crate::movement::{Movement, MovementKind, MovementOutcome, MovementTarget};
use crate::render::RenderTarget;

pub use state::{CarriedItemBehavior, HeroState, RunPhase};
use state::{
    point_in_front, throw_item, StateEffect, BLOCK_MOVE_SPEED, CONVEYOR_BELT_SPEED,
    FALLING_DURATION_MS, FAST_SWIMMING_DURATION_MS, HURT_DURATION_MS, HURT_KNOCKBACK_DISTANCE,
    HURT_KNOCKBACK_SPEED, INVENTORY_ITEM_DURATION_MS, JUMP_SPEED, LIFTING_DURATION_MS,
    PLUNGING_DURATION_MS, PUSHING_DELAY_MS, RUNNING_PREPARATION_MS, RUNNING_SPEED,
    SPIN_ATTACK_DURATION_MS, SWORD_LOADING_DELAY_MS, SWORD_SWING_DURATION_MS,
    SWORD_TAPPING_SOUND_DELAY_MS, VICTORY_DURATION_MS,
};

pub const HERO_WALKING_SPEED: i32 = 88;
/// Time during which the hero cannot be hurt again.
pub const HERO_INVINCIBILITY_MS: u64 = 1_000;
const HERO_ORIGIN: Point = Point::new(8, 13);
/// Height above the hero's origin at which a carried item is held.
const CARRIED_ITEM_HEIGHT: i32 = 18;
const CARRIED_ITEM_FALLBACK_COLOR: [u8; 4] = [160, 160, 160, 255];

#[derive(Debug, Clone)]
pub struct Hero {
    base: EntityBase,
    state: HeroState,
    walking_speed: i32,
    on_conveyor_belt: bool,
    on_raised_blocks: bool,
    last_solid_ground: Option<(Point, Layer)>,
    invincible_until: u64,
}

impl Default for Hero {
    fn default() -> Self {
        Self::new()
    }
}

impl Hero {
    pub fn new() -> Self {
        let mut base =
            EntityBase::at_origin(HERO_NAME, Layer::Low, HERO_ORIGIN, 16, 16, HERO_ORIGIN);
        base.set_direction(3);
        sprites::create(&mut base);
        base.set_movement(Movement::player(HERO_WALKING_SPEED));
        Self {
            base,
            state: HeroState::free(),
            walking_speed: HERO_WALKING_SPEED,
            on_conveyor_belt: false,
            on_raised_blocks: false,
            last_solid_ground: None,
            invincible_until: 0,
        }
    }

    pub fn base(&self) -> &EntityBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    pub fn state(&self) -> &HeroState {
        &self.state
    }

    pub fn walking_speed(&self) -> i32 {
        self.walking_speed
    }

    pub fn set_walking_speed(&mut self, speed: i32) {
        self.walking_speed = speed;
    }

    pub fn is_on_conveyor_belt(&self) -> bool {
        self.on_conveyor_belt
    }

    pub fn is_on_raised_blocks(&self) -> bool {
        self.on_raised_blocks
    }

    pub fn is_invincible(&self, now: u64) -> bool {
        now < self.invincible_until
    }

    pub fn last_solid_ground(&self) -> Option<(Point, Layer)> {
        self.last_solid_ground
    }

    /// Puts the hero's origin on `xy` on `layer`, facing `direction4`.
    pub fn place(&mut self, xy: Point, layer: Layer, direction4: u8) {
        self.base.set_xy(xy);
        self.base.set_layer(layer);
        self.base.set_direction(direction4 % 4);
        self.last_solid_ground = Some((xy, layer));
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        let shift = self.base.set_suspended(suspended, now);
        if shift > 0 {
            self.state.shift_dates(shift);
            if self.invincible_until > 0 {
                self.invincible_until += shift;
            }
        }
    }

    /// Area the sword currently hits, if the hero is cutting.
    pub fn sword_area(&self) -> Option<Rect> {
        sprites::sword_area(&self.base, &self.state)
    }

    /// Leaves the current state for `next`. The side effects of stopping are
    /// applied before `next` starts.
    pub(crate) fn set_state(
        &mut self,
        next: HeroState,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) {
        for effect in self.state.stop(&next, &self.base) {
            match effect {
                StateEffect::SpawnEntity(entity) => {
                    store.add_entity(*entity);
                }
                StateEffect::ClearMovement => self.base.clear_movement(),
                StateEffect::PlaySound(sound) => services.play_sound(sound),
                StateEffect::SetActionKey(effect) => services.state.keys_effect.action = effect,
            }
        }
        let mut previous = std::mem::replace(&mut self.state, next);
        self.start_state(&mut previous, store, services);
        debug!(
            from = previous.name(),
            to = self.state.name(),
            "hero_state_changed"
        );
    }

    fn start_state(
        &mut self,
        previous: &mut HeroState,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) {
        let now = services.now;
        let Self {
            base,
            state,
            walking_speed,
            last_solid_ground,
            invincible_until,
            ..
        } = self;
        match state {
            HeroState::Free { .. } => ensure_player_movement(base, *walking_speed),
            HeroState::Pushing {
                direction4,
                pushed_block,
            } => {
                *pushed_block = move_facing_block(base, *direction4, false, store);
                if pushed_block.is_some() {
                    services.play_sound("hero_pushes");
                }
            }
            HeroState::Grabbing {
                pulling,
                pulled_block,
            } => {
                if *pulling {
                    let direction4 = opposite_direction4(base.direction());
                    *pulled_block = move_facing_block(base, direction4, true, store);
                    *pulling = pulled_block.is_some();
                    if *pulling {
                        services.play_sound("hero_pushes");
                    }
                }
                services.state.keys_effect.action = ActionKeyEffect::Grab;
            }
            HeroState::Lifting { end_date, .. } => {
                *end_date = now + LIFTING_DURATION_MS;
                base.clear_movement();
                services.play_sound("lift");
            }
            HeroState::Carrying { item } => {
                if item.is_none() {
                    if let HeroState::Lifting { item: lifted, .. } = previous {
                        *item = lifted.take();
                    }
                }
                ensure_player_movement(base, *walking_speed);
                services.state.keys_effect.action = ActionKeyEffect::Throw;
            }
            HeroState::Swimming { .. } => {
                base.set_movement(Movement::player(*walking_speed / 2));
                services.state.keys_effect.action = ActionKeyEffect::Swim;
                services.play_sound("splash");
            }
            HeroState::Plunging { ground, end_date } => {
                *end_date = now + PLUNGING_DURATION_MS;
                base.clear_movement();
                services.play_sound(if *ground == Ground::Lava {
                    "lava"
                } else {
                    "splash"
                });
            }
            HeroState::ConveyorBelt { belt, .. } => {
                match store.entity(*belt).map(|belt| belt.base().top_left()) {
                    Some(top_left) => base.set_movement(Movement::target(
                        MovementTarget::Point(top_left),
                        *walking_speed * 2 / 3,
                        true,
                    )),
                    None => base.clear_movement(),
                }
            }
            HeroState::Running {
                phase,
                next_phase_date,
            } => {
                *phase = RunPhase::Preparing;
                *next_phase_date = now + RUNNING_PREPARATION_MS;
                base.clear_movement();
            }
            HeroState::Falling { end_date } => {
                *end_date = now + FALLING_DURATION_MS;
                base.clear_movement();
                services.play_sound("hero_falls");
            }
            HeroState::BackToSolidGround => match *last_solid_ground {
                Some((xy, layer)) => {
                    base.set_layer(layer);
                    let origin = base.origin();
                    base.set_movement(Movement::target(
                        MovementTarget::Point(xy.translated(-origin.x, -origin.y)),
                        *walking_speed,
                        true,
                    ));
                }
                None => base.clear_movement(),
            },
            HeroState::Hurt {
                source,
                damage,
                end_date,
            } => {
                *end_date = now + HURT_DURATION_MS;
                *invincible_until = now + HERO_INVINCIBILITY_MS;
                services.state.equipment.remove_life(*damage);
                services.play_sound("hero_hurt");
                base.set_movement(Movement::straight(
                    source.angle_to(base.center()),
                    HURT_KNOCKBACK_SPEED,
                    Some(HURT_KNOCKBACK_DISTANCE),
                ));
                if services.state.equipment.life() == 0 {
                    debug!(damage = *damage, "hero_life_exhausted");
                }
            }
            HeroState::SpinAttack { end_date } => {
                *end_date = now + SPIN_ATTACK_DURATION_MS;
                base.clear_movement();
                services.play_sound("sword_spin_attack_release");
            }
            HeroState::SwordSwinging { end_date } => {
                *end_date = now + SWORD_SWING_DURATION_MS;
                base.clear_movement();
                services.play_sound("sword1");
            }
            HeroState::SwordLoading {
                loaded,
                loaded_date,
            } => {
                *loaded = false;
                *loaded_date = now + SWORD_LOADING_DELAY_MS;
                ensure_player_movement(base, *walking_speed);
            }
            HeroState::SwordTapping { next_sound_date } => {
                *next_sound_date = now;
                base.clear_movement();
            }
            HeroState::Jumping { direction8, length } => {
                base.set_movement(Movement::jump(*direction8, *length, JUMP_SPEED));
                services.play_sound("jump");
            }
            HeroState::UsingInventoryItem { item, end_date } => {
                *end_date = now + INVENTORY_ITEM_DURATION_MS;
                base.clear_movement();
                use_inventory_item(base, item, store, services);
            }
            HeroState::Treasure { treasure } => {
                base.clear_movement();
                services.state.equipment.obtain(treasure);
                if let Some(variable) = &treasure.savegame_variable {
                    services.state.savegame.set_boolean(variable.clone(), true);
                }
                services.play_sound("treasure");
                services.start_dialog(&treasure.dialog_id());
            }
            HeroState::Victory { end_date } => {
                *end_date = now + VICTORY_DURATION_MS;
                base.clear_movement();
                services.play_sound("victory");
            }
            HeroState::Freezed => base.clear_movement(),
        }
    }

    /// One step: movement, ground, then the state's own timers.
    pub(crate) fn update(&mut self, store: &mut EntityStore, services: &mut Services<'_>) {
        if self.base.is_suspended() {
            // the treasure dialog runs while the map is suspended
            if self.state.is_brandishing_treasure() {
                self.update_state(store, services);
            }
            return;
        }
        self.base.update_sprites(services.now);
        self.update_wanted_direction(services);

        let outcome = self.update_movement(store, services.now);
        if outcome.moved {
            if let HeroState::Free {
                pushing_direction4, ..
            } = &mut self.state
            {
                *pushing_direction4 = None;
            }
        }
        if outcome.obstacle_reached {
            self.notify_obstacle_reached(store, services);
        }

        if let Some(next) = self.update_ground(store, services) {
            self.set_state(next, store, services);
        }
        self.update_state(store, services);

        let moving = self
            .base
            .movement()
            .and_then(Movement::direction8)
            .is_some();
        sprites::sync(&mut self.base, &self.state, moving);
    }

    fn current_speed(&self, now: u64) -> i32 {
        match &self.state {
            HeroState::Swimming {
                fast_until: Some(until),
            } if now < *until => self.walking_speed,
            HeroState::Swimming { .. } => self.walking_speed / 2,
            _ if self.base.ground_below() == Ground::Ladder => self.walking_speed / 2,
            _ => self.walking_speed,
        }
    }

    fn update_wanted_direction(&mut self, services: &Services<'_>) {
        if !self.state.has_player_movement() {
            return;
        }
        let wanted = services.commands.wanted_direction8();
        let speed = self.current_speed(services.now);
        if let Some(movement) = self.base.movement_mut() {
            movement.set_wanted_direction8(wanted);
            if movement.speed() != speed {
                movement.set_speed(speed);
            }
        }
        if let Some(direction8) = wanted {
            if self.state.can_control_direction() {
                let direction4 = sprite_direction4(direction8, self.base.direction());
                self.base.set_direction(direction4);
            }
        }
    }

    fn update_movement(&mut self, store: &EntityStore, now: u64) -> MovementOutcome {
        let Some(mut movement) = self.base.take_movement() else {
            return MovementOutcome::default();
        };
        let layer = self.base.layer();
        let mut bbox = self.base.bounding_box();
        let outcome = movement.update(now, &mut bbox, |candidate| {
            store.test_collision_with_obstacles(layer, candidate, &*self, None)
        });
        self.base.set_bounding_box(bbox);
        self.base.restore_movement(movement);
        outcome
    }

    /// Whether the pixel just in front of the hero is an obstacle.
    pub(crate) fn is_facing_point_on_obstacle(&self, store: &EntityStore) -> bool {
        let point = self.base.facing_point_towards(self.base.direction());
        store.test_collision_with_obstacles(
            self.base.layer(),
            &Rect::new(point.x, point.y, 1, 1),
            self,
            None,
        )
    }

    fn notify_obstacle_reached(&mut self, store: &mut EntityStore, services: &mut Services<'_>) {
        let now = services.now;
        let direction4 = self.base.direction();
        let walking_to_facing = services.commands.wanted_direction8() == Some(direction4 * 2);
        let facing_obstacle = walking_to_facing && self.is_facing_point_on_obstacle(store);
        let next = match &mut self.state {
            HeroState::Free {
                pushing_direction4,
                start_pushing_date,
            } if facing_obstacle => match pushing_direction4 {
                Some(pushing) if *pushing == direction4 => {
                    (now >= *start_pushing_date).then_some(HeroState::Pushing {
                        direction4,
                        pushed_block: None,
                    })
                }
                _ => {
                    *pushing_direction4 = Some(direction4);
                    *start_pushing_date = now + PUSHING_DELAY_MS;
                    None
                }
            },
            HeroState::SwordLoading { .. } if facing_obstacle => {
                Some(HeroState::SwordTapping { next_sound_date: 0 })
            }
            HeroState::Running {
                phase: RunPhase::Running,
                ..
            } => {
                services.play_sound("running_obstacle");
                Some(HeroState::free())
            }
            HeroState::ConveyorBelt {
                snapping: false, ..
            } => Some(HeroState::free()),
            _ => None,
        };
        if let Some(next) = next {
            self.set_state(next, store, services);
        }
    }

    /// Samples the ground under the hero and returns the state a hazard
    /// forces, if any.
    fn update_ground(&mut self, store: &EntityStore, services: &Services<'_>) -> Option<HeroState> {
        let layer = self.base.layer();
        let ground = store.ground_at(layer, self.base.ground_point());
        self.base.set_ground_below(ground);
        self.on_raised_blocks = store.overlaps_raised_blocks(layer, &self.base.bounding_box());
        if !self.state.is_touching_ground() {
            return None;
        }
        let state = &self.state;
        match ground {
            Ground::DeepWater if !state.can_avoid_deep_water() => {
                if services.state.equipment.has_ability("swim") {
                    Some(HeroState::Swimming { fast_until: None })
                } else {
                    Some(HeroState::Plunging {
                        ground,
                        end_date: 0,
                    })
                }
            }
            Ground::Hole if !state.can_avoid_hole() => Some(HeroState::Falling { end_date: 0 }),
            Ground::Lava if !state.can_avoid_lava() => Some(HeroState::Plunging {
                ground,
                end_date: 0,
            }),
            Ground::Prickle
                if !state.can_avoid_prickle()
                    && state.can_be_hurt()
                    && !self.is_invincible(services.now) =>
            {
                Some(HeroState::hurt(point_in_front(&self.base, 8), 2))
            }
            ground
                if ground.is_solid_footing()
                    && state.has_player_movement()
                    && !state.is_swimming() =>
            {
                self.last_solid_ground = Some((self.base.xy(), layer));
                None
            }
            _ => None,
        }
    }

    fn update_state(&mut self, store: &mut EntityStore, services: &mut Services<'_>) {
        let now = services.now;
        let movement_finished = self.base.movement().map_or(true, Movement::is_finished);
        let attack_held = services.is_pressed(Command::Attack);
        let action_held = services.is_pressed(Command::Action);
        let wanted = services.commands.wanted_direction8();
        let direction4 = self.base.direction();
        let tapping_obstacle = matches!(self.state, HeroState::SwordTapping { .. })
            && self.is_facing_point_on_obstacle(store);
        let hero_xy = self.base.xy();
        let hero_layer = self.base.layer();

        let next = match &mut self.state {
            HeroState::Free { .. } | HeroState::Freezed => None,
            HeroState::Pushing {
                direction4,
                pushed_block,
            } => match pushed_block {
                Some(_) => movement_finished.then(HeroState::free),
                None => (wanted != Some(*direction4 * 2)).then(HeroState::free),
            },
            HeroState::Grabbing { pulling: true, .. } => {
                movement_finished.then_some(HeroState::Grabbing {
                    pulling: false,
                    pulled_block: None,
                })
            }
            HeroState::Grabbing { .. } => {
                if !action_held {
                    Some(HeroState::free())
                } else if wanted == Some(direction4 * 2) {
                    Some(HeroState::Pushing {
                        direction4,
                        pushed_block: None,
                    })
                } else if wanted == Some(opposite_direction4(direction4) * 2) {
                    Some(HeroState::Grabbing {
                        pulling: true,
                        pulled_block: None,
                    })
                } else {
                    None
                }
            }
            HeroState::Lifting { item, end_date } => {
                sync_carried_item(item.as_deref_mut(), hero_xy, hero_layer);
                (now >= *end_date).then_some(HeroState::Carrying { item: None })
            }
            HeroState::Carrying { item } => {
                sync_carried_item(item.as_deref_mut(), hero_xy, hero_layer);
                None
            }
            HeroState::Swimming { fast_until } => {
                if fast_until.is_some_and(|until| now >= until) {
                    *fast_until = None;
                }
                (self.base.ground_below() != Ground::DeepWater).then(HeroState::free)
            }
            HeroState::Plunging { ground, end_date } => (now >= *end_date).then(|| {
                let damage = if *ground == Ground::Lava { 2 } else { 1 };
                services.state.equipment.remove_life(damage);
                HeroState::BackToSolidGround
            }),
            HeroState::ConveyorBelt {
                direction4,
                snapping,
                ..
            } => {
                if *snapping {
                    if movement_finished {
                        *snapping = false;
                        let step = *direction4 * 2;
                        self.base.set_movement(Movement::path(
                            &[step, step],
                            CONVEYOR_BELT_SPEED,
                            false,
                            false,
                        ));
                    }
                    None
                } else {
                    (movement_finished || !self.on_conveyor_belt).then(HeroState::free)
                }
            }
            HeroState::Running {
                phase,
                next_phase_date,
            } if *phase == RunPhase::Preparing => {
                if !action_held {
                    Some(HeroState::free())
                } else {
                    if now >= *next_phase_date {
                        *phase = RunPhase::Running;
                        self.base.set_movement(Movement::straight(
                            direction8_to_angle(direction4 * 2),
                            RUNNING_SPEED,
                            None,
                        ));
                        services.play_sound("running");
                    }
                    None
                }
            }
            HeroState::Running { .. } => match wanted {
                Some(direction8) if direction8 != direction4 * 2 => Some(HeroState::free()),
                _ => None,
            },
            HeroState::Falling { end_date } => (now >= *end_date).then(|| {
                services.state.equipment.remove_life(2);
                HeroState::BackToSolidGround
            }),
            HeroState::BackToSolidGround => movement_finished.then(|| {
                self.invincible_until = now + HERO_INVINCIBILITY_MS;
                HeroState::free()
            }),
            HeroState::Hurt { end_date, .. }
            | HeroState::SpinAttack { end_date }
            | HeroState::UsingInventoryItem { end_date, .. }
            | HeroState::Victory { end_date } => (now >= *end_date).then(HeroState::free),
            HeroState::SwordSwinging { end_date } => (now >= *end_date).then(|| {
                if attack_held {
                    HeroState::SwordLoading {
                        loaded: false,
                        loaded_date: 0,
                    }
                } else {
                    HeroState::free()
                }
            }),
            HeroState::SwordLoading {
                loaded,
                loaded_date,
            } => {
                if !attack_held {
                    Some(if *loaded {
                        HeroState::SpinAttack { end_date: 0 }
                    } else {
                        HeroState::free()
                    })
                } else {
                    if !*loaded && now >= *loaded_date {
                        *loaded = true;
                        services.play_sound("sword_spin_attack_load");
                    }
                    None
                }
            }
            HeroState::SwordTapping { next_sound_date } => {
                if !attack_held {
                    Some(HeroState::free())
                } else if !tapping_obstacle {
                    Some(HeroState::SwordLoading {
                        loaded: false,
                        loaded_date: 0,
                    })
                } else {
                    if now >= *next_sound_date {
                        services.play_sound("sword_tapping");
                        *next_sound_date = now + SWORD_TAPPING_SOUND_DELAY_MS;
                    }
                    None
                }
            }
            HeroState::Jumping { .. } => movement_finished.then(HeroState::free),
            HeroState::Treasure { treasure } => (!services.dialogs.is_enabled()).then(|| {
                services.hooks.on_treasure_obtained(treasure);
                HeroState::free()
            }),
        };
        // refreshed by the collision pass every frame
        self.on_conveyor_belt = false;

        if let Some(next) = next {
            self.set_state(next, store, services);
        }
    }

    pub(crate) fn notify_command_pressed(
        &mut self,
        command: Command,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) {
        match command {
            Command::Action => self.notify_action_pressed(store, services),
            Command::Attack => {
                if self.state.can_start_sword() && services.state.equipment.has_ability("sword") {
                    self.set_state(HeroState::SwordSwinging { end_date: 0 }, store, services);
                }
            }
            Command::Item1 | Command::Item2 => {
                let slot = usize::from(command == Command::Item2);
                let Some(item) = services.state.equipment.assigned_item(slot) else {
                    return;
                };
                if self.state.can_start_item() {
                    let item = item.to_string();
                    self.set_state(
                        HeroState::UsingInventoryItem { item, end_date: 0 },
                        store,
                        services,
                    );
                }
            }
            _ => {}
        }
    }

    fn notify_action_pressed(&mut self, store: &mut EntityStore, services: &mut Services<'_>) {
        let effect = services.state.keys_effect.action;
        match (&mut self.state, effect) {
            (HeroState::Carrying { item }, ActionKeyEffect::Throw) => {
                if let Some(item) = item.take() {
                    store.add_entity(throw_item(*item, &self.base));
                    services.play_sound("throw");
                }
                self.set_state(HeroState::free(), store, services);
            }
            (HeroState::Swimming { fast_until }, ActionKeyEffect::Swim) => {
                *fast_until = Some(services.now + FAST_SWIMMING_DURATION_MS);
            }
            (HeroState::Free { .. }, _) => self.notify_action_when_free(effect, store, services),
            _ => {}
        }
    }

    fn notify_action_when_free(
        &mut self,
        effect: ActionKeyEffect,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) {
        let facing = self
            .base
            .facing_entity()
            .and_then(|id| store.entity(id).map(|entity| (id, entity.entity_type())));
        match (facing, effect) {
            (Some((id, EntityType::ShopItem)), ActionKeyEffect::Look) => {
                shop::notify_action(store, id, services);
            }
            (Some((id, EntityType::Destructible)), ActionKeyEffect::Lift) => {
                self.lift(id, store, services);
            }
            (_, ActionKeyEffect::Grab) => {
                self.set_state(
                    HeroState::Grabbing {
                        pulling: false,
                        pulled_block: None,
                    },
                    store,
                    services,
                );
            }
            (_, ActionKeyEffect::None) if services.state.equipment.has_ability("run") => {
                self.set_state(
                    HeroState::Running {
                        phase: RunPhase::Preparing,
                        next_phase_date: 0,
                    },
                    store,
                    services,
                );
            }
            _ => {}
        }
    }

    fn lift(&mut self, id: EntityId, store: &mut EntityStore, services: &mut Services<'_>) {
        let Some(destructible) = store.entity(id) else {
            return;
        };
        let EntityKind::Destructible(data) = destructible.kind() else {
            return;
        };
        if !data.can_be_lifted() || u32::from(data.weight) > services.state.equipment.ability("lift") {
            services.play_sound("wrong");
            return;
        }
        let color = destructible
            .base()
            .sprites()
            .first()
            .map_or(CARRIED_ITEM_FALLBACK_COLOR, |sprite| sprite.color());
        let mut item = Entity::carried_item(
            self.base.layer(),
            self.base.xy().translated(0, -CARRIED_ITEM_HEIGHT),
            color,
            data.destruction_sound(),
        );
        item.base_mut().set_direction(self.base.direction());
        let treasure = data.treasure.clone();
        if let Some(treasure) = treasure {
            give_treasure(&treasure, services);
        }
        store.remove_entity(id);
        self.base.set_facing_entity(None);
        self.set_state(HeroState::lifting(item), store, services);
    }

    /// Hurts the hero from `source`; false when the hero cannot be hurt now.
    pub fn hurt(
        &mut self,
        source: Point,
        damage: i32,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) -> bool {
        if !self.state.can_be_hurt() || self.is_invincible(services.now) {
            return false;
        }
        self.set_state(HeroState::hurt(source, damage), store, services);
        true
    }

    /// Called while the hero overlaps a conveyor belt. Starts riding it once
    /// the hero's center is on the belt and the way ahead is free.
    pub(crate) fn notify_collision_with_conveyor_belt(
        &mut self,
        belt: EntityId,
        belt_box: Rect,
        direction4: u8,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) {
        self.on_conveyor_belt = true;
        if self.state.can_avoid_conveyor_belt() {
            return;
        }
        let center = self.base.center();
        if !belt_box.contains_rect(&Rect::new(center.x - 1, center.y - 1, 2, 2)) {
            return;
        }
        let (dx, dy) = direction4_to_xy(direction4);
        let step = self.base.bounding_box().translated(dx, dy);
        if store.test_collision_with_obstacles(self.base.layer(), &step, &*self, None) {
            return;
        }
        self.set_state(HeroState::conveyor_belt(belt, direction4), store, services);
    }

    pub fn start_jumping(
        &mut self,
        direction8: u8,
        length: i32,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) {
        if !self.state.can_take_jumper() {
            return;
        }
        self.base.set_direction(direction8 / 2);
        self.set_state(HeroState::jumping(direction8, length), store, services);
    }

    /// Moves the hero one layer up or down when walking through stairs that
    /// lie on `stairs_layer` and climb toward `direction4`.
    pub(crate) fn take_stairs(&mut self, stairs_layer: Layer, direction4: u8, services: &Services<'_>) {
        if !self.state.can_take_stairs() {
            return;
        }
        let wanted = services.commands.wanted_direction8();
        let layer = self.base.layer();
        let next_layer = if layer == stairs_layer && wanted == Some(direction4 * 2) {
            stairs_layer.above()
        } else if Some(layer) == stairs_layer.above()
            && wanted == Some(opposite_direction4(direction4) * 2)
        {
            Some(stairs_layer)
        } else {
            None
        };
        if let Some(next_layer) = next_layer {
            self.base.set_layer(next_layer);
            debug!(layer = ?next_layer, "hero_took_stairs");
        }
    }

    pub fn start_treasure(
        &mut self,
        treasure: Treasure,
        store: &mut EntityStore,
        services: &mut Services<'_>,
    ) {
        self.set_state(HeroState::treasure(treasure), store, services);
    }

    pub fn freeze(&mut self, store: &mut EntityStore, services: &mut Services<'_>) {
        self.set_state(HeroState::Freezed, store, services);
    }

    pub fn unfreeze(&mut self, store: &mut EntityStore, services: &mut Services<'_>) {
        if matches!(self.state, HeroState::Freezed) {
            self.set_state(HeroState::free(), store, services);
        }
    }

    pub fn start_victory(&mut self, store: &mut EntityStore, services: &mut Services<'_>) {
        self.set_state(HeroState::Victory { end_date: 0 }, store, services);
    }

    pub(crate) fn draw(&self, target: &mut dyn RenderTarget, camera: Point) {
        draw_sprites(target, &self.base, camera);
        if let Some(item) = self.state.carried_item() {
            draw_sprites(target, item.base(), camera);
        }
    }
}

/// Gives a treasure found in the world, without the brandish animation.
pub(crate) fn give_treasure(treasure: &Treasure, services: &mut Services<'_>) {
    services.state.equipment.obtain(treasure);
    if let Some(variable) = &treasure.savegame_variable {
        services.state.savegame.set_boolean(variable.clone(), true);
    }
    services.hooks.on_treasure_obtained(treasure);
}

fn ensure_player_movement(base: &mut EntityBase, speed: i32) {
    let has_player_movement = base
        .movement()
        .is_some_and(|movement| matches!(movement.kind(), MovementKind::Player { .. }));
    if !has_player_movement {
        base.set_movement(Movement::player(speed));
    }
}

fn sync_carried_item(item: Option<&mut Entity>, hero_xy: Point, layer: Layer) {
    if let Some(item) = item {
        item.base_mut()
            .set_xy(hero_xy.translated(0, -CARRIED_ITEM_HEIGHT));
        item.base_mut().set_layer(layer);
    }
}

/// Sprite direction for a wanted direction8. Diagonals keep the current
/// direction when it is one of their two components.
fn sprite_direction4(direction8: u8, current4: u8) -> u8 {
    if direction8 % 2 == 0 {
        return direction8 / 2;
    }
    let first = direction8 / 2;
    let second = (first + 1) % 4;
    if current4 == first || current4 == second {
        current4
    } else {
        first
    }
}

/// Moves the block the hero faces 16 px toward `direction4`, the hero
/// following it. Returns the block moved, if any.
fn move_facing_block(
    hero: &mut EntityBase,
    direction4: u8,
    pulling: bool,
    store: &mut EntityStore,
) -> Option<EntityId> {
    let id = hero.facing_entity()?;
    let block = store.entity(id)?;
    let EntityKind::Block(data) = block.kind() else {
        return None;
    };
    let allowed = if pulling {
        data.can_be_pulled
    } else {
        data.can_be_pushed
    };
    if !allowed || !data.can_move() {
        return None;
    }
    let (dx, dy) = direction4_to_xy(direction4);
    let destination = block.bounding_box().translated(dx * 16, dy * 16);
    if store.test_collision_with_obstacles(block.layer(), &destination, block, None) {
        return None;
    }
    if pulling {
        let hero_destination = hero.bounding_box().translated(dx * 16, dy * 16);
        if store.test_collision_with_obstacles(hero.layer(), &hero_destination, &WalkingHero, None)
        {
            return None;
        }
    }

    let steps = [direction4 * 2, direction4 * 2];
    hero.set_movement(Movement::path(&steps, BLOCK_MOVE_SPEED, false, true));
    let (base, kind) = store.entity_mut(id)?.parts_mut();
    base.set_movement(Movement::path(&steps, BLOCK_MOVE_SPEED, false, pulling));
    if let EntityKind::Block(data) = kind {
        data.moves_done += 1;
    }
    debug!(block = %base.name(), direction4, pulling, "block_moved");
    Some(id)
}

/// Obstacle rules of a hero walking freely, for tests made while the hero
/// itself is mutably borrowed.
struct WalkingHero;

impl ObstacleRules for WalkingHero {
    fn obstacle_rules_type(&self) -> EntityType {
        EntityType::Hero
    }

    fn is_deep_water_obstacle(&self) -> bool {
        false
    }

    fn is_hole_obstacle(&self) -> bool {
        false
    }

    fn is_lava_obstacle(&self) -> bool {
        false
    }

    fn is_prickle_obstacle(&self) -> bool {
        false
    }

    fn is_ladder_obstacle(&self) -> bool {
        false
    }
}

fn use_inventory_item(
    hero: &EntityBase,
    item: &str,
    store: &mut EntityStore,
    services: &mut Services<'_>,
) {
    let direction4 = hero.direction();
    let angle = direction8_to_angle(direction4 * 2);
    match item {
        "bombs" => {
            if services.state.equipment.item_amount("bombs") == 0 {
                services.play_sound("wrong");
                return;
            }
            services.state.equipment.remove_amount("bombs", 1);
            store.add_entity(Entity::bomb(
                "bomb",
                hero.layer(),
                point_in_front(hero, 16),
                services.now,
            ));
            services.play_sound("bomb");
        }
        "bow" => {
            if services.state.equipment.item_amount("bow") == 0 {
                services.play_sound("wrong");
                return;
            }
            services.state.equipment.remove_amount("bow", 1);
            let mut arrow = Entity::arrow(hero.layer(), hero.center(), direction4);
            arrow
                .base_mut()
                .set_movement(Movement::straight(angle, ARROW_SPEED, None));
            store.add_entity(arrow);
            services.play_sound("bow");
        }
        "boomerang" => {
            if store.is_boomerang_present() {
                return;
            }
            let angle = services
                .commands
                .wanted_direction8()
                .map_or(angle, direction8_to_angle);
            let mut boomerang = Entity::boomerang(hero.layer(), hero.center());
            boomerang.base_mut().set_movement(Movement::straight(
                angle,
                BOOMERANG_SPEED,
                Some(BOOMERANG_MAX_DISTANCE),
            ));
            store.add_entity(boomerang);
            services.play_sound("boomerang");
        }
        other => warn!(item = other, "inventory_item_unsupported"),
    }
}

impl ObstacleRules for Hero {
    fn obstacle_rules_type(&self) -> EntityType {
        EntityType::Hero
    }

    fn is_shallow_water_obstacle(&self) -> bool {
        self.state.is_shallow_water_obstacle()
    }

    fn is_deep_water_obstacle(&self) -> bool {
        self.state.is_deep_water_obstacle()
    }

    fn is_hole_obstacle(&self) -> bool {
        self.state.is_hole_obstacle()
    }

    fn is_lava_obstacle(&self) -> bool {
        self.state.is_lava_obstacle()
    }

    fn is_prickle_obstacle(&self) -> bool {
        self.state.is_prickle_obstacle()
    }

    fn is_ladder_obstacle(&self) -> bool {
        false
    }

    fn is_teletransporter_obstacle(&self, _teletransporter: &Entity) -> bool {
        self.state.is_teletransporter_obstacle()
    }

    fn is_conveyor_belt_obstacle(&self, _conveyor_belt: &Entity) -> bool {
        self.state.is_conveyor_belt_obstacle()
    }

    fn is_stairs_obstacle(&self, _stairs: &Entity) -> bool {
        self.state.is_stairs_obstacle()
    }

    fn is_sensor_obstacle(&self, _sensor: &Entity) -> bool {
        self.state.is_sensor_obstacle()
    }

    fn is_switch_obstacle(&self, _switch: &Entity) -> bool {
        false
    }

    fn is_separator_obstacle(&self, _separator: &Entity) -> bool {
        false
    }

    fn is_raised_block_obstacle(&self, _crystal_block: &Entity) -> bool {
        // a hero already standing on raised blocks walks over them
        !self.on_raised_blocks && !self.state.is_jumping()
    }

    fn is_jumper_obstacle(&self, _jumper: &Entity) -> bool {
        !self.state.can_take_jumper()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DestructibleSubtype;
    use crate::game::testing::{test_tileset, Fixture};
    use crate::game::Equipment;

    fn store() -> EntityStore {
        EntityStore::new("hero_test", 160, 160, test_tileset())
    }

    fn hero_at(xy: Point) -> Hero {
        let mut hero = Hero::new();
        hero.place(xy, Layer::Low, 0);
        hero
    }

    fn run(hero: &mut Hero, store: &mut EntityStore, fixture: &mut Fixture, ticks: u64) {
        for _ in 0..ticks {
            fixture.now += 10;
            let mut services = fixture.services();
            hero.update(store, &mut services);
        }
    }

    #[test]
    fn diagonals_keep_a_matching_sprite_direction() {
        assert_eq!(sprite_direction4(1, 1), 1);
        assert_eq!(sprite_direction4(1, 0), 0);
        assert_eq!(sprite_direction4(1, 3), 0);
        assert_eq!(sprite_direction4(7, 3), 3);
        assert_eq!(sprite_direction4(4, 1), 2);
    }

    #[test]
    fn walking_moves_the_hero() {
        let mut store = store();
        let mut hero = hero_at(Point::new(40, 45));
        let mut fixture = Fixture::default();
        fixture.commands.press(Command::Right);
        run(&mut hero, &mut store, &mut fixture, 50);
        assert!(hero.base().xy().x > 70);
        assert_eq!(hero.base().direction(), 0);
        assert!(hero.state().is_free());
    }

    #[test]
    fn walking_into_a_wall_starts_pushing_after_a_delay() {
        let mut store = store();
        store.add_entity(Entity::wall(
            "wall",
            Layer::Low,
            Rect::new(64, 0, 16, 160),
            true,
            true,
            true,
        ));
        let mut hero = hero_at(Point::new(40, 45));
        let mut fixture = Fixture::default();
        fixture.commands.press(Command::Right);
        run(&mut hero, &mut store, &mut fixture, 40);
        assert_eq!(hero.base().bounding_box().right(), 64);
        assert!(hero.state().is_free());
        run(&mut hero, &mut store, &mut fixture, 90);
        assert!(matches!(hero.state(), HeroState::Pushing { .. }));
    }

    #[test]
    fn hurt_knocks_back_and_grants_invincibility() {
        let mut store = store();
        let mut hero = hero_at(Point::new(80, 80));
        let mut fixture = Fixture::default();
        let life = fixture.state.equipment.life();
        {
            let mut services = fixture.services();
            assert!(hero.hurt(Point::new(60, 75), 2, &mut store, &mut services));
            assert!(!hero.hurt(Point::new(60, 75), 2, &mut store, &mut services));
        }
        assert_eq!(fixture.state.equipment.life(), life - 2);
        run(&mut hero, &mut store, &mut fixture, 30);
        assert!(hero.base().xy().x > 80);
        assert!(hero.state().is_free());
        assert!(hero.is_invincible(fixture.now));
    }

    #[test]
    fn deep_water_without_swimming_returns_to_solid_ground() {
        let mut store = store();
        store.add_entity(Entity::dynamic_tile(
            "pool",
            Layer::Low,
            Rect::new(64, 0, 32, 160),
            "water",
            Ground::DeepWater,
        ));
        let mut hero = hero_at(Point::new(48, 45));
        let mut fixture = Fixture::default();
        fixture.state.equipment = Equipment::new(12);
        fixture.commands.press(Command::Right);
        run(&mut hero, &mut store, &mut fixture, 40);
        assert!(matches!(hero.state(), HeroState::Plunging { .. }));
        fixture.commands.release(Command::Right);
        run(&mut hero, &mut store, &mut fixture, 120);
        assert!(hero.state().is_free());
        assert!(hero.base().xy().x < 64);
        assert_eq!(fixture.state.equipment.life(), 11);
    }

    #[test]
    fn held_sword_loads_a_spin_attack() {
        let mut store = store();
        let mut hero = hero_at(Point::new(80, 80));
        let mut fixture = Fixture::default();
        fixture.state.equipment.set_ability("sword", 1);
        fixture.commands.press(Command::Attack);
        {
            let mut services = fixture.services();
            hero.notify_command_pressed(Command::Attack, &mut store, &mut services);
        }
        assert!(hero.sword_area().is_some());
        run(&mut hero, &mut store, &mut fixture, 31);
        assert!(matches!(hero.state(), HeroState::SwordLoading { .. }));
        run(&mut hero, &mut store, &mut fixture, 101);
        fixture.commands.release(Command::Attack);
        run(&mut hero, &mut store, &mut fixture, 1);
        assert!(matches!(hero.state(), HeroState::SpinAttack { .. }));
        assert!(fixture
            .sounds
            .played
            .iter()
            .any(|sound| sound == "sword_spin_attack_load"));
    }

    #[test]
    fn lifting_then_throwing_spawns_a_thrown_item() {
        let mut store = store();
        let mut hero = hero_at(Point::new(40, 45));
        let pot = store
            .add_entity(Entity::destructible(
                "pot",
                Layer::Low,
                Point::new(56, 45),
                DestructibleSubtype::Pot,
                None,
            ))
            .expect("pot id");
        hero.base_mut().set_facing_entity(Some(pot));
        let mut fixture = Fixture::default();
        fixture.state.keys_effect.action = ActionKeyEffect::Lift;
        {
            let mut services = fixture.services();
            hero.notify_command_pressed(Command::Action, &mut store, &mut services);
        }
        assert!(matches!(hero.state(), HeroState::Lifting { .. }));
        assert!(store.entity(pot).is_some_and(Entity::is_being_removed));
        run(&mut hero, &mut store, &mut fixture, 31);
        assert!(matches!(hero.state(), HeroState::Carrying { item: Some(_) }));
        assert_eq!(fixture.state.keys_effect.action, ActionKeyEffect::Throw);

        {
            let mut services = fixture.services();
            hero.notify_command_pressed(Command::Action, &mut store, &mut services);
        }
        assert!(hero.state().is_free());
        assert_eq!(store.get_entities_by_type(EntityType::CarriedItem).len(), 1);
    }

    #[test]
    fn thrown_item_is_in_the_store_before_the_next_state_starts() {
        let mut store = store();
        let mut hero = hero_at(Point::new(40, 45));
        let pot = store
            .add_entity(Entity::destructible(
                "pot",
                Layer::Low,
                Point::new(56, 45),
                DestructibleSubtype::Pot,
                None,
            ))
            .expect("pot id");
        hero.base_mut().set_facing_entity(Some(pot));
        let mut fixture = Fixture::default();
        fixture.state.equipment.set_item("bombs", 1, Some(10));
        fixture.state.equipment.add_amount("bombs", 3);
        fixture.state.keys_effect.action = ActionKeyEffect::Lift;
        {
            let mut services = fixture.services();
            hero.notify_command_pressed(Command::Action, &mut store, &mut services);
        }
        run(&mut hero, &mut store, &mut fixture, 31);
        assert!(matches!(hero.state(), HeroState::Carrying { item: Some(_) }));

        {
            let mut services = fixture.services();
            hero.set_state(
                HeroState::UsingInventoryItem {
                    item: "bombs".to_string(),
                    end_date: 0,
                },
                &mut store,
                &mut services,
            );
        }
        let position_of = |entity_type: EntityType| {
            store
                .ids()
                .iter()
                .position(|id| store.entity(*id).is_some_and(|entity| entity.entity_type() == entity_type))
                .expect("entity in the store")
        };
        assert!(position_of(EntityType::CarriedItem) < position_of(EntityType::Bomb));
        let throw = fixture.sounds.played.iter().position(|sound| sound == "throw");
        let bomb = fixture.sounds.played.iter().position(|sound| sound == "bomb");
        assert!(throw.is_some() && throw < bomb);
    }

    #[test]
    fn treasure_waits_for_the_dialog() {
        let mut store = store();
        let mut hero = hero_at(Point::new(40, 45));
        let mut fixture = Fixture::default();
        {
            let mut services = fixture.services();
            hero.start_treasure(
                Treasure::new("sword", 1).with_savegame_variable("got_sword"),
                &mut store,
                &mut services,
            );
        }
        assert_eq!(fixture.dialogs.started, vec!["_treasure.sword.1".to_string()]);
        assert!(fixture.state.savegame.get_boolean("got_sword"));
        run(&mut hero, &mut store, &mut fixture, 5);
        assert!(hero.state().is_brandishing_treasure());
        fixture.dialogs.enabled = false;
        run(&mut hero, &mut store, &mut fixture, 1);
        assert!(hero.state().is_free());
        assert!(fixture.has_event("treasure:sword:1"));
    }

    #[test]
    fn suspension_shifts_state_deadlines() {
        let mut store = store();
        let mut hero = hero_at(Point::new(40, 45));
        let mut fixture = Fixture::default();
        {
            let mut services = fixture.services();
            hero.start_victory(&mut store, &mut services);
        }
        hero.set_suspended(true, 0);
        hero.set_suspended(false, 5_000);
        let HeroState::Victory { end_date } = hero.state() else {
            panic!("expected the victory state");
        };
        assert_eq!(*end_date, 6_500);
    }
}
