//! Detector pass: every enabled entity and the hero are tested against the
//! detectors of their layer. Positive tests are collected first and
//! dispatched afterwards, so a reaction may remove entities freely.

use tracing::{debug, info};

use crate::game::{ActionKeyEffect, MapChange, Services, SwordKeyEffect};
use crate::hero::state::CONVEYOR_BELT_SPEED;
use crate::hero::{give_treasure, Hero};
use crate::movement::{Movement, MovementTarget};

use super::base::EntityId;
use super::behaviour::break_carried_item;
use super::detector::{separator_side, test_collision, Collider, CollisionMode};
use super::kinds::{
    EnemyAttack, Entity, EntityKind, EntityType, ReactionKind,
    SeparatorData, SwitchSubtype, ARROW_STUCK_DURATION_MS, BOOMERANG_SPEED, CRYSTAL_HIT_DELAY_MS,
};
use super::registry::EntityStore;

/// Time an enemy cannot be hurt again after a hit.
const ENEMY_INVULNERABILITY_MS: u64 = 500;
const ENEMY_IMMOBILIZED_MS: u64 = 5_000;
const EXPLOSION_DAMAGE_ON_HERO: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Hero,
    Entity(EntityId),
}

#[derive(Debug, Clone, Copy)]
struct CollisionEvent {
    detector: EntityId,
    subject: Subject,
    mode: CollisionMode,
}

pub(crate) fn check_collisions(store: &mut EntityStore, hero: &mut Hero, services: &mut Services<'_>) {
    let previously_overlapping = clear_overlap_flags(store);
    let events = collect_events(store, hero);
    for event in events {
        dispatch(store, hero, event, services);
    }
    finish_overlaps(store, hero, &previously_overlapping, services);
    check_sword_hits(store, hero, services);
    update_facing_entity(store, hero, services);
}

/// Resets the "currently overlapping" flags; returns the switches and
/// sensors that were overlapped during the previous pass.
fn clear_overlap_flags(store: &mut EntityStore) -> Vec<EntityId> {
    let mut previously = Vec::new();
    for id in store.detectors().to_vec() {
        let Some(entity) = store.entity_mut(id) else {
            continue;
        };
        let flag = match entity.kind_mut() {
            EntityKind::Switch(data) => &mut data.overlapping,
            EntityKind::Sensor(data) => &mut data.overlapping,
            _ => continue,
        };
        if std::mem::take(flag) {
            previously.push(id);
        }
    }
    previously
}

fn is_active(entity: &Entity) -> bool {
    entity.is_enabled() && !entity.is_being_removed()
}

fn collect_events(store: &EntityStore, hero: &Hero) -> Vec<CollisionEvent> {
    let mut events = Vec::new();
    let hero_collider = Collider {
        base: hero.base(),
        is_hero: true,
        facing_direction4: hero.base().direction(),
        moving_direction8: hero.base().movement().and_then(Movement::direction8),
        ground: hero.base().ground_below(),
    };

    for &detector_id in store.detectors() {
        let Some(detector) = store.entity(detector_id).filter(|entity| is_active(entity)) else {
            continue;
        };
        let modes = detector.collision_modes();
        if modes.is_empty() {
            continue;
        }
        let layer_independent = detector.has_layer_independent_collisions();

        if layer_independent || detector.layer() == hero.base().layer() {
            if let Some(mode) = modes
                .iter()
                .find(|mode| test_collision(detector, &hero_collider, *mode))
            {
                events.push(CollisionEvent {
                    detector: detector_id,
                    subject: Subject::Hero,
                    mode,
                });
            }
        }

        for &subject_id in store.ids() {
            if subject_id == detector_id {
                continue;
            }
            let Some(subject) = store.entity(subject_id).filter(|entity| is_active(entity)) else {
                continue;
            };
            if !layer_independent && subject.layer() != detector.layer() {
                continue;
            }
            let collider = Collider {
                base: subject.base(),
                is_hero: false,
                facing_direction4: subject.base().direction() % 4,
                moving_direction8: subject.base().movement().and_then(Movement::direction8),
                ground: subject.base().ground_below(),
            };
            let found = modes
                .iter()
                .filter(|mode| *mode != CollisionMode::FacingPoint)
                .find(|mode| test_collision(detector, &collider, *mode));
            if let Some(mode) = found {
                events.push(CollisionEvent {
                    detector: detector_id,
                    subject: Subject::Entity(subject_id),
                    mode,
                });
            }
        }
    }
    events
}

fn dispatch(
    store: &mut EntityStore,
    hero: &mut Hero,
    event: CollisionEvent,
    services: &mut Services<'_>,
) {
    // an earlier reaction of this pass may have removed either side
    let Some(detector) = store.entity(event.detector).filter(|entity| is_active(entity)) else {
        return;
    };
    match event.subject {
        // facing-point detectors are resolved by the facing entity pass
        Subject::Hero if event.mode == CollisionMode::FacingPoint => {}
        Subject::Hero => {
            let detector_type = detector.entity_type();
            notify_hero_collision(store, hero, event.detector, detector_type, services)
        }
        Subject::Entity(subject) => {
            if store.entity(subject).is_some_and(is_active) {
                notify_entity_collision(store, event.detector, subject, services);
            }
        }
    }
}

fn notify_hero_collision(
    store: &mut EntityStore,
    hero: &mut Hero,
    id: EntityId,
    detector_type: EntityType,
    services: &mut Services<'_>,
) {
    let now = services.now;
    match detector_type {
        EntityType::Switch => {
            let avoid = hero.state().can_avoid_switch();
            let Some(EntityKind::Switch(data)) = store.entity_mut(id).map(Entity::kind_mut) else {
                return;
            };
            data.overlapping = true;
            if !avoid && data.is_walkable() && !data.needs_block {
                activate_switch(store, id, services);
            }
        }
        EntityType::Sensor => {
            let avoid = hero.state().can_avoid_sensor();
            let Some(entity) = store.entity_mut(id) else {
                return;
            };
            let name = entity.name().to_string();
            let EntityKind::Sensor(data) = entity.kind_mut() else {
                return;
            };
            data.overlapping = true;
            if !avoid && !data.hero_inside {
                data.hero_inside = true;
                debug!(sensor = %name, "sensor_activated");
                services.hooks.on_sensor_activated(&name);
            }
        }
        EntityType::ConveyorBelt => {
            let Some(belt) = store.entity(id) else {
                return;
            };
            let EntityKind::ConveyorBelt { direction4 } = *belt.kind() else {
                return;
            };
            let belt_box = belt.bounding_box();
            hero.notify_collision_with_conveyor_belt(id, belt_box, direction4, store, services);
        }
        EntityType::Teletransporter => {
            if hero.state().can_avoid_teletransporter() {
                return;
            }
            let Some(entity) = store.entity_mut(id) else {
                return;
            };
            let name = entity.name().to_string();
            let EntityKind::Teletransporter(data) = entity.kind_mut() else {
                return;
            };
            if data.transporting_hero {
                return;
            }
            data.transporting_hero = true;
            let change = MapChange {
                map_id: data.destination_map.clone(),
                destination: data.resolved_destination(),
                transition_direction: data.transition_direction(),
            };
            info!(
                teletransporter = %name,
                map = %change.map_id,
                destination = %change.destination,
                "teletransporter_activated"
            );
            services.hooks.on_teletransporter_activated(&name);
            services.state.request_map_change(change);
        }
        EntityType::Jumper => {
            let Some(EntityKind::Jumper(data)) = store.entity(id).map(Entity::kind) else {
                return;
            };
            let (direction8, length) = (data.direction8, data.jump_length);
            hero.start_jumping(direction8, length, store, services);
        }
        EntityType::Stairs => {
            let Some(stairs) = store.entity(id) else {
                return;
            };
            let EntityKind::Stairs(data) = stairs.kind() else {
                return;
            };
            hero.take_stairs(stairs.layer(), data.direction4, services);
        }
        EntityType::Separator => {
            let center = hero.base().center();
            let Some(entity) = store.entity_mut(id) else {
                return;
            };
            let name = entity.name().to_string();
            let bbox = entity.bounding_box();
            let EntityKind::Separator(data) = entity.kind_mut() else {
                return;
            };
            let Some(side) = separator_side(&bbox, center) else {
                return;
            };
            let previous = data.hero_side.replace(side);
            if previous.is_some() {
                let direction4 = match (SeparatorData::is_vertical(&bbox), side > 0) {
                    (true, true) => 0,
                    (true, false) => 2,
                    (false, true) => 3,
                    (false, false) => 1,
                };
                debug!(separator = %name, direction4, "separator_crossed");
                services.hooks.on_separator_crossed(&name, direction4);
            }
        }
        EntityType::Enemy => {
            let Some(enemy) = store.entity(id) else {
                return;
            };
            let EntityKind::Enemy(data) = enemy.kind() else {
                return;
            };
            if data.damage > 0 && !data.is_immobilized(now) {
                let (source, damage) = (enemy.base().center(), data.damage);
                hero.hurt(source, damage, store, services);
            }
        }
        EntityType::Explosion => {
            if hero.state().can_avoid_explosion() {
                return;
            }
            let Some(entity) = store.entity_mut(id) else {
                return;
            };
            let source = entity.base().center();
            let EntityKind::Explosion(data) = entity.kind_mut() else {
                return;
            };
            if data.hero_hit {
                return;
            }
            data.hero_hit = true;
            hero.hurt(source, EXPLOSION_DAMAGE_ON_HERO, store, services);
        }
        _ => {}
    }
}

fn notify_entity_collision(
    store: &mut EntityStore,
    detector: EntityId,
    subject: EntityId,
    services: &mut Services<'_>,
) {
    let (Some(detector_type), Some(subject_type)) = (
        store.entity(detector).map(Entity::entity_type),
        store.entity(subject).map(Entity::entity_type),
    ) else {
        return;
    };
    match (detector_type, subject_type) {
        (EntityType::Switch, EntityType::Block) => {
            let Some(EntityKind::Switch(data)) = store.entity_mut(detector).map(Entity::kind_mut) else {
                return;
            };
            if data.is_walkable() {
                data.overlapping = true;
                activate_switch(store, detector, services);
            }
        }
        (EntityType::Switch, EntityType::Arrow) if is_flying_arrow(store, subject) => {
            let arrow_target = matches!(
                store.entity(detector).map(Entity::kind),
                Some(EntityKind::Switch(data)) if data.subtype == SwitchSubtype::ArrowTarget
            );
            if arrow_target {
                activate_switch(store, detector, services);
                stick_arrow(store, subject, services);
            }
        }
        (EntityType::ConveyorBelt, EntityType::Bomb) => carry_bomb(store, detector, subject),
        (EntityType::Explosion, _) => {
            explosion_hit(store, detector, subject, subject_type, services)
        }
        (EntityType::Enemy, EntityType::Arrow) if is_flying_arrow(store, subject) => {
            if attack_enemy(store, detector, EnemyAttack::Arrow, 1, services) {
                store.remove_entity(subject);
            }
        }
        (EntityType::Enemy, EntityType::Boomerang) if is_boomerang_going_out(store, subject) => {
            attack_enemy(store, detector, EnemyAttack::Boomerang, 1, services);
            send_boomerang_back(store, subject);
        }
        (EntityType::Enemy, EntityType::CarriedItem) => {
            let Some(EntityKind::CarriedItem(item)) = store.entity(subject).map(Entity::kind) else {
                return;
            };
            if !item.is_thrown() {
                return;
            }
            let damage = item.damage_on_enemies;
            attack_enemy(store, detector, EnemyAttack::ThrownItem, damage, services);
            if let Some(sound) = store
                .entity_mut(subject)
                .and_then(|item| break_carried_item(item, services.now))
            {
                services.play_sound(sound);
            }
        }
        (EntityType::Crystal, EntityType::Arrow) if is_flying_arrow(store, subject) => {
            hit_crystal(store, detector, services);
            stick_arrow(store, subject, services);
        }
        (EntityType::Crystal, EntityType::Boomerang) if is_boomerang_going_out(store, subject) => {
            hit_crystal(store, detector, services);
            send_boomerang_back(store, subject);
        }
        _ => {}
    }
}

fn is_flying_arrow(store: &EntityStore, id: EntityId) -> bool {
    matches!(
        store.entity(id).map(Entity::kind),
        Some(EntityKind::Arrow(data)) if data.stuck_until.is_none()
    )
}

fn is_boomerang_going_out(store: &EntityStore, id: EntityId) -> bool {
    matches!(
        store.entity(id).map(Entity::kind),
        Some(EntityKind::Boomerang(data)) if !data.going_back
    )
}

/// Pushes an idle bomb whose center lies on the belt one belt length further.
fn carry_bomb(store: &mut EntityStore, belt: EntityId, bomb: EntityId) {
    let Some(belt) = store.entity(belt) else {
        return;
    };
    let EntityKind::ConveyorBelt { direction4 } = *belt.kind() else {
        return;
    };
    let belt_box = belt.bounding_box();
    let Some(bomb) = store.entity_mut(bomb) else {
        return;
    };
    let idle = bomb.base().movement().map_or(true, Movement::is_finished);
    if idle && belt_box.contains_point(bomb.base().center()) {
        let step = direction4 * 2;
        bomb.base_mut()
            .set_movement(Movement::path(&[step, step], CONVEYOR_BELT_SPEED, false, false));
    }
}

/// An explosion affects each victim once during its lifetime.
fn explosion_hit(
    store: &mut EntityStore,
    explosion: EntityId,
    victim: EntityId,
    victim_type: EntityType,
    services: &mut Services<'_>,
) {
    if !matches!(
        victim_type,
        EntityType::Enemy | EntityType::Bomb | EntityType::Destructible | EntityType::Crystal
    ) {
        return;
    }
    let Some(EntityKind::Explosion(data)) = store.entity_mut(explosion).map(Entity::kind_mut) else {
        return;
    };
    if data.victims.contains(&victim) {
        return;
    }
    data.victims.push(victim);
    match victim_type {
        EntityType::Enemy => {
            attack_enemy(store, victim, EnemyAttack::Explosion, 1, services);
        }
        EntityType::Bomb => {
            if let Some(EntityKind::Bomb(bomb)) = store.entity_mut(victim).map(Entity::kind_mut) {
                bomb.explosion_date = bomb.explosion_date.min(services.now);
            }
        }
        EntityType::Destructible => destroy_destructible(store, victim, services),
        _ => hit_crystal(store, victim, services),
    }
}

/// Clears flags left over from overlaps that ended during this pass.
fn finish_overlaps(
    store: &mut EntityStore,
    hero: &Hero,
    previously_overlapping: &[EntityId],
    services: &mut Services<'_>,
) {
    let hero_box = hero.base().bounding_box();
    for id in store.detectors().to_vec() {
        let was_overlapping = previously_overlapping.contains(&id);
        let Some(entity) = store.entity_mut(id) else {
            continue;
        };
        let name = entity.name().to_string();
        let overlaps_hero = entity.bounding_box().overlaps(&hero_box);
        match entity.kind_mut() {
            EntityKind::Switch(data) if was_overlapping && !data.overlapping => {
                services.hooks.on_switch_left(&name);
                if data.is_walkable() && data.inactivate_when_leaving && data.activated && !data.locked {
                    data.activated = false;
                    debug!(switch = %name, "switch_inactivated");
                    services.play_sound("switch");
                    services.hooks.on_switch_inactivated(&name);
                }
            }
            EntityKind::Sensor(data) if data.hero_inside && !data.overlapping => {
                data.hero_inside = false;
                services.hooks.on_sensor_left(&name);
            }
            EntityKind::Teletransporter(data) if data.transporting_hero && !overlaps_hero => {
                data.transporting_hero = false;
            }
            _ => {}
        }
    }
}

fn check_sword_hits(store: &mut EntityStore, hero: &Hero, services: &mut Services<'_>) {
    let Some(area) = hero.sword_area() else {
        return;
    };
    let layer = hero.base().layer();
    let factor = hero.state().sword_damage_factor();
    for id in store.ids().to_vec() {
        let target = store
            .entity(id)
            .filter(|entity| is_active(entity) && entity.layer() == layer)
            .filter(|entity| entity.bounding_box().overlaps(&area))
            .and_then(sword_target);
        match target {
            Some(EntityType::Enemy) => {
                attack_enemy(store, id, EnemyAttack::Sword, factor, services);
            }
            Some(EntityType::Destructible) => destroy_destructible(store, id, services),
            Some(EntityType::Switch) => activate_switch(store, id, services),
            Some(EntityType::Crystal) => hit_crystal(store, id, services),
            _ => {}
        }
    }
}

fn sword_target(entity: &Entity) -> Option<EntityType> {
    match entity.kind() {
        EntityKind::Enemy(_) => Some(EntityType::Enemy),
        EntityKind::Destructible(data) if data.can_be_cut() => Some(EntityType::Destructible),
        EntityKind::Switch(data) if data.subtype == SwitchSubtype::Solid => Some(EntityType::Switch),
        EntityKind::Crystal(_) => Some(EntityType::Crystal),
        _ => None,
    }
}

/// Finds the detector in front of the hero and the action key effect it
/// offers while the hero is free.
fn update_facing_entity(store: &EntityStore, hero: &mut Hero, services: &mut Services<'_>) {
    let direction4 = hero.base().direction();
    let point = hero.base().facing_point_towards(direction4);
    let layer = hero.base().layer();
    let facing = store.detectors().iter().copied().find(|id| {
        store.entity(*id).is_some_and(|entity| {
            is_active(entity)
                && entity.layer() == layer
                && entity.collision_modes().contains(CollisionMode::FacingPoint)
                && entity.bounding_box().contains_point(point)
        })
    });
    hero.base_mut().set_facing_entity(facing);

    let has_sword = services.state.equipment.has_ability("sword");
    services.state.keys_effect.sword = if has_sword {
        SwordKeyEffect::Sword
    } else {
        SwordKeyEffect::None
    };
    if !hero.state().is_free() {
        return;
    }
    let effect = match facing.and_then(|id| store.entity(id)).map(Entity::kind) {
        Some(EntityKind::ShopItem(_)) => ActionKeyEffect::Look,
        Some(EntityKind::Destructible(data)) if data.can_be_lifted() => ActionKeyEffect::Lift,
        Some(EntityKind::Block(_)) => ActionKeyEffect::Grab,
        _ => ActionKeyEffect::None,
    };
    services.state.keys_effect.action = effect;
}

fn activate_switch(store: &mut EntityStore, id: EntityId, services: &mut Services<'_>) {
    let Some(entity) = store.entity_mut(id) else {
        return;
    };
    let name = entity.name().to_string();
    let EntityKind::Switch(data) = entity.kind_mut() else {
        return;
    };
    if data.activated || data.locked {
        return;
    }
    data.activated = true;
    debug!(switch = %name, "switch_activated");
    services.play_sound("switch");
    services.hooks.on_switch_activated(&name);
}

fn stick_arrow(store: &mut EntityStore, id: EntityId, services: &mut Services<'_>) {
    let Some(entity) = store.entity_mut(id) else {
        return;
    };
    let (base, kind) = entity.parts_mut();
    if let EntityKind::Arrow(data) = kind {
        data.stuck_until = Some(services.now + ARROW_STUCK_DURATION_MS);
        base.clear_movement();
        services.play_sound("arrow_hit");
    }
}

fn send_boomerang_back(store: &mut EntityStore, id: EntityId) {
    let Some(entity) = store.entity_mut(id) else {
        return;
    };
    let (base, kind) = entity.parts_mut();
    if let EntityKind::Boomerang(data) = kind {
        data.going_back = true;
        base.set_movement(Movement::target(MovementTarget::Hero, BOOMERANG_SPEED, true));
    }
}

/// Applies the enemy's reaction to `attack`. Returns false when the attack
/// had no effect at all.
fn attack_enemy(
    store: &mut EntityStore,
    id: EntityId,
    attack: EnemyAttack,
    factor: i32,
    services: &mut Services<'_>,
) -> bool {
    let now = services.now;
    let Some(entity) = store.entity_mut(id) else {
        return false;
    };
    let name = entity.name().to_string();
    let EntityKind::Enemy(data) = entity.kind_mut() else {
        return false;
    };
    let reaction = data.reactions.for_attack(attack);
    match reaction.kind {
        ReactionKind::Ignored => return false,
        ReactionKind::Protected => {
            services.play_sound("sword_tapping");
            return true;
        }
        ReactionKind::Immobilized => {
            data.immobilized_until = now + ENEMY_IMMOBILIZED_MS;
            debug!(enemy = %name, ?attack, "enemy_immobilized");
            return true;
        }
        ReactionKind::Hurt | ReactionKind::Custom => {}
    }
    if now < data.invulnerable_until {
        return true;
    }
    data.life -= reaction.life_lost * factor;
    if reaction.kind == ReactionKind::Hurt {
        data.invulnerable_until = now + ENEMY_INVULNERABILITY_MS;
        services.play_sound("enemy_hurt");
    }
    debug!(enemy = %name, ?attack, life = data.life, "enemy_hurt");
    if data.life > 0 {
        return true;
    }

    if let Some(variable) = data.savegame_variable.clone() {
        services.state.savegame.set_boolean(variable, true);
    }
    info!(enemy = %name, breed = %data.breed, "enemy_killed");
    services.play_sound("enemy_killed");
    store.remove_entity(id);
    services.hooks.on_enemy_dead(&name);
    true
}

fn destroy_destructible(store: &mut EntityStore, id: EntityId, services: &mut Services<'_>) {
    let Some(EntityKind::Destructible(data)) = store.entity(id).map(Entity::kind) else {
        return;
    };
    let treasure = data.treasure.clone();
    services.play_sound(data.destruction_sound());
    if let Some(treasure) = treasure {
        give_treasure(&treasure, services);
    }
    store.remove_entity(id);
}

/// Toggles the crystal state, raising or lowering every crystal block.
fn hit_crystal(store: &mut EntityStore, id: EntityId, services: &mut Services<'_>) {
    let now = services.now;
    let Some(EntityKind::Crystal(data)) = store.entity_mut(id).map(Entity::kind_mut) else {
        return;
    };
    if now < data.next_possible_hit_date {
        return;
    }
    data.next_possible_hit_date = now + CRYSTAL_HIT_DELAY_MS;
    let state = services.state.toggle_crystal_state();
    services.play_sound("switch");
    debug!(crystal_state = state, "crystal_state_changed");
    store.apply_crystal_state(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::kinds::{CrystalBlockSubtype, DestructibleSubtype, SwitchSubtype};
    use crate::entities::MapEntities;
    use crate::game::testing::{test_tileset, Fixture};
    use crate::game::{Command, Treasure};
    use crate::geometry::{Layer, Point, Rect};
    use crate::hero::HeroState;

    fn map() -> MapEntities {
        MapEntities::new("collision_test", 160, 160, test_tileset())
    }

    fn run(map: &mut MapEntities, fixture: &mut Fixture, ms: u64) {
        for _ in 0..ms / 10 {
            fixture.now += 10;
            let mut services = fixture.services();
            map.update(&mut services);
        }
    }

    fn press(map: &mut MapEntities, fixture: &mut Fixture, command: Command) {
        fixture.commands.press(command);
        let mut services = fixture.services();
        map.notify_command_pressed(command, &mut services);
    }

    #[test]
    fn conveyor_belt_carries_the_hero_one_belt_length() {
        let mut map = map();
        map.add_entity(Entity::conveyor_belt("belt", Layer::Low, Point::new(80, 80), 2))
            .expect("belt handle");
        map.hero_mut().place(Point::new(80, 80), Layer::Low, 3);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 10);
        assert!(matches!(
            map.hero().state(),
            HeroState::ConveyorBelt { direction4: 2, .. }
        ));

        run(&mut map, &mut fixture, 100);
        assert!(matches!(map.hero().state(), HeroState::ConveyorBelt { .. }));
        assert!(map.hero().base().xy().x < 80);

        run(&mut map, &mut fixture, 400);
        assert!(map.hero().state().is_free());
        assert_eq!(map.hero().base().xy(), Point::new(64, 80));
    }

    #[test]
    fn off_center_hero_snaps_at_two_thirds_of_walking_speed() {
        let mut map = map();
        map.add_entity(Entity::conveyor_belt("belt", Layer::Low, Point::new(80, 80), 2))
            .expect("belt handle");
        map.hero_mut().place(Point::new(86, 80), Layer::Low, 3);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 10);
        assert!(matches!(
            map.hero().state(),
            HeroState::ConveyorBelt { snapping: true, .. }
        ));
        let snap_speed = map.hero().base().movement().map(|movement| movement.speed());
        assert_eq!(snap_speed, Some(map.hero().walking_speed() * 2 / 3));

        run(&mut map, &mut fixture, 500);
        assert!(map.hero().state().is_free());
        assert_eq!(map.hero().base().xy(), Point::new(64, 80));
    }

    #[test]
    fn walkable_switch_turns_off_when_left() {
        let mut map = map();
        let id = map
            .add_entity(Entity::switch(
                "switch",
                Layer::Low,
                Point::new(64, 64),
                SwitchSubtype::WalkableVisible,
                false,
                true,
            ))
            .expect("switch handle");
        map.hero_mut().place(Point::new(72, 77), Layer::Low, 3);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 10);
        assert!(fixture.has_event("switch_activated:switch"));
        let activated = |map: &MapEntities| {
            matches!(map.store().entity(id).map(Entity::kind), Some(EntityKind::Switch(data)) if data.is_activated())
        };
        assert!(activated(&map));

        map.hero_mut().place(Point::new(24, 29), Layer::Low, 3);
        run(&mut map, &mut fixture, 10);
        assert!(fixture.has_event("switch_inactivated:switch"));
        assert!(!activated(&map));
    }

    #[test]
    fn hero_standing_on_an_arrow_target_leaves_it_off() {
        let mut map = map();
        let id = map
            .add_entity(Entity::switch(
                "target",
                Layer::Low,
                Point::new(64, 64),
                SwitchSubtype::ArrowTarget,
                false,
                false,
            ))
            .expect("target handle");
        map.hero_mut().place(Point::new(72, 77), Layer::Low, 3);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 20);
        assert!(!fixture.has_event("switch_activated:target"));
        assert!(matches!(
            map.store().entity(id).map(Entity::kind),
            Some(EntityKind::Switch(data)) if !data.is_activated()
        ));
    }

    #[test]
    fn sensor_reports_entering_and_leaving() {
        let mut map = map();
        map.add_entity(Entity::sensor("sensor", Layer::Low, Rect::new(64, 64, 16, 16)))
            .expect("sensor handle");
        map.hero_mut().place(Point::new(72, 72), Layer::Low, 3);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 30);
        let activations = fixture
            .hooks
            .events
            .iter()
            .filter(|event| *event == "sensor_activated:sensor")
            .count();
        assert_eq!(activations, 1);

        map.hero_mut().place(Point::new(24, 29), Layer::Low, 3);
        run(&mut map, &mut fixture, 10);
        assert!(fixture.has_event("sensor_left:sensor"));
    }

    #[test]
    fn teletransporter_requests_a_map_change() {
        let mut map = map();
        map.add_entity(Entity::teletransporter(
            "to_cave",
            Layer::Low,
            Rect::new(64, 64, 16, 16),
            "cave",
            "entrance",
            (160, 160),
        ))
        .expect("teletransporter handle");
        map.hero_mut().place(Point::new(72, 77), Layer::Low, 3);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 10);
        assert_eq!(
            fixture.state.pending_map_change(),
            Some(&MapChange {
                map_id: "cave".to_string(),
                destination: "entrance".to_string(),
                transition_direction: None,
            })
        );
        assert!(fixture.has_event("teletransporter:to_cave"));
    }

    #[test]
    fn hero_arriving_on_a_teletransporter_stays() {
        let mut map = map();
        map.add_entity(Entity::teletransporter(
            "to_cave",
            Layer::Low,
            Rect::new(64, 64, 16, 16),
            "cave",
            "entrance",
            (160, 160),
        ))
        .expect("teletransporter handle");
        map.hero_mut().place(Point::new(72, 77), Layer::Low, 3);
        let mut fixture = Fixture::default();
        map.notify_map_started(&mut fixture.services());

        run(&mut map, &mut fixture, 50);
        assert!(fixture.state.pending_map_change().is_none());
    }

    #[test]
    fn sword_cuts_bushes_and_hurts_enemies() {
        let mut map = map();
        let bush = map
            .add_entity(Entity::destructible(
                "bush",
                Layer::Low,
                Point::new(56, 45),
                DestructibleSubtype::Bush,
                Some(Treasure::new("rupee", 5)),
            ))
            .expect("bush handle");
        let enemy = map
            .add_entity(Entity::enemy("soldier", Layer::Low, Point::new(56, 29), "soldier", 2, 0))
            .expect("enemy handle");
        map.hero_mut().place(Point::new(40, 45), Layer::Low, 0);
        let mut fixture = Fixture::default();
        fixture.state.equipment.set_ability("sword", 1);

        press(&mut map, &mut fixture, Command::Attack);
        run(&mut map, &mut fixture, 10);
        assert!(map.store().entity(bush).is_none());
        assert!(fixture.sounds.played.iter().any(|sound| sound == "bush"));
        assert!(fixture.has_event("treasure:rupee:5"));
        // the enemy sits above the sword's reach
        let life = |map: &MapEntities| match map.store().entity(enemy).map(Entity::kind) {
            Some(EntityKind::Enemy(data)) => Some(data.life()),
            _ => None,
        };
        assert_eq!(life(&map), Some(2));

        map.store_mut()
            .entity_mut(enemy)
            .expect("enemy")
            .base_mut()
            .set_xy(Point::new(56, 45));
        run(&mut map, &mut fixture, 10);
        assert_eq!(life(&map), Some(1));
        run(&mut map, &mut fixture, 200);
        assert_eq!(life(&map), Some(1));
    }

    #[test]
    fn spin_attack_kills_with_double_damage() {
        let mut map = map();
        let enemy = map
            .add_entity(Entity::enemy("soldier", Layer::Low, Point::new(64, 45), "soldier", 2, 0))
            .expect("enemy handle");
        map.hero_mut().place(Point::new(40, 45), Layer::Low, 0);
        let mut fixture = Fixture::default();
        {
            let (hero, store) = map.parts_mut();
            hero.set_state(HeroState::SpinAttack { end_date: 0 }, store, &mut fixture.services());
        }
        assert_eq!(map.hero().sword_area(), Some(Rect::new(16, 16, 48, 48)));

        run(&mut map, &mut fixture, 10);
        assert!(map.store().entity(enemy).is_none());
        assert!(fixture.has_event("enemy_dead:soldier"));
        assert!(fixture.has_event("removed:soldier"));
    }

    #[test]
    fn crystal_hit_toggles_blocks_once_per_delay() {
        let mut map = map();
        map.add_entity(Entity::crystal("crystal", Layer::Low, Point::new(56, 45)))
            .expect("crystal handle");
        let block = map
            .add_entity(Entity::crystal_block(
                "orange",
                Layer::Low,
                Rect::new(112, 112, 16, 16),
                CrystalBlockSubtype::Orange,
                false,
            ))
            .expect("block handle");
        map.hero_mut().place(Point::new(40, 45), Layer::Low, 0);
        let mut fixture = Fixture::default();
        fixture.state.equipment.set_ability("sword", 1);

        press(&mut map, &mut fixture, Command::Attack);
        run(&mut map, &mut fixture, 200);
        assert!(fixture.state.crystal_state());
        let raised = matches!(
            map.store().entity(block).map(Entity::kind),
            Some(EntityKind::CrystalBlock(data)) if data.is_raised()
        );
        assert!(!raised);
    }

    #[test]
    fn explosion_hurts_each_victim_once() {
        let mut map = map();
        let enemy = map
            .add_entity(Entity::enemy("soldier", Layer::Low, Point::new(80, 80), "soldier", 3, 0))
            .expect("enemy handle");
        map.add_entity(Entity::explosion(Layer::Low, Point::new(80, 75), 0))
            .expect("explosion handle");
        map.hero_mut().place(Point::new(90, 95), Layer::Low, 3);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 100);
        let life = match map.store().entity(enemy).map(Entity::kind) {
            Some(EntityKind::Enemy(data)) => Some(data.life()),
            _ => None,
        };
        assert_eq!(life, Some(1));
        assert_eq!(fixture.state.equipment.life(), 10);
    }

    #[test]
    fn facing_a_shop_item_offers_look() {
        let mut map = map();
        let shop_item = map
            .add_entity(Entity::shop_item(
                "bombs_for_sale",
                Layer::Low,
                Point::new(64, 32),
                Treasure::new("bombs", 10),
                20,
                "shop.bombs",
            ))
            .expect("shop item handle");
        map.hero_mut().place(Point::new(56, 45), Layer::Low, 0);
        let mut fixture = Fixture::default();

        run(&mut map, &mut fixture, 10);
        assert_eq!(map.hero().base().facing_entity(), Some(shop_item));
        assert_eq!(fixture.state.keys_effect.action, ActionKeyEffect::Look);

        press(&mut map, &mut fixture, Command::Action);
        assert_eq!(fixture.dialogs.started, vec!["shop.bombs".to_string()]);
    }
}
