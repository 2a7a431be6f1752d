use crate::entities::{CarriedPhase, Entity, EntityBase, EntityId, EntityKind};
use crate::game::{ActionKeyEffect, Treasure};
use crate::geometry::{direction4_to_xy, direction8_to_angle, Point};
use crate::map::Ground;
use crate::movement::Movement;

/// Delay before a free hero walking into an obstacle starts pushing.
pub const PUSHING_DELAY_MS: u64 = 800;
/// Time the sword must be held before a spin attack is ready.
pub const SWORD_LOADING_DELAY_MS: u64 = 1_000;
pub const SWORD_SWING_DURATION_MS: u64 = 300;
pub const SPIN_ATTACK_DURATION_MS: u64 = 600;
pub const SWORD_TAPPING_SOUND_DELAY_MS: u64 = 100;
pub const HURT_DURATION_MS: u64 = 200;
pub const HURT_KNOCKBACK_SPEED: i32 = 120;
pub const HURT_KNOCKBACK_DISTANCE: i32 = 24;
pub const LIFTING_DURATION_MS: u64 = 300;
pub const THROW_SPEED: i32 = 200;
pub const THROW_DISTANCE: i32 = 48;
pub const PLUNGING_DURATION_MS: u64 = 500;
pub const FALLING_DURATION_MS: u64 = 500;
pub const RUNNING_PREPARATION_MS: u64 = 500;
pub const RUNNING_SPEED: i32 = 300;
pub const FAST_SWIMMING_DURATION_MS: u64 = 500;
pub const INVENTORY_ITEM_DURATION_MS: u64 = 300;
pub const VICTORY_DURATION_MS: u64 = 1_500;
pub const JUMP_SPEED: i32 = 100;
/// Speed of the path a conveyor belt moves the hero along.
pub const CONVEYOR_BELT_SPEED: i32 = 64;
pub const BLOCK_MOVE_SPEED: i32 = 40;

/// What happens to a carried item when the hero leaves the state carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarriedItemBehavior {
    Throw,
    Destroy,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Preparing,
    Running,
}

/// Side effect of leaving a state, applied before the next state starts.
#[derive(Debug)]
pub(crate) enum StateEffect {
    SpawnEntity(Box<Entity>),
    ClearMovement,
    PlaySound(&'static str),
    SetActionKey(ActionKeyEffect),
}

#[derive(Debug, Clone)]
pub enum HeroState {
    Free {
        pushing_direction4: Option<u8>,
        start_pushing_date: u64,
    },
    Pushing {
        direction4: u8,
        pushed_block: Option<EntityId>,
    },
    Grabbing {
        pulling: bool,
        pulled_block: Option<EntityId>,
    },
    Lifting {
        item: Option<Box<Entity>>,
        end_date: u64,
    },
    Carrying {
        item: Option<Box<Entity>>,
    },
    Swimming {
        fast_until: Option<u64>,
    },
    Plunging {
        ground: Ground,
        end_date: u64,
    },
    ConveyorBelt {
        belt: EntityId,
        direction4: u8,
        snapping: bool,
    },
    Running {
        phase: RunPhase,
        next_phase_date: u64,
    },
    Falling {
        end_date: u64,
    },
    BackToSolidGround,
    Hurt {
        source: Point,
        damage: i32,
        end_date: u64,
    },
    SpinAttack {
        end_date: u64,
    },
    SwordSwinging {
        end_date: u64,
    },
    SwordLoading {
        loaded: bool,
        loaded_date: u64,
    },
    SwordTapping {
        next_sound_date: u64,
    },
    Jumping {
        direction8: u8,
        length: i32,
    },
    UsingInventoryItem {
        item: String,
        end_date: u64,
    },
    Treasure {
        treasure: Treasure,
    },
    Victory {
        end_date: u64,
    },
    Freezed,
}

impl HeroState {
    pub fn free() -> Self {
        HeroState::Free {
            pushing_direction4: None,
            start_pushing_date: 0,
        }
    }

    pub fn hurt(source: Point, damage: i32) -> Self {
        HeroState::Hurt {
            source,
            damage,
            end_date: 0,
        }
    }

    pub fn lifting(item: Entity) -> Self {
        HeroState::Lifting {
            item: Some(Box::new(item)),
            end_date: 0,
        }
    }

    pub fn conveyor_belt(belt: EntityId, direction4: u8) -> Self {
        HeroState::ConveyorBelt {
            belt,
            direction4,
            snapping: true,
        }
    }

    pub fn jumping(direction8: u8, length: i32) -> Self {
        HeroState::Jumping { direction8, length }
    }

    pub fn treasure(treasure: Treasure) -> Self {
        HeroState::Treasure { treasure }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HeroState::Free { .. } => "free",
            HeroState::Pushing { .. } => "pushing",
            HeroState::Grabbing { .. } => "grabbing",
            HeroState::Lifting { .. } => "lifting",
            HeroState::Carrying { .. } => "carrying",
            HeroState::Swimming { .. } => "swimming",
            HeroState::Plunging { .. } => "plunging",
            HeroState::ConveyorBelt { .. } => "conveyor_belt",
            HeroState::Running { .. } => "running",
            HeroState::Falling { .. } => "falling",
            HeroState::BackToSolidGround => "back_to_solid_ground",
            HeroState::Hurt { .. } => "hurt",
            HeroState::SpinAttack { .. } => "spin_attack",
            HeroState::SwordSwinging { .. } => "sword_swinging",
            HeroState::SwordLoading { .. } => "sword_loading",
            HeroState::SwordTapping { .. } => "sword_tapping",
            HeroState::Jumping { .. } => "jumping",
            HeroState::UsingInventoryItem { .. } => "using_inventory_item",
            HeroState::Treasure { .. } => "treasure",
            HeroState::Victory { .. } => "victory",
            HeroState::Freezed => "freezed",
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, HeroState::Free { .. })
    }

    pub fn is_grabbing_or_pulling(&self) -> bool {
        matches!(self, HeroState::Grabbing { .. })
    }

    pub fn is_moving_grabbed_entity(&self) -> bool {
        matches!(
            self,
            HeroState::Pushing {
                pushed_block: Some(_),
                ..
            } | HeroState::Grabbing {
                pulling: true,
                ..
            }
        )
    }

    pub fn is_carrying_item(&self) -> bool {
        matches!(self, HeroState::Lifting { .. } | HeroState::Carrying { .. })
    }

    pub fn carried_item(&self) -> Option<&Entity> {
        match self {
            HeroState::Lifting { item, .. } | HeroState::Carrying { item } => item.as_deref(),
            _ => None,
        }
    }

    pub fn is_using_inventory_item(&self) -> bool {
        matches!(self, HeroState::UsingInventoryItem { .. })
    }

    pub fn is_brandishing_treasure(&self) -> bool {
        matches!(self, HeroState::Treasure { .. })
    }

    pub fn is_jumping(&self) -> bool {
        matches!(self, HeroState::Jumping { .. })
    }

    pub fn is_swimming(&self) -> bool {
        matches!(self, HeroState::Swimming { .. })
    }

    /// Ground effects apply only while touching the ground.
    pub fn is_touching_ground(&self) -> bool {
        !matches!(
            self,
            HeroState::Hurt { .. } | HeroState::Jumping { .. } | HeroState::BackToSolidGround
        )
    }

    /// The sprite keeps its direction whatever the wanted movement.
    pub fn is_direction_locked(&self) -> bool {
        matches!(
            self,
            HeroState::SwordLoading { .. }
                | HeroState::SwordTapping { .. }
                | HeroState::Grabbing { .. }
                | HeroState::Pushing { .. }
        )
    }

    /// States where the directional commands drive a player movement.
    pub fn has_player_movement(&self) -> bool {
        matches!(
            self,
            HeroState::Free { .. }
                | HeroState::Carrying { .. }
                | HeroState::SwordLoading { .. }
                | HeroState::Swimming { .. }
        )
    }

    pub fn can_control_direction(&self) -> bool {
        self.has_player_movement() && !self.is_direction_locked()
    }

    pub fn can_be_hurt(&self) -> bool {
        !matches!(
            self,
            HeroState::Hurt { .. }
                | HeroState::Plunging { .. }
                | HeroState::Falling { .. }
                | HeroState::BackToSolidGround
                | HeroState::Treasure { .. }
                | HeroState::Victory { .. }
                | HeroState::Freezed
                | HeroState::Jumping { .. }
        )
    }

    pub fn can_start_sword(&self) -> bool {
        matches!(
            self,
            HeroState::Free { .. } | HeroState::Carrying { .. } | HeroState::Pushing { .. }
        )
    }

    pub fn can_start_item(&self) -> bool {
        self.is_free()
    }

    pub fn can_take_stairs(&self) -> bool {
        matches!(
            self,
            HeroState::Free { .. }
                | HeroState::Carrying { .. }
                | HeroState::SwordLoading { .. }
                | HeroState::Running { .. }
        )
    }

    pub fn can_take_jumper(&self) -> bool {
        matches!(
            self,
            HeroState::Free { .. }
                | HeroState::Carrying { .. }
                | HeroState::SwordLoading { .. }
                | HeroState::Running { .. }
                | HeroState::Swimming { .. }
        )
    }

    fn is_airborne_or_scripted(&self) -> bool {
        matches!(
            self,
            HeroState::Plunging { .. }
                | HeroState::BackToSolidGround
                | HeroState::Jumping { .. }
                | HeroState::Treasure { .. }
                | HeroState::Victory { .. }
                | HeroState::Freezed
        )
    }

    pub fn can_avoid_deep_water(&self) -> bool {
        self.is_swimming() || self.is_airborne_or_scripted() || matches!(self, HeroState::Falling { .. })
    }

    pub fn can_avoid_hole(&self) -> bool {
        self.is_airborne_or_scripted() || matches!(self, HeroState::Falling { .. })
    }

    pub fn can_avoid_lava(&self) -> bool {
        self.is_airborne_or_scripted() || matches!(self, HeroState::Falling { .. })
    }

    pub fn can_avoid_prickle(&self) -> bool {
        self.is_airborne_or_scripted() || matches!(self, HeroState::Falling { .. })
    }

    pub fn can_avoid_teletransporter(&self) -> bool {
        matches!(
            self,
            HeroState::ConveyorBelt { .. }
                | HeroState::Jumping { .. }
                | HeroState::BackToSolidGround
                | HeroState::Plunging { .. }
                | HeroState::Freezed
        )
    }

    pub fn can_avoid_conveyor_belt(&self) -> bool {
        matches!(
            self,
            HeroState::ConveyorBelt { .. }
                | HeroState::Pushing { .. }
                | HeroState::Hurt { .. }
                | HeroState::Running { .. }
                | HeroState::Falling { .. }
        ) || self.is_airborne_or_scripted()
    }

    pub fn can_avoid_switch(&self) -> bool {
        matches!(
            self,
            HeroState::Hurt { .. }
                | HeroState::Jumping { .. }
                | HeroState::BackToSolidGround
                | HeroState::Freezed
        )
    }

    pub fn can_avoid_sensor(&self) -> bool {
        matches!(self, HeroState::Freezed)
    }

    pub fn can_avoid_explosion(&self) -> bool {
        !self.can_be_hurt()
    }

    pub fn can_start_gameover_sequence(&self) -> bool {
        !matches!(
            self,
            HeroState::Hurt { .. }
                | HeroState::Falling { .. }
                | HeroState::Plunging { .. }
                | HeroState::Running { .. }
        )
    }

    pub fn is_cutting_with_sword(&self) -> bool {
        matches!(
            self,
            HeroState::SwordSwinging { .. }
                | HeroState::SpinAttack { .. }
                | HeroState::Running {
                    phase: RunPhase::Running,
                    ..
                }
        )
    }

    pub fn is_sword_visible(&self) -> bool {
        self.is_cutting_with_sword()
            || matches!(
                self,
                HeroState::SwordLoading { .. } | HeroState::SwordTapping { .. }
            )
    }

    pub fn sword_damage_factor(&self) -> i32 {
        match self {
            HeroState::SpinAttack { .. } | HeroState::Running { .. } => 2,
            _ => 1,
        }
    }

    fn blocks_every_hazard(&self) -> bool {
        matches!(self, HeroState::Pushing { .. } | HeroState::Grabbing { .. })
    }

    pub fn is_shallow_water_obstacle(&self) -> bool {
        self.blocks_every_hazard()
    }

    pub fn is_deep_water_obstacle(&self) -> bool {
        self.blocks_every_hazard()
    }

    pub fn is_hole_obstacle(&self) -> bool {
        self.blocks_every_hazard()
    }

    pub fn is_lava_obstacle(&self) -> bool {
        self.blocks_every_hazard()
    }

    pub fn is_prickle_obstacle(&self) -> bool {
        self.blocks_every_hazard()
    }

    pub fn is_teletransporter_obstacle(&self) -> bool {
        matches!(self, HeroState::Hurt { .. })
    }

    pub fn is_conveyor_belt_obstacle(&self) -> bool {
        matches!(self, HeroState::Hurt { .. })
    }

    pub fn is_stairs_obstacle(&self) -> bool {
        matches!(self, HeroState::Swimming { .. })
    }

    pub fn is_sensor_obstacle(&self) -> bool {
        matches!(self, HeroState::Hurt { .. } | HeroState::Running { .. })
    }

    /// Fate of the item carried by the previous state when entering this one.
    pub fn previous_carried_item_behavior(&self) -> CarriedItemBehavior {
        match self {
            HeroState::Free { .. } | HeroState::Treasure { .. } => CarriedItemBehavior::Destroy,
            HeroState::Carrying { .. } => CarriedItemBehavior::Keep,
            _ => CarriedItemBehavior::Throw,
        }
    }

    /// Leaves this state for `next` and returns the side effects to apply
    /// before `next` starts.
    pub(crate) fn stop(&mut self, next: &HeroState, hero: &EntityBase) -> Vec<StateEffect> {
        let mut effects = Vec::new();
        if self.has_player_movement() && !next.has_player_movement() {
            effects.push(StateEffect::ClearMovement);
        }
        match self {
            HeroState::Free { .. } | HeroState::Carrying { .. } | HeroState::Swimming { .. } => {
                effects.push(StateEffect::SetActionKey(ActionKeyEffect::None));
            }
            HeroState::Hurt { .. }
            | HeroState::ConveyorBelt { .. }
            | HeroState::SpinAttack { .. }
            | HeroState::Running { .. }
            | HeroState::Jumping { .. }
            | HeroState::BackToSolidGround
            | HeroState::Pushing { .. }
            | HeroState::Grabbing { .. } => {
                effects.push(StateEffect::ClearMovement);
            }
            _ => {}
        }
        if let HeroState::Lifting { item, .. } | HeroState::Carrying { item } = self {
            match next.previous_carried_item_behavior() {
                CarriedItemBehavior::Throw => {
                    if let Some(item) = item.take() {
                        effects.push(StateEffect::PlaySound("throw"));
                        effects.push(StateEffect::SpawnEntity(Box::new(throw_item(*item, hero))));
                    }
                }
                CarriedItemBehavior::Destroy => {
                    *item = None;
                }
                CarriedItemBehavior::Keep => {}
            }
        }
        effects
    }

    /// Shifts the state's dates after a suspension of `shift` ms.
    pub(crate) fn shift_dates(&mut self, shift: u64) {
        let date = match self {
            HeroState::Free {
                start_pushing_date, ..
            } => start_pushing_date,
            HeroState::Lifting { end_date, .. }
            | HeroState::Plunging { end_date, .. }
            | HeroState::Falling { end_date }
            | HeroState::Hurt { end_date, .. }
            | HeroState::SpinAttack { end_date }
            | HeroState::SwordSwinging { end_date }
            | HeroState::UsingInventoryItem { end_date, .. }
            | HeroState::Victory { end_date } => end_date,
            HeroState::Running {
                next_phase_date, ..
            } => next_phase_date,
            HeroState::SwordLoading { loaded_date, .. } => loaded_date,
            HeroState::SwordTapping { next_sound_date } => next_sound_date,
            HeroState::Swimming {
                fast_until: Some(date),
            } => date,
            _ => return,
        };
        *date += shift;
    }
}

/// Turns a carried item into a thrown one leaving from the hero.
pub(crate) fn throw_item(mut item: Entity, hero: &EntityBase) -> Entity {
    let direction4 = hero.direction();
    item.base_mut().set_layer(hero.layer());
    item.base_mut().set_xy(hero.xy());
    item.base_mut().set_direction(direction4);
    if let EntityKind::CarriedItem(data) = item.kind_mut() {
        data.phase = CarriedPhase::Thrown;
    }
    item.base_mut().set_movement(Movement::straight(
        direction8_to_angle(direction4 * 2),
        THROW_SPEED,
        Some(THROW_DISTANCE),
    ));
    item
}

/// Point `distance` px in front of the hero's origin.
pub(crate) fn point_in_front(hero: &EntityBase, distance: i32) -> Point {
    let (dx, dy) = direction4_to_xy(hero.direction());
    hero.xy().translated(dx * distance, dy * distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Layer;

    fn carried() -> Entity {
        Entity::carried_item(Layer::Low, Point::new(0, 0), [1, 2, 3, 255], "stone")
    }

    fn hero_base() -> EntityBase {
        let mut base =
            EntityBase::at_origin("hero", Layer::Low, Point::new(40, 40), 16, 16, Point::new(8, 13));
        base.set_direction(0);
        base
    }

    #[test]
    fn carrying_into_hurt_throws_the_item() {
        let mut carrying = HeroState::Carrying {
            item: Some(Box::new(carried())),
        };
        let effects = carrying.stop(&HeroState::hurt(Point::new(0, 0), 2), &hero_base());
        let thrown = effects
            .iter()
            .find_map(|effect| match effect {
                StateEffect::SpawnEntity(entity) => Some(entity),
                _ => None,
            })
            .expect("thrown item");
        assert_eq!(thrown.base().xy(), Point::new(40, 40));
        assert!(thrown.base().movement().is_some());
        let EntityKind::CarriedItem(data) = thrown.kind() else {
            panic!("carried item kind");
        };
        assert!(data.is_thrown());
        assert!(carrying.carried_item().is_none());
    }

    #[test]
    fn carrying_into_free_destroys_the_item() {
        let mut carrying = HeroState::Carrying {
            item: Some(Box::new(carried())),
        };
        let effects = carrying.stop(&HeroState::free(), &hero_base());
        assert!(!effects
            .iter()
            .any(|effect| matches!(effect, StateEffect::SpawnEntity(_))));
        assert!(carrying.carried_item().is_none());
    }

    #[test]
    fn lifting_into_carrying_keeps_the_item() {
        let mut lifting = HeroState::lifting(carried());
        let effects = lifting.stop(&HeroState::Carrying { item: None }, &hero_base());
        assert!(effects.is_empty());
        assert!(lifting.carried_item().is_some());
    }

    #[test]
    fn predicates_follow_the_state() {
        let hurt = HeroState::hurt(Point::new(0, 0), 1);
        assert!(!hurt.can_be_hurt());
        assert!(!hurt.is_touching_ground());
        assert!(hurt.is_teletransporter_obstacle());
        assert!(hurt.can_avoid_switch());

        let belt = HeroState::conveyor_belt(EntityId::default(), 2);
        assert!(belt.can_avoid_conveyor_belt());
        assert!(belt.can_avoid_teletransporter());

        assert_eq!(HeroState::SpinAttack { end_date: 0 }.sword_damage_factor(), 2);
        assert!(HeroState::Pushing {
            direction4: 0,
            pushed_block: None
        }
        .is_deep_water_obstacle());
        assert!(HeroState::free().can_start_sword());
    }

    #[test]
    fn suspension_shifts_state_dates() {
        let mut loading = HeroState::SwordLoading {
            loaded: false,
            loaded_date: 1_000,
        };
        loading.shift_dates(300);
        assert!(matches!(
            loading,
            HeroState::SwordLoading {
                loaded_date: 1_300,
                ..
            }
        ));
    }
}
