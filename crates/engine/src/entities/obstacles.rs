use crate::hero::Hero;
use crate::map::Ground;

use super::base::EntityId;
use super::kinds::{CarriedPhase, Entity, EntityKind, EntityType, SwitchSubtype};

/// Questions an obstacle asks the entity trying to move through it.
///
/// Each obstacle kind calls the query that concerns it, so a mover only
/// overrides the answers that differ from the common case.
pub trait ObstacleRules {
    fn obstacle_rules_type(&self) -> EntityType;

    /// Registry handle of the mover, so it never blocks itself.
    fn mover_id(&self) -> Option<EntityId> {
        None
    }

    fn is_low_wall_obstacle(&self) -> bool {
        true
    }

    fn is_shallow_water_obstacle(&self) -> bool {
        false
    }

    fn is_deep_water_obstacle(&self) -> bool {
        true
    }

    fn is_hole_obstacle(&self) -> bool {
        true
    }

    fn is_lava_obstacle(&self) -> bool {
        true
    }

    fn is_prickle_obstacle(&self) -> bool {
        true
    }

    fn is_ladder_obstacle(&self) -> bool {
        true
    }

    fn is_hero_obstacle(&self, _hero: &Hero) -> bool {
        false
    }

    fn is_block_obstacle(&self, _block: &Entity) -> bool {
        true
    }

    fn is_teletransporter_obstacle(&self, _teletransporter: &Entity) -> bool {
        true
    }

    fn is_conveyor_belt_obstacle(&self, _conveyor_belt: &Entity) -> bool {
        true
    }

    fn is_stairs_obstacle(&self, _stairs: &Entity) -> bool {
        true
    }

    fn is_sensor_obstacle(&self, _sensor: &Entity) -> bool {
        true
    }

    fn is_switch_obstacle(&self, _switch: &Entity) -> bool {
        true
    }

    fn is_raised_block_obstacle(&self, _crystal_block: &Entity) -> bool {
        true
    }

    fn is_crystal_obstacle(&self, _crystal: &Entity) -> bool {
        true
    }

    fn is_enemy_obstacle(&self, _enemy: &Entity) -> bool {
        false
    }

    fn is_jumper_obstacle(&self, _jumper: &Entity) -> bool {
        true
    }

    fn is_destructible_obstacle(&self, _destructible: &Entity) -> bool {
        true
    }

    fn is_separator_obstacle(&self, _separator: &Entity) -> bool {
        true
    }

    /// Whether a cell of `ground` blocks this mover. Diagonal cells are
    /// resolved by the caller.
    fn is_ground_obstacle(&self, ground: Ground) -> bool {
        match ground {
            Ground::Wall => true,
            Ground::Traversable | Ground::Empty | Ground::Grass | Ground::Ice => false,
            Ground::ShallowWater => self.is_shallow_water_obstacle(),
            Ground::DeepWater => self.is_deep_water_obstacle(),
            Ground::Hole => self.is_hole_obstacle(),
            Ground::Lava => self.is_lava_obstacle(),
            Ground::Prickle => self.is_prickle_obstacle(),
            Ground::Ladder => self.is_ladder_obstacle(),
            diagonal => diagonal.is_wall(),
        }
    }
}

impl Entity {
    /// Whether this entity blocks `other`. The answer comes from `other`'s
    /// typed query for this kind.
    pub fn is_obstacle_for(&self, other: &dyn ObstacleRules) -> bool {
        match self.kind() {
            EntityKind::Wall {
                stops_hero,
                stops_enemies,
                stops_blocks,
            } => match other.obstacle_rules_type() {
                EntityType::Hero => *stops_hero,
                EntityType::Enemy => *stops_enemies,
                EntityType::Block => *stops_blocks,
                _ => false,
            },
            EntityKind::DynamicTile { ground, .. } => ground.is_wall(),
            EntityKind::Switch(data) => {
                data.subtype == SwitchSubtype::Solid || other.is_switch_obstacle(self)
            }
            EntityKind::Block(_) => other.is_block_obstacle(self),
            EntityKind::Teletransporter(_) => other.is_teletransporter_obstacle(self),
            EntityKind::ConveyorBelt { .. } => other.is_conveyor_belt_obstacle(self),
            EntityKind::Stairs(_) => other.is_stairs_obstacle(self),
            EntityKind::Sensor(_) => other.is_sensor_obstacle(self),
            EntityKind::CrystalBlock(data) => data.is_raised() && other.is_raised_block_obstacle(self),
            EntityKind::Crystal(_) => other.is_crystal_obstacle(self),
            EntityKind::Enemy(_) => other.is_enemy_obstacle(self),
            EntityKind::Jumper(_) => other.is_jumper_obstacle(self),
            EntityKind::Destructible(data) => {
                data.is_obstacle() && other.is_destructible_obstacle(self)
            }
            EntityKind::Separator(_) => other.is_separator_obstacle(self),
            EntityKind::ShopItem(_) => true,
            _ => false,
        }
    }
}

/// Kinds that fly over the ground and through most detectors.
fn is_projectile(kind: &EntityKind) -> bool {
    match kind {
        EntityKind::Arrow(_) | EntityKind::Boomerang(_) => true,
        EntityKind::CarriedItem(data) => data.phase == CarriedPhase::Thrown,
        _ => false,
    }
}

impl ObstacleRules for Entity {
    fn obstacle_rules_type(&self) -> EntityType {
        self.entity_type()
    }

    fn mover_id(&self) -> Option<EntityId> {
        Some(self.id())
    }

    fn is_low_wall_obstacle(&self) -> bool {
        !is_projectile(self.kind())
    }

    fn is_deep_water_obstacle(&self) -> bool {
        !matches!(
            self.kind(),
            EntityKind::Bomb(_) | EntityKind::Block(_)
        ) && !is_projectile(self.kind())
    }

    fn is_hole_obstacle(&self) -> bool {
        !matches!(
            self.kind(),
            EntityKind::Bomb(_) | EntityKind::Block(_)
        ) && !is_projectile(self.kind())
    }

    fn is_lava_obstacle(&self) -> bool {
        !matches!(
            self.kind(),
            EntityKind::Bomb(_) | EntityKind::Block(_)
        ) && !is_projectile(self.kind())
    }

    fn is_prickle_obstacle(&self) -> bool {
        !matches!(self.kind(), EntityKind::Bomb(_)) && !is_projectile(self.kind())
    }

    fn is_ladder_obstacle(&self) -> bool {
        !matches!(self.kind(), EntityKind::Bomb(_)) && !is_projectile(self.kind())
    }

    fn is_hero_obstacle(&self, _hero: &Hero) -> bool {
        matches!(self.kind(), EntityKind::Block(_) | EntityKind::Enemy(_))
    }

    fn is_teletransporter_obstacle(&self, _teletransporter: &Entity) -> bool {
        !is_projectile(self.kind())
            && !matches!(self.kind(), EntityKind::Bomb(_) | EntityKind::CarriedItem(_))
    }

    fn is_conveyor_belt_obstacle(&self, _conveyor_belt: &Entity) -> bool {
        !is_projectile(self.kind()) && !matches!(self.kind(), EntityKind::Bomb(_))
    }

    fn is_stairs_obstacle(&self, _stairs: &Entity) -> bool {
        !is_projectile(self.kind())
    }

    fn is_sensor_obstacle(&self, _sensor: &Entity) -> bool {
        matches!(self.kind(), EntityKind::Enemy(_))
    }

    fn is_switch_obstacle(&self, _switch: &Entity) -> bool {
        // only enemies are kept off switches
        matches!(self.kind(), EntityKind::Enemy(_))
    }

    fn is_jumper_obstacle(&self, _jumper: &Entity) -> bool {
        !is_projectile(self.kind())
    }

    fn is_separator_obstacle(&self, _separator: &Entity) -> bool {
        !is_projectile(self.kind())
    }
}
