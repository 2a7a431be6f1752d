//! Map entities: the shared base, the closed set of kinds, obstacle rules,
//! detectors and the registry that owns them.

pub mod base;
pub(crate) mod behaviour;
mod collisions;
pub mod detector;
pub mod kinds;
pub mod obstacles;
pub mod registry;
pub(crate) mod shop;

pub use base::{EntityBase, EntityId, PixelMask, Sprite};
pub use detector::{CollisionMode, CollisionModes};
pub use kinds::{
    ArrowData, BlockData, BombData, BoomerangData, CarriedItemData, CarriedPhase, CrystalBlockData,
    CrystalBlockSubtype, CrystalData, DestinationData, DestructibleData, DestructibleSubtype,
    EnemyAttack, EnemyData, EnemyReactions, Entity, EntityKind, EntityType, ExplosionData,
    JumperData, Reaction, ReactionKind, SensorData, SeparatorData, ShopItemData, StairsData,
    SwitchData, SwitchSubtype, TeletransporterData,
};
pub use obstacles::ObstacleRules;
pub use registry::{EntityStore, MapEntities, HERO_NAME};
