use serde::{Deserialize, Serialize};

use crate::game::Treasure;
use crate::geometry::{Layer, Point, Rect};
use crate::map::Ground;

use super::base::{EntityBase, EntityId, Sprite};
use super::detector::{CollisionMode, CollisionModes};

/// Delay between a bomb being set and its explosion.
pub const BOMB_EXPLOSION_DELAY_MS: u64 = 6_000;
/// Lifetime of an explosion.
pub const EXPLOSION_DURATION_MS: u64 = 300;
pub const ARROW_SPEED: i32 = 192;
/// Time a stuck arrow stays on the map before disappearing.
pub const ARROW_STUCK_DURATION_MS: u64 = 1_500;
pub const BOOMERANG_SPEED: i32 = 160;
pub const BOOMERANG_MAX_DISTANCE: i32 = 120;
/// Minimal interval between two hits on the same crystal.
pub const CRYSTAL_HIT_DELAY_MS: u64 = 1_000;
/// Name a teletransporter uses as destination to mean "the matching map side".
pub const SIDE_DESTINATION: &str = "_side";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Tile,
    DynamicTile,
    Wall,
    Switch,
    Block,
    Arrow,
    Bomb,
    Explosion,
    ConveyorBelt,
    Jumper,
    Teletransporter,
    ShopItem,
    Stairs,
    CrystalBlock,
    Crystal,
    Enemy,
    Boomerang,
    Destination,
    Separator,
    Sensor,
    Destructible,
    CarriedItem,
    Hero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchSubtype {
    WalkableInvisible,
    WalkableVisible,
    ArrowTarget,
    Solid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchData {
    pub subtype: SwitchSubtype,
    pub needs_block: bool,
    pub inactivate_when_leaving: bool,
    pub(crate) activated: bool,
    pub(crate) locked: bool,
    pub(crate) overlapping: bool,
}

impl SwitchData {
    pub fn is_walkable(&self) -> bool {
        matches!(
            self.subtype,
            SwitchSubtype::WalkableInvisible | SwitchSubtype::WalkableVisible
        )
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub can_be_pushed: bool,
    pub can_be_pulled: bool,
    pub maximum_moves: Option<u32>,
    pub(crate) moves_done: u32,
    pub(crate) initial_xy: Point,
}

impl BlockData {
    pub fn can_move(&self) -> bool {
        self.maximum_moves.map_or(true, |max| self.moves_done < max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrowData {
    pub direction4: u8,
    pub(crate) stuck_until: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BombData {
    pub(crate) explosion_date: u64,
    pub(crate) exploded: bool,
}

impl BombData {
    pub fn explosion_date(&self) -> u64 {
        self.explosion_date
    }

    pub fn has_exploded(&self) -> bool {
        self.exploded
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplosionData {
    pub(crate) end_date: u64,
    pub(crate) victims: Vec<EntityId>,
    pub(crate) hero_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumperData {
    pub direction8: u8,
    pub jump_length: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeletransporterData {
    pub destination_map: String,
    pub destination_name: String,
    /// Side of the destination map the hero arrives on, for "_side" destinations.
    pub(crate) destination_side: Option<u8>,
    /// Set once the hero was sent away, or when the map opened with the hero
    /// on it; cleared when the hero stops colliding.
    pub(crate) transporting_hero: bool,
}

impl TeletransporterData {
    pub fn is_on_map_side(&self) -> bool {
        self.destination_side.is_some()
    }

    pub fn destination_side(&self) -> Option<u8> {
        self.destination_side
    }

    /// Direction the hero walks to leave through a map side.
    pub fn transition_direction(&self) -> Option<u8> {
        self.destination_side.map(|side| (side + 2) % 4)
    }

    /// Destination name including the side suffix ("_side0" .. "_side3").
    pub fn resolved_destination(&self) -> String {
        match self.destination_side {
            Some(side) => format!("{}{side}", self.destination_name),
            None => self.destination_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopItemData {
    pub treasure: Treasure,
    pub price: u32,
    pub dialog_id: String,
    pub(crate) is_looking_item: bool,
    pub(crate) is_asking_question: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StairsData {
    pub direction4: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrystalBlockSubtype {
    /// Raised while the crystal state is off.
    Orange,
    /// Raised while the crystal state is on.
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrystalBlockData {
    pub subtype: CrystalBlockSubtype,
    pub(crate) raised: bool,
}

impl CrystalBlockData {
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub(crate) fn raised_for(subtype: CrystalBlockSubtype, crystal_state: bool) -> bool {
        match subtype {
            CrystalBlockSubtype::Orange => !crystal_state,
            CrystalBlockSubtype::Blue => crystal_state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrystalData {
    pub(crate) next_possible_hit_date: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyAttack {
    Sword,
    Arrow,
    Boomerang,
    Explosion,
    ThrownItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Hurt,
    Ignored,
    Protected,
    Immobilized,
    /// Left to scripts; the enemy only loses `life_lost`.
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub kind: ReactionKind,
    pub life_lost: i32,
}

impl Reaction {
    pub const fn new(kind: ReactionKind, life_lost: i32) -> Self {
        Self { kind, life_lost }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyReactions {
    pub sword: Reaction,
    pub arrow: Reaction,
    pub boomerang: Reaction,
    pub explosion: Reaction,
    pub thrown_item: Reaction,
}

impl Default for EnemyReactions {
    fn default() -> Self {
        Self {
            sword: Reaction::new(ReactionKind::Hurt, 1),
            arrow: Reaction::new(ReactionKind::Hurt, 2),
            boomerang: Reaction::new(ReactionKind::Immobilized, 0),
            explosion: Reaction::new(ReactionKind::Hurt, 2),
            thrown_item: Reaction::new(ReactionKind::Hurt, 1),
        }
    }
}

impl EnemyReactions {
    pub fn for_attack(&self, attack: EnemyAttack) -> Reaction {
        match attack {
            EnemyAttack::Sword => self.sword,
            EnemyAttack::Arrow => self.arrow,
            EnemyAttack::Boomerang => self.boomerang,
            EnemyAttack::Explosion => self.explosion,
            EnemyAttack::ThrownItem => self.thrown_item,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyData {
    pub breed: String,
    pub(crate) life: i32,
    pub damage: i32,
    pub reactions: EnemyReactions,
    pub savegame_variable: Option<String>,
    pub(crate) invulnerable_until: u64,
    pub(crate) immobilized_until: u64,
}

impl EnemyData {
    pub fn life(&self) -> i32 {
        self.life
    }

    pub fn is_immobilized(&self, now: u64) -> bool {
        now < self.immobilized_until
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoomerangData {
    pub(crate) initial_xy: Point,
    pub(crate) going_back: bool,
}

impl BoomerangData {
    pub fn is_going_back(&self) -> bool {
        self.going_back
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationData {
    pub direction4: Option<u8>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeparatorData {
    /// Side of the separator line the hero's center was last seen on.
    pub(crate) hero_side: Option<i8>,
}

impl SeparatorData {
    pub fn is_vertical(bounding_box: &Rect) -> bool {
        bounding_box.width == 16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorData {
    pub(crate) hero_inside: bool,
    pub(crate) overlapping: bool,
}

impl SensorData {
    pub fn is_hero_inside(&self) -> bool {
        self.hero_inside
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestructibleSubtype {
    Grass,
    Bush,
    Pot,
    Stone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestructibleData {
    pub subtype: DestructibleSubtype,
    pub weight: u8,
    pub treasure: Option<Treasure>,
}

impl DestructibleData {
    pub fn is_obstacle(&self) -> bool {
        self.subtype != DestructibleSubtype::Grass
    }

    pub fn can_be_cut(&self) -> bool {
        matches!(
            self.subtype,
            DestructibleSubtype::Grass | DestructibleSubtype::Bush
        )
    }

    pub fn can_be_lifted(&self) -> bool {
        self.subtype != DestructibleSubtype::Grass
    }

    pub fn destruction_sound(&self) -> &'static str {
        match self.subtype {
            DestructibleSubtype::Grass | DestructibleSubtype::Bush => "bush",
            DestructibleSubtype::Pot => "stone",
            DestructibleSubtype::Stone => "stone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarriedPhase {
    Carried,
    Thrown,
    Broken { remove_date: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarriedItemData {
    pub(crate) phase: CarriedPhase,
    pub destruction_sound: &'static str,
    pub damage_on_enemies: i32,
}

impl CarriedItemData {
    pub fn phase(&self) -> CarriedPhase {
        self.phase
    }

    pub fn is_thrown(&self) -> bool {
        self.phase == CarriedPhase::Thrown
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.phase, CarriedPhase::Broken { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Tile { pattern: String },
    DynamicTile { pattern: String, ground: Ground },
    Wall {
        stops_hero: bool,
        stops_enemies: bool,
        stops_blocks: bool,
    },
    Switch(SwitchData),
    Block(BlockData),
    Arrow(ArrowData),
    Bomb(BombData),
    Explosion(ExplosionData),
    ConveyorBelt { direction4: u8 },
    Jumper(JumperData),
    Teletransporter(TeletransporterData),
    ShopItem(ShopItemData),
    Stairs(StairsData),
    CrystalBlock(CrystalBlockData),
    Crystal(CrystalData),
    Enemy(EnemyData),
    Boomerang(BoomerangData),
    Destination(DestinationData),
    Separator(SeparatorData),
    Sensor(SensorData),
    Destructible(DestructibleData),
    CarriedItem(CarriedItemData),
}

impl EntityKind {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityKind::Tile { .. } => EntityType::Tile,
            EntityKind::DynamicTile { .. } => EntityType::DynamicTile,
            EntityKind::Wall { .. } => EntityType::Wall,
            EntityKind::Switch(_) => EntityType::Switch,
            EntityKind::Block(_) => EntityType::Block,
            EntityKind::Arrow(_) => EntityType::Arrow,
            EntityKind::Bomb(_) => EntityType::Bomb,
            EntityKind::Explosion(_) => EntityType::Explosion,
            EntityKind::ConveyorBelt { .. } => EntityType::ConveyorBelt,
            EntityKind::Jumper(_) => EntityType::Jumper,
            EntityKind::Teletransporter(_) => EntityType::Teletransporter,
            EntityKind::ShopItem(_) => EntityType::ShopItem,
            EntityKind::Stairs(_) => EntityType::Stairs,
            EntityKind::CrystalBlock(_) => EntityType::CrystalBlock,
            EntityKind::Crystal(_) => EntityType::Crystal,
            EntityKind::Enemy(_) => EntityType::Enemy,
            EntityKind::Boomerang(_) => EntityType::Boomerang,
            EntityKind::Destination(_) => EntityType::Destination,
            EntityKind::Separator(_) => EntityType::Separator,
            EntityKind::Sensor(_) => EntityType::Sensor,
            EntityKind::Destructible(_) => EntityType::Destructible,
            EntityKind::CarriedItem(_) => EntityType::CarriedItem,
        }
    }
}

/// A map object owned by the registry: shared state plus kind-specific data.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    base: EntityBase,
    kind: EntityKind,
}

impl Entity {
    pub fn new(base: EntityBase, kind: EntityKind) -> Self {
        Self {
            id: EntityId::default(),
            base,
            kind,
        }
    }

    /// Handle assigned by the registry; the null key before insertion.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    pub fn base(&self) -> &EntityBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut EntityBase, &mut EntityKind) {
        (&mut self.base, &mut self.kind)
    }

    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type()
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn layer(&self) -> Layer {
        self.base.layer()
    }

    pub fn bounding_box(&self) -> Rect {
        self.base.bounding_box()
    }

    pub fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    pub fn is_being_removed(&self) -> bool {
        self.base.is_being_removed()
    }

    pub fn tile(layer: Layer, footprint: Rect, pattern: impl Into<String>) -> Self {
        Self::new(
            EntityBase::new("", layer, footprint),
            EntityKind::Tile {
                pattern: pattern.into(),
            },
        )
    }

    pub fn dynamic_tile(
        name: impl Into<String>,
        layer: Layer,
        footprint: Rect,
        pattern: impl Into<String>,
        ground: Ground,
    ) -> Self {
        Self::new(
            EntityBase::new(name, layer, footprint),
            EntityKind::DynamicTile {
                pattern: pattern.into(),
                ground,
            },
        )
    }

    pub fn wall(
        name: impl Into<String>,
        layer: Layer,
        footprint: Rect,
        stops_hero: bool,
        stops_enemies: bool,
        stops_blocks: bool,
    ) -> Self {
        Self::new(
            EntityBase::new(name, layer, footprint),
            EntityKind::Wall {
                stops_hero,
                stops_enemies,
                stops_blocks,
            },
        )
    }

    pub fn switch(
        name: impl Into<String>,
        layer: Layer,
        top_left: Point,
        subtype: SwitchSubtype,
        needs_block: bool,
        inactivate_when_leaving: bool,
    ) -> Self {
        let mut base = EntityBase::new(name, layer, Rect::new(top_left.x, top_left.y, 16, 16));
        if subtype != SwitchSubtype::WalkableInvisible {
            base.add_sprite(Sprite::new("switch", 16, 16, Point::default(), [200, 170, 40, 255]));
        }
        Self::new(
            base,
            EntityKind::Switch(SwitchData {
                subtype,
                needs_block,
                inactivate_when_leaving,
                activated: false,
                locked: false,
                overlapping: false,
            }),
        )
    }

    pub fn block(
        name: impl Into<String>,
        layer: Layer,
        xy: Point,
        can_be_pushed: bool,
        can_be_pulled: bool,
        maximum_moves: Option<u32>,
    ) -> Self {
        let mut base = EntityBase::at_origin(name, layer, xy, 16, 16, Point::new(8, 13));
        base.add_sprite(Sprite::new("block", 16, 16, Point::new(8, 13), [150, 110, 70, 255]));
        Self::new(
            base,
            EntityKind::Block(BlockData {
                can_be_pushed,
                can_be_pulled,
                maximum_moves,
                moves_done: 0,
                initial_xy: xy,
            }),
        )
    }

    /// Arrow shot from `center` toward `direction4`.
    pub fn arrow(layer: Layer, center: Point, direction4: u8) -> Self {
        let (width, height) = if direction4 % 2 == 0 { (16, 8) } else { (8, 16) };
        let origin = Point::new(width / 2, height / 2);
        let mut base = EntityBase::at_origin("", layer, center, width, height, origin);
        base.set_direction(direction4 % 4);
        base.add_sprite(Sprite::new("arrow", width, height, origin, [220, 220, 220, 255]));
        Self::new(
            base,
            EntityKind::Arrow(ArrowData {
                direction4: direction4 % 4,
                stuck_until: None,
            }),
        )
    }

    pub fn bomb(name: impl Into<String>, layer: Layer, xy: Point, now: u64) -> Self {
        let mut base = EntityBase::at_origin(name, layer, xy, 16, 16, Point::new(8, 13));
        base.add_sprite(
            Sprite::new("bomb", 16, 16, Point::new(8, 13), [40, 40, 60, 255]).with_frames(2, 200, true),
        );
        Self::new(
            base,
            EntityKind::Bomb(BombData {
                explosion_date: now + BOMB_EXPLOSION_DELAY_MS,
                exploded: false,
            }),
        )
    }

    pub fn explosion(layer: Layer, center: Point, now: u64) -> Self {
        let origin = Point::new(24, 24);
        let mut base = EntityBase::at_origin("", layer, center, 48, 48, origin);
        base.add_sprite(
            Sprite::new("explosion", 48, 48, origin, [250, 160, 40, 255]).with_frames(3, 100, false),
        );
        Self::new(
            base,
            EntityKind::Explosion(ExplosionData {
                end_date: now + EXPLOSION_DURATION_MS,
                victims: Vec::new(),
                hero_hit: false,
            }),
        )
    }

    pub fn conveyor_belt(name: impl Into<String>, layer: Layer, xy: Point, direction4: u8) -> Self {
        let mut base = EntityBase::at_origin(name, layer, xy, 16, 16, Point::new(8, 13));
        base.set_direction(direction4 % 4);
        base.add_sprite(
            Sprite::new("conveyor_belt", 16, 16, Point::new(8, 13), [90, 90, 110, 255])
                .with_frames(2, 100, true),
        );
        Self::new(
            base,
            EntityKind::ConveyorBelt {
                direction4: direction4 % 4,
            },
        )
    }

    pub fn jumper(
        name: impl Into<String>,
        layer: Layer,
        footprint: Rect,
        direction8: u8,
        jump_length: i32,
    ) -> Self {
        let mut base = EntityBase::new(name, layer, footprint);
        base.set_direction(direction8 % 8);
        Self::new(
            base,
            EntityKind::Jumper(JumperData {
                direction8: direction8 % 8,
                jump_length,
            }),
        )
    }

    /// A teletransporter. A "_side" one must lie in the 16 px band just
    /// outside a map edge; elsewhere it is left without a side.
    pub fn teletransporter(
        name: impl Into<String>,
        layer: Layer,
        footprint: Rect,
        destination_map: impl Into<String>,
        destination_name: impl Into<String>,
        map_size: (i32, i32),
    ) -> Self {
        let destination_name = destination_name.into();
        let destination_side = (destination_name == SIDE_DESTINATION)
            .then(|| destination_side_of(&footprint, map_size))
            .flatten();
        Self::new(
            EntityBase::new(name, layer, footprint),
            EntityKind::Teletransporter(TeletransporterData {
                destination_map: destination_map.into(),
                destination_name,
                destination_side,
                transporting_hero: false,
            }),
        )
    }

    pub fn shop_item(
        name: impl Into<String>,
        layer: Layer,
        top_left: Point,
        treasure: Treasure,
        price: u32,
        dialog_id: impl Into<String>,
    ) -> Self {
        let mut base = EntityBase::new(name, layer, Rect::new(top_left.x, top_left.y, 32, 32));
        base.add_sprite(Sprite::new("treasure", 16, 16, Point::new(-8, -4), [230, 200, 60, 255]));
        Self::new(
            base,
            EntityKind::ShopItem(ShopItemData {
                treasure,
                price,
                dialog_id: dialog_id.into(),
                is_looking_item: false,
                is_asking_question: false,
            }),
        )
    }

    pub fn stairs(name: impl Into<String>, layer: Layer, top_left: Point, direction4: u8) -> Self {
        let mut base = EntityBase::new(name, layer, Rect::new(top_left.x, top_left.y, 16, 16));
        base.set_direction(direction4 % 4);
        Self::new(
            base,
            EntityKind::Stairs(StairsData {
                direction4: direction4 % 4,
            }),
        )
    }

    pub fn crystal_block(
        name: impl Into<String>,
        layer: Layer,
        footprint: Rect,
        subtype: CrystalBlockSubtype,
        crystal_state: bool,
    ) -> Self {
        let color = match subtype {
            CrystalBlockSubtype::Orange => [230, 130, 30, 255],
            CrystalBlockSubtype::Blue => [40, 90, 230, 255],
        };
        let mut base = EntityBase::new(name, layer, footprint);
        base.add_sprite(Sprite::new(
            "crystal_block",
            footprint.width,
            footprint.height,
            Point::default(),
            color,
        ));
        Self::new(
            base,
            EntityKind::CrystalBlock(CrystalBlockData {
                subtype,
                raised: CrystalBlockData::raised_for(subtype, crystal_state),
            }),
        )
    }

    pub fn crystal(name: impl Into<String>, layer: Layer, xy: Point) -> Self {
        let mut base = EntityBase::at_origin(name, layer, xy, 16, 16, Point::new(8, 13));
        base.add_sprite(Sprite::new("crystal", 16, 16, Point::new(8, 13), [120, 220, 240, 255]));
        Self::new(base, EntityKind::Crystal(CrystalData::default()))
    }

    pub fn enemy(
        name: impl Into<String>,
        layer: Layer,
        xy: Point,
        breed: impl Into<String>,
        life: i32,
        damage: i32,
    ) -> Self {
        let mut base = EntityBase::at_origin(name, layer, xy, 16, 16, Point::new(8, 13));
        base.set_direction(3);
        base.add_sprite(
            Sprite::new("enemy", 16, 16, Point::new(8, 13), [200, 40, 40, 255]).with_frames(2, 150, true),
        );
        Self::new(
            base,
            EntityKind::Enemy(EnemyData {
                breed: breed.into(),
                life,
                damage,
                reactions: EnemyReactions::default(),
                savegame_variable: None,
                invulnerable_until: 0,
                immobilized_until: 0,
            }),
        )
    }

    /// Boomerang starting at `xy`; the thrower gives it its movement.
    pub fn boomerang(layer: Layer, xy: Point) -> Self {
        let origin = Point::new(8, 8);
        let mut base = EntityBase::at_origin("", layer, xy, 16, 16, origin);
        base.add_sprite(
            Sprite::new("boomerang", 16, 16, origin, [170, 120, 60, 255]).with_frames(4, 50, true),
        );
        Self::new(
            base,
            EntityKind::Boomerang(BoomerangData {
                initial_xy: xy,
                going_back: false,
            }),
        )
    }

    pub fn destination(
        name: impl Into<String>,
        layer: Layer,
        xy: Point,
        direction4: Option<u8>,
        is_default: bool,
    ) -> Self {
        let mut base = EntityBase::at_origin(name, layer, xy, 16, 16, Point::new(8, 13));
        if let Some(direction4) = direction4 {
            base.set_direction(direction4 % 4);
        }
        Self::new(
            base,
            EntityKind::Destination(DestinationData {
                direction4,
                is_default,
            }),
        )
    }

    pub fn separator(name: impl Into<String>, layer: Layer, footprint: Rect) -> Self {
        Self::new(
            EntityBase::new(name, layer, footprint),
            EntityKind::Separator(SeparatorData::default()),
        )
    }

    pub fn sensor(name: impl Into<String>, layer: Layer, footprint: Rect) -> Self {
        Self::new(
            EntityBase::new(name, layer, footprint),
            EntityKind::Sensor(SensorData::default()),
        )
    }

    pub fn destructible(
        name: impl Into<String>,
        layer: Layer,
        xy: Point,
        subtype: DestructibleSubtype,
        treasure: Option<Treasure>,
    ) -> Self {
        let (weight, color) = match subtype {
            DestructibleSubtype::Grass => (0, [60, 160, 60, 255]),
            DestructibleSubtype::Bush => (0, [30, 120, 30, 255]),
            DestructibleSubtype::Pot => (0, [160, 100, 60, 255]),
            DestructibleSubtype::Stone => (1, [140, 140, 140, 255]),
        };
        let mut base = EntityBase::at_origin(name, layer, xy, 16, 16, Point::new(8, 13));
        base.add_sprite(Sprite::new("destructible", 16, 16, Point::new(8, 13), color));
        Self::new(
            base,
            EntityKind::Destructible(DestructibleData {
                subtype,
                weight,
                treasure,
            }),
        )
    }

    /// Item held above the hero's head, made from what was lifted.
    pub fn carried_item(layer: Layer, xy: Point, color: [u8; 4], destruction_sound: &'static str) -> Self {
        let mut base = EntityBase::at_origin("", layer, xy, 16, 16, Point::new(8, 13));
        base.add_sprite(Sprite::new("carried_item", 16, 16, Point::new(8, 13), color));
        Self::new(
            base,
            EntityKind::CarriedItem(CarriedItemData {
                phase: CarriedPhase::Carried,
                destruction_sound,
                damage_on_enemies: 1,
            }),
        )
    }

    /// Receives overlap notifications from the collision pass.
    pub fn is_detector(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Switch(_)
                | EntityKind::Block(_)
                | EntityKind::Explosion(_)
                | EntityKind::ConveyorBelt { .. }
                | EntityKind::Jumper(_)
                | EntityKind::Teletransporter(_)
                | EntityKind::ShopItem(_)
                | EntityKind::Stairs(_)
                | EntityKind::Crystal(_)
                | EntityKind::Enemy(_)
                | EntityKind::Separator(_)
                | EntityKind::Sensor(_)
                | EntityKind::Destructible(_)
        )
    }

    pub fn collision_modes(&self) -> CollisionModes {
        match &self.kind {
            EntityKind::Switch(data) => match data.subtype {
                SwitchSubtype::WalkableInvisible | SwitchSubtype::WalkableVisible => {
                    CollisionModes::from(CollisionMode::Custom)
                }
                SwitchSubtype::ArrowTarget => CollisionModes::from(CollisionMode::Overlapping),
                SwitchSubtype::Solid => CollisionModes::empty(),
            },
            EntityKind::Block(_) | EntityKind::ShopItem(_) | EntityKind::Destructible(_) => {
                CollisionModes::from(CollisionMode::FacingPoint)
            }
            EntityKind::Explosion(_) | EntityKind::Crystal(_) | EntityKind::Enemy(_) => {
                CollisionModes::from(CollisionMode::Overlapping).with(CollisionMode::Sprite)
            }
            EntityKind::ConveyorBelt { .. } => CollisionModes::from(CollisionMode::Overlapping),
            EntityKind::Stairs(_) => CollisionModes::from(CollisionMode::Center),
            EntityKind::Jumper(_)
            | EntityKind::Teletransporter(_)
            | EntityKind::Separator(_)
            | EntityKind::Sensor(_) => CollisionModes::from(CollisionMode::Custom),
            _ => CollisionModes::empty(),
        }
    }

    /// Can block the movement of other entities.
    pub fn can_be_obstacle(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::DynamicTile { .. }
                | EntityKind::Wall { .. }
                | EntityKind::Switch(_)
                | EntityKind::Block(_)
                | EntityKind::ConveyorBelt { .. }
                | EntityKind::Jumper(_)
                | EntityKind::Teletransporter(_)
                | EntityKind::ShopItem(_)
                | EntityKind::Stairs(_)
                | EntityKind::CrystalBlock(_)
                | EntityKind::Crystal(_)
                | EntityKind::Enemy(_)
                | EntityKind::Separator(_)
                | EntityKind::Sensor(_)
                | EntityKind::Destructible(_)
        )
    }

    /// Tracks the ground under its ground point.
    pub fn is_ground_observer(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Bomb(_) | EntityKind::Enemy(_) | EntityKind::CarriedItem(_)
        )
    }

    /// Changes the ground of the cells it covers.
    pub fn is_ground_modifier(&self) -> bool {
        match &self.kind {
            EntityKind::DynamicTile { .. } => true,
            EntityKind::Destructible(data) => data.subtype == DestructibleSubtype::Grass,
            _ => false,
        }
    }

    /// Ground this entity imposes on the cells it covers, if it modifies ground.
    pub fn modified_ground(&self) -> Option<Ground> {
        match &self.kind {
            EntityKind::DynamicTile { ground, .. } => Some(*ground),
            EntityKind::Destructible(data) if data.subtype == DestructibleSubtype::Grass => {
                Some(Ground::Grass)
            }
            _ => None,
        }
    }

    pub fn can_be_drawn(&self) -> bool {
        !matches!(
            self.kind,
            EntityKind::Wall { .. }
                | EntityKind::Jumper(_)
                | EntityKind::Teletransporter(_)
                | EntityKind::Destination(_)
                | EntityKind::Separator(_)
                | EntityKind::Sensor(_)
                | EntityKind::Stairs(_)
        )
    }

    /// Drawn sorted by the bottom of its bounding box instead of insertion order.
    pub fn is_drawn_in_y_order(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Arrow(_)
                | EntityKind::Bomb(_)
                | EntityKind::Enemy(_)
                | EntityKind::Boomerang(_)
                | EntityKind::CarriedItem(_)
                | EntityKind::Block(_)
                | EntityKind::Crystal(_)
                | EntityKind::Destructible(_)
        )
    }

    /// Detects and blocks entities on every layer.
    pub fn has_layer_independent_collisions(&self) -> bool {
        matches!(self.kind, EntityKind::Stairs(_) | EntityKind::Separator(_))
    }

    /// Shifts the entity's own dates after a suspension of `shift` ms.
    pub(crate) fn shift_dates(&mut self, shift: u64) {
        if shift == 0 {
            return;
        }
        match &mut self.kind {
            EntityKind::Bomb(data) => data.explosion_date += shift,
            EntityKind::Explosion(data) => data.end_date += shift,
            EntityKind::Arrow(data) => {
                if let Some(date) = data.stuck_until.as_mut() {
                    *date += shift;
                }
            }
            EntityKind::Crystal(data) => data.next_possible_hit_date += shift,
            EntityKind::Enemy(data) => {
                data.invulnerable_until += shift;
                data.immobilized_until += shift;
            }
            EntityKind::CarriedItem(data) => {
                if let CarriedPhase::Broken { remove_date } = &mut data.phase {
                    *remove_date += shift;
                }
            }
            _ => {}
        }
    }
}

/// Side of the destination map reached through a band outside this map.
fn destination_side_of(footprint: &Rect, (map_width, map_height): (i32, i32)) -> Option<u8> {
    if footprint.width == 16 && footprint.x == -16 {
        Some(0)
    } else if footprint.width == 16 && footprint.x == map_width {
        Some(2)
    } else if footprint.height == 16 && footprint.y == -16 {
        Some(3)
    } else if footprint.height == 16 && footprint.y == map_height {
        Some(1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_buckets_are_exclusive() {
        let belt = Entity::conveyor_belt("belt", Layer::Low, Point::new(8, 13), 2);
        assert!(belt.can_be_drawn());
        assert!(!belt.is_drawn_in_y_order());

        let bomb = Entity::bomb("bomb", Layer::Low, Point::new(8, 13), 0);
        assert!(bomb.is_drawn_in_y_order());

        let sensor = Entity::sensor("sensor", Layer::Low, Rect::new(0, 0, 16, 16));
        assert!(!sensor.can_be_drawn());
    }

    #[test]
    fn side_teletransporter_knows_its_side() {
        let east = Entity::teletransporter(
            "east",
            Layer::Low,
            Rect::new(320, 0, 16, 240),
            "next",
            SIDE_DESTINATION,
            (320, 240),
        );
        let EntityKind::Teletransporter(data) = east.kind() else {
            panic!("teletransporter kind");
        };
        assert_eq!(data.destination_side(), Some(2));
        assert_eq!(data.transition_direction(), Some(0));
        assert_eq!(data.resolved_destination(), "_side2");

        let inner = Entity::teletransporter(
            "inner",
            Layer::Low,
            Rect::new(64, 64, 16, 16),
            "next",
            "door",
            (320, 240),
        );
        let EntityKind::Teletransporter(data) = inner.kind() else {
            panic!("teletransporter kind");
        };
        assert!(!data.is_on_map_side());
    }

    #[test]
    fn crystal_blocks_follow_the_crystal_state() {
        assert!(CrystalBlockData::raised_for(CrystalBlockSubtype::Orange, false));
        assert!(!CrystalBlockData::raised_for(CrystalBlockSubtype::Blue, false));
        assert!(CrystalBlockData::raised_for(CrystalBlockSubtype::Blue, true));
    }

    #[test]
    fn suspension_shift_moves_bomb_date() {
        let mut bomb = Entity::bomb("bomb", Layer::Low, Point::new(8, 13), 100);
        bomb.shift_dates(250);
        let EntityKind::Bomb(data) = bomb.kind() else {
            panic!("bomb kind");
        };
        assert_eq!(data.explosion_date(), 100 + BOMB_EXPLOSION_DELAY_MS + 250);
    }

    #[test]
    fn grass_modifies_ground_without_blocking() {
        let grass = Entity::destructible(
            "grass",
            Layer::Low,
            Point::new(8, 13),
            DestructibleSubtype::Grass,
            None,
        );
        assert_eq!(grass.modified_ground(), Some(Ground::Grass));
        let EntityKind::Destructible(data) = grass.kind() else {
            panic!("destructible kind");
        };
        assert!(!data.is_obstacle());
        assert!(data.can_be_cut());
    }
}
