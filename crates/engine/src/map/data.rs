//! Serializable description of a map and its conversion into a running
//! [`MapEntities`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::entities::{
    CrystalBlockSubtype, DestructibleSubtype, Entity, EntityKind, MapEntities, SwitchSubtype,
};
use crate::game::Treasure;
use crate::geometry::{Layer, Point, Rect};
use crate::render::Color;

use super::ground::{Ground, TilePattern, TilePatternError, Tileset};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapDataError {
    #[error("map '{id}' has invalid size {width}x{height}: expected positive multiples of 8")]
    InvalidMapSize { id: String, width: i32, height: i32 },
    #[error(transparent)]
    InvalidPattern(#[from] TilePatternError),
    #[error("tileset '{tileset}' defines pattern '{pattern}' twice")]
    DuplicatePattern { tileset: String, pattern: String },
    #[error("tiles[{index}] uses unknown pattern '{pattern}'")]
    UnknownPattern { index: usize, pattern: String },
    #[error("tiles[{index}] at {x},{y} ({width}x{height}) lies outside the map")]
    TileOutsideMap {
        index: usize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[error("tiles[{index}] at {x},{y} ({width}x{height}) is not aligned to the 8 px grid")]
    MisalignedTile {
        index: usize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[error("entities[{index}] uses unknown pattern '{pattern}'")]
    UnknownEntityPattern { index: usize, pattern: String },
    #[error("hero start destination '{0}' does not exist")]
    UnknownDestination(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub id: String,
    pub width: i32,
    pub height: i32,
    pub tileset: TilesetData,
    /// Static tiles, painted bottom to top in this order.
    #[serde(default)]
    pub tiles: Vec<TileData>,
    #[serde(default)]
    pub entities: Vec<EntityData>,
    #[serde(default)]
    pub hero: HeroStart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilesetData {
    pub id: String,
    #[serde(default = "default_background")]
    pub background: Color,
    pub patterns: Vec<PatternData>,
}

fn default_background() -> Color {
    [0, 0, 0, 255]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternData {
    pub id: String,
    pub ground: Ground,
    pub width: i32,
    pub height: i32,
    pub color: Color,
    /// Extra frames make the pattern animated.
    #[serde(default)]
    pub frames: Vec<Color>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileData {
    pub layer: Layer,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub pattern: String,
}

/// Where the hero appears: a fixed position, a named destination, or the
/// default destination when both are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroStart {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub position: Option<HeroPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroPosition {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_layer")]
    pub layer: Layer,
    #[serde(default = "default_hero_direction")]
    pub direction: u8,
}

fn default_layer() -> Layer {
    Layer::Low
}

fn default_hero_direction() -> u8 {
    3
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityData {
    Destination {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        #[serde(default)]
        direction: Option<u8>,
        #[serde(default)]
        default: bool,
    },
    Teletransporter {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        destination_map: String,
        destination: String,
    },
    Wall {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        #[serde(default = "default_true")]
        stops_hero: bool,
        #[serde(default = "default_true")]
        stops_enemies: bool,
        #[serde(default = "default_true")]
        stops_blocks: bool,
    },
    DynamicTile {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        pattern: String,
        #[serde(default = "default_true")]
        enabled: bool,
    },
    Switch {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        subtype: SwitchSubtype,
        #[serde(default)]
        needs_block: bool,
        #[serde(default)]
        inactivate_when_leaving: bool,
    },
    Block {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        #[serde(default = "default_true")]
        can_be_pushed: bool,
        #[serde(default)]
        can_be_pulled: bool,
        #[serde(default)]
        maximum_moves: Option<u32>,
    },
    ConveyorBelt {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        direction: u8,
    },
    Jumper {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        direction: u8,
        jump_length: i32,
    },
    ShopItem {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        treasure: Treasure,
        price: u32,
        dialog: String,
    },
    Stairs {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        direction: u8,
    },
    CrystalBlock {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        subtype: CrystalBlockSubtype,
    },
    Crystal {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
    },
    Enemy {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        breed: String,
        life: i32,
        damage: i32,
        #[serde(default)]
        savegame_variable: Option<String>,
    },
    Separator {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Sensor {
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Destructible {
        #[serde(default)]
        name: String,
        layer: Layer,
        x: i32,
        y: i32,
        subtype: DestructibleSubtype,
        #[serde(default)]
        treasure: Option<Treasure>,
    },
}

impl MapData {
    /// Validates the description and builds the map with the hero placed.
    pub fn build(&self) -> Result<MapEntities, MapDataError> {
        if self.width <= 0 || self.height <= 0 || self.width % 8 != 0 || self.height % 8 != 0 {
            return Err(MapDataError::InvalidMapSize {
                id: self.id.clone(),
                width: self.width,
                height: self.height,
            });
        }
        let tileset = self.tileset.build()?;
        let map_area = Rect::new(0, 0, self.width, self.height);

        for (index, tile) in self.tiles.iter().enumerate() {
            if tileset.pattern(&tile.pattern).is_none() {
                return Err(MapDataError::UnknownPattern {
                    index,
                    pattern: tile.pattern.clone(),
                });
            }
            let footprint = Rect::new(tile.x, tile.y, tile.width, tile.height);
            if footprint.is_empty() || !map_area.contains_rect(&footprint) {
                return Err(MapDataError::TileOutsideMap {
                    index,
                    x: tile.x,
                    y: tile.y,
                    width: tile.width,
                    height: tile.height,
                });
            }
            if [tile.x, tile.y, tile.width, tile.height]
                .iter()
                .any(|value| value % 8 != 0)
            {
                return Err(MapDataError::MisalignedTile {
                    index,
                    x: tile.x,
                    y: tile.y,
                    width: tile.width,
                    height: tile.height,
                });
            }
        }

        let mut entities = Vec::with_capacity(self.entities.len());
        for (index, data) in self.entities.iter().enumerate() {
            entities.push(self.build_entity(index, data, &tileset)?);
        }

        let mut map = MapEntities::new(self.id.clone(), self.width, self.height, tileset);
        for tile in &self.tiles {
            let footprint = Rect::new(tile.x, tile.y, tile.width, tile.height);
            map.add_entity(Entity::tile(tile.layer, footprint, tile.pattern.clone()));
        }
        for entity in entities {
            map.add_entity(entity);
        }
        self.place_hero(&mut map)?;

        debug!(
            map = %self.id,
            tiles = self.tiles.len(),
            entities = self.entities.len(),
            "map_data_built"
        );
        Ok(map)
    }

    fn build_entity(
        &self,
        index: usize,
        data: &EntityData,
        tileset: &Tileset,
    ) -> Result<Entity, MapDataError> {
        let entity = match data.clone() {
            EntityData::Destination {
                name,
                layer,
                x,
                y,
                direction,
                default,
            } => Entity::destination(name, layer, Point::new(x, y), direction, default),
            EntityData::Teletransporter {
                name,
                layer,
                x,
                y,
                width,
                height,
                destination_map,
                destination,
            } => Entity::teletransporter(
                name,
                layer,
                Rect::new(x, y, width, height),
                destination_map,
                destination,
                (self.width, self.height),
            ),
            EntityData::Wall {
                name,
                layer,
                x,
                y,
                width,
                height,
                stops_hero,
                stops_enemies,
                stops_blocks,
            } => Entity::wall(
                name,
                layer,
                Rect::new(x, y, width, height),
                stops_hero,
                stops_enemies,
                stops_blocks,
            ),
            EntityData::DynamicTile {
                name,
                layer,
                x,
                y,
                width,
                height,
                pattern,
                enabled,
            } => {
                let Some(ground) = tileset.pattern(&pattern).map(TilePattern::ground) else {
                    return Err(MapDataError::UnknownEntityPattern { index, pattern });
                };
                let mut entity =
                    Entity::dynamic_tile(name, layer, Rect::new(x, y, width, height), pattern, ground);
                entity.base_mut().set_enabled(enabled);
                entity
            }
            EntityData::Switch {
                name,
                layer,
                x,
                y,
                subtype,
                needs_block,
                inactivate_when_leaving,
            } => Entity::switch(
                name,
                layer,
                Point::new(x, y),
                subtype,
                needs_block,
                inactivate_when_leaving,
            ),
            EntityData::Block {
                name,
                layer,
                x,
                y,
                can_be_pushed,
                can_be_pulled,
                maximum_moves,
            } => Entity::block(
                name,
                layer,
                Point::new(x, y),
                can_be_pushed,
                can_be_pulled,
                maximum_moves,
            ),
            EntityData::ConveyorBelt {
                name,
                layer,
                x,
                y,
                direction,
            } => Entity::conveyor_belt(name, layer, Point::new(x, y), direction),
            EntityData::Jumper {
                name,
                layer,
                x,
                y,
                width,
                height,
                direction,
                jump_length,
            } => Entity::jumper(name, layer, Rect::new(x, y, width, height), direction, jump_length),
            EntityData::ShopItem {
                name,
                layer,
                x,
                y,
                treasure,
                price,
                dialog,
            } => Entity::shop_item(name, layer, Point::new(x, y), treasure, price, dialog),
            EntityData::Stairs {
                name,
                layer,
                x,
                y,
                direction,
            } => Entity::stairs(name, layer, Point::new(x, y), direction),
            EntityData::CrystalBlock {
                name,
                layer,
                x,
                y,
                width,
                height,
                subtype,
            } => Entity::crystal_block(name, layer, Rect::new(x, y, width, height), subtype, false),
            EntityData::Crystal { name, layer, x, y } => {
                Entity::crystal(name, layer, Point::new(x, y))
            }
            EntityData::Enemy {
                name,
                layer,
                x,
                y,
                breed,
                life,
                damage,
                savegame_variable,
            } => {
                let mut entity = Entity::enemy(name, layer, Point::new(x, y), breed, life, damage);
                if let EntityKind::Enemy(enemy) = entity.kind_mut() {
                    enemy.savegame_variable = savegame_variable;
                }
                entity
            }
            EntityData::Separator {
                name,
                layer,
                x,
                y,
                width,
                height,
            } => Entity::separator(name, layer, Rect::new(x, y, width, height)),
            EntityData::Sensor {
                name,
                layer,
                x,
                y,
                width,
                height,
            } => Entity::sensor(name, layer, Rect::new(x, y, width, height)),
            EntityData::Destructible {
                name,
                layer,
                x,
                y,
                subtype,
                treasure,
            } => Entity::destructible(name, layer, Point::new(x, y), subtype, treasure),
        };
        Ok(entity)
    }

    fn place_hero(&self, map: &mut MapEntities) -> Result<(), MapDataError> {
        if let Some(position) = self.hero.position {
            map.hero_mut().place(
                Point::new(position.x, position.y),
                position.layer,
                position.direction % 4,
            );
            return Ok(());
        }
        let destination = self.hero.destination.as_deref();
        if map.place_hero_on_destination(destination) {
            return Ok(());
        }
        match destination {
            Some(name) => Err(MapDataError::UnknownDestination(name.to_string())),
            None => {
                warn!(map = %self.id, "map_has_no_default_destination");
                Ok(())
            }
        }
    }
}

impl TilesetData {
    pub fn build(&self) -> Result<Tileset, MapDataError> {
        let mut tileset = Tileset::new(self.id.clone(), self.background);
        let mut seen = HashSet::new();
        for pattern in &self.patterns {
            if !seen.insert(pattern.id.as_str()) {
                return Err(MapDataError::DuplicatePattern {
                    tileset: self.id.clone(),
                    pattern: pattern.id.clone(),
                });
            }
            let built = if pattern.frames.is_empty() {
                TilePattern::new(
                    pattern.id.clone(),
                    pattern.ground,
                    pattern.width,
                    pattern.height,
                    pattern.color,
                )?
            } else {
                let mut frames = Vec::with_capacity(pattern.frames.len() + 1);
                frames.push(pattern.color);
                frames.extend(pattern.frames.iter().copied());
                TilePattern::animated(
                    pattern.id.clone(),
                    pattern.ground,
                    pattern.width,
                    pattern.height,
                    frames,
                )?
            };
            tileset.add_pattern(built);
        }
        Ok(tileset)
    }
}
