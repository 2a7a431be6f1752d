//! Map terrain: tile patterns, the per-layer obstacle grid, the camera and
//! the serializable map description.

mod camera;
mod data;
mod grid;
mod ground;

pub use camera::{Camera, CAMERA_HEIGHT, CAMERA_SPEED, CAMERA_WIDTH};
pub use data::{
    EntityData, HeroPosition, HeroStart, MapData, MapDataError, PatternData, TileData, TilesetData,
};
pub use grid::ObstacleGrid;
pub use ground::{
    DiagonalCorner, Ground, TilePattern, TilePatternError, Tileset, TILE_ANIMATION_FRAME_DELAY_MS,
};
