use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::Color;

/// Terrain classification of one 8x8 map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ground {
    #[default]
    Traversable,
    Wall,
    WallTopRight,
    WallTopLeft,
    WallBottomLeft,
    WallBottomRight,
    /// No ground here: look at the layer below.
    Empty,
    WallTopRightWater,
    WallTopLeftWater,
    WallBottomLeftWater,
    WallBottomRightWater,
    DeepWater,
    ShallowWater,
    Hole,
    Ladder,
    Prickle,
    Lava,
    Grass,
    Ice,
}

/// Corner of a cell occupied by the wall half of a diagonal pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagonalCorner {
    TopRight,
    TopLeft,
    BottomLeft,
    BottomRight,
}

impl DiagonalCorner {
    /// Whether pixel (x,y) of an 8x8 cell lies in the wall triangle.
    pub fn covers(self, x_in_cell: i32, y_in_cell: i32) -> bool {
        match self {
            DiagonalCorner::TopRight => y_in_cell <= x_in_cell,
            DiagonalCorner::TopLeft => y_in_cell <= 7 - x_in_cell,
            DiagonalCorner::BottomLeft => y_in_cell >= x_in_cell,
            DiagonalCorner::BottomRight => y_in_cell >= 7 - x_in_cell,
        }
    }

    /// Tag of the cell sitting on the diagonal.
    pub fn wall_tag(self) -> Ground {
        match self {
            DiagonalCorner::TopRight => Ground::WallTopRight,
            DiagonalCorner::TopLeft => Ground::WallTopLeft,
            DiagonalCorner::BottomLeft => Ground::WallBottomLeft,
            DiagonalCorner::BottomRight => Ground::WallBottomRight,
        }
    }
}

impl Ground {
    /// Splits a diagonal ground into its corner and the ground of the open side.
    pub fn diagonal(self) -> Option<(DiagonalCorner, Ground)> {
        match self {
            Ground::WallTopRight => Some((DiagonalCorner::TopRight, Ground::Traversable)),
            Ground::WallTopLeft => Some((DiagonalCorner::TopLeft, Ground::Traversable)),
            Ground::WallBottomLeft => Some((DiagonalCorner::BottomLeft, Ground::Traversable)),
            Ground::WallBottomRight => Some((DiagonalCorner::BottomRight, Ground::Traversable)),
            Ground::WallTopRightWater => Some((DiagonalCorner::TopRight, Ground::DeepWater)),
            Ground::WallTopLeftWater => Some((DiagonalCorner::TopLeft, Ground::DeepWater)),
            Ground::WallBottomLeftWater => Some((DiagonalCorner::BottomLeft, Ground::DeepWater)),
            Ground::WallBottomRightWater => Some((DiagonalCorner::BottomRight, Ground::DeepWater)),
            _ => None,
        }
    }

    pub fn is_diagonal(self) -> bool {
        self.diagonal().is_some()
    }

    /// Solid for everything: plain walls and the wall half of diagonals.
    pub fn is_wall(self) -> bool {
        matches!(self, Ground::Wall) || self.is_diagonal()
    }

    /// Grounds a walking entity can stand on without special effect.
    pub fn is_solid_footing(self) -> bool {
        matches!(
            self,
            Ground::Traversable | Ground::Grass | Ground::Ice | Ground::ShallowWater | Ground::Ladder
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TilePatternError {
    #[error("tile pattern '{id}' has invalid size {width}x{height}: expected positive multiples of 8")]
    InvalidSize { id: String, width: i32, height: i32 },
    #[error("diagonal tile pattern '{id}' must be square, got {width}x{height}")]
    NonSquareDiagonal { id: String, width: i32, height: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePattern {
    id: String,
    ground: Ground,
    width: i32,
    height: i32,
    frames: Vec<Color>,
    frame_delay_ms: u64,
}

pub const TILE_ANIMATION_FRAME_DELAY_MS: u64 = 250;

impl TilePattern {
    pub fn new(
        id: impl Into<String>,
        ground: Ground,
        width: i32,
        height: i32,
        color: Color,
    ) -> Result<Self, TilePatternError> {
        Self::animated(id, ground, width, height, vec![color])
    }

    /// A pattern cycling through `frames`; a single frame is a static pattern.
    pub fn animated(
        id: impl Into<String>,
        ground: Ground,
        width: i32,
        height: i32,
        frames: Vec<Color>,
    ) -> Result<Self, TilePatternError> {
        let id = id.into();
        if width <= 0 || height <= 0 || width % 8 != 0 || height % 8 != 0 {
            return Err(TilePatternError::InvalidSize { id, width, height });
        }
        if ground.is_diagonal() && width != height {
            return Err(TilePatternError::NonSquareDiagonal { id, width, height });
        }
        let frames = if frames.is_empty() {
            vec![[0, 0, 0, 255]]
        } else {
            frames
        };
        Ok(Self {
            id,
            ground,
            width,
            height,
            frames,
            frame_delay_ms: TILE_ANIMATION_FRAME_DELAY_MS,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ground(&self) -> Ground {
        self.ground
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn color_at(&self, now: u64) -> Color {
        let frame = (now / self.frame_delay_ms) as usize % self.frames.len();
        self.frames[frame]
    }
}

/// Collection of tile patterns a map is painted with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tileset {
    id: String,
    background: Color,
    patterns: HashMap<String, TilePattern>,
}

impl Tileset {
    pub fn new(id: impl Into<String>, background: Color) -> Self {
        Self {
            id: id.into(),
            background,
            patterns: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn add_pattern(&mut self, pattern: TilePattern) {
        self.patterns.insert(pattern.id.clone(), pattern);
    }

    pub fn pattern(&self, id: &str) -> Option<&TilePattern> {
        self.patterns.get(id)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_sizes_must_be_positive_multiples_of_eight() {
        assert!(TilePattern::new("ok", Ground::Wall, 16, 8, [0; 4]).is_ok());
        assert_eq!(
            TilePattern::new("zero", Ground::Wall, 0, 8, [0; 4]),
            Err(TilePatternError::InvalidSize {
                id: "zero".to_string(),
                width: 0,
                height: 8
            })
        );
        assert!(matches!(
            TilePattern::new("odd", Ground::Traversable, 12, 8, [0; 4]),
            Err(TilePatternError::InvalidSize { .. })
        ));
    }

    #[test]
    fn diagonal_patterns_must_be_square() {
        assert!(TilePattern::new("d", Ground::WallTopLeft, 16, 16, [0; 4]).is_ok());
        assert!(matches!(
            TilePattern::new("d", Ground::WallBottomRightWater, 16, 24, [0; 4]),
            Err(TilePatternError::NonSquareDiagonal { .. })
        ));
    }

    #[test]
    fn diagonal_split_reports_open_side_ground() {
        assert_eq!(
            Ground::WallTopLeftWater.diagonal(),
            Some((DiagonalCorner::TopLeft, Ground::DeepWater))
        );
        assert_eq!(Ground::Hole.diagonal(), None);
        assert!(Ground::WallBottomLeft.is_wall());
        assert!(!Ground::DeepWater.is_wall());
    }

    #[test]
    fn corner_triangles_include_their_diagonal() {
        assert!(DiagonalCorner::TopRight.covers(7, 0));
        assert!(DiagonalCorner::TopRight.covers(3, 3));
        assert!(!DiagonalCorner::TopRight.covers(0, 7));
        assert!(DiagonalCorner::TopLeft.covers(0, 0));
        assert!(!DiagonalCorner::TopLeft.covers(7, 7));
        assert!(DiagonalCorner::BottomLeft.covers(0, 7));
        assert!(DiagonalCorner::BottomRight.covers(7, 7));
        assert!(!DiagonalCorner::BottomRight.covers(0, 0));
    }

    #[test]
    fn animated_pattern_cycles_frames() {
        let pattern = TilePattern::animated(
            "water",
            Ground::DeepWater,
            8,
            8,
            vec![[0, 0, 100, 255], [0, 0, 200, 255]],
        )
        .expect("valid pattern");
        assert!(pattern.is_animated());
        assert_eq!(pattern.color_at(0), [0, 0, 100, 255]);
        assert_eq!(pattern.color_at(TILE_ANIMATION_FRAME_DELAY_MS), [0, 0, 200, 255]);
        assert_eq!(pattern.color_at(2 * TILE_ANIMATION_FRAME_DELAY_MS), [0, 0, 100, 255]);
    }
}
