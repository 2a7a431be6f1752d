use crate::geometry::{Layer, Rect};

use super::ground::{DiagonalCorner, Ground};

/// Ground of every 8x8 cell, one dense row-major array per layer.
///
/// Cells never painted by a static tile read as `Ground::Traversable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObstacleGrid {
    width8: usize,
    height8: usize,
    cells: [Vec<Ground>; Layer::COUNT],
}

impl ObstacleGrid {
    pub fn new(map_width: i32, map_height: i32) -> Self {
        let width8 = (map_width.max(0) / 8) as usize;
        let height8 = (map_height.max(0) / 8) as usize;
        let cell_count = width8 * height8;
        Self {
            width8,
            height8,
            cells: std::array::from_fn(|_| vec![Ground::default(); cell_count]),
        }
    }

    pub fn width8(&self) -> usize {
        self.width8
    }

    pub fn height8(&self) -> usize {
        self.height8
    }

    /// Ground of the cell containing pixel (x,y). Hot path: the caller
    /// guarantees (x,y) lies inside the map.
    #[inline]
    pub fn get_obstacle(&self, layer: Layer, x: i32, y: i32) -> Ground {
        self.cells[layer.index()][(y >> 3) as usize * self.width8 + (x >> 3) as usize]
    }

    pub fn cell(&self, layer: Layer, x8: i32, y8: i32) -> Option<Ground> {
        let index = self.index_of(x8, y8)?;
        Some(self.cells[layer.index()][index])
    }

    pub fn set_cell(&mut self, layer: Layer, x8: i32, y8: i32, ground: Ground) {
        if let Some(index) = self.index_of(x8, y8) {
            self.cells[layer.index()][index] = ground;
        }
    }

    fn index_of(&self, x8: i32, y8: i32) -> Option<usize> {
        if x8 < 0 || y8 < 0 || x8 as usize >= self.width8 || y8 as usize >= self.height8 {
            return None;
        }
        Some(y8 as usize * self.width8 + x8 as usize)
    }

    /// Paints the footprint of a static tile. `Empty` keeps what lower tiles
    /// painted, so tiles must be stamped in bottom-to-top order.
    pub fn stamp(&mut self, layer: Layer, footprint: Rect, ground: Ground) {
        let x8 = footprint.x >> 3;
        let y8 = footprint.y >> 3;
        let width8 = footprint.width >> 3;
        let height8 = footprint.height >> 3;

        if ground == Ground::Empty {
            return;
        }

        let Some((corner, open_ground)) = ground.diagonal() else {
            for row in 0..height8 {
                for column in 0..width8 {
                    self.set_cell(layer, x8 + column, y8 + row, ground);
                }
            }
            return;
        };

        let diagonal = corner.wall_tag();
        for i in 0..height8 {
            let y = y8 + i;
            match corner {
                DiagonalCorner::TopRight => {
                    self.set_cell(layer, x8 + i, y, diagonal);
                    for j in 0..i {
                        self.set_cell(layer, x8 + j, y, open_ground);
                    }
                    for j in i + 1..width8 {
                        self.set_cell(layer, x8 + j, y, Ground::Wall);
                    }
                }
                DiagonalCorner::TopLeft => {
                    for j in 0..width8 - i - 1 {
                        self.set_cell(layer, x8 + j, y, Ground::Wall);
                    }
                    self.set_cell(layer, x8 + width8 - i - 1, y, diagonal);
                    for j in width8 - i..width8 {
                        self.set_cell(layer, x8 + j, y, open_ground);
                    }
                }
                DiagonalCorner::BottomLeft => {
                    for j in 0..i {
                        self.set_cell(layer, x8 + j, y, Ground::Wall);
                    }
                    self.set_cell(layer, x8 + i, y, diagonal);
                    for j in i + 1..width8 {
                        self.set_cell(layer, x8 + j, y, open_ground);
                    }
                }
                DiagonalCorner::BottomRight => {
                    for j in 0..width8 - i - 1 {
                        self.set_cell(layer, x8 + j, y, open_ground);
                    }
                    self.set_cell(layer, x8 + width8 - i - 1, y, diagonal);
                    for j in width8 - i..width8 {
                        self.set_cell(layer, x8 + j, y, Ground::Wall);
                    }
                }
            }
        }
    }
}
