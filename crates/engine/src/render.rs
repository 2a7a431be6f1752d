use crate::geometry::{Point, Rect};

pub type Color = [u8; 4];

/// Pixels with this value are skipped when a surface is blitted.
pub const TRANSPARENT: Color = [0, 0, 0, 0];

/// Opaque 2D blit target the map draws into.
pub trait RenderTarget {
    fn size(&self) -> (u32, u32);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    /// Copies `src` of `surface` to `dst`, skipping transparent pixels.
    fn blit(&mut self, surface: &Surface, src: Rect, dst: Point);
}

/// In-memory RGBA surface, used for pre-rendered tile layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index_of(x, y).map(|index| self.pixels[index])
    }

    pub fn clear(&mut self) {
        self.pixels.fill(TRANSPARENT);
    }

    pub fn clear_rect(&mut self, rect: Rect) {
        self.fill_rect(rect, TRANSPARENT);
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }
}

impl RenderTarget for Surface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(clipped) = rect.intersection(&self.bounds()) else {
            return;
        };
        for y in clipped.y..clipped.bottom() {
            let row = y as usize * self.width as usize;
            let start = row + clipped.x as usize;
            let end = row + clipped.right() as usize;
            self.pixels[start..end].fill(color);
        }
    }

    fn blit(&mut self, surface: &Surface, src: Rect, dst: Point) {
        for_each_opaque_pixel(surface, src, dst, self.bounds(), |x, y, color| {
            if let Some(index) = self.index_of(x, y) {
                self.pixels[index] = color;
            }
        });
    }
}

/// Walks the opaque pixels of `src` placed at `dst`, clipped to `clip`.
pub fn for_each_opaque_pixel(
    surface: &Surface,
    src: Rect,
    dst: Point,
    clip: Rect,
    mut visit: impl FnMut(i32, i32, Color),
) {
    let Some(src) = src.intersection(&surface.bounds()) else {
        return;
    };
    let placed = Rect::new(dst.x, dst.y, src.width, src.height);
    let Some(visible) = placed.intersection(&clip) else {
        return;
    };
    for y in visible.y..visible.bottom() {
        for x in visible.x..visible.right() {
            let sx = src.x + (x - dst.x);
            let sy = src.y + (y - dst.y);
            if let Some(color) = surface.pixel(sx, sy) {
                if color != TRANSPARENT {
                    visit(x, y, color);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCall {
    Fill { rect: Rect, color: Color },
    Blit { src: Rect, dst: Point },
}

/// Target that records calls instead of drawing. Headless runs and tests use it.
#[derive(Debug, Clone, Default)]
pub struct RecordingTarget {
    width: u32,
    height: u32,
    calls: Vec<DrawCall>,
}

impl RecordingTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }
}

impl RenderTarget for RecordingTarget {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.calls.push(DrawCall::Fill { rect, color });
    }

    fn blit(&mut self, _surface: &Surface, src: Rect, dst: Point) {
        self.calls.push(DrawCall::Blit { src, dst });
    }
}
