use crate::geometry::{Point, Rect};
use crate::render::{for_each_opaque_pixel, Color, RenderTarget, Surface};

/// RGBA8 frame buffer of the window, seen as a blit target.
pub struct PixelFrame<'a> {
    bytes: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> PixelFrame<'a> {
    /// `bytes` must hold `width * height` RGBA pixels.
    pub fn new(bytes: &'a mut [u8], width: u32, height: u32) -> Self {
        debug_assert_eq!(bytes.len(), width as usize * height as usize * 4);
        Self {
            bytes,
            width,
            height,
        }
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    fn put(&mut self, x: i32, y: i32, color: Color) {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(pixel) = self.bytes.get_mut(offset..offset + 4) {
            pixel.copy_from_slice(&color);
        }
    }
}

impl RenderTarget for PixelFrame<'_> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(clipped) = rect.intersection(&self.bounds()) else {
            return;
        };
        for y in clipped.y..clipped.bottom() {
            for x in clipped.x..clipped.right() {
                self.put(x, y, color);
            }
        }
    }

    fn blit(&mut self, surface: &Surface, src: Rect, dst: Point) {
        let clip = self.bounds();
        for_each_opaque_pixel(surface, src, dst, clip, |x, y, color| self.put(x, y, color));
    }
}
