use slotmap::new_key_type;

use crate::clock::Suspension;
use crate::geometry::{Layer, Point, Rect};
use crate::map::Ground;
use crate::movement::Movement;
use crate::render::Color;

new_key_type! {
    /// Generation-checked handle to an entity owned by the registry.
    pub struct EntityId;
}

/// Per-pixel opacity of one sprite frame, packed in 64-bit words per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    width: i32,
    height: i32,
    words_per_row: usize,
    bits: Vec<u64>,
}

impl PixelMask {
    pub fn from_fn(width: i32, height: i32, opaque: impl Fn(i32, i32) -> bool) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let words_per_row = (width as usize).div_ceil(64);
        let mut bits = vec![0u64; words_per_row * height as usize];
        for y in 0..height {
            for x in 0..width {
                if opaque(x, y) {
                    let word = y as usize * words_per_row + x as usize / 64;
                    bits[word] |= 1 << (x as usize % 64);
                }
            }
        }
        Self {
            width,
            height,
            words_per_row,
            bits,
        }
    }

    /// Builds a mask from RGBA pixels; zero alpha is transparent.
    pub fn from_rgba(width: i32, height: i32, rgba: &[u8]) -> Self {
        Self::from_fn(width, height, |x, y| {
            let alpha_index = (y as usize * width as usize + x as usize) * 4 + 3;
            rgba.get(alpha_index).is_some_and(|alpha| *alpha != 0)
        })
    }

    pub fn opaque(width: i32, height: i32) -> Self {
        Self::from_fn(width, height, |_, _| true)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_opaque(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        let word = y as usize * self.words_per_row + x as usize / 64;
        self.bits[word] & (1 << (x as usize % 64)) != 0
    }

    /// Whether this mask placed at `position` shares an opaque pixel with
    /// `other` placed at `other_position`.
    pub fn intersects(&self, position: Point, other: &PixelMask, other_position: Point) -> bool {
        let own = Rect::new(position.x, position.y, self.width, self.height);
        let theirs = Rect::new(other_position.x, other_position.y, other.width, other.height);
        let Some(common) = own.intersection(&theirs) else {
            return false;
        };
        for y in common.y..common.bottom() {
            for x in common.x..common.right() {
                if self.is_opaque(x - position.x, y - position.y)
                    && other.is_opaque(x - other_position.x, y - other_position.y)
                {
                    return true;
                }
            }
        }
        false
    }
}

/// Placeholder animated sprite: a colored box cycling through frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    name: String,
    animation: String,
    direction: u8,
    width: i32,
    height: i32,
    origin: Point,
    color: Color,
    frame: usize,
    frame_count: usize,
    frame_delay_ms: u64,
    looped: bool,
    next_frame_date: Option<u64>,
    animation_finished: bool,
    visible: bool,
    suspension: Suspension,
    masks: Vec<PixelMask>,
}

impl Sprite {
    pub fn new(name: impl Into<String>, width: i32, height: i32, origin: Point, color: Color) -> Self {
        Self {
            name: name.into(),
            animation: "stopped".to_string(),
            direction: 0,
            width,
            height,
            origin,
            color,
            frame: 0,
            frame_count: 1,
            frame_delay_ms: 0,
            looped: true,
            next_frame_date: None,
            animation_finished: false,
            visible: true,
            suspension: Suspension::default(),
            masks: Vec::new(),
        }
    }

    pub fn with_frames(mut self, frame_count: usize, frame_delay_ms: u64, looped: bool) -> Self {
        self.frame_count = frame_count.max(1);
        self.frame_delay_ms = frame_delay_ms;
        self.looped = looped;
        self
    }

    /// Enables pixel-precise collisions with one mask per frame.
    pub fn with_pixel_collisions(mut self, masks: Vec<PixelMask>) -> Self {
        self.masks = masks;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn animation(&self) -> &str {
        &self.animation
    }

    pub fn set_animation(&mut self, animation: &str) {
        if self.animation != animation {
            self.animation = animation.to_string();
            self.frame = 0;
            self.next_frame_date = None;
            self.animation_finished = false;
        }
    }

    pub fn direction(&self) -> u8 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: u8) {
        self.direction = direction;
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn is_animation_finished(&self) -> bool {
        self.animation_finished
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn has_pixel_collisions(&self) -> bool {
        !self.masks.is_empty()
    }

    pub fn mask(&self) -> Option<&PixelMask> {
        if self.masks.is_empty() {
            return None;
        }
        self.masks.get(self.frame % self.masks.len())
    }

    /// Screen-space box of the sprite when its owner's origin point is `xy`.
    pub fn rect_at(&self, xy: Point) -> Rect {
        Rect::new(
            xy.x - self.origin.x,
            xy.y - self.origin.y,
            self.width,
            self.height,
        )
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        let shift = self.suspension.set(suspended, now);
        if let Some(date) = self.next_frame_date.as_mut() {
            *date += shift;
        }
    }

    /// Advances the frame counter; returns true when the frame changed.
    pub fn update(&mut self, now: u64) -> bool {
        if self.suspension.is_suspended()
            || self.frame_count <= 1
            || self.frame_delay_ms == 0
            || self.animation_finished
        {
            return false;
        }
        let Some(next) = self.next_frame_date else {
            self.next_frame_date = Some(now + self.frame_delay_ms);
            return false;
        };
        let mut changed = false;
        let mut next = next;
        while now >= next && !self.animation_finished {
            next += self.frame_delay_ms;
            if self.frame + 1 < self.frame_count {
                self.frame += 1;
                changed = true;
            } else if self.looped {
                self.frame = 0;
                changed = true;
            } else {
                self.animation_finished = true;
            }
        }
        self.next_frame_date = Some(next);
        changed
    }
}

/// State shared by every map entity.
#[derive(Debug, Clone)]
pub struct EntityBase {
    name: String,
    layer: Layer,
    bounding_box: Rect,
    origin: Point,
    direction: u8,
    enabled: bool,
    waiting_enabled: bool,
    visible: bool,
    sprites: Vec<Sprite>,
    movement: Option<Movement>,
    facing_entity: Option<EntityId>,
    being_removed: bool,
    suspension: Suspension,
    ground_below: Ground,
}

impl EntityBase {
    pub fn new(name: impl Into<String>, layer: Layer, bounding_box: Rect) -> Self {
        Self {
            name: name.into(),
            layer,
            bounding_box,
            origin: Point::default(),
            direction: 0,
            enabled: true,
            waiting_enabled: false,
            visible: true,
            sprites: Vec::new(),
            movement: None,
            facing_entity: None,
            being_removed: false,
            suspension: Suspension::default(),
            ground_below: Ground::Empty,
        }
    }

    /// Places an entity of `size` so that its origin point lands on `xy`.
    pub fn at_origin(
        name: impl Into<String>,
        layer: Layer,
        xy: Point,
        width: i32,
        height: i32,
        origin: Point,
    ) -> Self {
        let mut base = Self::new(
            name,
            layer,
            Rect::new(xy.x - origin.x, xy.y - origin.y, width, height),
        );
        base.origin = origin;
        base
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub(crate) fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }

    pub fn bounding_box(&self) -> Rect {
        self.bounding_box
    }

    pub fn set_bounding_box(&mut self, bounding_box: Rect) {
        self.bounding_box = bounding_box;
    }

    pub fn size(&self) -> (i32, i32) {
        (self.bounding_box.width, self.bounding_box.height)
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        self.bounding_box.width = width;
        self.bounding_box.height = height;
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Moves the origin offset while keeping the origin point in place.
    pub fn set_origin(&mut self, origin: Point) {
        let xy = self.xy();
        self.origin = origin;
        self.set_xy(xy);
    }

    /// The origin point in map coordinates.
    pub fn xy(&self) -> Point {
        Point::new(
            self.bounding_box.x + self.origin.x,
            self.bounding_box.y + self.origin.y,
        )
    }

    pub fn set_xy(&mut self, xy: Point) {
        self.bounding_box.x = xy.x - self.origin.x;
        self.bounding_box.y = xy.y - self.origin.y;
    }

    pub fn top_left(&self) -> Point {
        self.bounding_box.top_left()
    }

    pub fn set_top_left(&mut self, top_left: Point) {
        self.bounding_box.x = top_left.x;
        self.bounding_box.y = top_left.y;
    }

    pub fn center(&self) -> Point {
        self.bounding_box.center()
    }

    /// Point a few pixels above the origin, used to sample the ground.
    pub fn ground_point(&self) -> Point {
        let xy = self.xy();
        Point::new(xy.x, xy.y - 2)
    }

    pub fn direction(&self) -> u8 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: u8) {
        self.direction = direction;
    }

    /// Point just outside the bounding box in `direction4`.
    pub fn facing_point_towards(&self, direction4: u8) -> Point {
        let bbox = self.bounding_box;
        match direction4 % 4 {
            0 => Point::new(bbox.right(), bbox.y + bbox.height / 2),
            1 => Point::new(bbox.x + bbox.width / 2, bbox.y - 1),
            2 => Point::new(bbox.x - 1, bbox.y + bbox.height / 2),
            _ => Point::new(bbox.x + bbox.width / 2, bbox.bottom()),
        }
    }

    pub fn is_aligned_to_grid(&self) -> bool {
        self.bounding_box.x % 8 == 0 && self.bounding_box.y % 8 == 0
    }

    pub fn overlaps(&self, rect: &Rect) -> bool {
        self.bounding_box.overlaps(rect)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.waiting_enabled = false;
    }

    pub fn is_waiting_enabled(&self) -> bool {
        self.waiting_enabled
    }

    /// Enables the entity once nothing overlaps it anymore.
    pub fn set_waiting_enabled(&mut self) {
        self.waiting_enabled = true;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    pub fn sprites_mut(&mut self) -> &mut [Sprite] {
        &mut self.sprites
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|sprite| sprite.name() == name)
    }

    pub fn sprite_mut(&mut self, name: &str) -> Option<&mut Sprite> {
        self.sprites.iter_mut().find(|sprite| sprite.name() == name)
    }

    pub fn add_sprite(&mut self, sprite: Sprite) {
        self.sprites.push(sprite);
    }

    pub fn remove_sprite(&mut self, name: &str) {
        self.sprites.retain(|sprite| sprite.name() != name);
    }

    pub fn has_pixel_collisions(&self) -> bool {
        self.sprites.iter().any(Sprite::has_pixel_collisions)
    }

    pub fn movement(&self) -> Option<&Movement> {
        self.movement.as_ref()
    }

    pub fn movement_mut(&mut self) -> Option<&mut Movement> {
        self.movement.as_mut()
    }

    /// Replaces the movement; the previous one is dropped.
    pub fn set_movement(&mut self, mut movement: Movement) {
        if self.suspension.is_suspended() {
            movement.set_suspended(true, 0);
        }
        self.movement = Some(movement);
    }

    pub fn clear_movement(&mut self) {
        self.movement = None;
    }

    pub(crate) fn take_movement(&mut self) -> Option<Movement> {
        self.movement.take()
    }

    /// Puts back a movement taken for an update unless a new one was set meanwhile.
    pub(crate) fn restore_movement(&mut self, movement: Movement) {
        if self.movement.is_none() {
            self.movement = Some(movement);
        }
    }

    pub fn facing_entity(&self) -> Option<EntityId> {
        self.facing_entity
    }

    pub fn set_facing_entity(&mut self, facing_entity: Option<EntityId>) {
        self.facing_entity = facing_entity;
    }

    pub fn is_being_removed(&self) -> bool {
        self.being_removed
    }

    pub(crate) fn mark_being_removed(&mut self) {
        self.being_removed = true;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspension.is_suspended()
    }

    /// Suspends sprites and movement; returns the interval to add to the
    /// entity's own dates (non-zero only when resuming).
    pub fn set_suspended(&mut self, suspended: bool, now: u64) -> u64 {
        let shift = self.suspension.set(suspended, now);
        for sprite in &mut self.sprites {
            sprite.set_suspended(suspended, now);
        }
        if let Some(movement) = self.movement.as_mut() {
            movement.set_suspended(suspended, now);
        }
        shift
    }

    pub fn ground_below(&self) -> Ground {
        self.ground_below
    }

    pub(crate) fn set_ground_below(&mut self, ground: Ground) -> bool {
        let changed = self.ground_below != ground;
        self.ground_below = ground;
        changed
    }

    /// Updates sprite animations.
    pub(crate) fn update_sprites(&mut self, now: u64) {
        for sprite in &mut self.sprites {
            sprite.update(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_point_tracks_bounding_box() {
        let mut base = EntityBase::at_origin(
            "belt",
            Layer::Low,
            Point::new(40, 29),
            16,
            16,
            Point::new(8, 13),
        );
        assert_eq!(base.bounding_box(), Rect::new(32, 16, 16, 16));
        base.set_top_left(Point::new(0, 0));
        assert_eq!(base.xy(), Point::new(8, 13));
        base.set_origin(Point::new(0, 0));
        assert_eq!(base.xy(), Point::new(8, 13));
        assert_eq!(base.top_left(), Point::new(8, 13));
    }

    #[test]
    fn facing_points_sit_just_outside_the_box() {
        let base = EntityBase::new("hero", Layer::Low, Rect::new(0, 0, 16, 16));
        assert_eq!(base.facing_point_towards(0), Point::new(16, 8));
        assert_eq!(base.facing_point_towards(1), Point::new(8, -1));
        assert_eq!(base.facing_point_towards(2), Point::new(-1, 8));
        assert_eq!(base.facing_point_towards(3), Point::new(8, 16));
    }

    #[test]
    fn pixel_masks_intersect_only_on_opaque_pixels() {
        let diagonal = PixelMask::from_fn(8, 8, |x, y| x == y);
        let corner = PixelMask::from_fn(8, 8, |x, y| x == 7 && y == 0);
        assert!(!diagonal.intersects(Point::new(0, 0), &corner, Point::new(0, 0)));
        assert!(diagonal.intersects(Point::new(0, 0), &corner, Point::new(-3, 4)));
        assert!(!diagonal.intersects(Point::new(0, 0), &corner, Point::new(100, 0)));
    }

    #[test]
    fn masks_wider_than_a_word() {
        let wide = PixelMask::from_fn(70, 2, |x, _| x == 69);
        assert!(wide.is_opaque(69, 1));
        assert!(!wide.is_opaque(5, 1));
        let rgba = [0, 0, 0, 0, 9, 9, 9, 255];
        let mask = PixelMask::from_rgba(2, 1, &rgba);
        assert!(!mask.is_opaque(0, 0));
        assert!(mask.is_opaque(1, 0));
    }

    #[test]
    fn sprite_frames_freeze_while_suspended() {
        let mut sprite = Sprite::new("main", 16, 16, Point::new(8, 13), [1, 1, 1, 255])
            .with_frames(4, 100, true);
        sprite.update(0);
        assert!(sprite.update(100));
        assert_eq!(sprite.frame(), 1);
        sprite.set_suspended(true, 150);
        assert!(!sprite.update(1_000));
        sprite.set_suspended(false, 1_150);
        assert!(!sprite.update(1_150));
        assert!(sprite.update(1_200));
        assert_eq!(sprite.frame(), 2);
    }

    #[test]
    fn non_looping_animation_finishes() {
        let mut sprite =
            Sprite::new("explosion", 16, 16, Point::default(), [1, 1, 1, 255]).with_frames(2, 50, false);
        sprite.update(0);
        sprite.update(200);
        assert!(sprite.is_animation_finished());
        assert_eq!(sprite.frame(), 1);
    }
}
