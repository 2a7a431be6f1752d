use serde::{Deserialize, Serialize};

/// One of the three z-order bands of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Low,
    Intermediate,
    High,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Low, Layer::Intermediate, Layer::High];
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        match self {
            Layer::Low => 0,
            Layer::Intermediate => 1,
            Layer::High => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Layer> {
        Self::ALL.get(index).copied()
    }

    pub fn below(self) -> Option<Layer> {
        match self {
            Layer::Low => None,
            Layer::Intermediate => Some(Layer::Low),
            Layer::High => Some(Layer::Intermediate),
        }
    }

    pub fn above(self) -> Option<Layer> {
        match self {
            Layer::Low => Some(Layer::Intermediate),
            Layer::Intermediate => Some(Layer::High),
            Layer::High => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle in radians from `self` to `other`, y axis pointing up.
    pub fn angle_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(self.y - other.y);
        dy.atan2(dx)
    }
}

/// Axis-aligned rectangle in map pixels. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.contains(point.x, point.y)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Unit step for a 4-direction value: 0 east, 1 north, 2 west, 3 south.
pub fn direction4_to_xy(direction4: u8) -> (i32, i32) {
    match direction4 % 4 {
        0 => (1, 0),
        1 => (0, -1),
        2 => (-1, 0),
        _ => (0, 1),
    }
}

/// Unit step for an 8-direction value: 0 east, counter-clockwise in 45 degree steps.
pub fn direction8_to_xy(direction8: u8) -> (i32, i32) {
    match direction8 % 8 {
        0 => (1, 0),
        1 => (1, -1),
        2 => (0, -1),
        3 => (-1, -1),
        4 => (-1, 0),
        5 => (-1, 1),
        6 => (0, 1),
        _ => (1, 1),
    }
}

pub fn direction8_to_angle(direction8: u8) -> f64 {
    f64::from(direction8 % 8) * std::f64::consts::FRAC_PI_4
}

/// Closest 4-direction for an angle in radians.
pub fn angle_to_direction4(angle: f64) -> u8 {
    let turns = angle.rem_euclid(std::f64::consts::TAU) / std::f64::consts::FRAC_PI_2;
    (turns.round() as i64).rem_euclid(4) as u8
}

pub fn opposite_direction4(direction4: u8) -> u8 {
    (direction4 + 2) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_excludes_touching_edges() {
        let a = Rect::new(0, 0, 16, 16);
        let b = Rect::new(16, 0, 16, 16);
        let c = Rect::new(15, 15, 4, 4);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn intersection_of_disjoint_rects_is_none() {
        let a = Rect::new(0, 0, 8, 8);
        assert_eq!(a.intersection(&Rect::new(8, 8, 8, 8)), None);
        assert_eq!(
            a.intersection(&Rect::new(4, 2, 8, 8)),
            Some(Rect::new(4, 2, 4, 6))
        );
    }

    #[test]
    fn direction_helpers_agree_on_cardinals() {
        for direction4 in 0..4u8 {
            assert_eq!(direction4_to_xy(direction4), direction8_to_xy(direction4 * 2));
        }
        assert_eq!(opposite_direction4(1), 3);
        assert_eq!(angle_to_direction4(std::f64::consts::PI), 2);
        assert_eq!(angle_to_direction4(-std::f64::consts::FRAC_PI_2), 3);
    }

    #[test]
    fn angle_points_up_for_smaller_y() {
        let origin = Point::new(10, 10);
        let angle = origin.angle_to(Point::new(10, 0));
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn layer_neighbours() {
        assert_eq!(Layer::Low.below(), None);
        assert_eq!(Layer::High.below(), Some(Layer::Intermediate));
        assert_eq!(Layer::from_index(1), Some(Layer::Intermediate));
        assert_eq!(Layer::from_index(3), None);
    }
}
