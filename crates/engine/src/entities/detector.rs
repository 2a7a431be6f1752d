use crate::geometry::{Point, Rect};
use crate::map::Ground;

use super::base::EntityBase;
use super::kinds::{Entity, EntityKind, SeparatorData};

/// How a detector decides that another entity collides with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionMode {
    Overlapping,
    Containing,
    OriginPoint,
    FacingPoint,
    Center,
    /// Kind-specific geometric test.
    Custom,
    /// Pixel-precise test between sprite masks.
    Sprite,
}

impl CollisionMode {
    pub const ALL: [CollisionMode; 7] = [
        CollisionMode::Overlapping,
        CollisionMode::Containing,
        CollisionMode::OriginPoint,
        CollisionMode::FacingPoint,
        CollisionMode::Center,
        CollisionMode::Custom,
        CollisionMode::Sprite,
    ];

    const fn bit(self) -> u8 {
        match self {
            CollisionMode::Overlapping => 1,
            CollisionMode::Containing => 1 << 1,
            CollisionMode::OriginPoint => 1 << 2,
            CollisionMode::FacingPoint => 1 << 3,
            CollisionMode::Center => 1 << 4,
            CollisionMode::Custom => 1 << 5,
            CollisionMode::Sprite => 1 << 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionModes(u8);

impl CollisionModes {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn with(self, mode: CollisionMode) -> Self {
        Self(self.0 | mode.bit())
    }

    pub fn contains(self, mode: CollisionMode) -> bool {
        self.0 & mode.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = CollisionMode> {
        CollisionMode::ALL
            .into_iter()
            .filter(move |mode| self.contains(*mode))
    }
}

impl From<CollisionMode> for CollisionModes {
    fn from(mode: CollisionMode) -> Self {
        Self::empty().with(mode)
    }
}

/// What a detector sees of the entity it tests.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Collider<'a> {
    pub base: &'a EntityBase,
    pub is_hero: bool,
    pub facing_direction4: u8,
    pub moving_direction8: Option<u8>,
    pub ground: Ground,
}

impl Collider<'_> {
    fn is_moving_towards(&self, direction4: u8) -> bool {
        self.moving_direction8 == Some(direction4 * 2)
    }
}

/// Tests one collision mode between `detector` and `collider`.
pub(crate) fn test_collision(detector: &Entity, collider: &Collider<'_>, mode: CollisionMode) -> bool {
    let bbox = detector.bounding_box();
    let other = collider.base;
    match mode {
        CollisionMode::Overlapping => bbox.overlaps(&other.bounding_box()),
        CollisionMode::Containing => bbox.contains_rect(&other.bounding_box()),
        CollisionMode::OriginPoint => bbox.contains_point(other.xy()),
        CollisionMode::FacingPoint => {
            bbox.contains_point(other.facing_point_towards(collider.facing_direction4))
        }
        CollisionMode::Center => bbox.contains_point(other.center()),
        CollisionMode::Custom => test_collision_custom(detector, collider),
        CollisionMode::Sprite => test_collision_sprites(detector.base(), other),
    }
}

fn test_collision_custom(detector: &Entity, collider: &Collider<'_>) -> bool {
    let bbox = detector.bounding_box();
    let other = collider.base;
    match detector.kind() {
        EntityKind::Switch(data) if data.is_walkable() => {
            corners_inside(&bbox, &other.bounding_box())
        }
        EntityKind::Teletransporter(data) => {
            if collider.is_hero {
                if let Some(direction4) = data.transition_direction() {
                    return collider.is_moving_towards(direction4)
                        && bbox.contains_point(other.facing_point_towards(direction4));
                }
                if collider.ground == Ground::Hole {
                    return bbox.contains_point(other.ground_point());
                }
            }
            corners_inside(&bbox, &other.bounding_box())
        }
        EntityKind::Jumper(data) => {
            if !collider.is_hero || collider.moving_direction8 != Some(data.direction8) {
                return false;
            }
            if data.direction8 % 2 == 0 {
                let point = other.facing_point_towards(data.direction8 / 2);
                bbox.contains_point(point)
            } else {
                is_point_in_diagonal(&bbox, data.direction8, other.center())
            }
        }
        EntityKind::Sensor(_) => collider.is_hero && bbox.contains_point(other.xy()),
        EntityKind::Separator(data) => {
            collider.is_hero
                && separator_side(&bbox, other.center())
                    .is_some_and(|side| data.hero_side != Some(side))
        }
        _ => false,
    }
}

/// The mover's box shrunk by 4 px on each side lies inside `area`.
fn corners_inside(area: &Rect, mover: &Rect) -> bool {
    let x1 = mover.x + 4;
    let x2 = x1 + mover.width - 9;
    let y1 = mover.y + 4;
    let y2 = y1 + mover.height - 9;
    area.contains(x1, y1) && area.contains(x2, y1) && area.contains(x1, y2) && area.contains(x2, y2)
}

/// Whether `point` lies within 8 px of the diagonal a jumper is drawn along.
fn is_point_in_diagonal(bbox: &Rect, direction8: u8, point: Point) -> bool {
    if !bbox.contains_point(point) {
        return false;
    }
    let dx = point.x - bbox.x;
    let offset = match direction8 {
        // north-east and south-west jumpers follow the bottom-left to top-right diagonal
        1 | 5 => dx - (bbox.bottom() - point.y),
        _ => dx - (point.y - bbox.y),
    };
    offset.abs() <= 8
}

/// Side (-1 or 1) of the separator line the point lies on, if the point is
/// within the separator's extent.
pub(crate) fn separator_side(bbox: &Rect, point: Point) -> Option<i8> {
    let (within, coordinate, line) = if SeparatorData::is_vertical(bbox) {
        (
            point.y >= bbox.y && point.y < bbox.bottom(),
            point.x,
            bbox.x + 8,
        )
    } else {
        (
            point.x >= bbox.x && point.x < bbox.right(),
            point.y,
            bbox.y + 8,
        )
    };
    within.then_some(if coordinate < line { -1 } else { 1 })
}

fn test_collision_sprites(detector: &EntityBase, other: &EntityBase) -> bool {
    detector.sprites().iter().any(|own| {
        let Some(own_mask) = own.mask() else {
            return false;
        };
        let own_position = own.rect_at(detector.xy()).top_left();
        other.sprites().iter().any(|theirs| {
            theirs.mask().is_some_and(|their_mask| {
                own_mask.intersects(own_position, their_mask, theirs.rect_at(other.xy()).top_left())
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::base::{PixelMask, Sprite};
    use crate::entities::kinds::SwitchSubtype;
    use crate::geometry::Layer;

    fn hero_base(top_left: Point) -> EntityBase {
        let mut base = EntityBase::at_origin(
            "hero",
            Layer::Low,
            Point::default(),
            16,
            16,
            Point::new(8, 13),
        );
        base.set_top_left(top_left);
        base
    }

    fn collider(base: &EntityBase) -> Collider<'_> {
        Collider {
            base,
            is_hero: true,
            facing_direction4: base.direction(),
            moving_direction8: None,
            ground: Ground::Traversable,
        }
    }

    #[test]
    fn modes_bitset_iterates_in_order() {
        let modes = CollisionModes::from(CollisionMode::Sprite).with(CollisionMode::Overlapping);
        assert_eq!(
            modes.iter().collect::<Vec<_>>(),
            vec![CollisionMode::Overlapping, CollisionMode::Sprite]
        );
        assert!(CollisionModes::empty().is_empty());
    }

    #[test]
    fn walkable_switch_needs_the_mover_centered() {
        let switch = Entity::switch(
            "switch",
            Layer::Low,
            Point::new(32, 32),
            SwitchSubtype::WalkableVisible,
            false,
            false,
        );
        let centered = hero_base(Point::new(32, 32));
        assert!(test_collision(&switch, &collider(&centered), CollisionMode::Custom));

        let offset = hero_base(Point::new(38, 32));
        assert!(!test_collision(&switch, &collider(&offset), CollisionMode::Custom));
    }

    #[test]
    fn side_teletransporter_requires_moving_outwards() {
        let teletransporter = Entity::teletransporter(
            "west_exit",
            Layer::Low,
            Rect::new(-16, 0, 16, 240),
            "other_map",
            "_side",
            (320, 240),
        );
        let hero = hero_base(Point::new(0, 100));
        let mut still = collider(&hero);
        assert!(!test_collision(&teletransporter, &still, CollisionMode::Custom));

        still.moving_direction8 = Some(4);
        assert!(test_collision(&teletransporter, &still, CollisionMode::Custom));
    }

    #[test]
    fn hole_teletransporter_uses_ground_point() {
        let teletransporter = Entity::teletransporter(
            "hole",
            Layer::Low,
            Rect::new(64, 64, 16, 16),
            "cave",
            "entrance",
            (320, 240),
        );
        let hero = hero_base(Point::new(56, 56));
        let mut falling = collider(&hero);
        assert!(!test_collision(&teletransporter, &falling, CollisionMode::Custom));
        falling.ground = Ground::Hole;
        assert!(test_collision(&teletransporter, &falling, CollisionMode::Custom));
    }

    #[test]
    fn diagonal_jumper_band() {
        let jumper = Entity::jumper("jumper", Layer::Low, Rect::new(0, 0, 32, 32), 7, 32);
        let on_line = hero_base(Point::new(8, 8));
        let mut moving = collider(&on_line);
        moving.moving_direction8 = Some(7);
        assert!(test_collision(&jumper, &moving, CollisionMode::Custom));

        let off_line = hero_base(Point::new(16, -8));
        let mut moving = collider(&off_line);
        moving.moving_direction8 = Some(7);
        assert!(!test_collision(&jumper, &moving, CollisionMode::Custom));
    }

    #[test]
    fn separator_reports_side_changes_only() {
        let separator = Entity::separator("sep", Layer::Low, Rect::new(152, 0, 16, 240));
        let hero = hero_base(Point::new(120, 100));
        assert_eq!(separator_side(&separator.bounding_box(), hero.center()), Some(-1));
        assert!(test_collision(&separator, &collider(&hero), CollisionMode::Custom));

        let mut recorded = separator.clone();
        if let EntityKind::Separator(data) = recorded.kind_mut() {
            data.hero_side = Some(-1);
        }
        assert!(!test_collision(&recorded, &collider(&hero), CollisionMode::Custom));
        let crossed = hero_base(Point::new(160, 100));
        assert!(test_collision(&recorded, &collider(&crossed), CollisionMode::Custom));
    }

    #[test]
    fn sprite_mode_compares_masks() {
        let mut crystal = Entity::crystal("crystal", Layer::Low, Point::new(8, 13));
        crystal.base_mut().sprites_mut()[0] =
            Sprite::new("crystal", 16, 16, Point::new(8, 13), [0, 0, 0, 255])
                .with_pixel_collisions(vec![PixelMask::from_fn(16, 16, |x, _| x < 2)]);
        let mut arrow = EntityBase::at_origin("", Layer::Low, Point::new(22, 13), 16, 16, Point::new(8, 13));
        arrow.add_sprite(
            Sprite::new("arrow", 16, 16, Point::new(8, 13), [0, 0, 0, 255])
                .with_pixel_collisions(vec![PixelMask::from_fn(16, 16, |x, _| x > 13)]),
        );
        let seen = Collider {
            base: &arrow,
            is_hero: false,
            facing_direction4: 0,
            moving_direction8: None,
            ground: Ground::Traversable,
        };
        assert!(test_collision(&crystal, &seen, CollisionMode::Overlapping));
        assert!(!test_collision(&crystal, &seen, CollisionMode::Sprite));
    }
}
