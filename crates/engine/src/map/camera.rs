use tracing::debug;

use crate::geometry::{Point, Rect};
use crate::movement::{Movement, MovementTarget};

pub const CAMERA_WIDTH: i32 = 320;
pub const CAMERA_HEIGHT: i32 = 240;
/// Speed of scripted camera moves, in pixels per second.
pub const CAMERA_SPEED: i32 = 120;

#[derive(Debug, Clone, PartialEq)]
enum CameraMode {
    FollowingHero,
    /// Scripted move; `restoring` moves go back to the hero and then follow it.
    Moving { movement: Movement, restoring: bool },
    Fixed,
}

/// Visible area of the map. Follows the hero's center clamped to the map
/// bounds, unless a scripted move is active.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    map_size: (i32, i32),
    area: Rect,
    mode: CameraMode,
}

impl Camera {
    pub fn new(map_size: (i32, i32)) -> Self {
        Self {
            map_size,
            area: Rect::new(0, 0, CAMERA_WIDTH, CAMERA_HEIGHT),
            mode: CameraMode::FollowingHero,
        }
    }

    /// Top-left corner of the visible area in map coordinates.
    pub fn position(&self) -> Point {
        self.area.top_left()
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn is_following_hero(&self) -> bool {
        self.mode == CameraMode::FollowingHero
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.mode, CameraMode::Moving { .. })
    }

    pub fn update(&mut self, hero_center: Point, now: u64) {
        let hero_position = self.clamped_top_left(hero_center);
        match &mut self.mode {
            CameraMode::FollowingHero => {
                self.area = Rect::new(hero_position.x, hero_position.y, CAMERA_WIDTH, CAMERA_HEIGHT);
            }
            CameraMode::Moving {
                movement,
                restoring,
            } => {
                if *restoring {
                    movement.set_destination(hero_position);
                }
                let outcome = movement.update(now, &mut self.area, |_| false);
                if outcome.finished || movement.is_finished() {
                    let restoring = *restoring;
                    self.mode = if restoring {
                        CameraMode::FollowingHero
                    } else {
                        CameraMode::Fixed
                    };
                    debug!(x = self.area.x, y = self.area.y, restoring, "camera_move_finished");
                }
            }
            CameraMode::Fixed => {}
        }
    }

    /// Scrolls until `center` is in the middle of the view (within the map
    /// bounds), then stays there.
    pub fn move_to(&mut self, center: Point) {
        let destination = self.clamped_top_left(center);
        debug!(x = destination.x, y = destination.y, "camera_move_started");
        self.mode = CameraMode::Moving {
            movement: Movement::target(MovementTarget::Point(destination), CAMERA_SPEED, true),
            restoring: false,
        };
    }

    /// Scrolls back to the hero, then follows it again.
    pub fn restore(&mut self) {
        if self.mode == CameraMode::FollowingHero {
            return;
        }
        self.mode = CameraMode::Moving {
            movement: Movement::target(
                MovementTarget::Point(self.area.top_left()),
                CAMERA_SPEED,
                true,
            ),
            restoring: true,
        };
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        if let CameraMode::Moving { movement, .. } = &mut self.mode {
            movement.set_suspended(suspended, now);
        }
    }

    fn clamped_top_left(&self, center: Point) -> Point {
        let (map_width, map_height) = self.map_size;
        let clamp = |value: i32, map_extent: i32, view_extent: i32| {
            if map_extent <= view_extent {
                // maps smaller than the view are centered
                (map_extent - view_extent) / 2
            } else {
                value.clamp(0, map_extent - view_extent)
            }
        };
        Point::new(
            clamp(center.x - CAMERA_WIDTH / 2, map_width, CAMERA_WIDTH),
            clamp(center.y - CAMERA_HEIGHT / 2, map_height, CAMERA_HEIGHT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_hero_within_map_bounds() {
        let mut camera = Camera::new((640, 480));
        camera.update(Point::new(320, 240), 0);
        assert_eq!(camera.position(), Point::new(160, 120));

        camera.update(Point::new(10, 470), 10);
        assert_eq!(camera.position(), Point::new(0, 240));

        camera.update(Point::new(630, 5), 20);
        assert_eq!(camera.position(), Point::new(320, 0));
    }

    #[test]
    fn small_map_is_centered() {
        let mut camera = Camera::new((160, 240));
        camera.update(Point::new(150, 10), 0);
        assert_eq!(camera.position(), Point::new(-80, 0));
    }

    #[test]
    fn scripted_move_stays_then_restores() {
        let mut camera = Camera::new((640, 480));
        let hero = Point::new(160, 120);
        camera.update(hero, 0);
        assert_eq!(camera.position(), Point::new(0, 0));

        camera.move_to(Point::new(184, 120));
        let mut now = 0;
        while camera.is_moving() && now < 2_000 {
            now += 10;
            camera.update(hero, now);
        }
        assert_eq!(camera.position(), Point::new(24, 0));
        assert!(!camera.is_following_hero());
        // 24 px at 120 px/s
        assert!((180..=260).contains(&now), "move took {now} ms");

        camera.update(hero, now + 500);
        assert_eq!(camera.position(), Point::new(24, 0));

        camera.restore();
        now += 500;
        while camera.is_moving() && now < 4_000 {
            now += 10;
            camera.update(hero, now);
        }
        assert!(camera.is_following_hero());
        assert_eq!(camera.position(), Point::new(0, 0));
    }
}
