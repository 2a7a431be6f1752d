use std::collections::VecDeque;

use crate::clock::Suspension;
use crate::entities::EntityId;
use crate::geometry::{direction8_to_xy, Point, Rect};

/// Pixels covered by one step of a path movement.
pub const PATH_STEP_LENGTH: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementTarget {
    Point(Point),
    Entity(EntityId),
    Hero,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MovementKind {
    Straight {
        angle: f64,
        max_distance: Option<i32>,
    },
    /// Brings the owner's bounding box top-left to `destination`, which the
    /// registry refreshes from `target` every update.
    Target {
        target: MovementTarget,
        destination: Point,
    },
    Path {
        steps: VecDeque<u8>,
        pattern: Vec<u8>,
        looped: bool,
        remaining_in_step: i32,
    },
    Jump {
        direction8: u8,
        length: i32,
    },
    /// Driven by the wanted direction of the game commands.
    Player {
        wanted_direction8: Option<u8>,
    },
}

enum Heading {
    Angle(f64),
    Grid((i32, i32)),
    Aim {
        angle: f64,
        x_aligned: bool,
        y_aligned: bool,
    },
    Arrived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementOutcome {
    pub moved: bool,
    pub obstacle_reached: bool,
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    kind: MovementKind,
    speed: i32,
    ignore_obstacles: bool,
    x_move: i32,
    y_move: i32,
    x_delay: u64,
    y_delay: u64,
    next_move_date_x: u64,
    next_move_date_y: u64,
    started: bool,
    distance_travelled: i32,
    finished: bool,
    suspension: Suspension,
}

impl Movement {
    fn with_kind(kind: MovementKind, speed: i32, ignore_obstacles: bool) -> Self {
        Self {
            kind,
            speed: speed.max(0),
            ignore_obstacles,
            x_move: 0,
            y_move: 0,
            x_delay: 0,
            y_delay: 0,
            next_move_date_x: 0,
            next_move_date_y: 0,
            started: false,
            distance_travelled: 0,
            finished: false,
            suspension: Suspension::default(),
        }
    }

    pub fn straight(angle: f64, speed: i32, max_distance: Option<i32>) -> Self {
        Self::with_kind(
            MovementKind::Straight {
                angle,
                max_distance,
            },
            speed,
            false,
        )
    }

    pub fn target(target: MovementTarget, speed: i32, ignore_obstacles: bool) -> Self {
        let destination = match target {
            MovementTarget::Point(point) => point,
            _ => Point::default(),
        };
        Self::with_kind(
            MovementKind::Target {
                target,
                destination,
            },
            speed,
            ignore_obstacles,
        )
    }

    /// Path of 8 px steps, each a direction8 value.
    pub fn path(steps: &[u8], speed: i32, looped: bool, ignore_obstacles: bool) -> Self {
        let mut movement = Self::with_kind(
            MovementKind::Path {
                steps: steps.iter().copied().collect(),
                pattern: steps.to_vec(),
                looped,
                remaining_in_step: PATH_STEP_LENGTH,
            },
            speed,
            ignore_obstacles,
        );
        if steps.is_empty() {
            movement.finished = true;
        }
        movement
    }

    pub fn jump(direction8: u8, length: i32, speed: i32) -> Self {
        Self::with_kind(MovementKind::Jump { direction8, length }, speed, true)
    }

    pub fn player(speed: i32) -> Self {
        Self::with_kind(
            MovementKind::Player {
                wanted_direction8: None,
            },
            speed,
            false,
        )
    }

    pub fn kind(&self) -> &MovementKind {
        &self.kind
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: i32) {
        self.speed = speed.max(0);
        self.started = false;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn ignores_obstacles(&self) -> bool {
        self.ignore_obstacles
    }

    /// What a target movement follows, if it is one.
    pub fn tracked_target(&self) -> Option<MovementTarget> {
        match self.kind {
            MovementKind::Target { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn set_destination(&mut self, destination: Point) {
        if let MovementKind::Target {
            destination: current,
            ..
        } = &mut self.kind
        {
            *current = destination;
        }
    }

    pub fn wanted_direction8(&self) -> Option<u8> {
        match self.kind {
            MovementKind::Player { wanted_direction8 } => wanted_direction8,
            _ => None,
        }
    }

    pub fn set_wanted_direction8(&mut self, direction8: Option<u8>) {
        if let MovementKind::Player { wanted_direction8 } = &mut self.kind {
            if *wanted_direction8 != direction8 {
                *wanted_direction8 = direction8;
                self.started = false;
            }
        }
    }

    /// Direction8 of the current motion, if any.
    pub fn direction8(&self) -> Option<u8> {
        match &self.kind {
            MovementKind::Path { steps, .. } => steps.front().copied(),
            MovementKind::Jump { direction8, .. } => Some(*direction8),
            MovementKind::Player { wanted_direction8 } => *wanted_direction8,
            _ => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspension.is_suspended()
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        let shift = self.suspension.set(suspended, now);
        self.next_move_date_x += shift;
        self.next_move_date_y += shift;
    }

    /// Advances the owner's bounding box pixel by pixel up to `now`. `blocked`
    /// answers whether a candidate box collides with an obstacle.
    pub fn update(
        &mut self,
        now: u64,
        bbox: &mut Rect,
        mut blocked: impl FnMut(&Rect) -> bool,
    ) -> MovementOutcome {
        let mut outcome = MovementOutcome::default();
        if self.finished || self.suspension.is_suspended() {
            return outcome;
        }

        if !self.started {
            self.started = true;
            self.refresh_direction(*bbox, now, true);
            if self.finished {
                outcome.finished = true;
                return outcome;
            }
        } else if matches!(self.kind, MovementKind::Target { .. }) {
            self.refresh_direction(*bbox, now, false);
            if self.finished {
                outcome.finished = true;
                return outcome;
            }
        }

        loop {
            let due_x = self.x_move != 0 && now >= self.next_move_date_x;
            let due_y = self.y_move != 0 && now >= self.next_move_date_y;
            if !due_x && !due_y {
                break;
            }

            let (dx, dy) = if due_x && due_y && self.next_move_date_x == self.next_move_date_y {
                (self.x_move, self.y_move)
            } else if due_x && (!due_y || self.next_move_date_x < self.next_move_date_y) {
                (self.x_move, 0)
            } else {
                (0, self.y_move)
            };
            if dx != 0 {
                self.next_move_date_x += self.x_delay;
            }
            if dy != 0 {
                self.next_move_date_y += self.y_delay;
            }

            let Some((dx, dy)) = self.resolve_step(bbox, dx, dy, &mut blocked) else {
                outcome.obstacle_reached = true;
                break;
            };

            *bbox = bbox.translated(dx, dy);
            outcome.moved = true;
            if self.after_step(*bbox, now) {
                self.finished = true;
                outcome.finished = true;
                break;
            }
        }

        outcome
    }

    fn resolve_step(
        &self,
        bbox: &Rect,
        dx: i32,
        dy: i32,
        blocked: &mut impl FnMut(&Rect) -> bool,
    ) -> Option<(i32, i32)> {
        if self.ignore_obstacles || !blocked(&bbox.translated(dx, dy)) {
            return Some((dx, dy));
        }
        // player movement slides along walls when moving diagonally
        if matches!(self.kind, MovementKind::Player { .. }) && dx != 0 && dy != 0 {
            if !blocked(&bbox.translated(dx, 0)) {
                return Some((dx, 0));
            }
            if !blocked(&bbox.translated(0, dy)) {
                return Some((0, dy));
            }
        }
        None
    }

    /// Bookkeeping after a pixel step; returns whether the movement is finished.
    fn after_step(&mut self, bbox: Rect, now: u64) -> bool {
        self.distance_travelled += 1;
        let travelled = self.distance_travelled;
        match &mut self.kind {
            MovementKind::Straight { max_distance, .. } => {
                return max_distance.is_some_and(|max| travelled >= max);
            }
            MovementKind::Jump { length, .. } => return travelled >= *length,
            MovementKind::Player { .. } => return false,
            MovementKind::Target { .. } => {}
            MovementKind::Path {
                steps,
                pattern,
                looped,
                remaining_in_step,
            } => {
                *remaining_in_step -= 1;
                if *remaining_in_step > 0 {
                    return false;
                }
                *remaining_in_step = PATH_STEP_LENGTH;
                steps.pop_front();
                if steps.is_empty() {
                    if !*looped || pattern.is_empty() {
                        return true;
                    }
                    steps.extend(pattern.iter().copied());
                }
            }
        }
        // a target is re-aimed after every pixel, a path at each new step
        self.refresh_direction(bbox, now, false);
        self.finished
    }

    fn refresh_direction(&mut self, bbox: Rect, now: u64, reset_dates: bool) {
        let previous = (self.x_move, self.y_move);
        let speed = f64::from(self.speed);
        let heading = match &self.kind {
            MovementKind::Straight { angle, .. } => Heading::Angle(*angle),
            MovementKind::Player { wanted_direction8 } => match wanted_direction8 {
                Some(direction8) => Heading::Grid(direction8_to_xy(*direction8)),
                None => Heading::Grid((0, 0)),
            },
            MovementKind::Jump { direction8, .. } => Heading::Grid(direction8_to_xy(*direction8)),
            MovementKind::Path { steps, .. } => match steps.front() {
                Some(direction8) => Heading::Grid(direction8_to_xy(*direction8)),
                None => Heading::Arrived,
            },
            MovementKind::Target { destination, .. } => {
                let dx = destination.x - bbox.x;
                let dy = destination.y - bbox.y;
                if dx == 0 && dy == 0 {
                    Heading::Arrived
                } else {
                    Heading::Aim {
                        angle: bbox.top_left().angle_to(*destination),
                        x_aligned: dx == 0,
                        y_aligned: dy == 0,
                    }
                }
            }
        };

        match heading {
            Heading::Angle(angle) => self.set_velocity_from_angle(angle, speed),
            Heading::Grid((dx, dy)) => self.set_uniform_velocity(dx, dy, speed),
            Heading::Aim {
                angle,
                x_aligned,
                y_aligned,
            } => {
                self.set_velocity_from_angle(angle, speed);
                // never overshoot on an axis already aligned
                if x_aligned {
                    self.x_move = 0;
                }
                if y_aligned {
                    self.y_move = 0;
                }
            }
            Heading::Arrived => {
                self.x_move = 0;
                self.y_move = 0;
                self.finished = true;
            }
        }

        if reset_dates || previous.0 == 0 {
            self.next_move_date_x = now + self.x_delay;
        }
        if reset_dates || previous.1 == 0 {
            self.next_move_date_y = now + self.y_delay;
        }
    }

    fn set_velocity_from_angle(&mut self, angle: f64, speed: f64) {
        let vx = speed * angle.cos();
        let vy = -speed * angle.sin();
        (self.x_move, self.x_delay) = axis_from_velocity(vx);
        (self.y_move, self.y_delay) = axis_from_velocity(vy);
    }

    fn set_uniform_velocity(&mut self, dx: i32, dy: i32, speed: f64) {
        let delay = delay_for_speed(speed);
        if speed <= 0.0 {
            self.x_move = 0;
            self.y_move = 0;
            return;
        }
        self.x_move = dx.signum();
        self.y_move = dy.signum();
        self.x_delay = delay;
        self.y_delay = delay;
    }
}

fn delay_for_speed(speed: f64) -> u64 {
    if speed <= 0.0 {
        return u64::MAX / 4;
    }
    ((1000.0 / speed).round() as u64).max(1)
}

fn axis_from_velocity(velocity: f64) -> (i32, u64) {
    if velocity.abs() < 1e-6 {
        return (0, 0);
    }
    (velocity.signum() as i32, delay_for_speed(velocity.abs()))
}
