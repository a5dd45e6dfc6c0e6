//! Simulation context
//!
//! Owns the physics world and everything bound into it. Exactly one setup is
//! active at a time; switching tears down every platform body and the ball
//! before anything new is created.

use glam::Vec2;

use super::ball::Ball;
use super::collision::point_box_distance;
use super::platform::{Platform, platform_index_from_tag, platform_tag};
use super::rect::Rect;
use super::tick::RunStatus;
use super::world::{BodyDef, BodyHandle, BodyKind, Fixture, PhysicsWorld, Shape};
use crate::consts::*;
use crate::settings::PhysicsSettings;
use crate::setup::Setup;

/// Half extents of the ground box; its top face is the floor line
const GROUND_HALF_EXTENTS: Vec2 = Vec2::new(1000.0, 10.0);
/// Half extents of the left wall box; its right face is at `LEFT_WALL_X`
const WALL_HALF_EXTENTS: Vec2 = Vec2::new(1.0, 1000.0);

/// The active world: boundaries, platforms, ball and run timers
#[derive(Debug, Clone)]
pub struct SimState {
    pub world: PhysicsWorld,
    ground: BodyHandle,
    wall: BodyHandle,
    /// Active platforms, index == fixture tag index
    pub platforms: Vec<Platform>,
    pub ball: Ball,
    /// Best ball x so far, in whole centimeters
    pub(crate) best_x_cm: i64,
    /// Seconds since the best x last improved
    pub stuck_time: f32,
    /// Simulated seconds since reset
    pub total_time: f32,
    /// Unsimulated time carried between calls
    pub(crate) time_residue: f32,
    pub status: RunStatus,
}

impl SimState {
    /// Fresh world with ground, wall and a ball at its starting position
    pub fn new(settings: &PhysicsSettings) -> Self {
        let mut world = PhysicsWorld::new(settings);
        let ground = world.create_body(
            BodyDef::new(
                BodyKind::Static,
                Vec2::new(0.0, FLOOR_Y - GROUND_HALF_EXTENTS.y),
            ),
            Fixture::new(Shape::Box {
                half_extents: GROUND_HALF_EXTENTS,
            })
            .with_friction(BOUNDARY_FRICTION),
        );
        let wall = world.create_body(
            BodyDef::new(
                BodyKind::Static,
                Vec2::new(LEFT_WALL_X - WALL_HALF_EXTENTS.x, 0.0),
            ),
            Fixture::new(Shape::Box {
                half_extents: WALL_HALF_EXTENTS,
            })
            .with_friction(BOUNDARY_FRICTION),
        );

        let mut state = Self {
            world,
            ground,
            wall,
            platforms: Vec::with_capacity(MAX_PLATFORMS),
            ball: Ball::default(),
            best_x_cm: 0,
            stuck_time: 0.0,
            total_time: 0.0,
            time_residue: 0.0,
            status: RunStatus::Running,
        };
        state.reset();
        state
    }

    pub fn ground(&self) -> BodyHandle {
        self.ground
    }

    pub fn wall(&self) -> BodyHandle {
        self.wall
    }

    /// Make `setup` the active one and reset
    pub fn use_setup(&mut self, setup: &Setup) {
        for platform in &mut self.platforms {
            platform.unbind(&mut self.world);
        }
        self.ball.unbind(&mut self.world);

        self.platforms.clear();
        self.platforms.extend(setup.platforms.iter().cloned());
        for (index, platform) in self.platforms.iter_mut().enumerate() {
            platform.body = None;
            platform.make_body(&mut self.world, index);
        }
        log::debug!("Activated setup with {} platforms", self.platforms.len());
        self.reset();
    }

    /// Respawn the ball, restore platform poses and velocities, zero timers
    pub fn reset(&mut self) {
        self.ball.respawn(&mut self.world);

        for platform in &mut self.platforms {
            platform.reset_pose();
            if let Some(handle) = platform.body {
                self.world
                    .set_transform(handle, platform.center, platform.angle);
                self.world
                    .set_linear_velocity(handle, platform.initial_velocity());
                self.world
                    .set_angular_velocity(handle, platform.angular_velocity());
            }
        }

        self.best_x_cm = 0;
        self.stuck_time = 0.0;
        self.total_time = 0.0;
        self.time_residue = 0.0;
        self.status = RunStatus::Running;
    }

    /// Bind a new platform at the end of the list. `None` once at capacity.
    pub fn add_platform(&mut self, mut platform: Platform) -> Option<usize> {
        if self.platforms.len() >= MAX_PLATFORMS {
            return None;
        }
        let index = self.platforms.len();
        platform.body = None;
        platform.make_body(&mut self.world, index);
        self.platforms.push(platform);
        Some(index)
    }

    /// Remove the platform at `index`, moving the last platform into its slot
    /// and retagging its fixture so tag lookups stay correct.
    pub fn delete_platform(&mut self, index: usize) -> Option<Platform> {
        if index >= self.platforms.len() {
            return None;
        }
        let mut removed = self.platforms.swap_remove(index);
        removed.unbind(&mut self.world);

        if let Some(moved) = self.platforms.get(index) {
            if let Some(handle) = moved.body {
                self.world.set_tag(handle, platform_tag(index));
            }
        }
        Some(removed)
    }

    /// Platform index a body belongs to, resolved through its fixture tag
    pub fn platform_index(&self, handle: BodyHandle) -> Option<usize> {
        self.world
            .tag(handle)
            .and_then(platform_index_from_tag)
            .filter(|&index| index < self.platforms.len())
    }

    /// First platform whose shape lies within `tolerance` of `point`
    pub fn platform_at(&self, point: Vec2, tolerance: f32) -> Option<usize> {
        let area = Rect::around_point(point, tolerance);
        let handle = self.world.query_aabb(&area, |_, body| {
            let is_platform = platform_index_from_tag(body.fixture.tag).is_some();
            let Shape::Box { half_extents } = body.fixture.shape else {
                return false;
            };
            is_platform
                && point_box_distance(point, body.position, body.angle, half_extents) <= tolerance
        })?;
        self.platform_index(handle)
    }

    /// X from which the ball's travel is measured
    pub fn starting_line(&self) -> f32 {
        starting_line(&self.platforms)
    }

    /// Destroy the ball body if it is still bound
    pub fn destroy_ball(&mut self) {
        self.ball.unbind(&mut self.world);
    }

    /// Snapshot of the active platforms as an unscored setup
    pub fn to_setup(&self) -> Setup {
        let platforms = self
            .platforms
            .iter()
            .map(|p| {
                let mut p = p.clone();
                p.body = None;
                p.reset_pose();
                p
            })
            .collect();
        Setup {
            platforms,
            ..Setup::default()
        }
    }
}

/// Rightmost reach of any platform, never left of the ball's start
pub fn starting_line(platforms: &[Platform]) -> f32 {
    platforms
        .iter()
        .map(Platform::rightmost_x)
        .fold(BALL_STARTING_X, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::platform::strategies;
    use proptest::prelude::*;

    fn state() -> SimState {
        SimState::new(&PhysicsSettings::default())
    }

    fn row(count: usize) -> Vec<Platform> {
        (0..count)
            .map(|i| Platform::new(Vec2::new(1.0 + i as f32 * 1.5, 5.0), 0.5, 0.0))
            .collect()
    }

    #[test]
    fn test_new_state_has_boundaries_and_ball() {
        let state = state();
        assert_eq!(state.world.body_count(), 3);
        assert!(state.ball.is_bound());
        assert_eq!(state.status, RunStatus::Running);
        assert_eq!(state.starting_line(), BALL_STARTING_X);
    }

    #[test]
    fn test_use_setup_rebinds_everything() {
        let mut state = state();
        let setup = Setup {
            platforms: row(4),
            ..Setup::default()
        };
        state.use_setup(&setup);
        assert_eq!(state.world.body_count(), 2 + 4 + 1);

        let smaller = Setup {
            platforms: row(2),
            ..Setup::default()
        };
        state.use_setup(&smaller);
        assert_eq!(state.world.body_count(), 2 + 2 + 1);
        for (i, p) in state.platforms.iter().enumerate() {
            assert_eq!(state.platform_index(p.body.unwrap()), Some(i));
        }
    }

    #[test]
    fn test_add_platform_respects_capacity() {
        let mut state = state();
        for i in 0..MAX_PLATFORMS {
            assert_eq!(
                state.add_platform(Platform::new(Vec2::new(5.0, 1.0 + i as f32), 0.3, 0.0)),
                Some(i)
            );
        }
        assert_eq!(
            state.add_platform(Platform::new(Vec2::new(5.0, 50.0), 0.3, 0.0)),
            None
        );
        assert_eq!(state.platforms.len(), MAX_PLATFORMS);
    }

    #[test]
    fn test_delete_keeps_tags_in_sync() {
        for count in 2..8 {
            for doomed in 0..count - 1 {
                let mut state = state();
                state.use_setup(&Setup {
                    platforms: row(count),
                    ..Setup::default()
                });
                let last_center = state.platforms[count - 1].center;

                let removed = state.delete_platform(doomed).unwrap();
                assert!(removed.body.is_none());
                assert_eq!(state.platforms.len(), count - 1);
                assert_eq!(state.platforms[doomed].center, last_center);
                for (i, p) in state.platforms.iter().enumerate() {
                    assert_eq!(state.platform_index(p.body.unwrap()), Some(i));
                }
                assert_eq!(state.platform_at(last_center, PICK_TOLERANCE), Some(doomed));
            }
        }
    }

    #[test]
    fn test_delete_last_and_out_of_range() {
        let mut state = state();
        state.use_setup(&Setup {
            platforms: row(3),
            ..Setup::default()
        });
        assert!(state.delete_platform(2).is_some());
        assert!(state.delete_platform(2).is_none());
        assert_eq!(state.world.body_count(), 2 + 2 + 1);
    }

    #[test]
    fn test_platform_at_uses_tolerance() {
        let mut state = state();
        state.add_platform(Platform::new(Vec2::new(5.0, 5.0), 1.0, 0.0));
        assert_eq!(state.platform_at(Vec2::new(5.5, 5.15), PICK_TOLERANCE), Some(0));
        assert_eq!(state.platform_at(Vec2::new(5.5, 5.5), PICK_TOLERANCE), None);
        // The ground is not a platform
        assert_eq!(state.platform_at(Vec2::new(5.0, -0.05), PICK_TOLERANCE), None);
    }

    #[test]
    fn test_starting_line_takes_rightmost_reach() {
        let mut platforms = row(2);
        assert!((starting_line(&platforms) - 3.0).abs() < 0.0001);
        platforms[0].moves = true;
        platforms[0].move_p2 = Vec2::new(9.0, 2.0);
        assert!((starting_line(&platforms) - 9.5).abs() < 0.0001);
        assert_eq!(starting_line(&[]), BALL_STARTING_X);
    }

    #[test]
    fn test_reset_restores_poses() {
        let mut state = state();
        let mut p = Platform::new(Vec2::new(5.0, 5.0), 1.0, 0.2);
        p.rotates = true;
        p.rotate_speed = 1.0;
        state.add_platform(p);
        for _ in 0..50 {
            state.world.step(SIM_DT);
        }
        let handle = state.platforms[0].body.unwrap();
        assert!((state.world.angle(handle).unwrap() - 0.7).abs() < 0.001);

        state.reset();
        assert!((state.world.angle(handle).unwrap() - 0.2).abs() < 0.0001);
        assert_eq!(state.total_time, 0.0);
        assert!(state.ball.is_bound());
        assert_eq!(state.world.body_count(), 2 + 1 + 1);
    }

    proptest! {
        #[test]
        fn test_starting_line_never_behind_ball_start(
            platforms in proptest::collection::vec(strategies::platform(), 0..=MAX_PLATFORMS),
        ) {
            let line = starting_line(&platforms);
            prop_assert!(line >= BALL_STARTING_X);
            prop_assert!(platforms.iter().all(|p| line >= p.rightmost_x()));
        }
    }
}
