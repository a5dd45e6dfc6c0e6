//! Bounce Evolve - evolutionary search over ball-bouncing platform layouts
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics world, platforms, ball, fixed-step driver)
//! - `setup`: Candidate platform arrangements, their scoring and binary format
//! - `evolution`: Generational search over setups with a per-frame time budget
//! - `editor`: Build/simulate/evolve mode controller for an interactive shell
//! - `persistence`: Setup files on disk
//! - `settings`: Data-driven tuning

pub mod editor;
pub mod error;
pub mod evolution;
pub mod persistence;
pub mod settings;
pub mod setup;
pub mod sim;

pub use editor::{Command, Editor, FrameInput, Mode};
pub use error::{SettingsError, SetupFileError};
pub use evolution::{AutoEvolve, Evolution, GenerationReport};
pub use settings::Settings;
pub use setup::Setup;

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed physics timestep (100 Hz)
    pub const SIM_DT: f32 = 0.01;
    /// Frame times above this are clamped before being fed to the driver
    pub const MAX_FRAME_DT: f32 = 100.0;
    /// Wall-clock-equivalent chunk used when scoring a setup in batch
    pub const SCORE_BATCH_DT: f32 = 0.1;
    /// Seconds without progress before the ball counts as stuck
    pub const STUCK_TIMEOUT: f32 = 10.0;

    /// Setup capacity
    pub const MAX_PLATFORMS: usize = 32;

    /// Platform half-length limits (meters)
    pub const PLATFORM_RADIUS_MIN: f32 = 0.2;
    pub const PLATFORM_RADIUS_MAX: f32 = 5.0;
    /// Linear speed limits for moving platforms (m/s)
    pub const PLATFORM_MOVE_SPEED_MIN: f32 = 0.1;
    pub const PLATFORM_MOVE_SPEED_MAX: f32 = 5.0;
    /// Angular speed limit for rotating platforms (rad/s, either sign)
    pub const PLATFORM_ROTATE_SPEED_MAX: f32 = 3.0;
    /// Smallest magnitude drawn for a freshly randomized rotating platform
    pub const PLATFORM_ROTATE_SPEED_RANDOM_MIN: f32 = 0.1;
    /// Half of the platform's thickness
    pub const PLATFORM_HALF_THICKNESS: f32 = 0.1;
    pub const PLATFORM_FRICTION: f32 = 0.5;
    /// Chance a random platform moves / rotates (independent)
    pub const PLATFORM_MOVE_CHANCE: f32 = 0.5;
    pub const PLATFORM_ROTATE_CHANCE: f32 = 0.5;
    /// Minimum Rec. 601 luma of a platform color
    pub const PLATFORM_MIN_BRIGHTNESS: f32 = 0.4;

    /// Region computer-generated platforms are placed in
    pub const SETUP_MIN_X: f32 = 1.0;
    pub const SETUP_MAX_X: f32 = 10.0;
    pub const SETUP_MIN_Y: f32 = 1.0;
    pub const SETUP_MAX_Y: f32 = 10.0;

    /// Tries per mutation before keeping the original platform
    pub const MUTATION_ATTEMPTS: u32 = 100;
    /// Chance a mutation attempt replaces the platform outright
    pub const MUTATION_FRESH_CHANCE: f32 = 0.1;
    /// Chance each attribute is perturbed in a mutation attempt
    pub const MUTATION_ATTRIBUTE_CHANCE: f32 = 0.3;
    /// Chance a mutation attempt flips the move or rotate flag
    pub const MUTATION_TOGGLE_CHANCE: f32 = 0.05;
    /// Standard deviations of attribute perturbations
    pub const MUTATION_SIGMA_POSITION: f32 = 0.5;
    pub const MUTATION_SIGMA_RADIUS: f32 = 0.3;
    pub const MUTATION_SIGMA_ANGLE: f32 = 0.3;
    pub const MUTATION_SIGMA_SPEED: f32 = 0.5;
    /// Tries per platform slot when filling a random setup
    pub const PLACEMENT_ATTEMPTS: u32 = 100;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 0.3;
    pub const BALL_STARTING_X: f32 = 2.0;
    pub const BALL_STARTING_Y: f32 = 11.0;
    pub const BALL_DENSITY: f32 = 1.0;
    pub const BALL_FRICTION: f32 = 0.3;
    pub const BALL_RESTITUTION: f32 = 0.6;

    /// Top face of the ground; the ball has landed once its bottom reaches it
    pub const FLOOR_Y: f32 = 0.0;
    /// Resting contact leaves the ball a hair above the floor
    pub const LANDING_TOLERANCE: f32 = 0.01;
    /// Right face of the left wall
    pub const LEFT_WALL_X: f32 = 0.0;
    /// Friction of ground and wall
    pub const BOUNDARY_FRICTION: f32 = 0.2;

    /// How close the cursor has to be to pick a platform
    pub const PICK_TOLERANCE: f32 = 0.1;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Rotate a vector counter-clockwise by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}
