//! Deterministic simulation module
//!
//! Everything that decides where the ball ends up lives here:
//! - Fixed timestep only
//! - Caller-owned RNG only
//! - Stable iteration order (bodies by slot, platforms by index)
//! - No rendering or platform dependencies

pub mod ball;
pub mod collision;
pub mod platform;
pub mod rect;
pub mod state;
pub mod tick;
pub mod world;

pub use ball::Ball;
pub use collision::{CollisionResult, circle_box_collision, point_box_distance};
pub use platform::{Platform, color_brightness, platform_index_from_tag, platform_tag};
pub use rect::Rect;
pub use state::{SimState, starting_line};
pub use tick::{RunStatus, simulate_time, step_once};
pub use world::{BodyDef, BodyHandle, BodyKind, Fixture, PhysicsWorld, Shape};
