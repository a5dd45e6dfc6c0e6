//! The ball

use glam::Vec2;

use super::world::{BodyDef, BodyHandle, BodyKind, Fixture, PhysicsWorld, Shape};
use crate::consts::*;

/// The single dynamic body under simulation
///
/// `body` is `None` once the ball has landed or got stuck; `pos` then holds
/// the frozen final position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub pos: Vec2,
    pub radius: f32,
    pub body: Option<BodyHandle>,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            pos: Self::starting_position(),
            radius: BALL_RADIUS,
            body: None,
        }
    }
}

impl Ball {
    pub fn starting_position() -> Vec2 {
        Vec2::new(BALL_STARTING_X, BALL_STARTING_Y)
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.body.is_some()
    }

    /// Lowest point of the ball
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.pos.y - self.radius
    }

    /// Replace any existing body with a fresh one at the starting position
    pub fn respawn(&mut self, world: &mut PhysicsWorld) {
        self.unbind(world);
        self.pos = Self::starting_position();
        self.radius = BALL_RADIUS;
        let fixture = Fixture::new(Shape::Circle {
            radius: self.radius,
        })
        .with_density(BALL_DENSITY)
        .with_friction(BALL_FRICTION)
        .with_restitution(BALL_RESTITUTION);
        self.body = Some(world.create_body(BodyDef::new(BodyKind::Dynamic, self.pos), fixture));
    }

    /// Read the body's position back; returns false if unbound
    pub fn sync(&mut self, world: &PhysicsWorld) -> bool {
        match self.body.and_then(|handle| world.position(handle)) {
            Some(pos) => {
                self.pos = pos;
                true
            }
            None => false,
        }
    }

    /// Destroy the body, keeping the last known position
    pub fn unbind(&mut self, world: &mut PhysicsWorld) {
        if let Some(handle) = self.body.take() {
            world.destroy_body(handle);
        }
    }
}
