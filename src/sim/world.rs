//! Rigid-body world
//!
//! A small deterministic 2D physics world: bodies live in a generational
//! arena addressed by `BodyHandle`, so a stale handle can never reach a body
//! that replaced the one it was issued for.
//!
//! Supported:
//! - Static and kinematic boxes (moved only by their own velocities)
//! - Dynamic circles under gravity, resolved against every non-dynamic body
//!   with sequential impulses (restitution and Coulomb friction) followed by
//!   position correction
//! - Broad-phase queries by axis-aligned box

use glam::Vec2;

use super::collision::{CollisionResult, circle_box_collision, point_velocity};
use super::rect::Rect;
use crate::rotate;
use crate::settings::PhysicsSettings;

/// Contacts closer than this are kept without correction (meters)
const LINEAR_SLOP: f32 = 0.005;
/// Fraction of remaining penetration removed per position iteration
const BAUMGARTE: f32 = 0.2;
/// Largest positional correction per iteration (meters)
const MAX_LINEAR_CORRECTION: f32 = 0.2;
/// Approach speeds below this do not bounce (m/s)
const RESTITUTION_THRESHOLD: f32 = 1.0;

/// Stable reference to a body in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Never moves
    Static,
    /// Moves with its own velocity, unaffected by contacts
    Kinematic,
    /// Falls under gravity and responds to contacts
    Dynamic,
}

/// Collision geometry attached to a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { half_extents: Vec2 },
    Circle { radius: f32 },
}

/// Material and identity of a body's shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fixture {
    pub shape: Shape,
    pub friction: f32,
    pub density: f32,
    pub restitution: f32,
    /// Opaque value the owner uses to map a body back to its own data
    pub tag: u64,
}

impl Fixture {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            friction: 0.2,
            density: 0.0,
            restitution: 0.0,
            tag: 0,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }
}

/// Initial state of a new body
#[derive(Debug, Clone, Copy)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
}

impl BodyDef {
    pub fn new(kind: BodyKind, position: Vec2) -> Self {
        Self {
            kind,
            position,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }
}

/// A simulated body
#[derive(Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub fixture: Fixture,
}

impl Body {
    /// World-space bounding box of the fixture
    pub fn aabb(&self) -> Rect {
        match self.fixture.shape {
            Shape::Circle { radius } => Rect::around_point(self.position, radius),
            Shape::Box { half_extents } => {
                let (sin, cos) = self.angle.sin_cos();
                let extent = Vec2::new(
                    half_extents.x * cos.abs() + half_extents.y * sin.abs(),
                    half_extents.x * sin.abs() + half_extents.y * cos.abs(),
                );
                Rect::from_center(self.position, extent)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    body: Option<Body>,
}

/// One contact between a dynamic circle and another body, with solver state
#[derive(Debug, Clone, Copy)]
struct ContactConstraint {
    other: usize,
    result: CollisionResult,
    friction: f32,
    /// Target normal velocity from restitution
    velocity_bias: f32,
    normal_impulse: f32,
    tangent_impulse: f32,
}

/// The physics world
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    gravity: Vec2,
    velocity_iterations: u32,
    position_iterations: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    body_count: usize,
}

impl PhysicsWorld {
    pub fn new(settings: &PhysicsSettings) -> Self {
        Self {
            gravity: Vec2::new(0.0, settings.gravity),
            velocity_iterations: settings.velocity_iterations.max(1),
            position_iterations: settings.position_iterations,
            slots: Vec::new(),
            free: Vec::new(),
            body_count: 0,
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.body_count
    }

    /// Create a body with a single fixture
    pub fn create_body(&mut self, def: BodyDef, fixture: Fixture) -> BodyHandle {
        let body = Body {
            kind: def.kind,
            position: def.position,
            angle: def.angle,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            fixture,
        };
        self.body_count += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.body = Some(body);
            return BodyHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            body: Some(body),
        });
        BodyHandle {
            index,
            generation: 0,
        }
    }

    /// Destroy a body. Returns false if the handle was already stale.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.body.is_none() {
            return false;
        }
        slot.body = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.body_count -= 1;
        self.free.push(handle.index);
        // Descending, so `pop` hands out the lowest free slot
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        true
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.body(handle).is_some()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_ref())
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_mut())
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        self.body(handle).map(|b| b.position)
    }

    pub fn angle(&self, handle: BodyHandle) -> Option<f32> {
        self.body(handle).map(|b| b.angle)
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec2> {
        self.body(handle).map(|b| b.linear_velocity)
    }

    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32) {
        if let Some(body) = self.body_mut(handle) {
            body.position = position;
            body.angle = angle;
        }
    }

    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec2) {
        if let Some(body) = self.body_mut(handle) {
            body.linear_velocity = velocity;
        }
    }

    pub fn set_angular_velocity(&mut self, handle: BodyHandle, angular_velocity: f32) {
        if let Some(body) = self.body_mut(handle) {
            body.angular_velocity = angular_velocity;
        }
    }

    pub fn tag(&self, handle: BodyHandle) -> Option<u64> {
        self.body(handle).map(|b| b.fixture.tag)
    }

    pub fn set_tag(&mut self, handle: BodyHandle, tag: u64) {
        if let Some(body) = self.body_mut(handle) {
            body.fixture.tag = tag;
        }
    }

    /// Visit bodies whose bounding box overlaps `area`, in slot order, and
    /// return the first one the predicate accepts.
    pub fn query_aabb<F>(&self, area: &Rect, mut predicate: F) -> Option<BodyHandle>
    where
        F: FnMut(BodyHandle, &Body) -> bool,
    {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let body = slot.body.as_ref()?;
            if !body.aabb().overlaps(area) {
                return None;
            }
            let handle = BodyHandle {
                index: index as u32,
                generation: slot.generation,
            };
            predicate(handle, body).then_some(handle)
        })
    }

    /// Advance the world by `dt` seconds
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let dynamic: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(&s.body, Some(b) if b.kind == BodyKind::Dynamic))
            .map(|(i, _)| i)
            .collect();

        // 1. Integrate gravity
        for &i in &dynamic {
            if let Some(body) = self.slots[i].body.as_mut() {
                body.linear_velocity += self.gravity * dt;
            }
        }

        // 2. Solve contact velocities from the current configuration
        for &i in &dynamic {
            let mut contacts = self.find_contacts(i, LINEAR_SLOP);
            self.solve_velocities(i, &mut contacts, dt);
        }

        // 3. Integrate positions of everything that moves
        for slot in &mut self.slots {
            if let Some(body) = slot.body.as_mut() {
                if body.kind != BodyKind::Static {
                    body.position += body.linear_velocity * dt;
                    body.angle += body.angular_velocity * dt;
                }
            }
        }

        // 4. Push circles out of anything they ended up inside
        for &i in &dynamic {
            self.solve_positions(i);
        }
    }

    fn find_contacts(&self, index: usize, margin: f32) -> Vec<ContactConstraint> {
        let Some(body) = self.slots[index].body.as_ref() else {
            return Vec::new();
        };
        let Shape::Circle { radius } = body.fixture.shape else {
            return Vec::new();
        };

        let mut contacts = Vec::new();
        for (other_index, slot) in self.slots.iter().enumerate() {
            let Some(other) = slot.body.as_ref() else {
                continue;
            };
            if other_index == index || other.kind == BodyKind::Dynamic {
                continue;
            }
            let Shape::Box { half_extents } = other.fixture.shape else {
                continue;
            };
            if let Some(result) = circle_box_collision(
                body.position,
                radius,
                other.position,
                other.angle,
                half_extents,
                margin,
            ) {
                let relative = body.linear_velocity
                    - point_velocity(
                        other.linear_velocity,
                        other.angular_velocity,
                        other.position,
                        result.point,
                    );
                let approach = relative.dot(result.normal);
                let restitution = body.fixture.restitution.max(other.fixture.restitution);
                let velocity_bias = if approach < -RESTITUTION_THRESHOLD {
                    -restitution * approach
                } else {
                    0.0
                };
                contacts.push(ContactConstraint {
                    other: other_index,
                    result,
                    friction: (body.fixture.friction * other.fixture.friction).sqrt(),
                    velocity_bias,
                    normal_impulse: 0.0,
                    tangent_impulse: 0.0,
                });
            }
        }
        contacts
    }

    fn solve_velocities(&mut self, index: usize, contacts: &mut [ContactConstraint], dt: f32) {
        if contacts.is_empty() {
            return;
        }
        for _ in 0..self.velocity_iterations {
            for contact in contacts.iter_mut() {
                let Some(other) = self.slots[contact.other].body.as_ref() else {
                    continue;
                };
                let surface = point_velocity(
                    other.linear_velocity,
                    other.angular_velocity,
                    other.position,
                    contact.result.point,
                );
                let Some(body) = self.slots[index].body.as_mut() else {
                    return;
                };
                let normal = contact.result.normal;
                let tangent = normal.perp();

                // Tangent first so the normal constraint has the final say
                let relative = body.linear_velocity - surface;
                let max_friction = contact.friction * contact.normal_impulse;
                let old_tangent = contact.tangent_impulse;
                contact.tangent_impulse =
                    (old_tangent - relative.dot(tangent)).clamp(-max_friction, max_friction);
                body.linear_velocity += tangent * (contact.tangent_impulse - old_tangent);

                // Normal: allow closing the remaining gap this step, never pull
                let relative = body.linear_velocity - surface;
                let speculative = contact.result.separation.max(0.0) / dt;
                let target = contact.velocity_bias.max(-speculative);
                let old_normal = contact.normal_impulse;
                contact.normal_impulse = (old_normal + target - relative.dot(normal)).max(0.0);
                body.linear_velocity += normal * (contact.normal_impulse - old_normal);
            }
        }
    }

    fn solve_positions(&mut self, index: usize) {
        for _ in 0..self.position_iterations {
            let contacts = self.find_contacts(index, 0.0);
            let mut largest = 0.0f32;
            let Some(body) = self.slots[index].body.as_mut() else {
                return;
            };
            for contact in &contacts {
                let error = contact.result.penetration() - LINEAR_SLOP;
                if error > 0.0 {
                    let correction = (BAUMGARTE * error).min(MAX_LINEAR_CORRECTION);
                    body.position += contact.result.normal * correction;
                    largest = largest.max(error);
                }
            }
            if largest <= 0.0 {
                break;
            }
        }
    }
}

/// Corners of a box body, counter-clockwise from the lower-left
pub fn box_corners(position: Vec2, angle: f32, half_extents: Vec2) -> [Vec2; 4] {
    [
        Vec2::new(-half_extents.x, -half_extents.y),
        Vec2::new(half_extents.x, -half_extents.y),
        Vec2::new(half_extents.x, half_extents.y),
        Vec2::new(-half_extents.x, half_extents.y),
    ]
    .map(|corner| position + rotate(corner, angle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsSettings::default())
    }

    fn ground(world: &mut PhysicsWorld) -> BodyHandle {
        world.create_body(
            BodyDef::new(BodyKind::Static, Vec2::new(0.0, -1.0)),
            Fixture::new(Shape::Box {
                half_extents: Vec2::new(50.0, 1.0),
            }),
        )
    }

    fn ball(world: &mut PhysicsWorld, position: Vec2) -> BodyHandle {
        world.create_body(
            BodyDef::new(BodyKind::Dynamic, position),
            Fixture::new(Shape::Circle { radius: 0.3 })
                .with_density(1.0)
                .with_restitution(0.6),
        )
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut world = world();
        let a = ball(&mut world, Vec2::ZERO);
        assert!(world.destroy_body(a));
        let b = ball(&mut world, Vec2::ONE);
        assert!(!world.contains(a));
        assert!(world.contains(b));
        assert!(!world.destroy_body(a));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_free_fall() {
        let mut world = world();
        let handle = ball(&mut world, Vec2::new(0.0, 10.0));
        for _ in 0..100 {
            world.step(0.01);
        }
        let pos = world.position(handle).unwrap();
        // Semi-implicit Euler over one second is slightly ahead of g/2
        assert!(pos.y < 10.0 - 4.9 && pos.y > 10.0 - 5.0);
        assert_eq!(pos.x, 0.0);
    }

    #[test]
    fn test_ball_comes_to_rest_on_ground() {
        let mut world = world();
        ground(&mut world);
        let handle = ball(&mut world, Vec2::new(0.0, 2.0));
        for _ in 0..1000 {
            world.step(0.01);
        }
        let pos = world.position(handle).unwrap();
        assert!((pos.y - 0.3).abs() < 0.02, "ball rests on ground, got {}", pos.y);
        assert!(world.linear_velocity(handle).unwrap().length() < 0.2);
    }

    #[test]
    fn test_ball_bounces() {
        let mut world = world();
        ground(&mut world);
        let handle = ball(&mut world, Vec2::new(0.0, 3.0));
        let mut peak_after_bounce = f32::MIN;
        let mut bounced = false;
        for _ in 0..300 {
            world.step(0.01);
            let v = world.linear_velocity(handle).unwrap();
            if v.y > 0.5 {
                bounced = true;
            }
            if bounced {
                peak_after_bounce = peak_after_bounce.max(world.position(handle).unwrap().y);
            }
        }
        assert!(bounced);
        assert!(peak_after_bounce > 0.8 && peak_after_bounce < 3.0);
    }

    #[test]
    fn test_kinematic_body_moves_with_velocity() {
        let mut world = world();
        let mut def = BodyDef::new(BodyKind::Kinematic, Vec2::ZERO);
        def.linear_velocity = Vec2::new(1.0, 0.0);
        def.angular_velocity = 0.5;
        let handle = world.create_body(
            def,
            Fixture::new(Shape::Box {
                half_extents: Vec2::new(1.0, 0.1),
            }),
        );
        for _ in 0..100 {
            world.step(0.01);
        }
        assert!((world.position(handle).unwrap().x - 1.0).abs() < 0.001);
        assert!((world.angle(handle).unwrap() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_query_aabb_returns_first_accepted() {
        let mut world = world();
        let shape = Shape::Box {
            half_extents: Vec2::new(1.0, 0.1),
        };
        let a = world.create_body(
            BodyDef::new(BodyKind::Static, Vec2::ZERO),
            Fixture::new(shape).with_tag(1),
        );
        let b = world.create_body(
            BodyDef::new(BodyKind::Static, Vec2::new(0.5, 0.0)),
            Fixture::new(shape).with_tag(2),
        );
        let area = Rect::around_point(Vec2::new(0.2, 0.0), 0.1);
        assert_eq!(world.query_aabb(&area, |_, _| true), Some(a));
        assert_eq!(world.query_aabb(&area, |_, body| body.fixture.tag == 2), Some(b));
        let far = Rect::around_point(Vec2::new(9.0, 9.0), 0.1);
        assert_eq!(world.query_aabb(&far, |_, _| true), None);
    }

    #[test]
    fn test_box_corners() {
        let corners = box_corners(Vec2::new(1.0, 1.0), 0.0, Vec2::new(2.0, 0.5));
        assert_eq!(corners[0], Vec2::new(-1.0, 0.5));
        assert_eq!(corners[2], Vec2::new(3.0, 1.5));
    }
}
