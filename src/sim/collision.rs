//! Contact generation for the ball
//!
//! The only dynamic body in the world is a circle, and every obstacle it can
//! touch is a (possibly rotated) box, so one narrow-phase routine covers all
//! contacts: circle vs oriented box.

use glam::Vec2;

use crate::rotate;

/// Result of a contact check
#[derive(Debug, Clone, Copy)]
pub struct CollisionResult {
    /// Closest point on the box surface
    pub point: Vec2,
    /// Surface normal at the contact, pointing from the box toward the circle
    pub normal: Vec2,
    /// Signed gap between circle and box (negative = overlapping)
    pub separation: f32,
}

impl CollisionResult {
    /// Depth of overlap (zero when separated)
    #[inline]
    pub fn penetration(&self) -> f32 {
        (-self.separation).max(0.0)
    }
}

/// Check a circle against an oriented box
///
/// Returns a contact if the circle is within `margin` of the box surface.
/// The box is centered on `box_center`, rotated by `box_angle`, and spans
/// `±half_extents` in its local frame.
pub fn circle_box_collision(
    circle_center: Vec2,
    circle_radius: f32,
    box_center: Vec2,
    box_angle: f32,
    half_extents: Vec2,
    margin: f32,
) -> Option<CollisionResult> {
    // Work in the box's local frame
    let local = rotate(circle_center - box_center, -box_angle);
    let clamped = local.clamp(-half_extents, half_extents);

    let (local_point, local_normal, separation) = if clamped == local {
        // Center is inside the box: push out along the shallowest axis
        let dx = half_extents.x - local.x.abs();
        let dy = half_extents.y - local.y.abs();
        if dx < dy {
            let sign = if local.x < 0.0 { -1.0 } else { 1.0 };
            (
                Vec2::new(sign * half_extents.x, local.y),
                Vec2::new(sign, 0.0),
                -dx - circle_radius,
            )
        } else {
            let sign = if local.y < 0.0 { -1.0 } else { 1.0 };
            (
                Vec2::new(local.x, sign * half_extents.y),
                Vec2::new(0.0, sign),
                -dy - circle_radius,
            )
        }
    } else {
        let offset = local - clamped;
        let dist = offset.length();
        if dist > circle_radius + margin {
            return None;
        }
        (clamped, offset / dist, dist - circle_radius)
    };

    if separation > margin {
        return None;
    }

    Some(CollisionResult {
        point: box_center + rotate(local_point, box_angle),
        normal: rotate(local_normal, box_angle),
        separation,
    })
}

/// Distance from a point to an oriented box (zero inside)
pub fn point_box_distance(point: Vec2, box_center: Vec2, box_angle: f32, half_extents: Vec2) -> f32 {
    let local = rotate(point - box_center, -box_angle);
    let clamped = local.clamp(-half_extents, half_extents);
    (local - clamped).length()
}

/// Velocity of a point rigidly attached to a body
#[inline]
pub fn point_velocity(linear: Vec2, angular: f32, body_center: Vec2, point: Vec2) -> Vec2 {
    let r = point - body_center;
    linear + Vec2::new(-angular * r.y, angular * r.x)
}
