//! Platforms the ball bounces off
//!
//! A platform is a thin box that may translate back and forth between two
//! endpoints and/or spin at a constant rate. While its setup is active it is
//! bound to a kinematic body whose fixture tag encodes the platform's index.

use std::f32::consts::{PI, TAU};
use std::io::{self, Read, Write};

use glam::Vec2;
use rand::Rng;

use super::rect::Rect;
use super::world::{BodyDef, BodyHandle, BodyKind, Fixture, PhysicsWorld, Shape, box_corners};
use crate::consts::*;
use crate::normalize_angle;
use crate::settings::PlatformCosts;

/// Set on every platform fixture tag; the low bits hold the platform index
pub const PLATFORM_TAG_BIT: u64 = 1 << 32;

const FLAG_MOVES: u8 = 1;
const FLAG_ROTATES: u8 = 2;

/// Fixture tag for the platform at `index`
#[inline]
pub fn platform_tag(index: usize) -> u64 {
    PLATFORM_TAG_BIT | index as u64
}

/// Platform index encoded in a fixture tag, if the fixture belongs to a platform
#[inline]
pub fn platform_index_from_tag(tag: u64) -> Option<usize> {
    (tag & PLATFORM_TAG_BIT != 0).then(|| (tag & !PLATFORM_TAG_BIT) as usize)
}

/// Uniform draw in `[min, max)` that tolerates an empty range
pub(crate) fn uniform(rng: &mut impl Rng, min: f32, max: f32) -> f32 {
    min + (max - min) * rng.random::<f32>()
}

/// Normally distributed sample (Box-Muller)
pub(crate) fn gaussian(rng: &mut impl Rng, sigma: f32) -> f32 {
    let u1 = rng.random::<f32>().max(f32::EPSILON);
    let u2 = rng.random::<f32>();
    sigma * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

fn gaussian_vec(rng: &mut impl Rng, sigma: f32) -> Vec2 {
    let x = gaussian(rng, sigma);
    let y = gaussian(rng, sigma);
    Vec2::new(x, y)
}

/// Uniform point in the region generated platforms are placed in
pub(crate) fn random_placement_point(rng: &mut impl Rng) -> Vec2 {
    let x = uniform(rng, SETUP_MIN_X, SETUP_MAX_X);
    let y = uniform(rng, SETUP_MIN_Y, SETUP_MAX_Y);
    Vec2::new(x, y)
}

/// Rec. 601 luma of a packed 0xRRGGBBAA color, in [0, 1]
pub fn color_brightness(rgba: u32) -> f32 {
    let channel = |shift: u32| ((rgba >> shift) & 0xFF) as f32 / 255.0;
    0.299 * channel(24) + 0.587 * channel(16) + 0.114 * channel(8)
}

fn random_color(rng: &mut impl Rng) -> u32 {
    loop {
        let color = rng.random::<u32>() | 0xFF;
        if color_brightness(color) > PLATFORM_MIN_BRIGHTNESS {
            return color;
        }
    }
}

/// An obstacle
#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    /// Current center (equals `move_p1` at reset when moving)
    pub center: Vec2,
    /// Half of the platform's length
    pub radius: f32,
    /// Current angle (radians)
    pub angle: f32,
    /// Angle restored on reset
    pub start_angle: f32,
    pub moves: bool,
    pub move_p1: Vec2,
    pub move_p2: Vec2,
    /// Linear speed while moving (m/s)
    pub move_speed: f32,
    pub rotates: bool,
    /// Signed angular speed while rotating (rad/s, positive = counter-clockwise)
    pub rotate_speed: f32,
    /// Packed 0xRRGGBBAA
    pub color: u32,
    /// Physics body while bound into an active world
    pub body: Option<BodyHandle>,
}

impl Platform {
    /// A static, non-rotating platform
    pub fn new(center: Vec2, radius: f32, angle: f32) -> Self {
        Self {
            center,
            radius,
            angle,
            start_angle: angle,
            moves: false,
            move_p1: center,
            move_p2: center,
            move_speed: PLATFORM_MOVE_SPEED_MIN,
            rotates: false,
            rotate_speed: 0.0,
            color: 0xFFFF_FFFF,
            body: None,
        }
    }

    /// A platform drawn uniformly from the placement region and legal ranges
    pub fn random(rng: &mut impl Rng) -> Self {
        let radius = uniform(rng, PLATFORM_RADIUS_MIN, PLATFORM_RADIUS_MAX);
        let center = random_placement_point(rng);
        let angle = uniform(rng, 0.0, PI);
        let mut platform = Platform::new(center, radius, angle);
        platform.color = random_color(rng);

        if rng.random::<f32>() < PLATFORM_MOVE_CHANCE {
            platform.moves = true;
            platform.move_speed = uniform(rng, PLATFORM_MOVE_SPEED_MIN, PLATFORM_MOVE_SPEED_MAX);
            platform.move_p1 = center;
            platform.move_p2 = random_placement_point(rng);
        }

        if rng.random::<f32>() < PLATFORM_ROTATE_CHANCE {
            platform.rotates = true;
            platform.rotate_speed = uniform(
                rng,
                PLATFORM_ROTATE_SPEED_RANDOM_MIN,
                PLATFORM_ROTATE_SPEED_MAX,
            );
            if rng.random_bool(0.5) {
                platform.rotate_speed = -platform.rotate_speed;
            }
        }

        platform
    }

    /// Half extents of the platform's box shape
    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.radius, PLATFORM_HALF_THICKNESS)
    }

    /// Velocity at reset: from `move_p1` toward `move_p2`
    pub fn initial_velocity(&self) -> Vec2 {
        if self.moves {
            (self.move_p2 - self.move_p1).normalize_or_zero() * self.move_speed
        } else {
            Vec2::ZERO
        }
    }

    pub fn angular_velocity(&self) -> f32 {
        if self.rotates { self.rotate_speed } else { 0.0 }
    }

    /// Box covering every position and angle the platform can reach
    pub fn bounding_box(&self) -> Rect {
        let t = PLATFORM_HALF_THICKNESS;
        let extent = if self.rotates {
            // Any angle: the diagonal never exceeds r + t on either axis
            Vec2::splat(self.radius + t)
        } else {
            let (sin, cos) = self.start_angle.sin_cos();
            Vec2::new(
                self.radius * cos.abs() + t * sin.abs(),
                self.radius * sin.abs() + t * cos.abs(),
            )
        };

        if self.moves {
            Rect::from_center(self.move_p1, extent).union(&Rect::from_center(self.move_p2, extent))
        } else {
            Rect::from_center(self.center, extent)
        }
    }

    /// Rightmost x any part of the platform can reach
    #[inline]
    pub fn rightmost_x(&self) -> f32 {
        self.bounding_box().max.x
    }

    /// Corners at the current center and angle
    pub fn corners(&self) -> [Vec2; 4] {
        box_corners(self.center, self.angle, self.half_extents())
    }

    /// How much platform this is (informational)
    pub fn cost(&self, costs: &PlatformCosts) -> f32 {
        let mut cost = self.radius * costs.radius;
        if self.moves {
            cost += self.move_speed * costs.move_speed;
        }
        if self.rotates {
            cost += self.rotate_speed.abs() * costs.rotate_speed;
        }
        cost
    }

    /// True if the platform can be placed among `obstacles`: right of the
    /// left wall and clear of every obstacle box
    pub fn fits(&self, obstacles: &[Rect]) -> bool {
        let bbox = self.bounding_box();
        bbox.min.x > LEFT_WALL_X && obstacles.iter().all(|other| !bbox.overlaps(other))
    }

    /// Restore the reset pose
    pub fn reset_pose(&mut self) {
        self.angle = self.start_angle;
        if self.moves {
            self.center = self.move_p1;
        }
    }

    /// Create the kinematic body for this platform, tagged with `index`
    pub fn make_body(&mut self, world: &mut PhysicsWorld, index: usize) -> BodyHandle {
        self.reset_pose();
        let mut def = BodyDef::new(BodyKind::Kinematic, self.center).with_angle(self.angle);
        def.linear_velocity = self.initial_velocity();
        def.angular_velocity = self.angular_velocity();

        let fixture = Fixture::new(Shape::Box {
            half_extents: self.half_extents(),
        })
        .with_friction(PLATFORM_FRICTION)
        .with_tag(platform_tag(index));

        let handle = world.create_body(def, fixture);
        self.body = Some(handle);
        handle
    }

    /// Destroy the bound body, if any
    pub fn unbind(&mut self, world: &mut PhysicsWorld) {
        if let Some(handle) = self.body.take() {
            world.destroy_body(handle);
        }
    }

    /// Try up to `MUTATION_ATTEMPTS` variants and return the first that
    /// fits among `obstacles`. `None` leaves the original in place.
    pub fn mutate(&self, obstacles: &[Rect], rng: &mut impl Rng) -> Option<Platform> {
        (0..MUTATION_ATTEMPTS).find_map(|_| {
            let candidate = if rng.random::<f32>() < MUTATION_FRESH_CHANCE {
                Platform::random(rng)
            } else {
                self.perturbed(rng)
            };
            candidate.fits(obstacles).then_some(candidate)
        })
    }

    fn perturbed(&self, rng: &mut impl Rng) -> Platform {
        let mut p = self.clone();
        p.body = None;
        let chance = MUTATION_ATTRIBUTE_CHANCE;

        if rng.random::<f32>() < chance {
            p.radius += gaussian(rng, MUTATION_SIGMA_RADIUS);
        }
        if rng.random::<f32>() < chance {
            p.start_angle = normalize_angle(p.start_angle + gaussian(rng, MUTATION_SIGMA_ANGLE));
        }

        if rng.random::<f32>() < MUTATION_TOGGLE_CHANCE {
            p.moves = !p.moves;
            if p.moves {
                p.move_p1 = p.center;
                p.move_p2 = random_placement_point(rng);
                p.move_speed = uniform(rng, PLATFORM_MOVE_SPEED_MIN, PLATFORM_MOVE_SPEED_MAX);
            }
        }
        if p.moves {
            if rng.random::<f32>() < chance {
                p.move_p1 += gaussian_vec(rng, MUTATION_SIGMA_POSITION);
            }
            if rng.random::<f32>() < chance {
                p.move_p2 += gaussian_vec(rng, MUTATION_SIGMA_POSITION);
            }
            if rng.random::<f32>() < chance {
                p.move_speed += gaussian(rng, MUTATION_SIGMA_SPEED);
            }
        } else if rng.random::<f32>() < chance {
            p.center += gaussian_vec(rng, MUTATION_SIGMA_POSITION);
        }

        if rng.random::<f32>() < MUTATION_TOGGLE_CHANCE {
            p.rotates = !p.rotates;
        }
        if p.rotates && rng.random::<f32>() < chance {
            p.rotate_speed += gaussian(rng, MUTATION_SIGMA_SPEED);
        }

        p.clamp_to_limits();
        p.reset_pose();
        p
    }

    /// Pull radius and speeds back into their legal ranges
    pub fn clamp_to_limits(&mut self) {
        self.radius = self.radius.clamp(PLATFORM_RADIUS_MIN, PLATFORM_RADIUS_MAX);
        self.move_speed = self
            .move_speed
            .clamp(PLATFORM_MOVE_SPEED_MIN, PLATFORM_MOVE_SPEED_MAX);
        self.rotate_speed = self
            .rotate_speed
            .clamp(-PLATFORM_ROTATE_SPEED_MAX, PLATFORM_ROTATE_SPEED_MAX);
    }

    /// Check a decoded platform against the legal ranges
    pub fn validate(&self) -> Result<(), String> {
        let floats = [
            self.radius,
            self.start_angle,
            self.center.x,
            self.center.y,
            self.move_p1.x,
            self.move_p1.y,
            self.move_p2.x,
            self.move_p2.y,
            self.move_speed,
            self.rotate_speed,
        ];
        if floats.iter().any(|v| !v.is_finite()) {
            return Err("non-finite value".into());
        }
        if !(PLATFORM_RADIUS_MIN..=PLATFORM_RADIUS_MAX).contains(&self.radius) {
            return Err(format!("radius {} out of range", self.radius));
        }
        if self.moves && !(PLATFORM_MOVE_SPEED_MIN..=PLATFORM_MOVE_SPEED_MAX).contains(&self.move_speed)
        {
            return Err(format!("move speed {} out of range", self.move_speed));
        }
        if self.rotates && self.rotate_speed.abs() > PLATFORM_ROTATE_SPEED_MAX {
            return Err(format!("rotate speed {} out of range", self.rotate_speed));
        }
        Ok(())
    }

    /// Append the binary record (little-endian)
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&self.radius.to_le_bytes())?;
        w.write_all(&self.start_angle.to_le_bytes())?;
        w.write_all(&self.color.to_le_bytes())?;

        let mut flags = 0u8;
        if self.moves {
            flags |= FLAG_MOVES;
        }
        if self.rotates {
            flags |= FLAG_ROTATES;
        }
        w.write_all(&[flags])?;

        if self.moves {
            w.write_all(&self.move_speed.to_le_bytes())?;
            write_vec2(w, self.move_p1)?;
            write_vec2(w, self.move_p2)?;
        } else {
            write_vec2(w, self.center)?;
        }
        if self.rotates {
            w.write_all(&self.rotate_speed.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read one binary record written by [`Platform::write_to`]
    pub fn read_from(r: &mut impl Read) -> io::Result<Platform> {
        let radius = read_f32(r)?;
        let start_angle = read_f32(r)?;
        let color = read_u32(r)?;
        let mut flags = [0u8; 1];
        r.read_exact(&mut flags)?;

        let mut platform = Platform::new(Vec2::ZERO, radius, start_angle);
        platform.color = color;
        platform.moves = flags[0] & FLAG_MOVES != 0;
        platform.rotates = flags[0] & FLAG_ROTATES != 0;

        if platform.moves {
            platform.move_speed = read_f32(r)?;
            platform.move_p1 = read_vec2(r)?;
            platform.move_p2 = read_vec2(r)?;
            platform.center = platform.move_p1;
        } else {
            platform.center = read_vec2(r)?;
            platform.move_p1 = platform.center;
            platform.move_p2 = platform.center;
        }
        if platform.rotates {
            platform.rotate_speed = read_f32(r)?;
        }
        Ok(platform)
    }
}

fn write_vec2(w: &mut impl Write, v: Vec2) -> io::Result<()> {
    w.write_all(&v.x.to_le_bytes())?;
    w.write_all(&v.y.to_le_bytes())
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_f32(r: &mut impl Read) -> io::Result<f32> {
    read_u32(r).map(f32::from_bits)
}

fn read_vec2(r: &mut impl Read) -> io::Result<Vec2> {
    let x = read_f32(r)?;
    let y = read_f32(r)?;
    Ok(Vec2::new(x, y))
}
