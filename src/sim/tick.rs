//! Fixed timestep simulation driver
//!
//! Frame time is accumulated and spent in `SIM_DT` steps, so the physics
//! always sees the same step size no matter how the caller slices time.

use super::state::SimState;
use crate::consts::*;

/// Outcome of the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Ball is still bound and moving
    Running,
    /// Ball reached the floor
    Landed,
    /// Ball stopped making progress to the right
    Stuck,
}

impl RunStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        self != RunStatus::Running
    }
}

/// Advance the simulation by `dt` seconds of frame time
///
/// Leftover time shorter than one step carries over to the next call.
pub fn simulate_time(state: &mut SimState, dt: f32) -> RunStatus {
    state.time_residue += dt.clamp(0.0, MAX_FRAME_DT);
    while state.time_residue >= SIM_DT {
        state.time_residue -= SIM_DT;
        step_once(state);
    }
    state.status
}

/// Advance exactly one fixed step
pub fn step_once(state: &mut SimState) {
    state.world.step(SIM_DT);

    if state.ball.is_bound() {
        state.stuck_time += SIM_DT;
        state.total_time += SIM_DT;
        state.ball.sync(&state.world);
        check_ball(state);
    }

    bounce_moving_platforms(state);
}

fn check_ball(state: &mut SimState) {
    let ball = &mut state.ball;

    if ball.bottom() <= FLOOR_Y + LANDING_TOLERANCE {
        ball.unbind(&mut state.world);
        ball.pos.y = FLOOR_Y + ball.radius;
        state.status = RunStatus::Landed;
        log::trace!(
            "Ball landed at x={:.2} after {:.2}s",
            ball.pos.x,
            state.total_time
        );
        return;
    }

    // Centimeter granularity keeps float noise from resetting the timer
    let x_cm = (ball.pos.x * 100.0).round() as i64;
    if x_cm > state.best_x_cm {
        state.best_x_cm = x_cm;
        state.stuck_time = 0.0;
    } else if state.stuck_time > STUCK_TIMEOUT {
        ball.unbind(&mut state.world);
        state.stuck_time = STUCK_TIMEOUT;
        state.status = RunStatus::Stuck;
        log::trace!(
            "Ball stuck at x={:.2} after {:.2}s",
            ball.pos.x,
            state.total_time
        );
    }
}

/// Reverse moving platforms that have passed the endpoint they travel toward
fn bounce_moving_platforms(state: &mut SimState) {
    for platform in &mut state.platforms {
        let Some(handle) = platform.body else {
            continue;
        };
        let Some(body) = state.world.body_mut(handle) else {
            continue;
        };
        platform.center = body.position;
        platform.angle = body.angle;
        if !platform.moves {
            continue;
        }

        let travel = platform.move_p2 - platform.move_p1;
        let heading = body.linear_velocity.dot(travel);
        let past_p2 = heading > 0.0 && (body.position - platform.move_p2).dot(travel) >= 0.0;
        let past_p1 = heading < 0.0 && (body.position - platform.move_p1).dot(travel) <= 0.0;
        if past_p2 || past_p1 {
            body.linear_velocity = -body.linear_velocity;
        }
    }
}
