//! Setups: the unit of evolution
//!
//! A setup is an ordered list of platforms plus the result of its last run.

use std::io::{Read, Write};

use rand::Rng;

use crate::consts::*;
use crate::error::SetupFileError;
use crate::settings::PlatformCosts;
use crate::sim::{Platform, Rect, SimState, simulate_time, starting_line};

/// A candidate platform arrangement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Setup {
    pub platforms: Vec<Platform>,
    /// Distance traveled past the starting line on the last run
    pub score: f32,
    /// Simulated seconds the last run took
    pub total_time: f32,
    /// How many mutations separate this setup from a random one
    pub mutation_count: u32,
}

impl Setup {
    /// Place up to `max_platforms` random platforms without overlaps
    ///
    /// Gives up on the first slot that can't be filled within
    /// `PLACEMENT_ATTEMPTS`, leaving a smaller setup.
    pub fn random(rng: &mut impl Rng, max_platforms: usize) -> Self {
        let max_platforms = max_platforms.min(MAX_PLATFORMS);
        let mut platforms: Vec<Platform> = Vec::with_capacity(max_platforms);
        let mut obstacles: Vec<Rect> = Vec::with_capacity(max_platforms);

        while platforms.len() < max_platforms {
            let placed = (0..PLACEMENT_ATTEMPTS)
                .map(|_| Platform::random(rng))
                .find(|candidate| candidate.fits(&obstacles));
            let Some(platform) = placed else {
                break;
            };
            obstacles.push(platform.bounding_box());
            platforms.push(platform);
        }

        Self {
            platforms,
            ..Self::default()
        }
    }

    /// Mutate each platform independently with probability `rate`
    ///
    /// A platform whose mutation finds no legal variant is left unchanged.
    pub fn mutate_with_rate(&mut self, rng: &mut impl Rng, rate: f32) {
        for index in 0..self.platforms.len() {
            if rng.random::<f32>() >= rate {
                continue;
            }
            let obstacles = self.obstacles_except(index);
            if let Some(mutated) = self.platforms[index].mutate(&obstacles, rng) {
                self.platforms[index] = mutated;
            }
        }
    }

    /// Bounding boxes of every platform but `index`
    fn obstacles_except(&self, index: usize) -> Vec<Rect> {
        self.platforms
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, p)| p.bounding_box())
            .collect()
    }

    /// X from which the ball's travel is measured
    pub fn starting_line(&self) -> f32 {
        starting_line(&self.platforms)
    }

    /// Total platform cost (informational, never part of the score)
    pub fn cost(&self, costs: &PlatformCosts) -> f32 {
        self.platforms.iter().map(|p| p.cost(costs)).sum()
    }

    /// Activate this setup, run the ball to a terminal state and record the
    /// distance it traveled past the starting line
    pub fn score(&mut self, sim: &mut SimState) -> f32 {
        sim.use_setup(self);
        let line = self.starting_line();
        while sim.ball.is_bound() {
            simulate_time(sim, SCORE_BATCH_DT);
        }
        self.score = sim.ball.pos.x - line;
        self.total_time = sim.total_time;
        self.score
    }

    /// Write the binary form: platform count, then each record
    pub fn write_to(&self, w: &mut impl Write) -> std::io::Result<()> {
        w.write_all(&(self.platforms.len() as u32).to_le_bytes())?;
        for platform in &self.platforms {
            platform.write_to(w)?;
        }
        Ok(())
    }

    /// Read the binary form, rejecting oversized or out-of-range data
    pub fn read_from(r: &mut impl Read) -> Result<Self, SetupFileError> {
        let mut count = [0u8; 4];
        r.read_exact(&mut count)?;
        let count = u32::from_le_bytes(count);
        if count as usize > MAX_PLATFORMS {
            return Err(SetupFileError::TooManyPlatforms {
                count,
                max: MAX_PLATFORMS,
            });
        }

        let mut platforms = Vec::with_capacity(count as usize);
        for index in 0..count as usize {
            let platform = Platform::read_from(r)?;
            platform
                .validate()
                .map_err(|reason| SetupFileError::InvalidPlatform { index, reason })?;
            platforms.push(platform);
        }

        Ok(Self {
            platforms,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PhysicsSettings;
    use crate::sim::RunStatus;
    use crate::sim::platform::strategies;
    use glam::Vec2;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn sim() -> SimState {
        SimState::new(&PhysicsSettings::default())
    }

    fn assert_no_overlaps(setup: &Setup) {
        for (i, a) in setup.platforms.iter().enumerate() {
            let bbox = a.bounding_box();
            assert!(bbox.min.x > LEFT_WALL_X);
            for b in &setup.platforms[i + 1..] {
                assert!(!bbox.overlaps(&b.bounding_box()));
            }
        }
    }

    #[test]
    fn test_random_setup_has_no_overlaps() {
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..20 {
            let setup = Setup::random(&mut rng, MAX_PLATFORMS);
            assert!(!setup.platforms.is_empty());
            assert!(setup.platforms.len() <= MAX_PLATFORMS);
            assert_eq!(setup.mutation_count, 0);
            assert_no_overlaps(&setup);
        }
    }

    #[test]
    fn test_random_setup_respects_requested_size() {
        let mut rng = Pcg32::seed_from_u64(2);
        assert!(Setup::random(&mut rng, 3).platforms.len() <= 3);
        assert!(Setup::random(&mut rng, 0).platforms.is_empty());
    }

    #[test]
    fn test_crowded_field_gives_up_early() {
        // The placement region can't hold a full setup of random platforms
        let mut rng = Pcg32::seed_from_u64(3);
        let sizes: Vec<usize> = (0..10)
            .map(|_| Setup::random(&mut rng, MAX_PLATFORMS).platforms.len())
            .collect();
        assert!(sizes.iter().all(|&len| len < MAX_PLATFORMS), "{sizes:?}");
        assert!(sizes.iter().any(|&len| len > 1), "{sizes:?}");
    }

    #[test]
    fn test_mutation_keeps_setup_legal() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut setup = Setup::random(&mut rng, 8);
        let count = setup.platforms.len();
        for _ in 0..50 {
            setup.mutate_with_rate(&mut rng, 0.5);
            assert_eq!(setup.platforms.len(), count);
            assert_no_overlaps(&setup);
        }
    }

    #[test]
    fn test_zero_rate_changes_nothing() {
        let mut rng = Pcg32::seed_from_u64(6);
        let setup = Setup::random(&mut rng, 6);
        let mut copy = setup.clone();
        copy.mutate_with_rate(&mut rng, 0.0);
        assert_eq!(copy, setup);
    }

    #[test]
    fn test_empty_setup_scores_zero() {
        let mut sim = sim();
        let mut setup = Setup::default();
        let score = setup.score(&mut sim);
        assert!(score.abs() < 0.01, "expected ~0, got {score}");
        assert!(setup.starting_line() >= BALL_STARTING_X);
        assert_eq!(sim.status, RunStatus::Landed);
        assert!(setup.total_time < STUCK_TIMEOUT);
    }

    #[test]
    fn test_ramp_deflects_ball_right() {
        let mut sim = sim();
        // Sloping down to the right, directly under the ball
        let mut setup = Setup {
            platforms: vec![Platform::new(Vec2::new(2.0, 6.0), 1.5, -0.5)],
            ..Setup::default()
        };
        let score = setup.score(&mut sim);
        assert!(score > 0.0, "ramp should push the ball past the line, got {score}");
        assert!(setup.total_time < STUCK_TIMEOUT);
        assert_eq!(setup.score, score);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let mut rng = Pcg32::seed_from_u64(9);
        let mut sim = sim();
        for _ in 0..5 {
            let mut a = Setup::random(&mut rng, 10);
            let mut b = a.clone();
            a.score(&mut sim);
            // Score something else in between to disturb the world
            Setup::random(&mut rng, 4).score(&mut sim);
            b.score(&mut sim);
            assert_eq!(a.score.to_bits(), b.score.to_bits());
            assert_eq!(a.total_time.to_bits(), b.total_time.to_bits());
        }
    }

    #[test]
    fn test_cost_sums_platforms() {
        let costs = PlatformCosts::default();
        let setup = Setup {
            platforms: vec![
                Platform::new(Vec2::ONE, 1.0, 0.0),
                Platform::new(Vec2::new(5.0, 5.0), 2.5, 0.0),
            ],
            ..Setup::default()
        };
        assert!((setup.cost(&costs) - 3.5).abs() < 0.0001);
    }

    #[test]
    fn test_read_rejects_oversized_count() {
        let bytes = (MAX_PLATFORMS as u32 + 1).to_le_bytes();
        let result = Setup::read_from(&mut bytes.as_slice());
        assert!(matches!(
            result,
            Err(SetupFileError::TooManyPlatforms { count, .. }) if count == MAX_PLATFORMS as u32 + 1
        ));
    }

    #[test]
    fn test_read_rejects_bad_radius() {
        let setup = Setup {
            platforms: vec![Platform::new(Vec2::ONE, 1.0, 0.0), Platform::new(Vec2::ONE, 50.0, 0.0)],
            ..Setup::default()
        };
        let mut buf = Vec::new();
        setup.write_to(&mut buf).unwrap();
        assert!(matches!(
            Setup::read_from(&mut buf.as_slice()),
            Err(SetupFileError::InvalidPlatform { index: 1, .. })
        ));
    }

    #[test]
    fn test_read_truncated() {
        let mut buf = Vec::new();
        Setup::random(&mut Pcg32::seed_from_u64(4), 5)
            .write_to(&mut buf)
            .unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            Setup::read_from(&mut buf.as_slice()),
            Err(SetupFileError::Malformed(_))
        ));
    }

    proptest! {
        #[test]
        fn test_setup_round_trip(
            platforms in proptest::collection::vec(strategies::platform(), 0..=MAX_PLATFORMS)
        ) {
            let setup = Setup { platforms, ..Setup::default() };
            let mut buf = Vec::new();
            setup.write_to(&mut buf).unwrap();
            let decoded = Setup::read_from(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(decoded.platforms.len(), setup.platforms.len());
            for (d, p) in decoded.platforms.iter().zip(&setup.platforms) {
                let mut expected = p.clone();
                if !expected.moves {
                    expected.move_p1 = expected.center;
                    expected.move_p2 = expected.center;
                    expected.move_speed = d.move_speed;
                }
                if !expected.rotates {
                    expected.rotate_speed = d.rotate_speed;
                }
                prop_assert_eq!(d, &expected);
            }
        }
    }
}
