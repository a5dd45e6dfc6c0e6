//! Mode controller for an interactive shell
//!
//! The shell translates raw input into [`Command`]s and calls
//! [`Editor::frame`] once per frame. Everything it draws is read back through
//! the accessors here.

use std::path::PathBuf;

use glam::Vec2;

use crate::consts::*;
use crate::error::SettingsError;
use crate::evolution::{AutoEvolve, Evolution, GenerationReport};
use crate::normalize_angle;
use crate::persistence;
use crate::settings::Settings;
use crate::sim::{Platform, SimState, simulate_time};

/// Rotate speed given to the template when rotation is first switched on
const DEFAULT_ROTATE_SPEED: f32 = 1.0;

/// What the shell is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Hand-placing platforms; physics paused
    Build,
    /// Replaying the active setup in real time
    Simulate,
    /// Population overview; auto-evolve runs here
    EvolveMenu,
}

/// One user action
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleMove,
    ToggleRotate,
    AdjustRadius(f32),
    AdjustAngle(f32),
    AdjustMoveSpeed(f32),
    AdjustRotateSpeed(f32),
    /// Place the template at the cursor (moving platforms take two clicks)
    Place,
    /// Delete the platform under the cursor
    Delete,
    Build,
    Simulate,
    /// Back to the evolve menu
    Escape,
    StartEvolution,
    EvolveOneGeneration,
    EvolveContinuous,
    StopEvolution,
    /// Replay the population member at this rank
    View(usize),
    Save(PathBuf),
    Load(PathBuf),
    /// Throw everything away and start over
    DebugReset,
}

/// Input for one frame
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Cursor position in world coordinates
    pub cursor: Vec2,
    pub commands: Vec<Command>,
}

/// The interactive controller
#[derive(Debug, Clone)]
pub struct Editor {
    settings: Settings,
    sim: SimState,
    evolution: Evolution,
    mode: Mode,
    /// Platform that follows the cursor in build mode
    template: Platform,
    /// First click of a moving platform placed, waiting for the second
    setting_move_p2: bool,
    /// Rank currently being replayed
    viewing: Option<usize>,
}

impl Editor {
    /// Fresh editor in build mode; fails on settings that cannot be run
    pub fn new(settings: Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let sim = SimState::new(&settings.physics);
        let evolution = Evolution::new(&settings.evolution)?;
        Ok(Self {
            settings,
            sim,
            evolution,
            mode: Mode::Build,
            template: Platform::new(Vec2::ZERO, 1.0, 0.0),
            setting_move_p2: false,
            viewing: None,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn building(&self) -> bool {
        self.mode == Mode::Build
    }

    pub fn simulating(&self) -> bool {
        self.mode == Mode::Simulate
    }

    pub fn evolve_menu(&self) -> bool {
        self.mode == Mode::EvolveMenu
    }

    /// A generation is in progress or queued to run
    pub fn evolving(&self) -> bool {
        self.evolution.is_evolving() || self.evolution.auto() != AutoEvolve::Off
    }

    pub fn sim(&self) -> &SimState {
        &self.sim
    }

    pub fn evolution(&self) -> &Evolution {
        &self.evolution
    }

    pub fn template(&self) -> &Platform {
        &self.template
    }

    pub fn setting_move_p2(&self) -> bool {
        self.setting_move_p2
    }

    pub fn viewing(&self) -> Option<usize> {
        self.viewing
    }

    /// Cost of the active platforms (informational)
    pub fn active_cost(&self) -> f32 {
        self.sim
            .platforms
            .iter()
            .map(|p| p.cost(&self.settings.costs))
            .sum()
    }

    /// Apply this frame's commands, then advance whatever the mode runs
    pub fn frame(&mut self, input: &FrameInput, dt: f32) -> Option<GenerationReport> {
        self.follow_cursor(input.cursor);
        for command in &input.commands {
            self.apply(command, input.cursor);
        }

        match self.mode {
            Mode::Build => None,
            Mode::Simulate => {
                simulate_time(&mut self.sim, dt);
                None
            }
            Mode::EvolveMenu => {
                let budget = self.evolution.frame_budget();
                self.evolution.run_budgeted(&mut self.sim, budget)
            }
        }
    }

    fn follow_cursor(&mut self, cursor: Vec2) {
        if self.setting_move_p2 {
            self.template.move_p2 = cursor;
        } else {
            self.template.center = cursor;
            self.template.move_p1 = cursor;
            self.template.move_p2 = cursor;
        }
    }

    fn apply(&mut self, command: &Command, cursor: Vec2) {
        match command {
            Command::Build => self.enter(Mode::Build),
            Command::Simulate => self.enter(Mode::Simulate),
            Command::Escape => {
                self.sim.destroy_ball();
                self.enter(Mode::EvolveMenu);
            }
            Command::StartEvolution => {
                self.evolution.start_evolution(&mut self.sim);
                self.enter(Mode::EvolveMenu);
            }
            Command::EvolveOneGeneration => self.set_auto(AutoEvolve::OneGeneration),
            Command::EvolveContinuous => self.set_auto(AutoEvolve::Continuous),
            Command::StopEvolution => self.evolution.set_auto(AutoEvolve::Off),
            Command::View(rank) => self.view(*rank),
            Command::Save(path) => {
                if let Err(err) = persistence::save_setup(path, &self.sim.to_setup()) {
                    log::warn!("{err}");
                }
            }
            Command::Load(path) => match persistence::load_setup(path) {
                Ok(setup) => {
                    self.sim.use_setup(&setup);
                    self.enter(Mode::Build);
                }
                Err(err) => log::warn!("{err}"),
            },
            Command::DebugReset => {
                log::info!("Resetting everything");
                match Editor::new(self.settings.clone()) {
                    Ok(fresh) => *self = fresh,
                    Err(err) => log::warn!("Reset failed: {err}"),
                }
            }
            edit if self.mode == Mode::Build => self.edit(edit, cursor),
            _ => {}
        }
    }

    fn edit(&mut self, command: &Command, cursor: Vec2) {
        let t = &mut self.template;
        match *command {
            Command::ToggleMove => {
                t.moves = !t.moves;
                if !t.moves && self.setting_move_p2 {
                    self.setting_move_p2 = false;
                    t.center = cursor;
                    t.move_p1 = cursor;
                }
            }
            Command::ToggleRotate => {
                t.rotates = !t.rotates;
                if t.rotates && t.rotate_speed == 0.0 {
                    t.rotate_speed = DEFAULT_ROTATE_SPEED;
                }
            }
            Command::AdjustRadius(delta) => {
                t.radius = (t.radius + delta).clamp(PLATFORM_RADIUS_MIN, PLATFORM_RADIUS_MAX);
            }
            Command::AdjustAngle(delta) => {
                t.start_angle = normalize_angle(t.start_angle + delta);
                t.angle = t.start_angle;
            }
            Command::AdjustMoveSpeed(delta) => {
                t.move_speed =
                    (t.move_speed + delta).clamp(PLATFORM_MOVE_SPEED_MIN, PLATFORM_MOVE_SPEED_MAX);
            }
            Command::AdjustRotateSpeed(delta) => {
                t.rotate_speed = (t.rotate_speed + delta)
                    .clamp(-PLATFORM_ROTATE_SPEED_MAX, PLATFORM_ROTATE_SPEED_MAX);
            }
            Command::Place => self.place(cursor),
            Command::Delete => {
                if let Some(index) = self.sim.platform_at(cursor, PICK_TOLERANCE) {
                    self.sim.delete_platform(index);
                }
            }
            _ => {}
        }
    }

    fn place(&mut self, cursor: Vec2) {
        if self.template.moves && !self.setting_move_p2 {
            self.template.move_p1 = cursor;
            self.template.center = cursor;
            self.template.move_p2 = cursor;
            self.setting_move_p2 = true;
            return;
        }
        if self.template.moves {
            self.template.move_p2 = cursor;
        }
        self.setting_move_p2 = false;

        let platform = self.template.clone();
        if self.sim.add_platform(platform).is_none() {
            log::debug!("Platform limit of {MAX_PLATFORMS} reached");
        }
        // Newly placed platforms sit at their reset pose with the ball at start
        self.sim.reset();
        self.follow_cursor(cursor);
    }

    fn set_auto(&mut self, auto: AutoEvolve) {
        if !self.evolution.is_initialized() {
            log::warn!("Start evolution before running generations");
            return;
        }
        self.evolution.set_auto(auto);
        self.enter(Mode::EvolveMenu);
    }

    fn view(&mut self, rank: usize) {
        let Some(setup) = self.evolution.population().get(rank).cloned() else {
            log::warn!("No setup at rank {rank}");
            return;
        };
        log::info!(
            "Viewing rank {rank}: score {:.3}, {} platforms, cost {:.2}",
            setup.score,
            setup.platforms.len(),
            setup.cost(&self.settings.costs)
        );
        self.sim.use_setup(&setup);
        self.mode = Mode::Simulate;
        self.viewing = Some(rank);
    }

    fn enter(&mut self, mode: Mode) {
        if mode != Mode::EvolveMenu {
            self.sim.reset();
        }
        self.setting_move_p2 = false;
        self.viewing = None;
        self.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EvolutionSettings;
    use crate::sim::RunStatus;
    use tempfile::TempDir;

    fn editor(dir: &TempDir) -> Editor {
        Editor::new(Settings {
            evolution: EvolutionSettings {
                top_kept: 2,
                generation_size: 5,
                max_platforms_per_setup: 4,
                output_dir: dir.path().join("setups"),
                ..EvolutionSettings::default()
            },
            ..Settings::default()
        })
        .unwrap()
    }

    fn input(cursor: Vec2, commands: Vec<Command>) -> FrameInput {
        FrameInput { cursor, commands }
    }

    #[test]
    fn test_place_static_platform() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        assert!(editor.building());

        editor.frame(&input(Vec2::new(5.0, 5.0), vec![Command::Place]), 0.016);
        assert_eq!(editor.sim().platforms.len(), 1);
        assert_eq!(editor.sim().platforms[0].center, Vec2::new(5.0, 5.0));
        assert!(editor.active_cost() > 0.0);
    }

    #[test]
    fn test_moving_platform_takes_two_clicks() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        editor.frame(&input(Vec2::new(3.0, 3.0), vec![Command::ToggleMove, Command::Place]), 0.016);
        assert!(editor.setting_move_p2());
        assert!(editor.sim().platforms.is_empty());

        editor.frame(&input(Vec2::new(7.0, 4.0), vec![]), 0.016);
        assert_eq!(editor.template().move_p2, Vec2::new(7.0, 4.0));
        assert_eq!(editor.template().move_p1, Vec2::new(3.0, 3.0));

        editor.frame(&input(Vec2::new(7.0, 4.0), vec![Command::Place]), 0.016);
        assert!(!editor.setting_move_p2());
        let placed = &editor.sim().platforms[0];
        assert!(placed.moves);
        assert_eq!(placed.move_p1, Vec2::new(3.0, 3.0));
        assert_eq!(placed.move_p2, Vec2::new(7.0, 4.0));
        assert_eq!(placed.center, placed.move_p1);
    }

    #[test]
    fn test_adjustments_are_clamped() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        editor.frame(
            &input(
                Vec2::ZERO,
                vec![
                    Command::AdjustRadius(100.0),
                    Command::AdjustMoveSpeed(-100.0),
                    Command::ToggleRotate,
                    Command::AdjustRotateSpeed(-100.0),
                ],
            ),
            0.016,
        );
        let t = editor.template();
        assert_eq!(t.radius, PLATFORM_RADIUS_MAX);
        assert_eq!(t.move_speed, PLATFORM_MOVE_SPEED_MIN);
        assert!(t.rotates);
        assert_eq!(t.rotate_speed, -PLATFORM_ROTATE_SPEED_MAX);
    }

    #[test]
    fn test_delete_under_cursor() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        editor.frame(&input(Vec2::new(5.0, 5.0), vec![Command::Place]), 0.016);
        editor.frame(&input(Vec2::new(5.0, 8.0), vec![Command::Place]), 0.016);
        editor.frame(&input(Vec2::new(5.5, 5.15), vec![Command::Delete]), 0.016);
        assert_eq!(editor.sim().platforms.len(), 1);
        assert_eq!(editor.sim().platforms[0].center, Vec2::new(5.0, 8.0));
        // Nothing under the cursor: no-op
        editor.frame(&input(Vec2::new(9.0, 1.0), vec![Command::Delete]), 0.016);
        assert_eq!(editor.sim().platforms.len(), 1);
    }

    #[test]
    fn test_edits_ignored_outside_build() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        editor.frame(&input(Vec2::new(5.0, 5.0), vec![Command::Simulate, Command::Place]), 0.016);
        assert!(editor.simulating());
        assert!(editor.sim().platforms.is_empty());
    }

    #[test]
    fn test_simulate_then_escape() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        editor.frame(&input(Vec2::ZERO, vec![Command::Simulate]), 0.5);
        assert!(editor.sim().ball.pos.y < BALL_STARTING_Y);
        assert_eq!(editor.sim().status, RunStatus::Running);

        editor.frame(&input(Vec2::ZERO, vec![Command::Escape]), 0.016);
        assert!(editor.evolve_menu());
        assert!(!editor.sim().ball.is_bound());
        assert_eq!(editor.sim().world.body_count(), 2);
    }

    #[test]
    fn test_evolve_and_view() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        editor.frame(&input(Vec2::ZERO, vec![Command::View(0)]), 0.016);
        assert!(editor.building());

        editor.frame(&input(Vec2::ZERO, vec![Command::StartEvolution]), 0.016);
        assert!(editor.evolve_menu());
        assert!(editor.evolution().is_initialized());
        assert!(!editor.evolving());

        let mut report = None;
        for _ in 0..1000 {
            let commands = if report.is_none() && !editor.evolving() {
                vec![Command::EvolveOneGeneration]
            } else {
                vec![]
            };
            if let Some(r) = editor.frame(&input(Vec2::ZERO, commands), 0.016) {
                report = Some(r);
                break;
            }
        }
        assert_eq!(report.map(|r| r.generation), Some(1));
        assert!(!editor.evolving());

        editor.frame(&input(Vec2::ZERO, vec![Command::View(0)]), 0.016);
        assert!(editor.simulating());
        assert_eq!(editor.viewing(), Some(0));
        let best = &editor.evolution().population()[0];
        assert_eq!(editor.sim().platforms.len(), best.platforms.len());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hand.setup");
        let mut editor = editor(&dir);
        editor.frame(&input(Vec2::new(4.0, 4.0), vec![Command::Place]), 0.016);
        editor.frame(&input(Vec2::new(8.0, 6.0), vec![Command::Place, Command::Save(path.clone())]), 0.016);
        assert!(path.exists());

        editor.frame(&input(Vec2::ZERO, vec![Command::DebugReset]), 0.016);
        assert!(editor.sim().platforms.is_empty());

        editor.frame(&input(Vec2::ZERO, vec![Command::Load(path)]), 0.016);
        assert!(editor.building());
        assert_eq!(editor.sim().platforms.len(), 2);
        assert_eq!(editor.sim().platforms[1].center, Vec2::new(8.0, 6.0));
    }

    #[test]
    fn test_load_missing_file_is_harmless() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        editor.frame(&input(Vec2::new(4.0, 4.0), vec![Command::Place]), 0.016);
        editor.frame(
            &input(Vec2::ZERO, vec![Command::Load(dir.path().join("missing.setup"))]),
            0.016,
        );
        assert_eq!(editor.sim().platforms.len(), 1);
    }

    #[test]
    fn test_rejects_settings_without_survivors() {
        let dir = TempDir::new().unwrap();
        let result = Editor::new(Settings {
            evolution: EvolutionSettings {
                top_kept: 0,
                generation_size: 3,
                output_dir: dir.path().join("setups"),
                ..EvolutionSettings::default()
            },
            ..Settings::default()
        });
        assert!(matches!(result, Err(SettingsError::Invalid(_))));

        let mut settings = Settings::default();
        settings.physics.gravity = f32::NAN;
        assert!(Editor::new(settings).is_err());
    }
}
