//! Run settings and tuning
//!
//! Loaded from a JSON file; every field falls back to its default when absent.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::MAX_PLATFORMS;
use crate::error::SettingsError;

/// Physics world parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Vertical acceleration (m/s², negative = down)
    pub gravity: f32,
    /// Contact solver passes per step
    pub velocity_iterations: u32,
    /// Penetration correction passes per step
    pub position_iterations: u32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            velocity_iterations: 8,
            position_iterations: 3,
        }
    }
}

/// Evolutionary search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionSettings {
    /// Survivors kept from one generation to the next
    pub top_kept: usize,
    /// Offspring scored per generation
    pub generation_size: usize,
    /// Per-platform mutation probability for each band of offspring, in order.
    /// One extra, final band is always fully re-randomized.
    pub mutation_bands: Vec<f32>,
    /// Wall-clock budget for scoring per frame while auto-evolving
    pub frame_budget_ms: u64,
    /// Seed for the search RNG
    pub seed: u64,
    /// Where ranked survivors are written after each generation
    pub output_dir: PathBuf,
    /// Platforms a random setup tries to place
    pub max_platforms_per_setup: usize,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        Self {
            top_kept: 10,
            generation_size: 100,
            mutation_bands: vec![0.05, 0.10, 0.25, 0.50],
            frame_budget_ms: 20,
            seed: 0x5eed_ba11,
            output_dir: PathBuf::from("setups"),
            max_platforms_per_setup: MAX_PLATFORMS,
        }
    }
}

impl EvolutionSettings {
    /// Offspring bands including the final re-randomized one
    pub fn band_count(&self) -> usize {
        self.mutation_bands.len() + 1
    }

    /// Whole population: survivors followed by offspring slots
    pub fn population_size(&self) -> usize {
        self.top_kept + self.generation_size
    }

    /// Reject search parameters the engine cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.top_kept == 0 {
            return Err(SettingsError::Invalid("top_kept must be at least 1".into()));
        }
        if self.generation_size == 0 {
            return Err(SettingsError::Invalid(
                "generation_size must be at least 1".into(),
            ));
        }
        if self.frame_budget_ms == 0 {
            return Err(SettingsError::Invalid(
                "frame_budget_ms must be positive".into(),
            ));
        }
        if self.max_platforms_per_setup > MAX_PLATFORMS {
            return Err(SettingsError::Invalid(format!(
                "max_platforms_per_setup {} exceeds capacity {MAX_PLATFORMS}",
                self.max_platforms_per_setup
            )));
        }
        if self.mutation_bands.is_empty() {
            return Err(SettingsError::Invalid(
                "mutation_bands needs at least one rate".into(),
            ));
        }
        if let Some(rate) = self
            .mutation_bands
            .iter()
            .find(|rate| !(0.0..=1.0).contains(*rate))
        {
            return Err(SettingsError::Invalid(format!(
                "mutation rate {rate} is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

/// Per-unit platform costs (informational; not part of fitness)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformCosts {
    /// Per meter of half-length
    pub radius: f32,
    /// Per m/s of linear speed
    pub move_speed: f32,
    /// Per rad/s of angular speed
    pub rotate_speed: f32,
}

impl Default for PlatformCosts {
    fn default() -> Self {
        Self {
            radius: 1.0,
            move_speed: 1.0,
            rotate_speed: 1.0,
        }
    }
}

/// All settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicsSettings,
    pub evolution: EvolutionSettings,
    pub costs: PlatformCosts,
}

impl Settings {
    /// Load and validate settings from a JSON file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&json)?;
        settings.validate()?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults on any failure
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("Ignoring settings: {err}");
                Self::default()
            }
        }
    }

    /// Save settings as pretty JSON
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.evolution.validate()?;
        if !self.physics.gravity.is_finite() {
            return Err(SettingsError::Invalid("gravity must be finite".into()));
        }
        Ok(())
    }
}
