//! Generational search over setups
//!
//! The population is `top_kept` survivors followed by `generation_size`
//! offspring slots. A generation fills the offspring slots one at a time
//! (`score_one`), so scoring can be spread over many frames, then re-ranks the
//! whole population and writes the survivors to disk.

use std::path::Path;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::error::SettingsError;
use crate::persistence;
use crate::settings::EvolutionSettings;
use crate::setup::Setup;
use crate::sim::SimState;

/// Whether evolution keeps running across frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoEvolve {
    #[default]
    Off,
    /// Stop as soon as the current generation finishes
    OneGeneration,
    Continuous,
}

/// Summary of a finished generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationReport {
    /// Generations completed so far
    pub generation: u32,
    /// Score of the best setup
    pub best: f32,
    /// Mean score of the survivors
    pub mean_top: f32,
}

/// The evolutionary engine
#[derive(Debug, Clone)]
pub struct Evolution {
    settings: EvolutionSettings,
    population: Vec<Setup>,
    generation: u32,
    /// Next offspring slot to fill
    cursor: usize,
    evolving: bool,
    auto: AutoEvolve,
    rng: Pcg32,
}

impl Evolution {
    /// Engine with an empty population; fails on settings it cannot run with
    pub fn new(settings: &EvolutionSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings: settings.clone(),
            population: Vec::new(),
            generation: 0,
            cursor: 0,
            evolving: false,
            auto: AutoEvolve::Off,
            rng: Pcg32::seed_from_u64(settings.seed),
        })
    }

    pub fn settings(&self) -> &EvolutionSettings {
        &self.settings
    }

    /// True once a population has been seeded
    pub fn is_initialized(&self) -> bool {
        !self.population.is_empty()
    }

    /// Whole population, best first after every generation
    pub fn population(&self) -> &[Setup] {
        &self.population
    }

    pub fn survivors(&self) -> &[Setup] {
        let kept = self.settings.top_kept.min(self.population.len());
        &self.population[..kept]
    }

    pub fn best(&self) -> Option<&Setup> {
        self.population.first()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Offspring scored so far in the current generation
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True between `start_generation` and `finish_generation`
    pub fn is_evolving(&self) -> bool {
        self.evolving
    }

    pub fn auto(&self) -> AutoEvolve {
        self.auto
    }

    pub fn set_auto(&mut self, auto: AutoEvolve) {
        self.auto = auto;
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.settings.frame_budget_ms)
    }

    fn random_setup(&mut self) -> Setup {
        Setup::random(&mut self.rng, self.settings.max_platforms_per_setup)
    }

    /// Seed the whole population with random setups and score them
    pub fn start_evolution(&mut self, sim: &mut SimState) {
        let size = self.settings.population_size();
        let population = (0..size).map(|_| self.random_setup()).collect();
        self.population = population;
        self.score_population(sim);
        log::info!(
            "Seeded population of {size}, best {:.3}",
            self.best().map_or(0.0, |s| s.score)
        );
    }

    /// Seed survivors from ranked files in `dir`, filling the rest of the
    /// population randomly. Returns how many setups were loaded; with none,
    /// the engine is left untouched.
    pub fn load_survivors(&mut self, sim: &mut SimState, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        let loaded = persistence::load_ranked(dir, self.settings.top_kept);
        let count = loaded.len();
        if count == 0 {
            return 0;
        }

        self.population = loaded;
        while self.population.len() < self.settings.population_size() {
            let setup = self.random_setup();
            self.population.push(setup);
        }
        self.score_population(sim);
        log::info!(
            "Resumed {count} survivors from {}, best {:.3}",
            dir.display(),
            self.best().map_or(0.0, |s| s.score)
        );
        count
    }

    fn score_population(&mut self, sim: &mut SimState) {
        for setup in &mut self.population {
            setup.score(sim);
        }
        self.sort_population();
        self.generation = 0;
        self.cursor = 0;
        self.evolving = false;
    }

    /// Descending by score; equal scores keep their current order
    fn sort_population(&mut self) {
        self.population.sort_by(|a, b| b.score.total_cmp(&a.score));
    }

    /// Begin filling offspring slots from the first
    pub fn start_generation(&mut self) {
        if !self.is_initialized() {
            log::warn!("No population to evolve yet");
            return;
        }
        self.cursor = 0;
        self.evolving = true;
    }

    /// Breed, score and store the next offspring
    ///
    /// Offspring are split into equal bands by slot: each band but the last
    /// copies a random survivor and mutates every platform with that band's
    /// rate, the last band is freshly random. Returns true once the
    /// generation's last offspring has been scored.
    pub fn score_one(&mut self, sim: &mut SimState) -> bool {
        let size = self.settings.generation_size;
        if !self.evolving || self.cursor >= size {
            return true;
        }
        let index = self.cursor;
        self.cursor += 1;

        let band = index * self.settings.band_count() / size;
        let kept = self.survivors().len();
        let rate = self.settings.mutation_bands.get(band).copied();
        let mut offspring = match rate {
            Some(rate) if kept > 0 => {
                let parent = self.rng.random_range(0..kept);
                let mut child = self.population[parent].clone();
                child.mutation_count += 1;
                child.mutate_with_rate(&mut self.rng, rate);
                child
            }
            _ => self.random_setup(),
        };
        offspring.score(sim);
        log::debug!(
            "Offspring {index} (band {band}, {} mutations): {:.3}",
            offspring.mutation_count,
            offspring.score
        );

        let slot = self.settings.top_kept + index;
        if let Some(entry) = self.population.get_mut(slot) {
            *entry = offspring;
        }
        self.cursor == size
    }

    /// Re-rank, persist the survivors and count the generation
    pub fn finish_generation(&mut self) -> GenerationReport {
        self.sort_population();
        self.evolving = false;
        self.generation += 1;

        let dir = &self.settings.output_dir;
        if let Err(err) = persistence::save_ranked(dir, self.survivors()) {
            log::warn!("Couldn't save survivors: {err}");
        }

        let survivors = self.survivors();
        let mean_top = if survivors.is_empty() {
            0.0
        } else {
            survivors.iter().map(|s| s.score).sum::<f32>() / survivors.len() as f32
        };
        let report = GenerationReport {
            generation: self.generation,
            best: survivors.first().map_or(0.0, |s| s.score),
            mean_top,
        };
        log::info!(
            "Generation {} done: best {:.3}, survivor mean {:.3}",
            report.generation,
            report.best,
            report.mean_top
        );
        report
    }

    /// Score offspring until `budget` has elapsed, finishing and restarting
    /// generations as auto-evolve dictates. At least one offspring is scored
    /// per call while auto-evolve is on.
    pub fn run_budgeted(&mut self, sim: &mut SimState, budget: Duration) -> Option<GenerationReport> {
        if self.auto == AutoEvolve::Off || !self.is_initialized() {
            return None;
        }
        if !self.evolving {
            self.start_generation();
        }

        let start = Instant::now();
        let mut report = None;
        loop {
            if self.score_one(sim) {
                report = Some(self.finish_generation());
                if self.auto == AutoEvolve::OneGeneration {
                    self.auto = AutoEvolve::Off;
                    break;
                }
                self.start_generation();
            }
            if start.elapsed() >= budget {
                break;
            }
        }
        report
    }
}
