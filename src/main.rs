//! Bounce Evolve headless runner
//!
//! Seeds a population (or resumes one from the output directory), runs the
//! requested number of generations and leaves the ranked survivors on disk.
//!
//! Usage: `bounce-evolve [GENERATIONS]`, settings from `$BOUNCE_SETTINGS`.

use std::env;
use std::process::ExitCode;

use bounce_evolve::sim::SimState;
use bounce_evolve::{Evolution, Settings};

const DEFAULT_SETTINGS_PATH: &str = "settings.json";
const DEFAULT_GENERATIONS: u32 = 10;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Bounce Evolve starting...");

    let settings_path =
        env::var("BOUNCE_SETTINGS").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());
    let settings = Settings::load_or_default(&settings_path);

    let generations = match env::args().nth(1) {
        None => DEFAULT_GENERATIONS,
        Some(arg) => match arg.parse::<u32>() {
            Ok(count) => count,
            Err(_) => {
                log::error!("Expected a generation count, got {arg:?}");
                return ExitCode::from(2);
            }
        },
    };

    let mut sim = SimState::new(&settings.physics);
    let mut evolution = match Evolution::new(&settings.evolution) {
        Ok(evolution) => evolution,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::from(2);
        }
    };
    let output_dir = settings.evolution.output_dir.clone();
    if evolution.load_survivors(&mut sim, &output_dir) == 0 {
        log::info!("Seeded with seed: {}", settings.evolution.seed);
        evolution.start_evolution(&mut sim);
    }

    for _ in 0..generations {
        evolution.start_generation();
        while !evolution.score_one(&mut sim) {}
        evolution.finish_generation();
    }

    if let Some(best) = evolution.best() {
        log::info!(
            "Best setup: score {:.3} in {:.2}s, {} platforms, cost {:.2}, {} mutations",
            best.score,
            best.total_time,
            best.platforms.len(),
            best.cost(&settings.costs),
            best.mutation_count
        );
    }
    log::info!("Survivors written to {}", output_dir.display());
    ExitCode::SUCCESS
}
