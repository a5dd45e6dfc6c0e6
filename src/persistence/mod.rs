//! Setup files on disk
//!
//! Setups are stored in the compact binary form of [`Setup::write_to`].
//! Ranked survivors go to `<dir>/NNN.setup`, NNN being the zero-padded rank.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SetupFileError;
use crate::setup::Setup;

/// Extension of setup files
pub const SETUP_EXTENSION: &str = "setup";

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SetupFileError + '_ {
    move |source| SetupFileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File name for the survivor at `rank` (0 = best)
pub fn ranked_path(dir: impl AsRef<Path>, rank: usize) -> PathBuf {
    dir.as_ref().join(format!("{rank:03}.{SETUP_EXTENSION}"))
}

/// Write one setup
pub fn save_setup(path: impl AsRef<Path>, setup: &Setup) -> Result<(), SetupFileError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    setup.write_to(&mut writer).map_err(io_error(path))?;
    writer.flush().map_err(io_error(path))?;
    log::debug!(
        "Saved setup ({} platforms) to {}",
        setup.platforms.len(),
        path.display()
    );
    Ok(())
}

/// Read one setup
pub fn load_setup(path: impl AsRef<Path>) -> Result<Setup, SetupFileError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(io_error(path))?;
    let setup = Setup::read_from(&mut BufReader::new(file))?;
    log::info!(
        "Loaded setup ({} platforms) from {}",
        setup.platforms.len(),
        path.display()
    );
    Ok(setup)
}

/// Write `setups` in rank order, creating `dir` if needed
///
/// Returns how many files were written.
pub fn save_ranked(dir: impl AsRef<Path>, setups: &[Setup]) -> Result<usize, SetupFileError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    for (rank, setup) in setups.iter().enumerate() {
        save_setup(ranked_path(dir, rank), setup)?;
    }
    log::info!("Saved {} ranked setups to {}", setups.len(), dir.display());
    Ok(setups.len())
}

/// Read ranks `0..count` from `dir`, skipping files that are missing or
/// unreadable
pub fn load_ranked(dir: impl AsRef<Path>, count: usize) -> Vec<Setup> {
    let dir = dir.as_ref();
    (0..count)
        .filter_map(|rank| {
            let path = ranked_path(dir, rank);
            if !path.exists() {
                return None;
            }
            load_setup(&path)
                .map_err(|err| log::warn!("Skipping {}: {err}", path.display()))
                .ok()
        })
        .collect()
}
