//! Startup checks for the directories handed to the engine.
//!
//! Nothing here is fatal: a bad path is reported and the renderer carries on
//! with whatever is usable.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// How many file names are listed for a healthy texture directory.
const TEXTURE_SAMPLE_NAMES: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{kind} directory {} does not exist", path.display())]
    Missing { kind: &'static str, path: PathBuf },
    #[error("{kind} path {} is not a directory", path.display())]
    NotADirectory { kind: &'static str, path: PathBuf },
    #[error("{kind} directory {} is not readable: {reason}", path.display())]
    Unreadable {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },
}

/// Result of inspecting one texture search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureDiagnosis {
    Empty,
    /// Directory has `total` entries; `samples` lists the first few file names.
    Populated { total: usize, samples: Vec<String> },
}

/// Inspects one texture directory.
pub fn inspect_texture_path(path: &Path) -> Result<TextureDiagnosis, ConfigurationError> {
    let entries = read_directory("texture", path)?;
    if entries.is_empty() {
        return Ok(TextureDiagnosis::Empty);
    }
    let samples = entries
        .iter()
        .filter(|entry| entry.is_file())
        .take(TEXTURE_SAMPLE_NAMES)
        .filter_map(|entry| entry.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    Ok(TextureDiagnosis::Populated {
        total: entries.len(),
        samples,
    })
}

/// Logs the state of every texture search path in order.
pub fn log_texture_paths(paths: &[PathBuf]) {
    if paths.is_empty() {
        info!("no texture search paths configured");
        return;
    }
    for (index, path) in paths.iter().enumerate() {
        match inspect_texture_path(path) {
            Ok(TextureDiagnosis::Empty) => {
                warn!(index, path = %path.display(), "texture directory is empty");
            }
            Ok(TextureDiagnosis::Populated { total, samples }) => {
                info!(
                    index,
                    path = %path.display(),
                    entries = total,
                    sample = ?samples,
                    "texture directory available"
                );
            }
            Err(err) => warn!(index, "{err}"),
        }
    }
}

/// Confirms the preset root is a readable directory.
pub fn check_preset_directory(path: &Path) -> Result<(), ConfigurationError> {
    read_directory("preset", path).map(|_| ())
}

fn read_directory(kind: &'static str, path: &Path) -> Result<Vec<PathBuf>, ConfigurationError> {
    let meta = fs::metadata(path).map_err(|_| ConfigurationError::Missing {
        kind,
        path: path.to_path_buf(),
    })?;
    if !meta.is_dir() {
        return Err(ConfigurationError::NotADirectory {
            kind,
            path: path.to_path_buf(),
        });
    }
    let unreadable = |err: std::io::Error| ConfigurationError::Unreadable {
        kind,
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    let mut entries = fs::read_dir(path)
        .map_err(unreadable)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}
