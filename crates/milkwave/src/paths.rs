use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;
use tracing::warn;

pub const ENV_CONFIG_DIR: &str = "MILKWAVE_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "milkwave.toml";
pub const SYSTEM_TEXTURE_DIR: &str = "/usr/share/projectM/textures";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Milkwave";
const APPLICATION: &str = "milkwave";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    exe_dir: Option<PathBuf>,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_dir = match env_override(ENV_CONFIG_DIR) {
            Some(dir) => dir,
            None => ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
                .ok_or_else(|| anyhow!("failed to determine user directories"))?
                .config_dir()
                .to_path_buf(),
        };
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Ok(Self {
            config_dir,
            exe_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Presets shipped alongside the binary: `<exe dir>/../presets`.
    pub fn default_preset_dir(&self) -> PathBuf {
        match &self.exe_dir {
            Some(dir) => dir.join("..").join("presets"),
            None => PathBuf::from("presets"),
        }
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, exe_dir: Option<PathBuf>) -> Self {
        Self {
            config_dir,
            exe_dir,
        }
    }
}

/// Texture search order used when neither the CLI nor the config names any.
pub fn default_texture_paths(preset_dir: &Path) -> Vec<PathBuf> {
    vec![
        preset_dir.join("Textures"),
        PathBuf::from(SYSTEM_TEXTURE_DIR),
    ]
}

/// Resolves a user-supplied audio path, retrying relative to `cwd`.
///
/// Returns `None` (after a warning) when neither location holds a file, in
/// which case the synthetic source is used.
pub fn resolve_audio_path(requested: &Path, cwd: &Path) -> Option<PathBuf> {
    if requested.is_file() {
        return Some(requested.to_path_buf());
    }
    let candidate = cwd.join(requested);
    if candidate.is_file() {
        return Some(candidate);
    }
    warn!(
        path = %requested.display(),
        cwd = %cwd.display(),
        "audio file not found; falling back to synthetic audio"
    );
    None
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
