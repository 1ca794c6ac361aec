use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use tracing::{debug, info, warn};

/// One preset resource, identified by its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresetEntry(PathBuf);

impl PresetEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PresetEntry(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File stem, used for log lines.
    pub fn name(&self) -> String {
        self.0
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for PresetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Presets found under a root directory, in their rotation order.
///
/// The order is a uniform shuffle computed once per load and never touched
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    root: Option<PathBuf>,
    entries: Vec<PresetEntry>,
}

impl PresetCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a catalog that keeps `entries` in the given order.
    pub fn from_entries(entries: Vec<PresetEntry>) -> Self {
        Self {
            root: None,
            entries,
        }
    }

    /// Scans `root` and shuffles with a freshly seeded generator.
    pub fn load(root: &Path, extension: &str) -> Self {
        let mut rng = StdRng::from_entropy();
        Self::load_with_rng(root, extension, &mut rng)
    }

    /// Scans `root` and shuffles with the supplied generator.
    ///
    /// A missing or unreadable directory yields an empty catalog.
    pub fn load_with_rng<R: Rng + ?Sized>(root: &Path, extension: &str, rng: &mut R) -> Self {
        let mut entries = match discover_presets(root, extension) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    path = %root.display(),
                    error = %err,
                    "preset directory unavailable; continuing without presets"
                );
                Vec::new()
            }
        };
        info!(
            path = %root.display(),
            count = entries.len(),
            "found preset files"
        );
        entries.shuffle(rng);
        Self {
            root: Some(root.to_path_buf()),
            entries,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PresetEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[PresetEntry] {
        &self.entries
    }
}

/// Recursively collects files under `root` whose extension matches, sorted by path.
pub fn discover_presets(root: &Path, extension: &str) -> io::Result<Vec<PresetEntry>> {
    let meta = fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        ));
    }

    let extension = extension.trim().trim_start_matches('.');
    let mut found = Vec::new();
    collect(root, extension, &mut found)?;
    found.sort();
    Ok(found.into_iter().map(PresetEntry).collect())
}

fn collect(dir: &Path, extension: &str, found: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if let Err(err) = collect(&path, extension, found) {
                debug!(path = %path.display(), error = %err, "skipping unreadable preset subdirectory");
            }
            continue;
        }

        // Symlinked files count; symlinked directories are not followed.
        let is_file = file_type.is_file()
            || (file_type.is_symlink() && fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false));
        if is_file && has_extension(&path, extension) {
            found.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}
