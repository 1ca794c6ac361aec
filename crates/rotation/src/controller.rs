use std::fmt;
use std::path::Path;

use tracing::info;

use crate::catalog::{PresetCatalog, PresetEntry};
use crate::IDLE_PRESET;

/// What the engine is asked to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetTarget<'a> {
    Entry(&'a PresetEntry),
    Idle,
}

impl fmt::Display for PresetTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetTarget::Entry(entry) => write!(f, "{entry}"),
            PresetTarget::Idle => f.write_str(IDLE_PRESET),
        }
    }
}

/// Receiver of preset load requests, normally the visualization engine.
pub trait PresetLoader {
    type Error: fmt::Display;

    fn load_preset(&mut self, target: PresetTarget<'_>) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Empty,
    Positioned(usize),
}

/// Cursor over a catalog's rotation order.
///
/// Manual navigation and timer-driven rotation share the same transitions;
/// each transition issues exactly one load request for the new cursor.
#[derive(Debug, Clone)]
pub struct PresetRotation {
    catalog: PresetCatalog,
    state: RotationState,
}

impl Default for PresetRotation {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetRotation {
    pub fn new() -> Self {
        Self {
            catalog: PresetCatalog::empty(),
            state: RotationState::Empty,
        }
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn current(&self) -> Option<&PresetEntry> {
        match self.state {
            RotationState::Empty => None,
            RotationState::Positioned(index) => self.catalog.get(index),
        }
    }

    /// Rescans `root`, resets the cursor and loads the first preset
    /// (or the idle preset when nothing was found).
    pub fn load_catalog<L>(
        &mut self,
        root: &Path,
        extension: &str,
        loader: &mut L,
    ) -> Result<RotationState, L::Error>
    where
        L: PresetLoader + ?Sized,
    {
        self.install(PresetCatalog::load(root, extension), loader)
    }

    /// Replaces the catalog with an already built one; see [`load_catalog`](Self::load_catalog).
    pub fn install<L>(
        &mut self,
        catalog: PresetCatalog,
        loader: &mut L,
    ) -> Result<RotationState, L::Error>
    where
        L: PresetLoader + ?Sized,
    {
        self.catalog = catalog;
        self.state = if self.catalog.is_empty() {
            RotationState::Empty
        } else {
            RotationState::Positioned(0)
        };
        match self.current() {
            Some(entry) => {
                info!(preset = %entry, "loading initial preset");
                loader.load_preset(PresetTarget::Entry(entry))?;
            }
            None => {
                info!("no presets found; using idle preset");
                loader.load_preset(PresetTarget::Idle)?;
            }
        }
        Ok(self.state)
    }

    /// Moves forward one preset, wrapping at the end. No-op when empty.
    pub fn advance<L>(&mut self, loader: &mut L) -> Result<Option<&PresetEntry>, L::Error>
    where
        L: PresetLoader + ?Sized,
    {
        self.step(loader, next_index, "next")
    }

    /// Moves back one preset, wrapping at the start. No-op when empty.
    pub fn retreat<L>(&mut self, loader: &mut L) -> Result<Option<&PresetEntry>, L::Error>
    where
        L: PresetLoader + ?Sized,
    {
        self.step(loader, previous_index, "previous")
    }

    /// Automatic rotation; identical to [`advance`](Self::advance).
    pub fn tick<L>(&mut self, loader: &mut L) -> Result<Option<&PresetEntry>, L::Error>
    where
        L: PresetLoader + ?Sized,
    {
        self.advance(loader)
    }

    fn step<L>(
        &mut self,
        loader: &mut L,
        mv: fn(usize, usize) -> usize,
        label: &'static str,
    ) -> Result<Option<&PresetEntry>, L::Error>
    where
        L: PresetLoader + ?Sized,
    {
        let RotationState::Positioned(index) = self.state else {
            return Ok(None);
        };
        let len = self.catalog.len();
        if len == 0 {
            self.state = RotationState::Empty;
            return Ok(None);
        }
        let index = mv(index, len);
        self.state = RotationState::Positioned(index);
        let entry = &self.catalog.entries()[index];
        info!(preset = %entry, direction = label, "loading preset");
        loader.load_preset(PresetTarget::Entry(entry))?;
        Ok(Some(entry))
    }
}

fn next_index(index: usize, len: usize) -> usize {
    (index + 1) % len
}

fn previous_index(index: usize, len: usize) -> usize {
    (index + len - 1) % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingLoader {
        loads: Vec<String>,
        fail: bool,
    }

    impl PresetLoader for RecordingLoader {
        type Error = String;

        fn load_preset(&mut self, target: PresetTarget<'_>) -> Result<(), String> {
            self.loads.push(target.to_string());
            if self.fail {
                Err(format!("cannot load {target}"))
            } else {
                Ok(())
            }
        }
    }

    fn catalog(len: usize) -> PresetCatalog {
        PresetCatalog::from_entries(
            (0..len)
                .map(|i| PresetEntry::new(format!("/presets/p{i}.milk")))
                .collect(),
        )
    }

    fn positioned(len: usize) -> (PresetRotation, RecordingLoader) {
        let mut rotation = PresetRotation::new();
        let mut loader = RecordingLoader::default();
        rotation.install(catalog(len), &mut loader).unwrap();
        (rotation, loader)
    }

    #[test]
    fn install_positions_at_first_entry() {
        let (rotation, loader) = positioned(3);
        assert_eq!(rotation.state(), RotationState::Positioned(0));
        assert_eq!(loader.loads, vec!["/presets/p0.milk"]);
    }

    #[test]
    fn empty_catalog_loads_idle_exactly_once() {
        let mut rotation = PresetRotation::new();
        let mut loader = RecordingLoader::default();
        let state = rotation.install(PresetCatalog::empty(), &mut loader).unwrap();
        assert_eq!(state, RotationState::Empty);
        assert_eq!(loader.loads, vec![IDLE_PRESET]);

        assert!(rotation.advance(&mut loader).unwrap().is_none());
        assert!(rotation.retreat(&mut loader).unwrap().is_none());
        assert!(rotation.tick(&mut loader).unwrap().is_none());
        assert_eq!(loader.loads.len(), 1);
        assert_eq!(rotation.state(), RotationState::Empty);
    }

    #[test]
    fn advance_wraps_forward() {
        let (mut rotation, mut loader) = positioned(3);
        for _ in 0..3 {
            rotation.advance(&mut loader).unwrap();
        }
        assert_eq!(rotation.state(), RotationState::Positioned(0));
        assert_eq!(
            loader.loads,
            vec![
                "/presets/p0.milk",
                "/presets/p1.milk",
                "/presets/p2.milk",
                "/presets/p0.milk"
            ]
        );
    }

    #[test]
    fn retreat_wraps_backward() {
        let (mut rotation, mut loader) = positioned(4);
        let entry = rotation.retreat(&mut loader).unwrap().cloned();
        assert_eq!(rotation.state(), RotationState::Positioned(3));
        assert_eq!(entry, Some(PresetEntry::new("/presets/p3.milk")));
    }

    #[test]
    fn advance_and_retreat_are_inverse() {
        for len in 1..6 {
            for start in 0..len {
                let (mut rotation, mut loader) = positioned(len);
                for _ in 0..start {
                    rotation.advance(&mut loader).unwrap();
                }
                assert_eq!(rotation.state(), RotationState::Positioned(start));
                rotation.advance(&mut loader).unwrap();
                rotation.retreat(&mut loader).unwrap();
                assert_eq!(rotation.state(), RotationState::Positioned(start));
            }
        }
    }

    #[test]
    fn cursor_stays_in_bounds_and_matches_last_load() {
        let (mut rotation, mut loader) = positioned(5);
        let moves = [0u8, 1, 1, 2, 0, 0, 0, 1, 2, 2, 2, 2, 1, 0, 2, 1, 1, 1, 1, 1, 1];
        for mv in moves {
            match mv {
                0 => rotation.advance(&mut loader).unwrap(),
                1 => rotation.retreat(&mut loader).unwrap(),
                _ => rotation.tick(&mut loader).unwrap(),
            };
            let RotationState::Positioned(index) = rotation.state() else {
                panic!("rotation lost its position");
            };
            assert!(index < 5);
            let current = rotation.current().unwrap().to_string();
            assert_eq!(loader.loads.last(), Some(&current));
        }
        assert_eq!(loader.loads.len(), moves.len() + 1);
    }

    #[test]
    fn single_entry_reloads_itself() {
        let (mut rotation, mut loader) = positioned(1);
        rotation.tick(&mut loader).unwrap();
        assert_eq!(rotation.state(), RotationState::Positioned(0));
        assert_eq!(loader.loads.len(), 2);
    }

    #[test]
    fn failed_load_still_moves_cursor() {
        let (mut rotation, mut loader) = positioned(3);
        loader.fail = true;
        assert!(rotation.advance(&mut loader).is_err());
        assert_eq!(rotation.state(), RotationState::Positioned(1));
        loader.fail = false;
        rotation.advance(&mut loader).unwrap();
        assert_eq!(rotation.state(), RotationState::Positioned(2));
    }

    #[test]
    fn reload_resets_cursor() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("only.milk"), "").unwrap();
        let (mut rotation, mut loader) = positioned(4);
        rotation.advance(&mut loader).unwrap();
        let state = rotation
            .load_catalog(dir.path(), "milk", &mut loader)
            .unwrap();
        assert_eq!(state, RotationState::Positioned(0));
        assert_eq!(rotation.len(), 1);
        assert_eq!(rotation.current().unwrap().name(), "only");
    }
}
