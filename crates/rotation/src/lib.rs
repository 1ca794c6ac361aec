//! Preset discovery and rotation.
//!
//! `PresetCatalog` walks a preset directory and fixes one shuffled rotation
//! order per load. `PresetRotation` owns the cursor into that order and is the
//! only place that decides which preset the engine should show next; every
//! transition is pushed through a [`PresetLoader`] so the cursor and the
//! engine never drift apart. `IntervalTimer` provides the deadlines that drive
//! both the frame cadence and automatic rotation.

mod catalog;
mod controller;
mod timer;

pub use catalog::{discover_presets, PresetCatalog, PresetEntry};
pub use controller::{PresetLoader, PresetRotation, PresetTarget, RotationState};
pub use timer::IntervalTimer;

/// Identifier engines understand as "show the built-in idle visual".
pub const IDLE_PRESET: &str = "idle://";
