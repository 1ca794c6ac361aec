use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineSettings;
use crate::surface::SurfaceDimensions;

/// Immutable configuration passed to the renderer at start-up.
///
/// Mirrors the merged config file and CLI flags; runtime changes go through
/// the [`RenderScheduler`](crate::RenderScheduler) setters instead.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Window title.
    pub title: String,
    /// Initial window size in physical pixels.
    pub surface_size: SurfaceDimensions,
    /// Target frame rate of the frame timer.
    pub fps: u32,
    /// Requested MSAA sample count; the closest available config wins.
    pub samples: u8,
    /// Per-pixel mesh resolution handed to the engine.
    pub mesh: (u32, u32),
    /// Root scanned recursively for presets.
    pub preset_dir: PathBuf,
    /// Preset file extension, without the dot.
    pub preset_extension: String,
    /// Period of automatic preset rotation.
    pub preset_duration: Duration,
    /// Hard-cut duration forwarded to the engine.
    pub hard_cut_duration: Duration,
    /// Ordered texture search paths; first match wins.
    pub texture_paths: Vec<PathBuf>,
    /// Audio file to visualize; `None` selects synthetic audio.
    pub audio_path: Option<PathBuf>,
    /// Frames forwarded to the engine per tick.
    pub chunk_frames: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "milkwave".into(),
            surface_size: SurfaceDimensions::new(800, 600),
            fps: 60,
            samples: 4,
            mesh: (32, 24),
            preset_dir: PathBuf::from("presets"),
            preset_extension: "milk".into(),
            preset_duration: Duration::from_secs(30),
            hard_cut_duration: Duration::from_secs(15),
            texture_paths: Vec::new(),
            audio_path: None,
            chunk_frames: audiofeed::DEFAULT_CHUNK_FRAMES,
        }
    }
}

impl RendererConfig {
    pub(crate) fn engine_settings(&self, dimensions: SurfaceDimensions) -> EngineSettings {
        EngineSettings {
            dimensions,
            mesh: self.mesh,
            fps: self.fps,
            preset_duration: self.preset_duration,
            hard_cut_duration: self.hard_cut_duration,
            texture_paths: self.texture_paths.clone(),
        }
    }
}

pub(crate) fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_interval_follows_fps() {
        assert_eq!(
            frame_interval(RendererConfig::default().fps),
            Duration::from_nanos(16_666_666)
        );
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }
}
