use std::path::PathBuf;
use std::time::Duration;

use audiofeed::PcmSink;
use rotation::{PresetLoader, PresetTarget};
use thiserror::Error;

use crate::surface::{ContextError, SurfaceDimensions};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to construct visualization engine: {0}")]
    Construction(String),
    #[error("failed to load preset {preset}: {reason}")]
    PresetLoad { preset: String, reason: String },
    #[error("frame render failed: {0}")]
    Render(String),
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Everything the engine is configured with right after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub dimensions: SurfaceDimensions,
    pub mesh: (u32, u32),
    pub fps: u32,
    pub preset_duration: Duration,
    pub hard_cut_duration: Duration,
    pub texture_paths: Vec<PathBuf>,
}

/// Capability surface of the visualization engine.
///
/// Every method must be called with the owning surface's context current.
pub trait VisualEngine {
    fn set_window_size(&mut self, dimensions: SurfaceDimensions);
    fn set_mesh_size(&mut self, width: u32, height: u32);
    fn set_fps(&mut self, fps: u32);
    fn set_preset_duration(&mut self, duration: Duration);
    fn set_hard_cut_duration(&mut self, duration: Duration);
    fn set_texture_paths(&mut self, paths: &[PathBuf]);
    fn load_preset(&mut self, target: PresetTarget<'_>) -> Result<(), EngineError>;
    /// Audio ingest; `None` while the engine cannot accept samples.
    fn pcm(&mut self) -> Option<&mut dyn PcmSink>;
    fn render_frame(&mut self) -> Result<(), EngineError>;
    /// Releases GPU resources. Called once, before the context goes away.
    fn destroy(&mut self);
}

/// Builds a fresh engine; invoked with the context current.
pub type EngineFactory = Box<dyn FnMut(&EngineSettings) -> Result<Box<dyn VisualEngine>, EngineError>>;

/// Pushes the full settings block into a freshly built engine.
pub fn configure(engine: &mut dyn VisualEngine, settings: &EngineSettings) {
    engine.set_window_size(settings.dimensions);
    engine.set_mesh_size(settings.mesh.0, settings.mesh.1);
    engine.set_fps(settings.fps);
    engine.set_preset_duration(settings.preset_duration);
    engine.set_hard_cut_duration(settings.hard_cut_duration);
    engine.set_texture_paths(&settings.texture_paths);
}

/// Routes rotation load requests into an engine.
pub(crate) struct EngineLoader<'a>(pub &'a mut dyn VisualEngine);

impl PresetLoader for EngineLoader<'_> {
    type Error = EngineError;

    fn load_preset(&mut self, target: PresetTarget<'_>) -> Result<(), EngineError> {
        self.0.load_preset(target)
    }
}
