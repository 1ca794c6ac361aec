//! Renderer crate for milkwave.
//!
//! Owns the OpenGL window, the visualization engine lifecycle and the two
//! periodic tasks that drive it. The overall flow is:
//!
//! ```text
//!   CLI / milkwave
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ OpenGlSurface + ScopeEngine factory ──▶ RenderScheduler
//!                                                              │
//!          winit event loop ── expose / resize / keys ─────────┤
//!                           └─ AboutToWait: poll(now) ──▶ frame tick ─▶ AudioFeedPipeline ─▶ engine
//!                                                      └▶ rotation tick ─▶ PresetRotation ─▶ engine
//! ```
//!
//! [`RenderScheduler`] is generic over [`RenderSurface`] and takes the engine
//! as a boxed factory, so its state machine runs unchanged against in-memory
//! doubles in tests. [`ScopeEngine`] is the bundled [`VisualEngine`]: an
//! oscilloscope that reacts to the fed audio and to preset changes.

mod context;
pub mod diagnostics;
mod engine;
mod fps;
mod scheduler;
mod scope;
mod surface;
mod types;
mod window;

use anyhow::Result;

pub use context::OpenGlSurface;
pub use diagnostics::{ConfigurationError, TextureDiagnosis};
pub use engine::{configure, EngineError, EngineFactory, EngineSettings, VisualEngine};
pub use fps::{FpsCounter, FPS_WINDOW};
pub use scheduler::{FrameOutcome, Navigation, RenderScheduler, SchedulerState};
pub use scope::{Palette, ScopeEngine};
pub use surface::{with_current, ContextError, CurrentGuard, RenderSurface, SurfaceDimensions};
pub use types::RendererConfig;
pub use window::navigation_for_key;

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the visualizer window and blocks until it is closed.
    pub fn run(self) -> Result<()> {
        window::run_window(self.config)
    }
}
