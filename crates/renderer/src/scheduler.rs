//! Orchestrates the engine lifecycle, the frame cadence and preset rotation.
//!
//! ```text
//!   expose ──▶ Initializing ──▶ Running ──poll──▶ frame tick ─▶ audio tick ─▶ render ─▶ present
//!                  │                 │                 rotation tick ─▶ load preset
//!                  ▼                 └─ resize / navigate / setters (outside the cadence)
//!                Failed ──retry──▶ Uninitialized
//! ```
//!
//! Every engine call happens inside [`with_current`], so the context is
//! released on all exit paths and the engine never outlives its context.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use audiofeed::{AudioFeedPipeline, FeedStatus};
use rotation::{IntervalTimer, PresetLoader, PresetRotation, PresetTarget};
use tracing::{debug, error, info, trace, warn};

use crate::diagnostics;
use crate::engine::{configure, EngineError, EngineFactory, EngineLoader, VisualEngine};
use crate::fps::FpsCounter;
use crate::surface::{with_current, RenderSurface, SurfaceDimensions};
use crate::types::{frame_interval, RendererConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Initializing,
    Running,
    Failed,
}

/// Manual preset navigation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The engine reported an error; the buffer was still swapped.
    RenderFailed,
    PresentFailed,
    ContextUnavailable,
    /// Not running, so nothing was drawn.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Advance,
    Retreat,
    Tick,
}

/// Single owner of the surface, the engine handle and all periodic state.
pub struct RenderScheduler<S: RenderSurface> {
    surface: S,
    factory: EngineFactory,
    engine: Option<Box<dyn VisualEngine>>,
    state: SchedulerState,
    config: RendererConfig,
    audio: AudioFeedPipeline,
    rotation: PresetRotation,
    frame_timer: IntervalTimer,
    rotation_timer: IntervalTimer,
    fps: FpsCounter,
    occluded: bool,
    context_lost: bool,
    failure: Option<String>,
}

impl<S: RenderSurface> RenderScheduler<S> {
    pub fn new(surface: S, factory: EngineFactory, config: RendererConfig) -> Self {
        let mut audio = AudioFeedPipeline::new(config.chunk_frames);
        audio.set_audio_file(config.audio_path.clone());
        Self {
            surface,
            factory,
            engine: None,
            state: SchedulerState::Uninitialized,
            audio,
            rotation: PresetRotation::new(),
            frame_timer: IntervalTimer::new(frame_interval(config.fps)),
            rotation_timer: IntervalTimer::new(config.preset_duration),
            fps: FpsCounter::default(),
            occluded: false,
            context_lost: false,
            failure: None,
            config,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Reason of the last failed initialization, cleared once running.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn dimensions(&self) -> SurfaceDimensions {
        self.surface.dimensions()
    }

    pub fn rotation(&self) -> &PresetRotation {
        &self.rotation
    }

    pub fn audio_status(&self) -> FeedStatus {
        self.audio.status()
    }

    pub fn preset_duration(&self) -> Duration {
        self.config.preset_duration
    }

    pub fn is_occluded(&self) -> bool {
        self.occluded
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps.last()
    }

    /// Earliest timer deadline, or `None` when nothing is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.frame_timer.next_deadline(),
            self.rotation_timer.next_deadline(),
        ) {
            (Some(frame), Some(rotation)) => Some(frame.min(rotation)),
            (frame, rotation) => frame.or(rotation),
        }
    }

    /// The surface became visible; the first exposure builds the engine.
    pub fn expose(&mut self, now: Instant) -> SchedulerState {
        if self.state == SchedulerState::Uninitialized {
            self.initialize(now);
        }
        self.state
    }

    /// Moves a failed scheduler back to `Uninitialized`.
    pub fn reset(&mut self) -> bool {
        if self.state != SchedulerState::Failed {
            return false;
        }
        info!("resetting renderer after failed initialization");
        self.state = SchedulerState::Uninitialized;
        true
    }

    /// Resets a failed scheduler and immediately tries to initialize again.
    pub fn retry(&mut self, now: Instant) -> SchedulerState {
        self.reset();
        self.expose(now)
    }

    fn initialize(&mut self, now: Instant) {
        self.state = SchedulerState::Initializing;
        let dimensions = self.surface.dimensions();
        info!(size = %dimensions, "initializing visualization engine");

        diagnostics::log_texture_paths(&self.config.texture_paths);
        if let Err(err) = diagnostics::check_preset_directory(&self.config.preset_dir) {
            warn!("{err}; falling back to the idle preset");
        }

        let settings = self.config.engine_settings(dimensions);
        let factory = &mut self.factory;
        let rotation = &mut self.rotation;
        let config = &self.config;
        let built = with_current(&mut self.surface, |_| -> Result<_, EngineError> {
            let mut engine = factory(&settings)?;
            configure(engine.as_mut(), &settings);
            if let Err(err) = load_initial_preset(rotation, config, engine.as_mut()) {
                engine.destroy();
                return Err(err);
            }
            Ok(engine)
        });

        let engine = match built {
            Ok(Ok(engine)) => engine,
            Ok(Err(err)) => return self.fail(err.to_string()),
            Err(err) => return self.fail(err.to_string()),
        };

        self.engine = Some(engine);
        self.audio.activate();
        self.frame_timer.restart(frame_interval(self.config.fps), now);
        self.rotation_timer
            .restart(self.config.preset_duration, now);
        self.fps.reset(now);
        self.failure = None;
        self.state = SchedulerState::Running;
        info!(
            presets = self.rotation.len(),
            fps = self.config.fps,
            preset_duration = ?self.config.preset_duration,
            "renderer running"
        );
    }

    fn fail(&mut self, reason: String) {
        error!(reason = %reason, "renderer initialization failed");
        self.engine = None;
        self.frame_timer.stop();
        self.rotation_timer.stop();
        self.failure = Some(reason);
        self.state = SchedulerState::Failed;
    }

    /// Fires due timers and returns the next deadline to wait for.
    pub fn poll(&mut self, now: Instant) -> Option<Instant> {
        if self.state != SchedulerState::Running {
            return None;
        }
        if self.frame_timer.poll(now) {
            if self.occluded {
                trace!("surface occluded; skipping frame");
            } else {
                self.render_frame(now);
            }
        }
        if self.rotation_timer.poll(now) {
            self.step(Step::Tick);
        }
        self.next_deadline()
    }

    /// One frame: feed audio, render, present. Errors never escape the tick.
    pub fn render_frame(&mut self, now: Instant) -> FrameOutcome {
        if self.state != SchedulerState::Running {
            return FrameOutcome::Skipped;
        }
        let Some(engine) = self.engine.as_mut() else {
            return FrameOutcome::Skipped;
        };

        let audio = &mut self.audio;
        let drawn = with_current(&mut self.surface, |surface| {
            audio.tick(engine.pcm());
            let rendered = engine.render_frame();
            if let Err(err) = &rendered {
                error!(error = %err, "frame render failed");
            }
            match (rendered, surface.present()) {
                (Ok(()), Ok(())) => FrameOutcome::Presented,
                (Err(_), _) => FrameOutcome::RenderFailed,
                (Ok(()), Err(err)) => {
                    warn!(error = %err, "failed to present frame");
                    FrameOutcome::PresentFailed
                }
            }
        });

        let outcome = match drawn {
            Ok(outcome) => {
                if self.context_lost {
                    info!("rendering context available again");
                    self.context_lost = false;
                }
                outcome
            }
            Err(err) => {
                if self.context_lost {
                    trace!(error = %err, "skipping frame");
                } else {
                    error!(error = %err, "rendering context unavailable; skipping frames");
                    self.context_lost = true;
                }
                FrameOutcome::ContextUnavailable
            }
        };
        if outcome == FrameOutcome::Presented {
            self.fps.record(now);
        }
        outcome
    }

    /// Records a new surface size and forwards it to a running engine.
    ///
    /// Returns false for zero-sized surfaces, which are ignored.
    pub fn resize(&mut self, dimensions: SurfaceDimensions) -> bool {
        if dimensions.is_empty() {
            debug!(size = %dimensions, "ignoring zero-sized resize");
            return false;
        }
        self.surface.resize(dimensions);
        if self.state != SchedulerState::Running {
            return true;
        }
        if let Some(engine) = self.engine.as_mut() {
            if let Err(err) = with_current(&mut self.surface, |_| {
                engine.set_window_size(dimensions)
            }) {
                warn!(error = %err, size = %dimensions, "could not resize engine");
            }
        }
        true
    }

    /// Manual navigation; restarts the rotation timer on success.
    pub fn navigate(&mut self, direction: Navigation, now: Instant) -> bool {
        if self.state != SchedulerState::Running {
            debug!(?direction, "ignoring navigation before the renderer is running");
            return false;
        }
        let step = match direction {
            Navigation::Next => Step::Advance,
            Navigation::Previous => Step::Retreat,
        };
        let moved = self.step(step);
        if moved {
            self.rotation_timer
                .restart(self.config.preset_duration, now);
        }
        moved
    }

    fn step(&mut self, step: Step) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        let rotation = &mut self.rotation;
        let moved = with_current(&mut self.surface, |_| {
            let mut loader = EngineLoader(engine.as_mut());
            let moved = match step {
                Step::Advance => rotation.advance(&mut loader),
                Step::Retreat => rotation.retreat(&mut loader),
                Step::Tick => rotation.tick(&mut loader),
            };
            moved.map(|entry| entry.is_some())
        });
        match moved {
            Ok(Ok(moved)) => moved,
            Ok(Err(err)) => {
                // The cursor has moved; the next step loads its successor.
                warn!(error = %err, "preset failed to load");
                true
            }
            Err(err) => {
                warn!(error = %err, "skipping preset change");
                false
            }
        }
    }

    /// Changes the rotation period; a running rotation restarts from `now`.
    pub fn set_preset_duration(&mut self, duration: Duration, now: Instant) {
        info!(duration = ?duration, "preset duration changed");
        self.config.preset_duration = duration;
        if self.state != SchedulerState::Running {
            self.rotation_timer.set_period(duration, now);
            return;
        }
        self.rotation_timer.restart(duration, now);
        if let Some(engine) = self.engine.as_mut() {
            if let Err(err) = with_current(&mut self.surface, |_| {
                engine.set_preset_duration(duration)
            }) {
                warn!(error = %err, "could not update engine preset duration");
            }
        }
    }

    /// Switches the visualized audio file; `None` selects synthetic audio.
    pub fn set_audio_file(&mut self, path: Option<PathBuf>) {
        self.audio.set_audio_file(path);
    }

    /// Replaces the texture search paths and forwards them when running.
    pub fn set_texture_paths(&mut self, paths: Vec<PathBuf>) {
        diagnostics::log_texture_paths(&paths);
        self.config.texture_paths = paths;
        if self.state != SchedulerState::Running {
            return;
        }
        let paths = &self.config.texture_paths;
        if let Some(engine) = self.engine.as_mut() {
            if let Err(err) = with_current(&mut self.surface, |_| {
                engine.set_texture_paths(paths)
            }) {
                warn!(error = %err, "could not update engine texture paths");
            }
        }
    }

    pub fn set_occluded(&mut self, occluded: bool) {
        if self.occluded != occluded {
            debug!(occluded, "surface visibility changed");
        }
        self.occluded = occluded;
    }

    /// Destroys the engine (with the context current), closes the audio
    /// source and stops both timers. Safe to call in any state.
    pub fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            match with_current(&mut self.surface, |_| engine.destroy()) {
                Ok(()) => debug!("visualization engine destroyed"),
                Err(err) => warn!(error = %err, "dropping engine without a current context"),
            }
        }
        self.audio.close();
        self.frame_timer.stop();
        self.rotation_timer.stop();
        if self.state != SchedulerState::Uninitialized {
            info!("renderer shut down");
        }
        self.state = SchedulerState::Uninitialized;
    }
}

impl<S: RenderSurface> Drop for RenderScheduler<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Loads the first catalog entry, or the idle preset when there is none or
/// the first entry fails. Errors only when the idle preset fails as well.
fn load_initial_preset(
    rotation: &mut PresetRotation,
    config: &RendererConfig,
    engine: &mut dyn VisualEngine,
) -> Result<(), EngineError> {
    let mut loader = EngineLoader(engine);
    match rotation.load_catalog(&config.preset_dir, &config.preset_extension, &mut loader) {
        Ok(_) => Ok(()),
        Err(err) if rotation.is_empty() => Err(err),
        Err(err) => {
            warn!(error = %err, "first preset failed to load; using the idle preset");
            loader.load_preset(PresetTarget::Idle)
        }
    }
}
