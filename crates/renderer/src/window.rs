use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{info, trace, warn};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};

use crate::context::OpenGlSurface;
use crate::engine::{EngineFactory, EngineSettings, VisualEngine};
use crate::scheduler::{Navigation, RenderScheduler, SchedulerState};
use crate::scope::ScopeEngine;
use crate::surface::SurfaceDimensions;
use crate::types::RendererConfig;

/// Maps a key press to a navigation command: arrows and `n`/`p`.
pub fn navigation_for_key(key: &Key) -> Option<Navigation> {
    match key {
        Key::Named(NamedKey::ArrowRight) => Some(Navigation::Next),
        Key::Named(NamedKey::ArrowLeft) => Some(Navigation::Previous),
        Key::Character(value) => match value.as_str() {
            "n" | "N" => Some(Navigation::Next),
            "p" | "P" => Some(Navigation::Previous),
            _ => None,
        },
        _ => None,
    }
}

fn pressed_navigation(event: &KeyEvent) -> Option<Navigation> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    navigation_for_key(&event.logical_key)
}

/// Opens the window and drives the scheduler from the winit event loop.
pub(crate) fn run_window(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let surface = OpenGlSurface::new(&event_loop, &config)
        .context("failed to create OpenGL window surface")?;

    let gl = surface.gl();
    let factory: EngineFactory = Box::new(move |settings: &EngineSettings| {
        ScopeEngine::new(gl.clone(), settings)
            .map(|engine| Box::new(engine) as Box<dyn VisualEngine>)
    });
    let window_id = surface.window().id();
    let mut scheduler = RenderScheduler::new(surface, factory, config);

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::Resumed => {
            scheduler.surface().window().request_redraw();
        }
        Event::WindowEvent { window_id: id, event } if id == window_id => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                scheduler.shutdown();
                elwt.exit();
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                if scheduler.expose(now) == SchedulerState::Failed {
                    warn!(
                        reason = scheduler.failure().unwrap_or("unknown"),
                        "renderer failed to start; showing an empty window"
                    );
                }
            }
            WindowEvent::Resized(size) => {
                scheduler.resize(SurfaceDimensions::new(size.width, size.height));
            }
            WindowEvent::Occluded(occluded) => {
                scheduler.set_occluded(occluded);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(direction) = pressed_navigation(&event) {
                    info!(?direction, "manual preset change");
                    scheduler.navigate(direction, Instant::now());
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            match scheduler.poll(now) {
                Some(deadline) => {
                    let ms = deadline.saturating_duration_since(now).as_millis();
                    trace!(deadline_ms = ms, "scheduler: waiting for next timer");
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                }
                None => elwt.set_control_flow(ControlFlow::Wait),
            }
        }
        Event::LoopExiting => {
            scheduler.shutdown();
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::SmolStr;

    #[test]
    fn arrows_and_mnemonics_navigate() {
        assert_eq!(
            navigation_for_key(&Key::Named(NamedKey::ArrowRight)),
            Some(Navigation::Next)
        );
        assert_eq!(
            navigation_for_key(&Key::Named(NamedKey::ArrowLeft)),
            Some(Navigation::Previous)
        );
        assert_eq!(
            navigation_for_key(&Key::Character(SmolStr::new("n"))),
            Some(Navigation::Next)
        );
        assert_eq!(
            navigation_for_key(&Key::Character(SmolStr::new("P"))),
            Some(Navigation::Previous)
        );
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(navigation_for_key(&Key::Named(NamedKey::Space)), None);
        assert_eq!(navigation_for_key(&Key::Character(SmolStr::new("x"))), None);
    }
}
