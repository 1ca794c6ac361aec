use std::ffi::CString;
use std::mem;
use std::num::NonZeroU32;
use std::rc::Rc;

use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{Display, DisplayApiPreference, GlDisplay};
use glutin::prelude::{NotCurrentGlContext, PossiblyCurrentGlContext};
use glutin::surface::{GlSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

use crate::surface::{ContextError, RenderSurface, SurfaceDimensions};
use crate::types::RendererConfig;

enum ContextSlot {
    Current(PossiblyCurrentContext),
    Released(NotCurrentContext),
    Lost,
}

/// Window plus OpenGL 3.3 core context created through glutin.
///
/// The context is left released after construction; callers acquire it
/// through [`with_current`](crate::with_current). Resizes arriving while the
/// context is released are applied on the next acquisition.
pub struct OpenGlSurface {
    gl: Rc<glow::Context>,
    gl_surface: Surface<WindowSurface>,
    context: ContextSlot,
    dimensions: SurfaceDimensions,
    pending_resize: Option<SurfaceDimensions>,
    window: Window,
}

impl OpenGlSurface {
    pub fn new(event_loop: &EventLoop<()>, config: &RendererConfig) -> Result<Self, ContextError> {
        let size = config.surface_size;
        let window_builder = WindowBuilder::new()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(size.width.max(1), size.height.max(1)));

        let display = unsafe { Display::new(event_loop.raw_display_handle(), display_preference()) }
            .map_err(|err| ContextError::Create(err.to_string()))?;
        let template = ConfigTemplateBuilder::new()
            .with_depth_size(24)
            .with_stencil_size(8)
            .with_single_buffering(false)
            .build();
        let wanted = config.samples;
        let configs = unsafe { display.find_configs(template) }
            .map_err(|err| ContextError::Create(err.to_string()))?;
        let gl_config = pick_config(configs, wanted).ok_or_else(|| {
            ContextError::Create("no double-buffered framebuffer config with depth and stencil".into())
        })?;
        let window = glutin_winit::finalize_window(event_loop, window_builder, &gl_config)
            .map_err(|err| ContextError::Create(err.to_string()))?;

        let raw_window_handle = window.raw_window_handle();
        let attributes = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(raw_window_handle));
        let not_current = unsafe { display.create_context(&gl_config, &attributes) }
            .map_err(|err| ContextError::Create(err.to_string()))?;

        let inner = window.inner_size();
        let dimensions = SurfaceDimensions::new(inner.width, inner.height);
        let surface_attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            raw_window_handle,
            non_zero(dimensions.width),
            non_zero(dimensions.height),
        );
        let gl_surface = unsafe { display.create_window_surface(&gl_config, &surface_attributes) }
            .map_err(|err| ContextError::Create(err.to_string()))?;

        let current = not_current
            .make_current(&gl_surface)
            .map_err(|err| ContextError::MakeCurrent(err.to_string()))?;
        if let Err(err) = gl_surface.set_swap_interval(&current, SwapInterval::DontWait) {
            debug!(error = %err, "could not disable vsync; frame timer may be throttled");
        }
        let gl = unsafe {
            glow::Context::from_loader_function(|symbol| match CString::new(symbol) {
                Ok(symbol) => display.get_proc_address(&symbol),
                Err(_) => std::ptr::null(),
            })
        };
        let released = current
            .make_not_current()
            .map_err(|err| ContextError::Release(err.to_string()))?;

        info!(
            size = %dimensions,
            samples = gl_config.num_samples(),
            requested_samples = wanted,
            "created OpenGL 3.3 core context"
        );

        Ok(Self {
            gl: Rc::new(gl),
            gl_surface,
            context: ContextSlot::Released(released),
            dimensions,
            pending_resize: None,
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Function table shared with engines built on this context.
    pub fn gl(&self) -> Rc<glow::Context> {
        Rc::clone(&self.gl)
    }

    fn apply_pending_resize(&mut self) {
        let ContextSlot::Current(context) = &self.context else {
            return;
        };
        if let Some(dimensions) = self.pending_resize.take() {
            self.gl_surface.resize(
                context,
                non_zero(dimensions.width),
                non_zero(dimensions.height),
            );
            debug!(size = %dimensions, "resized window surface");
        }
    }
}

impl RenderSurface for OpenGlSurface {
    fn dimensions(&self) -> SurfaceDimensions {
        self.dimensions
    }

    fn is_current(&self) -> bool {
        matches!(self.context, ContextSlot::Current(_))
    }

    fn make_current(&mut self) -> Result<(), ContextError> {
        let context = match mem::replace(&mut self.context, ContextSlot::Lost) {
            ContextSlot::Released(context) => context
                .make_current(&self.gl_surface)
                .map_err(|err| ContextError::MakeCurrent(err.to_string()))?,
            ContextSlot::Current(context) => context,
            ContextSlot::Lost => return Err(ContextError::Lost),
        };
        self.context = ContextSlot::Current(context);
        self.apply_pending_resize();
        Ok(())
    }

    fn release_current(&mut self) -> Result<(), ContextError> {
        match mem::replace(&mut self.context, ContextSlot::Lost) {
            ContextSlot::Current(context) => {
                let released = context
                    .make_not_current()
                    .map_err(|err| ContextError::Release(err.to_string()))?;
                self.context = ContextSlot::Released(released);
                Ok(())
            }
            other => {
                self.context = other;
                Ok(())
            }
        }
    }

    fn present(&mut self) -> Result<(), ContextError> {
        let ContextSlot::Current(context) = &self.context else {
            return Err(ContextError::Present("context is not current".into()));
        };
        self.gl_surface
            .swap_buffers(context)
            .map_err(|err| ContextError::Present(err.to_string()))
    }

    fn resize(&mut self, dimensions: SurfaceDimensions) {
        if dimensions.is_empty() {
            return;
        }
        self.dimensions = dimensions;
        self.pending_resize = Some(dimensions);
        self.apply_pending_resize();
    }
}

impl Drop for OpenGlSurface {
    fn drop(&mut self) {
        if matches!(self.context, ContextSlot::Lost) {
            warn!("dropping window surface with a lost OpenGL context");
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn display_preference() -> DisplayApiPreference {
    DisplayApiPreference::Egl
}

#[cfg(target_os = "macos")]
fn display_preference() -> DisplayApiPreference {
    DisplayApiPreference::Cgl
}

#[cfg(windows)]
fn display_preference() -> DisplayApiPreference {
    DisplayApiPreference::Wgl(None)
}

/// Chooses the config whose sample count is closest to the request,
/// preferring more samples on ties. `None` when the display offers nothing.
fn pick_config(configs: impl Iterator<Item = Config>, wanted: u8) -> Option<Config> {
    pick_closest(configs, wanted, |config| config.num_samples())
}

fn pick_closest<T>(
    candidates: impl Iterator<Item = T>,
    wanted: u8,
    samples: impl Fn(&T) -> u8,
) -> Option<T> {
    candidates.reduce(|best, candidate| {
        if closer_sample_count(samples(&candidate), samples(&best), wanted) {
            candidate
        } else {
            best
        }
    })
}

fn closer_sample_count(candidate: u8, current: u8, wanted: u8) -> bool {
    let distance = |samples: u8| samples.abs_diff(wanted);
    distance(candidate) < distance(current)
        || (distance(candidate) == distance(current) && candidate > current)
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_prefers_closest_then_higher() {
        assert!(closer_sample_count(4, 0, 4));
        assert!(!closer_sample_count(8, 4, 4));
        assert!(closer_sample_count(8, 0, 6));
        assert!(closer_sample_count(4, 2, 3));
        assert!(!closer_sample_count(2, 4, 3));
    }

    #[test]
    fn empty_config_list_picks_nothing() {
        assert_eq!(pick_closest(std::iter::empty::<u8>(), 4, |s| *s), None);
        assert_eq!(pick_closest([0u8, 2, 8, 4].into_iter(), 4, |s| *s), Some(4));
        assert_eq!(pick_closest([2u8, 8].into_iter(), 5, |s| *s), Some(8));
    }

    #[test]
    fn zero_dimensions_clamp_to_one() {
        assert_eq!(non_zero(0).get(), 1);
        assert_eq!(non_zero(640).get(), 640);
    }
}
