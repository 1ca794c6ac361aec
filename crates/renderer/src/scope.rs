//! Built-in OpenGL 3.3 oscilloscope engine.
//!
//! Draws the most recent audio chunk as a waveform over a faint mesh grid.
//! The background brightness follows the chunk's RMS level and the palette is
//! derived from the loaded preset's identity, so rotation is visible even
//! though preset files are never parsed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use audiofeed::PcmSink;
use glow::HasContext;
use rotation::PresetTarget;
use tracing::debug;

use crate::engine::{EngineError, EngineSettings, VisualEngine};
use crate::surface::SurfaceDimensions;

const VERTEX_SHADER: &str = r#"#version 330 core
layout(location = 0) in vec2 a_position;
void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 330 core
uniform vec4 u_color;
out vec4 frag_color;
void main() {
    frag_color = u_color;
}
"#;

/// Longest palette crossfade after a preset change.
const MAX_BLEND: Duration = Duration::from_secs(2);
/// Grid line opacity over the cleared background.
const GRID_OPACITY: f32 = 0.12;
/// Seconds for the smoothed level to fall by half.
const LEVEL_HALF_LIFE: f32 = 0.25;
const IDLE_COLOR: [f32; 3] = [0.55, 0.55, 0.55];

type Program = <glow::Context as HasContext>::Program;
type Buffer = <glow::Context as HasContext>::Buffer;
type VertexArray = <glow::Context as HasContext>::VertexArray;
type UniformLocation = <glow::Context as HasContext>::UniformLocation;

/// Waveform colour plus the background it is drawn on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub wave: [f32; 3],
    pub background: [f32; 3],
}

impl Palette {
    pub const IDLE: Palette = Palette {
        wave: IDLE_COLOR,
        background: [0.0, 0.0, 0.0],
    };

    /// Stable palette for a preset; the idle preset is neutral grey.
    pub fn for_target(target: PresetTarget<'_>) -> Self {
        let PresetTarget::Entry(entry) = target else {
            return Self::IDLE;
        };
        let mut hasher = DefaultHasher::new();
        entry.path().hash(&mut hasher);
        let hue = (hasher.finish() % 360) as f32;
        Self {
            wave: hsv_to_rgb(hue, 0.75, 1.0),
            background: hsv_to_rgb((hue + 180.0) % 360.0, 0.6, 0.35),
        }
    }

    fn blend(&self, other: &Palette, t: f32) -> Palette {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: [f32; 3], b: [f32; 3]| {
            [
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
            ]
        };
        Palette {
            wave: mix(self.wave, other.wave),
            background: mix(self.background, other.background),
        }
    }
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [f32; 3] {
    let c = value * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    [r + m, g + m, b + m]
}

/// Composites `top` at `opacity` over an opaque `bottom`.
fn over(top: [f32; 3], bottom: [f32; 3], opacity: f32) -> [f32; 3] {
    let a = opacity.clamp(0.0, 1.0);
    [0, 1, 2].map(|i| top[i] * a + bottom[i] * (1.0 - a))
}

/// Mono waveform and level extracted from the last fed chunk.
#[derive(Debug, Clone, Default)]
struct Waveform {
    samples: Vec<f32>,
    rms: f32,
}

impl Waveform {
    fn update<T: Copy>(&mut self, samples: &[T], channels: u16, to_f32: impl Fn(T) -> f32) {
        let stride = usize::from(channels.max(1));
        self.samples.clear();
        self.samples.extend(samples.chunks_exact(stride).map(|frame| {
            frame.iter().map(|&s| to_f32(s)).sum::<f32>() / stride as f32
        }));
        self.rms = if self.samples.is_empty() {
            0.0
        } else {
            let energy: f32 = self.samples.iter().map(|s| s * s).sum();
            (energy / self.samples.len() as f32).sqrt()
        };
    }

    /// Line-strip vertices spanning the viewport horizontally.
    fn vertices(&self) -> Vec<f32> {
        let count = self.samples.len();
        if count < 2 {
            return Vec::new();
        }
        let step = 2.0 / (count - 1) as f32;
        self.samples
            .iter()
            .enumerate()
            .flat_map(|(index, sample)| [-1.0 + step * index as f32, sample.clamp(-1.0, 1.0) * 0.8])
            .collect()
    }
}

/// Line-list vertices for a `columns` x `rows` grid in clip space.
fn grid_vertices(columns: u32, rows: u32) -> Vec<f32> {
    let mut vertices = Vec::new();
    for column in 1..columns {
        let x = -1.0 + 2.0 * column as f32 / columns as f32;
        vertices.extend_from_slice(&[x, -1.0, x, 1.0]);
    }
    for row in 1..rows {
        let y = -1.0 + 2.0 * row as f32 / rows as f32;
        vertices.extend_from_slice(&[-1.0, y, 1.0, y]);
    }
    vertices
}

struct GpuObjects {
    program: Program,
    color: Option<UniformLocation>,
    wave_vao: VertexArray,
    wave_vbo: Buffer,
    grid_vao: VertexArray,
    grid_vbo: Buffer,
    grid_vertices: i32,
}

/// Oscilloscope implementation of [`VisualEngine`].
pub struct ScopeEngine {
    gl: Rc<glow::Context>,
    gpu: Option<GpuObjects>,
    dimensions: SurfaceDimensions,
    fps: u32,
    preset_duration: Duration,
    hard_cut: Duration,
    waveform: Waveform,
    level: f32,
    palette: Palette,
    previous: Palette,
    changed_at: Instant,
}

impl ScopeEngine {
    /// Compiles the shaders and allocates buffers; the context must be current.
    pub fn new(gl: Rc<glow::Context>, settings: &EngineSettings) -> Result<Self, EngineError> {
        let gpu = unsafe { create_gpu_objects(&gl)? };
        let mut engine = Self {
            gl,
            gpu: Some(gpu),
            dimensions: settings.dimensions,
            fps: settings.fps,
            preset_duration: settings.preset_duration,
            hard_cut: settings.hard_cut_duration,
            waveform: Waveform::default(),
            level: 0.0,
            palette: Palette::IDLE,
            previous: Palette::IDLE,
            changed_at: Instant::now(),
        };
        engine.set_mesh_size(settings.mesh.0, settings.mesh.1);
        Ok(engine)
    }

    fn blend_duration(&self) -> Duration {
        self.hard_cut.min(self.preset_duration).min(MAX_BLEND)
    }

    fn current_palette(&self, now: Instant) -> Palette {
        let blend = self.blend_duration();
        if blend.is_zero() {
            return self.palette;
        }
        let t = now.saturating_duration_since(self.changed_at).as_secs_f32() / blend.as_secs_f32();
        self.previous.blend(&self.palette, t)
    }

    /// Exponential smoothing of the RMS level, frame-rate independent.
    fn smoothed_level(&mut self) -> f32 {
        let fps = self.fps.max(1) as f32;
        let decay = 0.5f32.powf(1.0 / (fps * LEVEL_HALF_LIFE));
        self.level = self.waveform.rms.max(self.level * decay);
        self.level
    }
}

unsafe fn create_gpu_objects(gl: &glow::Context) -> Result<GpuObjects, EngineError> {
    let program = link_program(gl)?;
    let color = gl.get_uniform_location(program, "u_color");
    let (wave_vao, wave_vbo) = create_vertex_buffer(gl)?;
    let (grid_vao, grid_vbo) = create_vertex_buffer(gl)?;
    Ok(GpuObjects {
        program,
        color,
        wave_vao,
        wave_vbo,
        grid_vao,
        grid_vbo,
        grid_vertices: 0,
    })
}

unsafe fn link_program(gl: &glow::Context) -> Result<Program, EngineError> {
    let construction = EngineError::Construction;
    let program = gl.create_program().map_err(construction)?;
    let mut shaders = Vec::with_capacity(2);
    for (kind, source) in [
        (glow::VERTEX_SHADER, VERTEX_SHADER),
        (glow::FRAGMENT_SHADER, FRAGMENT_SHADER),
    ] {
        let shader = gl.create_shader(kind).map_err(construction)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            gl.delete_program(program);
            return Err(EngineError::Construction(format!(
                "shader compilation failed: {log}"
            )));
        }
        gl.attach_shader(program, shader);
        shaders.push(shader);
    }
    gl.link_program(program);
    let linked = gl.get_program_link_status(program);
    for shader in shaders {
        gl.detach_shader(program, shader);
        gl.delete_shader(shader);
    }
    if !linked {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(EngineError::Construction(format!(
            "program link failed: {log}"
        )));
    }
    Ok(program)
}

unsafe fn create_vertex_buffer(
    gl: &glow::Context,
) -> Result<(VertexArray, Buffer), EngineError> {
    let vao = gl
        .create_vertex_array()
        .map_err(EngineError::Construction)?;
    let vbo = gl.create_buffer().map_err(EngineError::Construction)?;
    gl.bind_vertex_array(Some(vao));
    gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
    gl.enable_vertex_attrib_array(0);
    gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 8, 0);
    gl.bind_vertex_array(None);
    gl.bind_buffer(glow::ARRAY_BUFFER, None);
    Ok((vao, vbo))
}

impl PcmSink for ScopeEngine {
    fn add_i16(&mut self, samples: &[i16], channels: u16, _frames: usize) {
        self.waveform
            .update(samples, channels, |s| f32::from(s) / 32768.0);
    }

    fn add_f32(&mut self, samples: &[f32], channels: u16, _frames: usize) {
        self.waveform.update(samples, channels, |s| s);
    }
}

impl VisualEngine for ScopeEngine {
    fn set_window_size(&mut self, dimensions: SurfaceDimensions) {
        self.dimensions = dimensions;
    }

    fn set_mesh_size(&mut self, width: u32, height: u32) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let vertices = grid_vertices(width.max(1), height.max(1));
        gpu.grid_vertices = (vertices.len() / 2) as i32;
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(gpu.grid_vbo));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&vertices),
                glow::STATIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn set_fps(&mut self, fps: u32) {
        self.fps = fps;
    }

    fn set_preset_duration(&mut self, duration: Duration) {
        self.preset_duration = duration;
    }

    fn set_hard_cut_duration(&mut self, duration: Duration) {
        self.hard_cut = duration;
    }

    fn set_texture_paths(&mut self, paths: &[PathBuf]) {
        // The scope draws no sampled textures; the paths only matter to preset engines.
        debug!(count = paths.len(), "texture search paths updated");
    }

    fn load_preset(&mut self, target: PresetTarget<'_>) -> Result<(), EngineError> {
        if let PresetTarget::Entry(entry) = target {
            if !entry.path().is_file() {
                return Err(EngineError::PresetLoad {
                    preset: entry.to_string(),
                    reason: "file is not readable".into(),
                });
            }
        }
        let now = Instant::now();
        self.previous = self.current_palette(now);
        self.palette = Palette::for_target(target);
        self.changed_at = now;
        Ok(())
    }

    fn pcm(&mut self) -> Option<&mut dyn PcmSink> {
        self.gpu.as_ref()?;
        Some(self)
    }

    fn render_frame(&mut self) -> Result<(), EngineError> {
        let level = self.smoothed_level();
        let palette = self.current_palette(Instant::now());
        let vertices = self.waveform.vertices();
        let gl = &self.gl;
        let gpu = self
            .gpu
            .as_ref()
            .ok_or_else(|| EngineError::Render("engine already destroyed".into()))?;

        let brightness = 0.35 + 0.65 * level.min(1.0);
        let background = palette.background.map(|c| c * brightness);
        let [gr, gg, gb] = over(palette.wave, background, GRID_OPACITY);
        unsafe {
            gl.viewport(
                0,
                0,
                self.dimensions.width as i32,
                self.dimensions.height as i32,
            );
            let [r, g, b] = background;
            gl.clear_color(r, g, b, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
            gl.use_program(Some(gpu.program));

            // Blending stays off; the grid is pre-mixed with the background.
            gl.uniform_4_f32(gpu.color.as_ref(), gr, gg, gb, 1.0);
            gl.bind_vertex_array(Some(gpu.grid_vao));
            gl.draw_arrays(glow::LINES, 0, gpu.grid_vertices);

            if !vertices.is_empty() {
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(gpu.wave_vbo));
                gl.buffer_data_u8_slice(
                    glow::ARRAY_BUFFER,
                    bytemuck::cast_slice(&vertices),
                    glow::STREAM_DRAW,
                );
                let [r, g, b] = palette.wave;
                gl.uniform_4_f32(gpu.color.as_ref(), r, g, b, 1.0);
                gl.bind_vertex_array(Some(gpu.wave_vao));
                gl.draw_arrays(glow::LINE_STRIP, 0, (vertices.len() / 2) as i32);
            }

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.use_program(None);

            match gl.get_error() {
                glow::NO_ERROR => Ok(()),
                code => Err(EngineError::Render(format!("OpenGL error 0x{code:04x}"))),
            }
        }
    }

    fn destroy(&mut self) {
        let Some(gpu) = self.gpu.take() else {
            return;
        };
        unsafe {
            self.gl.delete_program(gpu.program);
            self.gl.delete_vertex_array(gpu.wave_vao);
            self.gl.delete_buffer(gpu.wave_vbo);
            self.gl.delete_vertex_array(gpu.grid_vao);
            self.gl.delete_buffer(gpu.grid_vbo);
        }
        debug!("scope engine resources released");
    }
}
