use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "milkwave",
    author,
    version,
    about = "Audio-reactive preset visualizer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Audio file to visualize; synthetic audio is used when omitted.
    #[arg(value_name = "AUDIO")]
    pub audio: Option<PathBuf>,

    /// Configuration file to load instead of `<config dir>/milkwave.toml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory scanned recursively for presets.
    #[arg(long, value_name = "DIR")]
    pub preset_dir: Option<PathBuf>,

    /// Texture search path; repeat to add more, first match wins.
    #[arg(long = "texture-path", value_name = "DIR")]
    pub texture_paths: Vec<PathBuf>,

    /// Time each preset stays on screen (e.g. `30`, `45s`, `2m`).
    #[arg(long, value_name = "DURATION", value_parser = parse_positive_duration)]
    pub preset_duration: Option<Duration>,

    /// Hard-cut duration forwarded to the engine.
    #[arg(long, value_name = "DURATION", value_parser = parse_positive_duration)]
    pub hard_cut: Option<Duration>,

    /// Target frame rate.
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<u32>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Requested MSAA sample count (0 disables multisampling).
    #[arg(long, value_name = "COUNT", value_parser = parse_samples)]
    pub samples: Option<u8>,

    /// Audio frames forwarded to the engine per rendered frame.
    #[arg(long, value_name = "FRAMES", value_parser = parse_chunk_frames)]
    pub chunk_frames: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved configuration, preset and texture paths, then exit.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_positive_duration(value: &str) -> Result<Duration, String> {
    let duration = vizconfig::parse_duration(value)?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}

pub fn parse_fps(value: &str) -> Result<u32, String> {
    let trimmed = value.trim();
    let fps: u32 = trimmed
        .parse()
        .map_err(|_| format!("invalid frame rate '{trimmed}'"))?;
    if fps == 0 {
        return Err("frame rate must be greater than zero".to_string());
    }
    Ok(fps)
}

pub fn parse_samples(value: &str) -> Result<u8, String> {
    let trimmed = value.trim();
    let samples: u8 = trimmed
        .parse()
        .map_err(|_| format!("invalid sample count '{trimmed}'"))?;
    if samples > 16 {
        return Err(format!(
            "unsupported sample count {samples}; use a value between 0 and 16"
        ));
    }
    Ok(samples)
}

pub fn parse_chunk_frames(value: &str) -> Result<usize, String> {
    let trimmed = value.trim();
    let frames: usize = trimmed
        .parse()
        .map_err(|_| format!("invalid chunk size '{trimmed}'"))?;
    if frames == 0 {
        return Err("chunk size must be greater than zero".to_string());
    }
    Ok(frames)
}
