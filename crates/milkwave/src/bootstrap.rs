use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use renderer::{RendererConfig, SurfaceDimensions};
use tracing::{debug, info};
use vizconfig::VisualizerConfig;

use crate::cli::RunArgs;
use crate::paths::{default_texture_paths, resolve_audio_path, AppPaths};

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named with `--config`.
    Explicit(PathBuf),
    /// Found at `<config dir>/milkwave.toml`.
    User(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn describe(&self) -> String {
        match self {
            ConfigSource::Explicit(path) => format!("{} (--config)", path.display()),
            ConfigSource::User(path) => path.display().to_string(),
            ConfigSource::Defaults => "none (built-in defaults)".to_string(),
        }
    }
}

pub struct LaunchPlan {
    pub config_source: ConfigSource,
    pub renderer: RendererConfig,
}

pub fn prepare(args: &RunArgs, paths: &AppPaths) -> Result<LaunchPlan> {
    let (config, config_source) = load_config(args.config.as_deref(), paths)?;
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let renderer = merge_config(args, &config, &paths.default_preset_dir(), &cwd)?;
    Ok(LaunchPlan {
        config_source,
        renderer,
    })
}

pub fn load_config(
    explicit: Option<&Path>,
    paths: &AppPaths,
) -> Result<(VisualizerConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = VisualizerConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    let user_file = paths.config_file();
    if user_file.is_file() {
        let config = VisualizerConfig::load(&user_file)
            .with_context(|| format!("failed to load configuration {}", user_file.display()))?;
        info!(path = %user_file.display(), "loaded configuration");
        return Ok((config, ConfigSource::User(user_file)));
    }

    debug!(path = %user_file.display(), "no configuration file; using defaults");
    Ok((VisualizerConfig::default(), ConfigSource::Defaults))
}

/// Applies command-line overrides on top of the file configuration.
pub fn merge_config(
    args: &RunArgs,
    config: &VisualizerConfig,
    default_preset_dir: &Path,
    cwd: &Path,
) -> Result<RendererConfig> {
    let preset_dir = args
        .preset_dir
        .clone()
        .or_else(|| config.presets.directory.clone())
        .unwrap_or_else(|| default_preset_dir.to_path_buf());

    let (width, height) = match args.size.as_deref() {
        Some(raw) => parse_surface_size(raw)?,
        None => (config.render.width, config.render.height),
    };

    let texture_paths = if !args.texture_paths.is_empty() {
        args.texture_paths.clone()
    } else if !config.textures.paths.is_empty() {
        config.textures.paths.clone()
    } else {
        default_texture_paths(&preset_dir)
    };

    let audio_path = args
        .audio
        .as_deref()
        .and_then(|requested| resolve_audio_path(requested, cwd));

    let preset_duration = args.preset_duration.unwrap_or(config.presets.duration);
    let hard_cut_duration = args.hard_cut.unwrap_or(config.presets.hard_cut);
    if preset_duration.is_zero() || hard_cut_duration.is_zero() {
        bail!("preset and hard-cut durations must be greater than zero");
    }

    Ok(RendererConfig {
        title: config.render.title.clone(),
        surface_size: SurfaceDimensions::new(width, height),
        fps: args.fps.unwrap_or(config.render.fps),
        samples: args.samples.unwrap_or(config.render.samples),
        mesh: (config.render.mesh[0], config.render.mesh[1]),
        preset_dir,
        preset_extension: config
            .presets
            .extension
            .trim()
            .trim_start_matches('.')
            .to_string(),
        preset_duration,
        hard_cut_duration,
        texture_paths,
        audio_path,
        chunk_frames: args.chunk_frames.unwrap_or(config.audio.chunk_frames),
    })
}

pub fn parse_surface_size(raw: &str) -> Result<(u32, u32)> {
    let trimmed = raw.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 1280x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size argument"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size argument"))?;

    if width == 0 || height == 0 {
        bail!("surface dimensions must be greater than zero");
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn surface_size_parses_common_forms() {
        assert_eq!(parse_surface_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
        assert_eq!(parse_surface_size("800×600").unwrap(), (800, 600));
        assert!(parse_surface_size("1280").is_err());
        assert!(parse_surface_size("0x720").is_err());
        assert!(parse_surface_size("wide x tall").is_err());
    }

    #[test]
    fn defaults_use_exe_relative_presets_and_default_textures() {
        let config = VisualizerConfig::default();
        let merged = merge_config(
            &RunArgs::default(),
            &config,
            Path::new("/opt/mw/presets"),
            Path::new("/"),
        )
        .unwrap();

        assert_eq!(merged.preset_dir, PathBuf::from("/opt/mw/presets"));
        assert_eq!(
            merged.texture_paths,
            vec![
                PathBuf::from("/opt/mw/presets/Textures"),
                PathBuf::from("/usr/share/projectM/textures"),
            ]
        );
        assert_eq!(merged.surface_size, SurfaceDimensions::new(800, 600));
        assert_eq!(merged.fps, 60);
        assert_eq!(merged.preset_duration, Duration::from_secs(30));
        assert_eq!(merged.hard_cut_duration, Duration::from_secs(15));
        assert_eq!(merged.chunk_frames, 1024);
        assert!(merged.audio_path.is_none());
    }

    #[test]
    fn cli_flags_override_file_values() {
        let config = VisualizerConfig::from_toml_str(
            r#"
[presets]
directory = "/srv/presets"
duration = "45s"

[render]
fps = 30

[textures]
paths = ["/srv/textures"]
"#,
        )
        .unwrap();

        let file_only =
            merge_config(&RunArgs::default(), &config, Path::new("/unused"), Path::new("/"))
                .unwrap();
        assert_eq!(file_only.preset_dir, PathBuf::from("/srv/presets"));
        assert_eq!(file_only.texture_paths, vec![PathBuf::from("/srv/textures")]);
        assert_eq!(file_only.preset_duration, Duration::from_secs(45));
        assert_eq!(file_only.fps, 30);

        let args = RunArgs {
            preset_dir: Some(PathBuf::from("/cli/presets")),
            texture_paths: vec![PathBuf::from("/cli/textures")],
            preset_duration: Some(Duration::from_secs(10)),
            fps: Some(50),
            size: Some("1024x768".into()),
            samples: Some(0),
            chunk_frames: Some(256),
            ..RunArgs::default()
        };
        let merged = merge_config(&args, &config, Path::new("/unused"), Path::new("/")).unwrap();
        assert_eq!(merged.preset_dir, PathBuf::from("/cli/presets"));
        assert_eq!(merged.texture_paths, vec![PathBuf::from("/cli/textures")]);
        assert_eq!(merged.preset_duration, Duration::from_secs(10));
        assert_eq!(merged.fps, 50);
        assert_eq!(merged.surface_size, SurfaceDimensions::new(1024, 768));
        assert_eq!(merged.samples, 0);
        assert_eq!(merged.chunk_frames, 256);
    }

    #[test]
    fn missing_audio_file_selects_synthetic_audio() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("track.wav"), [0u8; 8]).unwrap();
        let config = VisualizerConfig::default();

        let found = RunArgs {
            audio: Some(PathBuf::from("track.wav")),
            ..RunArgs::default()
        };
        let merged = merge_config(&found, &config, Path::new("/p"), root.path()).unwrap();
        assert_eq!(merged.audio_path, Some(root.path().join("track.wav")));

        let missing = RunArgs {
            audio: Some(PathBuf::from("nope.wav")),
            ..RunArgs::default()
        };
        let merged = merge_config(&missing, &config, Path::new("/p"), root.path()).unwrap();
        assert!(merged.audio_path.is_none());
    }

    #[test]
    fn explicit_config_must_exist_and_user_file_is_optional() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths::from_raw(root.path().to_path_buf(), None);

        let (config, source) = load_config(None, &paths).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config, VisualizerConfig::default());

        assert!(load_config(Some(&root.path().join("absent.toml")), &paths).is_err());

        fs::write(paths.config_file(), "[render]\nfps = 24\n").unwrap();
        let (config, source) = load_config(None, &paths).unwrap();
        assert_eq!(source, ConfigSource::User(paths.config_file()));
        assert_eq!(config.render.fps, 24);
    }
}
