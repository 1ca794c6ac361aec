use anyhow::Result;
use renderer::diagnostics::{check_preset_directory, inspect_texture_path};
use renderer::{Renderer, TextureDiagnosis};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{prepare, LaunchPlan};
use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let LaunchPlan {
        config_source,
        renderer,
    } = prepare(&args, &paths)?;

    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        config = %config_source.describe(),
        presets = %renderer.preset_dir.display(),
        textures = renderer.texture_paths.len(),
        "resolved milkwave paths"
    );
    tracing::info!(
        size = %renderer.surface_size,
        fps = renderer.fps,
        preset_duration = ?renderer.preset_duration,
        audio = %renderer
            .audio_path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "synthetic".to_string()),
        "starting milkwave"
    );

    Renderer::new(renderer).run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints what a run with these arguments would use, without opening a window.
pub fn report_where(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let LaunchPlan {
        config_source,
        renderer,
    } = prepare(args, &paths)?;

    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!("  config file: {}", config_source.describe());

    println!("Presets:");
    println!("  directory:   {}", renderer.preset_dir.display());
    println!("  extension:   {}", renderer.preset_extension);
    match check_preset_directory(&renderer.preset_dir) {
        Ok(()) => match rotation::discover_presets(&renderer.preset_dir, &renderer.preset_extension)
        {
            Ok(found) => println!("  found:       {} preset(s)", found.len()),
            Err(err) => println!("  found:       unreadable ({err})"),
        },
        Err(err) => println!("  found:       none ({err}; idle preset only)"),
    }

    println!("Texture search paths:");
    for path in &renderer.texture_paths {
        let status = match inspect_texture_path(path) {
            Ok(TextureDiagnosis::Empty) => "empty".to_string(),
            Ok(TextureDiagnosis::Populated { total, .. }) => format!("{total} entries"),
            Err(err) => err.to_string(),
        };
        println!("  {} [{status}]", path.display());
    }

    println!("Audio source:");
    match &renderer.audio_path {
        Some(path) => println!("  file:        {}", path.display()),
        None => println!("  synthetic:   sine test signal"),
    }

    Ok(())
}
