use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn create_preset_layout(root: &Path) {
    let presets = root.join("presets");
    fs::create_dir_all(presets.join("nested")).unwrap();
    fs::create_dir_all(presets.join("Textures")).unwrap();
    fs::write(presets.join("aurora.milk"), "[preset00]").unwrap();
    fs::write(presets.join("nested/tunnel.milk"), "[preset00]").unwrap();
    fs::write(presets.join("notes.txt"), "not a preset").unwrap();
    fs::write(presets.join("Textures/noise.png"), [0u8; 4]).unwrap();
}

fn milkwave(config_dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_milkwave"));
    command
        .env("MILKWAVE_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn where_reports_presets_textures_and_audio_from_user_config() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    create_preset_layout(root.path());

    let presets = root.path().join("presets");
    fs::write(
        config_dir.join("milkwave.toml"),
        format!(
            "[presets]\ndirectory = {:?}\n",
            presets.display().to_string()
        ),
    )
    .unwrap();

    let output = milkwave(&config_dir)
        .arg("where")
        .output()
        .expect("failed to run milkwave where");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("milkwave.toml"), "{stdout}");
    assert!(stdout.contains("2 preset(s)"), "{stdout}");
    assert!(
        stdout.contains(&format!("{} [1 entries]", presets.join("Textures").display())),
        "{stdout}"
    );
    assert!(stdout.contains("synthetic"), "{stdout}");
}

#[test]
fn where_honours_cli_overrides() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let textures = root.path().join("textures");
    fs::create_dir_all(&textures).unwrap();
    let track = root.path().join("track.wav");
    fs::write(&track, [0u8; 16]).unwrap();

    let output = milkwave(&config_dir)
        .arg("--preset-dir")
        .arg(root.path().join("missing-presets"))
        .arg("--texture-path")
        .arg(&textures)
        .arg(&track)
        .arg("where")
        .output()
        .expect("failed to run milkwave where");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("built-in defaults"), "{stdout}");
    assert!(stdout.contains("idle preset only"), "{stdout}");
    assert!(
        stdout.contains(&format!("{} [empty]", textures.display())),
        "{stdout}"
    );
    assert!(
        stdout.contains(&format!("file:        {}", track.display())),
        "{stdout}"
    );
}

#[test]
fn explicit_config_that_does_not_exist_is_an_error() {
    let root = TempDir::new().unwrap();
    let status = milkwave(root.path())
        .arg("--config")
        .arg(root.path().join("absent.toml"))
        .arg("where")
        .status()
        .expect("failed to run milkwave where");
    assert!(!status.success());
}
