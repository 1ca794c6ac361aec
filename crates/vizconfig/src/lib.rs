use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_PRESET_EXTENSION: &str = "milk";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// On-disk visualizer configuration.
///
/// Every section is optional; missing keys fall back to the values the
/// visualizer uses when no file is present at all.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisualizerConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub presets: PresetSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub textures: TextureSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresetSettings {
    /// Root scanned recursively for presets; `None` means "next to the executable".
    pub directory: Option<PathBuf>,
    pub extension: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub hard_cut: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub mesh: [u32; 2],
    pub samples: u8,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioSettings {
    pub chunk_frames: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextureSettings {
    pub paths: Vec<PathBuf>,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            presets: PresetSettings::default(),
            render: RenderSettings::default(),
            audio: AudioSettings::default(),
            textures: TextureSettings::default(),
        }
    }
}

impl Default for PresetSettings {
    fn default() -> Self {
        Self {
            directory: None,
            extension: DEFAULT_PRESET_EXTENSION.to_string(),
            duration: Duration::from_secs(30),
            hard_cut: Duration::from_secs(15),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: 60,
            width: 800,
            height: 600,
            mesh: [32, 24],
            samples: 4,
            title: "milkwave".to_string(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { chunk_frames: 1024 }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a finite non-negative number"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses a duration the same way the configuration file does, for CLI flags.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("duration must not be empty".into());
    }
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if seconds.is_nan() || seconds.is_sign_negative() || seconds.is_infinite() {
            return Err(format!("invalid duration '{trimmed}'"));
        }
        return Duration::try_from_secs_f64(seconds)
            .map_err(|err| format!("invalid duration '{trimmed}': {err}"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{trimmed}': {err}"))
}

impl VisualizerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: VisualizerConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        let extension = self.presets.extension.trim().trim_start_matches('.');
        if extension.is_empty() {
            return Err(ConfigError::Invalid(
                "presets.extension must not be empty".into(),
            ));
        }

        if self.presets.duration.is_zero() {
            return Err(ConfigError::Invalid(
                "presets.duration must be greater than zero".into(),
            ));
        }

        if self.presets.hard_cut.is_zero() {
            return Err(ConfigError::Invalid(
                "presets.hard_cut must be greater than zero".into(),
            ));
        }

        if self.render.fps == 0 {
            return Err(ConfigError::Invalid("render.fps must be > 0".into()));
        }

        if self.render.width == 0 || self.render.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "render size {}x{} must be non-zero",
                self.render.width, self.render.height
            )));
        }

        if self.render.mesh.iter().any(|&cells| cells == 0) {
            return Err(ConfigError::Invalid(
                "render.mesh dimensions must be > 0".into(),
            ));
        }

        if self.audio.chunk_frames == 0 {
            return Err(ConfigError::Invalid(
                "audio.chunk_frames must be > 0".into(),
            ));
        }

        for path in &self.textures.paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "textures.paths contains an empty entry".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[presets]
directory = "/opt/presets"
extension = "milk"
duration = "45s"
hard_cut = 12.5

[render]
fps = 30
width = 1280
height = 720
mesh = [48, 32]
samples = 8

[audio]
chunk_frames = 512

[textures]
paths = ["/opt/presets/Textures", "/usr/share/projectM/textures"]
"#;

    #[test]
    fn parses_sample_config() {
        let config = VisualizerConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.presets.directory, Some(PathBuf::from("/opt/presets")));
        assert_eq!(config.presets.duration, Duration::from_secs(45));
        assert_eq!(config.presets.hard_cut, Duration::from_secs_f64(12.5));
        assert_eq!(config.render.fps, 30);
        assert_eq!(config.render.mesh, [48, 32]);
        assert_eq!(config.render.samples, 8);
        assert_eq!(config.audio.chunk_frames, 512);
        assert_eq!(config.textures.paths.len(), 2);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = VisualizerConfig::from_toml_str("").expect("parse empty config");
        assert_eq!(config, VisualizerConfig::default());
        assert_eq!(config.presets.duration, Duration::from_secs(30));
        assert_eq!(config.presets.hard_cut, Duration::from_secs(15));
        assert_eq!(config.audio.chunk_frames, 1024);
        assert_eq!(config.render.fps, 60);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = VisualizerConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_duration_and_chunk() {
        let err = VisualizerConfig::from_toml_str("[presets]\nduration = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = VisualizerConfig::from_toml_str("[audio]\nchunk_frames = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_duration() {
        let err = VisualizerConfig::from_toml_str("[presets]\nduration = -3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = VisualizerConfig::from_toml_str("[render]\nvsync = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_durations_too_large_to_represent() {
        let err = VisualizerConfig::from_toml_str("[presets]\nduration = 1e20\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = VisualizerConfig::from_toml_str("[presets]\nhard_cut = 1e300\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parse_duration_accepts_seconds_and_humantime() {
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-4").is_err());
        assert!(parse_duration("1e20").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = VisualizerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("milkwave.toml");
        fs::write(&path, "[render]\nfps = 24\n").unwrap();
        let config = VisualizerConfig::load(&path).unwrap();
        assert_eq!(config.render.fps, 24);
    }
}
