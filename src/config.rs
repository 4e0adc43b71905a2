use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::device::joystick::DEFAULT_AXIS_THRESHOLD;
use crate::device::layout::ControlLayoutConfig;
use crate::device::Layout;
use crate::error::ConfigError;
use crate::mapping::{MappingConfig, MappingTable};

/// Written to the config path on first start
pub const DEFAULT_CONFIG: &str = include_str!("../config.example.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    /// Raw input -> control id/class overrides
    pub controls: Vec<ControlLayoutConfig>,
    /// `initial_mode`, `[combos]` and `[modes]`
    #[serde(flatten)]
    pub mapping: MappingConfig,
}

impl Config {
    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Ok(Self::load_from(&config_path)?)
        } else {
            // Create default config
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("failed to write {}", config_path.display()))?;
            info!("Created default configuration at {}", config_path.display());
            Ok(Self::parse(DEFAULT_CONFIG)?)
        }
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.source.validate()?;
        Ok(config)
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config/surface-keys/config.toml"))
    }

    /// Build the validated mapping table
    pub fn table(&self) -> Result<MappingTable, ConfigError> {
        self.mapping.build()
    }

    /// Build the surface layout from `[[controls]]`
    pub fn layout(&self) -> Result<Layout, ConfigError> {
        Layout::from_config(&self.controls)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Midi,
    Joystick,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Substring of the MIDI port name
    pub device: String,
    /// MIDI channel (1-16)
    pub channel: u8,
    /// Joystick device node
    pub path: PathBuf,
    /// Axis deflection that counts as a press
    pub axis_threshold: i16,
    /// Play the intro animation on connect
    pub intro: bool,
}

impl SourceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=16).contains(&self.channel) {
            return Err(ConfigError::InvalidSource(format!(
                "channel {} is not between 1 and 16",
                self.channel
            )));
        }
        if self.axis_threshold <= 0 {
            return Err(ConfigError::InvalidSource(format!(
                "axis_threshold {} must be positive",
                self.axis_threshold
            )));
        }
        if self.kind == SourceKind::Midi && self.device.trim().is_empty() {
            return Err(ConfigError::InvalidSource(
                "device must name a MIDI port".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Midi,
            device: "X-TOUCH MINI".to_string(),
            channel: 10,
            path: PathBuf::from("/dev/input/js0"),
            axis_threshold: DEFAULT_AXIS_THRESHOLD,
            intro: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::layout::AxisDirection;
    use crate::device::{ControlClass, RawControl};
    use crate::mapping::{Action, ControlId};
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.source.kind, SourceKind::Midi);
        assert_eq!(config.source.channel, 10);

        let table = config.table().unwrap();
        assert_eq!(table.initial_mode(), "default");
        assert_eq!(table.modes().collect::<Vec<_>>(), ["default", "rating"]);
        assert!(matches!(
            table.lookup("rating", &ControlId::Index(12)).map(|b| &b.action),
            Some(Action::NoOp)
        ));

        let layout = config.layout().unwrap();
        assert_eq!(
            layout.resolve(RawControl::Cc(9)),
            (ControlId::from("slider"), ControlClass::Slider)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            initial_mode = "main"

            [source]
            kind = "joystick"
            path = "/dev/input/js1"
            axis_threshold = 30000

            [[controls]]
            id = "dpad-left"
            axis = 8
            direction = "negative"

            [modes.main.bindings.dpad-left]
            action = {{ type = "emit", keys = "Left" }}
            "#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.source.kind, SourceKind::Joystick);
        assert_eq!(config.source.path, PathBuf::from("/dev/input/js1"));
        assert_eq!(config.source.axis_threshold, 30000);
        // Unset values keep their defaults
        assert_eq!(config.source.channel, 10);

        let table = config.table().unwrap();
        assert!(table.is_known(&ControlId::from("dpad-left")));
        let layout = config.layout().unwrap();
        assert_eq!(
            layout.resolve(RawControl::Axis(8, AxisDirection::Negative)),
            (ControlId::from("dpad-left"), ControlClass::Momentary)
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_source() {
        let err = Config::parse("[source]\nchannel = 17\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSource(_)));

        let err = Config::parse("[source]\naxis_threshold = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSource(_)));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            Config::parse("initial_mode = "),
            Err(ConfigError::Parse(_))
        ));
    }
}
