//! Error types shared by the mapping core and the transports

use thiserror::Error;

use crate::mapping::ControlId;

/// Problems found while loading or validating the mapping configuration.
///
/// These are always fatal: the process refuses to start with an invalid table.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no modes are defined")]
    NoModes,

    #[error("initial mode '{0}' is not defined")]
    UnknownInitialMode(String),

    #[error("mode '{mode}', control {control}: switch target '{target}' is not defined")]
    UnknownSwitchTarget {
        mode: String,
        control: ControlId,
        target: String,
    },

    #[error("mode '{mode}' has no binding for control {control} (bind it or list it in `unmapped`)")]
    MissingBinding { mode: String, control: ControlId },

    #[error("mode '{mode}' binds control {control} twice")]
    DuplicateBinding { mode: String, control: ControlId },

    #[error("unknown key symbol '{0}'")]
    UnknownKey(String),

    #[error("empty key chord in '{0}'")]
    EmptyChord(String),

    #[error("combo '@{0}' is not defined in [combos]")]
    UnknownCombo(String),

    #[error("combo '@{0}' refers to itself")]
    RecursiveCombo(String),

    #[error("invalid control id '{0}'")]
    InvalidControlId(String),

    #[error("mode '{mode}', control {control}: {reason}")]
    InvalidAction {
        mode: String,
        control: ControlId,
        reason: String,
    },

    #[error("control layout entry {0} must name exactly one of note, cc, button or axis")]
    InvalidLayout(ControlId),

    #[error("invalid [source] setting: {0}")]
    InvalidSource(String),
}

/// Failures of the control-surface transport.
///
/// Fatal when they come from the event source, logged when they come from a
/// feedback sink.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("control surface '{0}' disconnected or unavailable")]
    Disconnected(String),

    #[error("control event stream closed")]
    Closed,

    #[error("no control surface matching '{0}'")]
    NotFound(String),

    #[error("I/O error on control surface: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI error: {0}")]
    Midi(String),
}

/// Failures of the keystroke injector. Never fatal.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("failed to initialise keystroke injection: {0}")]
    Init(String),

    #[error("failed to inject key '{key}': {reason}")]
    Key { key: String, reason: String },
}
