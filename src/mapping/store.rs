//! Mapping configuration types for serialization/deserialization
//!
//! These types describe the `[combos]` and `[modes]` sections of config.toml
//! and are converted into a validated [`MappingTable`] at startup.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{Action, Binding, ControlId, FeedbackSpec, KeyCombo, KeySpec, KeyStep, MappingTable, Trigger};
use crate::error::ConfigError;

/// Control id as written in the config: `7` or `"cc9"`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ControlIdConfig {
    Index(u32),
    Name(String),
}

impl ControlIdConfig {
    pub fn to_control_id(&self) -> Result<ControlId, ConfigError> {
        match self {
            ControlIdConfig::Index(n) => Ok(ControlId::Index(*n)),
            ControlIdConfig::Name(name) => name.parse(),
        }
    }
}

/// One step of a key sequence: a chord, a `@combo` reference or a pause in ms
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Pause(u64),
    Chord(String),
}

/// A key sequence: one chord string, or a list of steps
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum KeySpecConfig {
    Chord(String),
    Sequence(Vec<StepConfig>),
}

/// Action configuration (serializable)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Emit a key sequence
    Emit { keys: KeySpecConfig },
    /// Switch to another mode
    Switch { mode: String },
    /// Latch on/off, emitting a different sequence for each state
    Toggle { on: KeySpecConfig, off: KeySpecConfig },
    /// Knob or slider with a sequence per direction
    Directional {
        up: KeySpecConfig,
        down: KeySpecConfig,
        #[serde(default)]
        zero: Option<KeySpecConfig>,
        #[serde(default)]
        threshold: u8,
    },
    /// Run an external program
    Command { argv: Vec<String> },
    /// Replay the intro animation
    Intro,
    /// Do nothing
    #[serde(alias = "none")]
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerConfig {
    #[default]
    Press,
    Release,
    Hold,
}

impl From<TriggerConfig> for Trigger {
    fn from(trigger: TriggerConfig) -> Self {
        match trigger {
            TriggerConfig::Press => Trigger::Press,
            TriggerConfig::Release => Trigger::Release,
            TriggerConfig::Hold => Trigger::Hold,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackConfig {
    /// LED to light instead of the control's own
    #[serde(default)]
    pub led: Option<ControlIdConfig>,
}

/// Binding entry for a single control
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BindingConfig {
    pub action: ActionConfig,
    #[serde(default)]
    pub feedback: Option<FeedbackConfig>,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub description: Option<String>,
}

/// One mode (layer) of the mapping
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Controls that deliberately do nothing in this mode
    pub unmapped: Vec<ControlIdConfig>,
    /// Control id -> binding
    pub bindings: BTreeMap<String, BindingConfig>,
}

/// The mapping part of the configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Mode active at startup
    pub initial_mode: String,
    /// Named key sequences, referenced as `@name`
    pub combos: BTreeMap<String, KeySpecConfig>,
    pub modes: BTreeMap<String, ModeConfig>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            initial_mode: "default".to_string(),
            combos: BTreeMap::new(),
            modes: BTreeMap::new(),
        }
    }
}

impl MappingConfig {
    /// Resolve keys and combos and validate into a [`MappingTable`]
    pub fn build(&self) -> Result<MappingTable, ConfigError> {
        let resolver = ComboResolver {
            combos: &self.combos,
        };

        let mut modes = BTreeMap::new();
        for (mode_name, mode) in &self.modes {
            let mut bindings = BTreeMap::new();

            for (raw_id, entry) in &mode.bindings {
                let control: ControlId = raw_id.parse()?;
                let binding = resolver
                    .binding(entry)
                    .map_err(|e| annotate(e, mode_name, &control))?;
                if bindings.insert(control.clone(), binding).is_some() {
                    return Err(ConfigError::DuplicateBinding {
                        mode: mode_name.clone(),
                        control,
                    });
                }
            }

            for raw_id in &mode.unmapped {
                let control = raw_id.to_control_id()?;
                if bindings.insert(control.clone(), Binding::noop()).is_some() {
                    return Err(ConfigError::DuplicateBinding {
                        mode: mode_name.clone(),
                        control,
                    });
                }
            }

            modes.insert(mode_name.clone(), bindings);
        }

        MappingTable::new(self.initial_mode.clone(), modes)
    }
}

/// Attach the mode/control location to errors raised while resolving an action
fn annotate(err: ConfigError, mode: &str, control: &ControlId) -> ConfigError {
    match err {
        ConfigError::InvalidAction { reason, .. } => ConfigError::InvalidAction {
            mode: mode.to_string(),
            control: control.clone(),
            reason,
        },
        other => other,
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidAction {
        mode: String::new(),
        control: ControlId::Index(0),
        reason: reason.into(),
    }
}

struct ComboResolver<'a> {
    combos: &'a BTreeMap<String, KeySpecConfig>,
}

impl ComboResolver<'_> {
    fn binding(&self, entry: &BindingConfig) -> Result<Binding, ConfigError> {
        let action = self.action(&entry.action)?;
        let feedback = entry
            .feedback
            .as_ref()
            .map(|fb| {
                fb.led
                    .as_ref()
                    .map(ControlIdConfig::to_control_id)
                    .transpose()
                    .map(|led| FeedbackSpec { led })
            })
            .transpose()?;

        Ok(Binding {
            action,
            feedback,
            trigger: entry.trigger.into(),
            description: entry.description.clone(),
        })
    }

    fn action(&self, action: &ActionConfig) -> Result<Action, ConfigError> {
        Ok(match action {
            ActionConfig::Emit { keys } => Action::EmitKeyCombo(self.spec(keys)?),
            ActionConfig::Switch { mode } => Action::SwitchMode(mode.clone()),
            ActionConfig::Toggle { on, off } => Action::ToggleAndEmit {
                on: self.spec(on)?,
                off: self.spec(off)?,
            },
            ActionConfig::Directional {
                up,
                down,
                zero,
                threshold,
            } => {
                if *threshold > 127 {
                    return Err(invalid(format!("threshold {} is above 127", threshold)));
                }
                Action::Directional {
                    up: self.spec(up)?,
                    down: self.spec(down)?,
                    zero: zero.as_ref().map(|z| self.spec(z)).transpose()?,
                    threshold: *threshold,
                }
            }
            ActionConfig::Command { argv } => {
                if argv.first().map_or(true, |program| program.trim().is_empty()) {
                    return Err(invalid("command needs a program to run"));
                }
                Action::RunCommand(argv.clone())
            }
            ActionConfig::Intro => Action::Intro,
            ActionConfig::Noop => Action::NoOp,
        })
    }

    fn spec(&self, spec: &KeySpecConfig) -> Result<KeySpec, ConfigError> {
        let mut steps = Vec::new();
        self.append(spec, &mut steps, &mut Vec::new())?;
        if steps.is_empty() {
            return Err(invalid("empty key sequence"));
        }
        Ok(KeySpec::new(steps))
    }

    fn append(
        &self,
        spec: &KeySpecConfig,
        steps: &mut Vec<KeyStep>,
        visiting: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        match spec {
            KeySpecConfig::Chord(chord) => self.append_chord(chord, steps, visiting),
            KeySpecConfig::Sequence(items) => {
                for item in items {
                    match item {
                        StepConfig::Pause(ms) => steps.push(KeyStep::Pause(Duration::from_millis(*ms))),
                        StepConfig::Chord(chord) => self.append_chord(chord, steps, visiting)?,
                    }
                }
                Ok(())
            }
        }
    }

    fn append_chord(
        &self,
        chord: &str,
        steps: &mut Vec<KeyStep>,
        visiting: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        let Some(name) = chord.trim().strip_prefix('@') else {
            steps.push(KeyStep::Chord(KeyCombo::parse(chord)?));
            return Ok(());
        };

        if visiting.iter().any(|v| v == name) {
            return Err(ConfigError::RecursiveCombo(name.to_string()));
        }
        let combo = self
            .combos
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCombo(name.to_string()))?;

        visiting.push(name.to_string());
        self.append(combo, steps, visiting)?;
        visiting.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> MappingConfig {
        toml::from_str(toml_src).unwrap()
    }

    fn chord(s: &str) -> KeySpec {
        KeySpec::chord(KeyCombo::parse(s).unwrap())
    }

    #[test]
    fn test_round_trip_lookup() {
        let config = parse(
            r#"
            initial_mode = "default"

            [combos]
            save = "ctrl+s"

            [modes.default]
            unmapped = [12]

            [modes.default.bindings.7]
            action = { type = "emit", keys = "@save" }
            description = "Save"

            [modes.default.bindings.3]
            action = { type = "toggle", on = "F1", off = "F2" }
            feedback = {}

            [modes.default.bindings.9]
            action = { type = "switch", mode = "shifted" }
            feedback = { led = 21 }

            [modes.default.bindings.cc1]
            action = { type = "directional", up = "Right", down = "Left", threshold = 5 }

            [modes.shifted]
            unmapped = [3, 7, "cc1"]

            [modes.shifted.bindings.9]
            action = { type = "switch", mode = "default" }
            trigger = "release"

            [modes.shifted.bindings.12]
            action = { type = "command", argv = ["toggle-grayscale.sh"] }
            "#,
        );
        let table = config.build().unwrap();

        let expect = [
            (
                "default",
                ControlId::Index(7),
                Binding::new(Action::EmitKeyCombo(chord("ctrl+s"))).with_description("Save"),
            ),
            (
                "default",
                ControlId::Index(3),
                Binding::new(Action::ToggleAndEmit {
                    on: chord("F1"),
                    off: chord("F2"),
                })
                .with_feedback(),
            ),
            (
                "default",
                ControlId::Index(9),
                Binding {
                    feedback: Some(FeedbackSpec {
                        led: Some(ControlId::Index(21)),
                    }),
                    ..Binding::new(Action::SwitchMode("shifted".to_string()))
                },
            ),
            (
                "default",
                ControlId::Name("cc1".to_string()),
                Binding::new(Action::Directional {
                    up: chord("Right"),
                    down: chord("Left"),
                    zero: None,
                    threshold: 5,
                }),
            ),
            ("default", ControlId::Index(12), Binding::noop()),
            ("shifted", ControlId::Index(3), Binding::noop()),
            (
                "shifted",
                ControlId::Index(9),
                Binding::new(Action::SwitchMode("default".to_string()))
                    .with_trigger(Trigger::Release),
            ),
            (
                "shifted",
                ControlId::Index(12),
                Binding::new(Action::RunCommand(vec!["toggle-grayscale.sh".to_string()])),
            ),
        ];

        for (mode, control, binding) in expect {
            assert_eq!(table.lookup(mode, &control), Some(&binding), "{} / {}", mode, control);
        }
    }

    #[test]
    fn test_sequence_with_pause_and_nested_combo() {
        let config = parse(
            r#"
            [combos]
            flag = ["Meta_L+3", "Right"]
            twice = ["@flag", 50, "@flag"]

            [modes.default.bindings.8]
            action = { type = "emit", keys = "@twice" }
            "#,
        );
        let table = config.build().unwrap();
        let binding = table.lookup("default", &ControlId::Index(8)).unwrap();
        let Action::EmitKeyCombo(spec) = &binding.action else {
            panic!("expected emit action");
        };
        assert_eq!(spec.to_string(), "Meta_L+3, Right, 50ms, Meta_L+3, Right");
    }

    #[test]
    fn test_unknown_combo_and_recursion() {
        let config = parse(
            r#"
            [modes.default.bindings.1]
            action = { type = "emit", keys = "@nope" }
            "#,
        );
        assert!(matches!(config.build(), Err(ConfigError::UnknownCombo(n)) if n == "nope"));

        let config = parse(
            r#"
            [combos]
            a = "@b"
            b = ["@a"]

            [modes.default.bindings.1]
            action = { type = "emit", keys = "@a" }
            "#,
        );
        assert!(matches!(config.build(), Err(ConfigError::RecursiveCombo(_))));
    }

    #[test]
    fn test_unknown_key_symbol_rejected() {
        let config = parse(
            r#"
            [modes.default.bindings.1]
            action = { type = "emit", keys = "Control_L+Nonsense" }
            "#,
        );
        assert!(matches!(config.build(), Err(ConfigError::UnknownKey(k)) if k == "Nonsense"));
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let config = parse(
            r#"
            [modes.default]
            unmapped = [1]

            [modes.default.bindings.1]
            action = { type = "noop" }
            "#,
        );
        assert!(matches!(config.build(), Err(ConfigError::DuplicateBinding { .. })));
    }

    #[test]
    fn test_invalid_actions_are_located() {
        let config = parse(
            r#"
            [modes.default.bindings.4]
            action = { type = "command", argv = [] }
            "#,
        );
        match config.build() {
            Err(ConfigError::InvalidAction { mode, control, .. }) => {
                assert_eq!(mode, "default");
                assert_eq!(control, ControlId::Index(4));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let config = parse(
            r#"
            [modes.default.bindings.cc9]
            action = { type = "directional", up = "Up", down = "Down", threshold = 200 }
            "#,
        );
        assert!(matches!(config.build(), Err(ConfigError::InvalidAction { .. })));
    }
}
