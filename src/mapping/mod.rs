//! Mapping table: which action each control performs in each mode
//!
//! The table is built once at startup from the configuration (see [`store`])
//! and never changes afterwards. Every mode is fully explicit: a control that
//! is bound in one mode must be bound, or explicitly listed as unmapped, in
//! every other mode. Incomplete configurations are rejected at load time.

pub mod keys;
pub mod store;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

pub use keys::{Key, KeyCode, KeyCombo, KeySpec, KeyStep};
pub use store::MappingConfig;

/// Stable identifier of one physical control
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlId {
    /// Numbered control, e.g. a MIDI note number
    Index(u32),
    /// Named control, e.g. `cc9` or `axis8+`
    Name(String),
}

impl FromStr for ControlId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidControlId(s.to_string()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse::<u32>()
                .map(ControlId::Index)
                .map_err(|_| ConfigError::InvalidControlId(s.to_string()))
        } else {
            Ok(ControlId::Name(s.to_string()))
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlId::Index(n) => write!(f, "{}", n),
            ControlId::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for ControlId {
    fn from(n: u32) -> Self {
        ControlId::Index(n)
    }
}

impl From<&str> for ControlId {
    fn from(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| ControlId::Name(name.to_string()))
    }
}

/// When a button binding fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    /// On the press edge
    #[default]
    Press,
    /// On the release edge
    Release,
    /// Key-down on press, key-up on release
    Hold,
}

/// What a control does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Emit a key sequence
    EmitKeyCombo(KeySpec),
    /// Make another mode the active one
    SwitchMode(String),
    /// Flip the control's latch and emit the matching sequence
    ToggleAndEmit { on: KeySpec, off: KeySpec },
    /// Separate sequences per direction of travel, for knobs and sliders
    Directional {
        up: KeySpec,
        down: KeySpec,
        zero: Option<KeySpec>,
        /// Minimum slider travel before a step registers
        threshold: u8,
    },
    /// Spawn an external program
    RunCommand(Vec<String>),
    /// Replay the surface's intro animation
    Intro,
    /// Explicitly does nothing
    NoOp,
}

/// Which LED reflects a binding's state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedbackSpec {
    /// LED to drive; defaults to the bound control's own LED
    pub led: Option<ControlId>,
}

/// Action plus its auxiliary parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub action: Action,
    pub feedback: Option<FeedbackSpec>,
    pub trigger: Trigger,
    pub description: Option<String>,
}

impl Binding {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            feedback: None,
            trigger: Trigger::default(),
            description: None,
        }
    }

    pub fn noop() -> Self {
        Self::new(Action::NoOp)
    }

    pub fn with_feedback(mut self) -> Self {
        self.feedback = Some(FeedbackSpec::default());
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// LED driven by this binding when bound to `control`, if any
    pub fn led(&self, control: &ControlId) -> Option<ControlId> {
        self.feedback
            .as_ref()
            .map(|spec| spec.led.clone().unwrap_or_else(|| control.clone()))
    }

    /// Text used in log lines
    pub fn label(&self) -> String {
        if let Some(desc) = &self.description {
            return desc.clone();
        }
        match &self.action {
            Action::EmitKeyCombo(keys) => keys.to_string(),
            Action::SwitchMode(mode) => format!("mode {}", mode),
            Action::ToggleAndEmit { .. } => "toggle".to_string(),
            Action::Directional { .. } => "directional".to_string(),
            Action::RunCommand(argv) => argv.join(" "),
            Action::Intro => "intro".to_string(),
            Action::NoOp => "no-op".to_string(),
        }
    }

    /// Every key this binding can emit
    pub fn keys(&self) -> Vec<&Key> {
        match &self.action {
            Action::EmitKeyCombo(spec) => spec.keys().collect(),
            Action::ToggleAndEmit { on, off } => on.keys().chain(off.keys()).collect(),
            Action::Directional { up, down, zero, .. } => up
                .keys()
                .chain(down.keys())
                .chain(zero.iter().flat_map(|z| z.keys()))
                .collect(),
            Action::SwitchMode(_) | Action::RunCommand(_) | Action::Intro | Action::NoOp => {
                Vec::new()
            }
        }
    }
}

/// Validated, immutable `(mode, control) -> binding` table
#[derive(Debug, Clone)]
pub struct MappingTable {
    initial_mode: String,
    modes: BTreeMap<String, BTreeMap<ControlId, Binding>>,
    known: BTreeSet<ControlId>,
    leds: BTreeSet<ControlId>,
}

impl MappingTable {
    /// Validate and build a table.
    ///
    /// Fails when the initial mode or a switch target is undefined, or when a
    /// control bound in one mode is missing from another.
    pub fn new(
        initial_mode: impl Into<String>,
        modes: BTreeMap<String, BTreeMap<ControlId, Binding>>,
    ) -> Result<Self, ConfigError> {
        let initial_mode = initial_mode.into();

        if modes.is_empty() {
            return Err(ConfigError::NoModes);
        }
        if !modes.contains_key(&initial_mode) {
            return Err(ConfigError::UnknownInitialMode(initial_mode));
        }

        let known: BTreeSet<ControlId> = modes
            .values()
            .flat_map(|bindings| bindings.keys().cloned())
            .collect();

        let mut leds = BTreeSet::new();
        for (mode, bindings) in &modes {
            for control in &known {
                let Some(binding) = bindings.get(control) else {
                    return Err(ConfigError::MissingBinding {
                        mode: mode.clone(),
                        control: control.clone(),
                    });
                };

                if let Action::SwitchMode(target) = &binding.action {
                    if !modes.contains_key(target) {
                        return Err(ConfigError::UnknownSwitchTarget {
                            mode: mode.clone(),
                            control: control.clone(),
                            target: target.clone(),
                        });
                    }
                }

                leds.extend(binding.led(control));
            }
        }

        Ok(Self {
            initial_mode,
            modes,
            known,
            leds,
        })
    }

    /// Binding for a control in a mode; `None` only for controls unknown to every mode
    pub fn lookup(&self, mode: &str, control: &ControlId) -> Option<&Binding> {
        self.modes.get(mode).and_then(|bindings| bindings.get(control))
    }

    pub fn initial_mode(&self) -> &str {
        &self.initial_mode
    }

    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    pub fn contains_mode(&self, mode: &str) -> bool {
        self.modes.contains_key(mode)
    }

    /// Whether any mode binds this control
    pub fn is_known(&self, control: &ControlId) -> bool {
        self.known.contains(control)
    }

    /// Every control bound in any mode, sorted
    pub fn controls(&self) -> impl Iterator<Item = &ControlId> {
        self.known.iter()
    }

    /// Every binding of a mode, in control order
    pub fn bindings(&self, mode: &str) -> impl Iterator<Item = (&ControlId, &Binding)> {
        self.modes.get(mode).into_iter().flat_map(|b| b.iter())
    }

    /// Every LED referenced by a feedback spec in any mode, sorted
    pub fn feedback_leds(&self) -> &BTreeSet<ControlId> {
        &self.leds
    }

    /// Every distinct key any binding can emit
    pub fn keys(&self) -> BTreeMap<String, Key> {
        self.modes
            .values()
            .flat_map(|bindings| bindings.values())
            .flat_map(|binding| binding.keys())
            .map(|key| (key.name().to_string(), key.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(chord: &str) -> Action {
        Action::EmitKeyCombo(KeySpec::chord(KeyCombo::parse(chord).unwrap()))
    }

    fn table(entries: &[(&str, u32, Binding)]) -> Result<MappingTable, ConfigError> {
        let mut modes: BTreeMap<String, BTreeMap<ControlId, Binding>> = BTreeMap::new();
        for (mode, control, binding) in entries {
            modes
                .entry(mode.to_string())
                .or_default()
                .insert(ControlId::Index(*control), binding.clone());
        }
        MappingTable::new("default", modes)
    }

    #[test]
    fn test_control_id_parse_and_display() {
        assert_eq!("7".parse::<ControlId>().unwrap(), ControlId::Index(7));
        assert_eq!(
            "axis8+".parse::<ControlId>().unwrap(),
            ControlId::Name("axis8+".to_string())
        );
        assert!("".parse::<ControlId>().is_err());
        assert_eq!(ControlId::from("cc9").to_string(), "cc9");
        assert_eq!(ControlId::Index(12).to_string(), "12");
    }

    #[test]
    fn test_lookup_returns_configured_binding() {
        let save = Binding::new(emit("ctrl+s")).with_description("Save");
        let table = table(&[("default", 7, save.clone())]).unwrap();

        assert_eq!(table.lookup("default", &ControlId::Index(7)), Some(&save));
        assert_eq!(table.lookup("default", &ControlId::Index(8)), None);
        assert_eq!(table.lookup("missing", &ControlId::Index(7)), None);
        assert!(table.is_known(&ControlId::Index(7)));
    }

    #[test]
    fn test_incomplete_mode_is_rejected() {
        let result = table(&[
            ("default", 7, Binding::new(emit("ctrl+s"))),
            ("shifted", 8, Binding::new(emit("F1"))),
        ]);
        assert!(matches!(result, Err(ConfigError::MissingBinding { .. })));
    }

    #[test]
    fn test_explicit_noop_completes_mode() {
        let table = table(&[
            ("default", 7, Binding::new(emit("ctrl+s"))),
            ("default", 8, Binding::noop()),
            ("shifted", 7, Binding::noop()),
            ("shifted", 8, Binding::new(emit("F1"))),
        ])
        .unwrap();
        assert_eq!(table.modes().collect::<Vec<_>>(), ["default", "shifted"]);
    }

    #[test]
    fn test_unknown_switch_target_is_rejected() {
        let result = table(&[(
            "default",
            9,
            Binding::new(Action::SwitchMode("nowhere".to_string())),
        )]);
        assert!(matches!(
            result,
            Err(ConfigError::UnknownSwitchTarget { target, .. }) if target == "nowhere"
        ));
    }

    #[test]
    fn test_unknown_initial_mode_is_rejected() {
        let mut modes = BTreeMap::new();
        modes.insert("shifted".to_string(), BTreeMap::new());
        assert!(matches!(
            MappingTable::new("default", modes),
            Err(ConfigError::UnknownInitialMode(_))
        ));
        assert!(matches!(
            MappingTable::new("default", BTreeMap::new()),
            Err(ConfigError::NoModes)
        ));
    }

    #[test]
    fn test_feedback_leds_collected() {
        let mut mode_led = Binding::new(Action::SwitchMode("default".to_string())).with_feedback();
        mode_led.feedback = Some(FeedbackSpec {
            led: Some(ControlId::Index(20)),
        });
        let table = table(&[
            ("default", 3, Binding::new(emit("F1")).with_feedback()),
            ("default", 9, mode_led),
        ])
        .unwrap();

        let leds: Vec<_> = table.feedback_leds().iter().cloned().collect();
        assert_eq!(leds, [ControlId::Index(3), ControlId::Index(20)]);
    }

    #[test]
    fn test_keys_collects_every_key() {
        let table = table(&[
            ("default", 1, Binding::new(emit("ctrl+s"))),
            (
                "default",
                2,
                Binding::new(Action::ToggleAndEmit {
                    on: KeySpec::chord(KeyCombo::parse("F1").unwrap()),
                    off: KeySpec::chord(KeyCombo::parse("F2").unwrap()),
                }),
            ),
        ])
        .unwrap();
        let keys: Vec<_> = table.keys().into_keys().collect();
        assert_eq!(keys, ["F1", "F2", "ctrl", "s"]);
    }
}
