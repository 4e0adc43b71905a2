//! Surface layout: which raw transport input is which control
//!
//! The layout translates transport-level addresses (MIDI note/CC numbers,
//! joystick button/axis numbers) into [`ControlId`]s and [`ControlClass`]es,
//! and back again for feedback. Anything not listed in the `[[controls]]`
//! section gets a default identity:
//!
//! - MIDI note N: control `N`, momentary
//! - MIDI CC N: control `ccN`, absolute rotary
//! - joystick button N: control `buttonN`, momentary
//! - joystick axis N: controls `axisN+` / `axisN-`, momentary

use serde::Deserialize;
use std::collections::HashMap;

use super::message::MidiMessage;
use super::{ControlClass, ControlEvent};
use crate::error::ConfigError;
use crate::mapping::store::ControlIdConfig;
use crate::mapping::ControlId;

/// Which end of a joystick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisDirection {
    Positive,
    Negative,
}

/// A transport-level control address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawControl {
    Note(u8),
    Cc(u8),
    Button(u8),
    Axis(u8, AxisDirection),
}

impl RawControl {
    fn default_identity(self) -> (ControlId, ControlClass) {
        match self {
            RawControl::Note(n) => (ControlId::Index(u32::from(n)), ControlClass::Momentary),
            RawControl::Cc(n) => (ControlId::Name(format!("cc{}", n)), ControlClass::AbsoluteRotary),
            RawControl::Button(n) => (
                ControlId::Name(format!("button{}", n)),
                ControlClass::Momentary,
            ),
            RawControl::Axis(n, dir) => {
                let sign = match dir {
                    AxisDirection::Positive => '+',
                    AxisDirection::Negative => '-',
                };
                (
                    ControlId::Name(format!("axis{}{}", n, sign)),
                    ControlClass::Momentary,
                )
            }
        }
    }
}

/// One `[[controls]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ControlLayoutConfig {
    pub id: ControlIdConfig,
    #[serde(default)]
    pub class: Option<ControlClass>,
    #[serde(default)]
    pub note: Option<u8>,
    #[serde(default)]
    pub cc: Option<u8>,
    #[serde(default)]
    pub button: Option<u8>,
    #[serde(default)]
    pub axis: Option<u8>,
    #[serde(default)]
    pub direction: Option<AxisDirection>,
}

impl ControlLayoutConfig {
    fn raw(&self, id: &ControlId) -> Result<RawControl, ConfigError> {
        let direction = self.direction.unwrap_or(AxisDirection::Positive);
        match (self.note, self.cc, self.button, self.axis) {
            (Some(n), None, None, None) => Ok(RawControl::Note(n)),
            (None, Some(n), None, None) => Ok(RawControl::Cc(n)),
            (None, None, Some(n), None) => Ok(RawControl::Button(n)),
            (None, None, None, Some(n)) => Ok(RawControl::Axis(n, direction)),
            _ => Err(ConfigError::InvalidLayout(id.clone())),
        }
    }
}

/// Bidirectional map between raw addresses and controls
#[derive(Debug, Clone, Default)]
pub struct Layout {
    forward: HashMap<RawControl, (ControlId, ControlClass)>,
    reverse: HashMap<ControlId, RawControl>,
}

impl Layout {
    pub fn from_config(entries: &[ControlLayoutConfig]) -> Result<Self, ConfigError> {
        let mut layout = Self::default();
        for entry in entries {
            let id = entry.id.to_control_id()?;
            let raw = entry.raw(&id)?;
            let class = entry.class.unwrap_or(raw.default_identity().1);
            layout.insert(raw, id, class);
        }
        Ok(layout)
    }

    pub fn insert(&mut self, raw: RawControl, id: ControlId, class: ControlClass) {
        self.reverse.insert(id.clone(), raw);
        self.forward.insert(raw, (id, class));
    }

    /// Control identity for a raw address
    pub fn resolve(&self, raw: RawControl) -> (ControlId, ControlClass) {
        self.forward
            .get(&raw)
            .cloned()
            .unwrap_or_else(|| raw.default_identity())
    }

    /// Raw address for a control, for writing feedback
    pub fn raw_for(&self, id: &ControlId) -> Option<RawControl> {
        if let Some(raw) = self.reverse.get(id) {
            return Some(*raw);
        }
        match id {
            ControlId::Index(n) => u8::try_from(*n).ok().filter(|n| *n < 128).map(RawControl::Note),
            ControlId::Name(name) => name
                .strip_prefix("cc")
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| *n < 128)
                .map(RawControl::Cc),
        }
    }

    /// Normalize a MIDI message into a control event
    pub fn midi_event(&self, message: MidiMessage) -> Option<ControlEvent> {
        let (raw, value) = match message {
            MidiMessage::NoteOn { note, velocity, .. } => (RawControl::Note(note), velocity),
            MidiMessage::NoteOff { note, .. } => (RawControl::Note(note), 0),
            MidiMessage::ControlChange { param, value, .. } => (RawControl::Cc(param), value),
            MidiMessage::Other => return None,
        };

        let (id, class) = self.resolve(raw);
        let value = match class {
            ControlClass::RelativeRotary => decode_relative(value),
            _ => i32::from(value),
        };
        Some(ControlEvent { id, class, value })
    }
}

/// Relative encoders send 1..=63 clockwise and 65..=127 counter-clockwise
pub fn decode_relative(value: u8) -> i32 {
    match value {
        1..=63 => i32::from(value),
        65..=127 => i32::from(value) - 128,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(note: u8, velocity: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: 9,
            note,
            velocity,
        }
    }

    fn cc(param: u8, value: u8) -> MidiMessage {
        MidiMessage::ControlChange {
            channel: 9,
            param,
            value,
        }
    }

    #[test]
    fn test_default_identities() {
        let layout = Layout::default();
        assert_eq!(
            layout.midi_event(note_on(8, 127)),
            Some(ControlEvent::new(8, ControlClass::Momentary, 127))
        );
        assert_eq!(
            layout.midi_event(MidiMessage::NoteOff {
                channel: 9,
                note: 8,
                velocity: 64
            }),
            Some(ControlEvent::new(8, ControlClass::Momentary, 0))
        );
        assert_eq!(
            layout.midi_event(cc(1, 70)),
            Some(ControlEvent::new("cc1", ControlClass::AbsoluteRotary, 70))
        );
        assert_eq!(layout.midi_event(MidiMessage::Other), None);
    }

    #[test]
    fn test_configured_layout() {
        #[derive(Deserialize)]
        struct Doc {
            controls: Vec<ControlLayoutConfig>,
        }
        let doc: Doc = toml::from_str(
            r#"
            controls = [
                { id = "slider", class = "slider", cc = 9 },
                { id = 3, class = "toggle_raw", note = 3 },
                { id = "jog", class = "relative_rotary", cc = 2 },
                { id = "dpad-left", axis = 8, direction = "negative" },
            ]
            "#,
        )
        .unwrap();
        let layout = Layout::from_config(&doc.controls).unwrap();

        assert_eq!(
            layout.midi_event(cc(9, 100)),
            Some(ControlEvent::new("slider", ControlClass::Slider, 100))
        );
        assert_eq!(
            layout.midi_event(note_on(3, 1)),
            Some(ControlEvent::new(3, ControlClass::ToggleRaw, 1))
        );
        assert_eq!(
            layout.midi_event(cc(2, 126)),
            Some(ControlEvent::new("jog", ControlClass::RelativeRotary, -2))
        );
        assert_eq!(
            layout.resolve(RawControl::Axis(8, AxisDirection::Negative)),
            (ControlId::from("dpad-left"), ControlClass::Momentary)
        );
        assert_eq!(layout.raw_for(&ControlId::from("slider")), Some(RawControl::Cc(9)));
    }

    #[test]
    fn test_raw_for_defaults() {
        let layout = Layout::default();
        assert_eq!(layout.raw_for(&ControlId::Index(10)), Some(RawControl::Note(10)));
        assert_eq!(layout.raw_for(&ControlId::from("cc4")), Some(RawControl::Cc(4)));
        assert_eq!(layout.raw_for(&ControlId::Index(300)), None);
        assert_eq!(layout.raw_for(&ControlId::from("button1")), None);
    }

    #[test]
    fn test_layout_entry_needs_one_address() {
        let entry = ControlLayoutConfig {
            id: ControlIdConfig::Index(1),
            class: None,
            note: Some(1),
            cc: Some(1),
            button: None,
            axis: None,
            direction: None,
        };
        assert!(matches!(
            Layout::from_config(&[entry]),
            Err(ConfigError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_decode_relative() {
        assert_eq!(decode_relative(1), 1);
        assert_eq!(decode_relative(63), 63);
        assert_eq!(decode_relative(127), -1);
        assert_eq!(decode_relative(65), -63);
        assert_eq!(decode_relative(64), 0);
        assert_eq!(decode_relative(0), 0);
    }
}
