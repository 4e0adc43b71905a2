//! Minimal MIDI channel-voice message decoding/encoding
//!
//! Only the messages a control surface sends for buttons, knobs and faders
//! are decoded; everything else is reported as [`MidiMessage::Other`].

/// A decoded MIDI message. Channels are 0-based on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, param: u8, value: u8 },
    Other,
}

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xb0;

impl MidiMessage {
    /// Decode one message. A Note On with velocity 0 is a Note Off.
    pub fn parse(bytes: &[u8]) -> Self {
        let [status, data1, data2, ..] = *bytes else {
            return MidiMessage::Other;
        };
        let channel = status & 0x0f;
        let (data1, data2) = (data1 & 0x7f, data2 & 0x7f);

        match status & 0xf0 {
            NOTE_ON if data2 == 0 => MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: 0,
            },
            NOTE_ON => MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            },
            NOTE_OFF => MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            },
            CONTROL_CHANGE => MidiMessage::ControlChange {
                channel,
                param: data1,
                value: data2,
            },
            _ => MidiMessage::Other,
        }
    }

    /// Encode to wire bytes; `Other` encodes to nothing
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![NOTE_ON | (channel & 0x0f), note & 0x7f, velocity & 0x7f],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => vec![NOTE_OFF | (channel & 0x0f), note & 0x7f, velocity & 0x7f],
            MidiMessage::ControlChange {
                channel,
                param,
                value,
            } => vec![CONTROL_CHANGE | (channel & 0x0f), param & 0x7f, value & 0x7f],
            MidiMessage::Other => Vec::new(),
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => Some(*channel),
            MidiMessage::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_messages() {
        assert_eq!(
            MidiMessage::parse(&[0x99, 8, 127]),
            MidiMessage::NoteOn {
                channel: 9,
                note: 8,
                velocity: 127
            }
        );
        assert_eq!(
            MidiMessage::parse(&[0x89, 8, 0]),
            MidiMessage::NoteOff {
                channel: 9,
                note: 8,
                velocity: 0
            }
        );
        // Running-status style note off
        assert_eq!(
            MidiMessage::parse(&[0x99, 8, 0]),
            MidiMessage::NoteOff {
                channel: 9,
                note: 8,
                velocity: 0
            }
        );
    }

    #[test]
    fn test_parse_control_change_and_others() {
        assert_eq!(
            MidiMessage::parse(&[0xb9, 2, 65]),
            MidiMessage::ControlChange {
                channel: 9,
                param: 2,
                value: 65
            }
        );
        assert_eq!(MidiMessage::parse(&[0xf8]), MidiMessage::Other);
        assert_eq!(MidiMessage::parse(&[0xe0, 0, 64]), MidiMessage::Other);
        assert_eq!(MidiMessage::parse(&[]), MidiMessage::Other);
    }

    #[test]
    fn test_encode() {
        let cc = MidiMessage::ControlChange {
            channel: 9,
            param: 1,
            value: 64,
        };
        assert_eq!(cc.to_bytes(), [0xb9, 1, 64]);
        assert_eq!(MidiMessage::parse(&cc.to_bytes()), cc);
        assert!(MidiMessage::Other.to_bytes().is_empty());
    }
}
