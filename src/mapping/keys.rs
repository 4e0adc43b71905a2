//! Symbolic keys, chords and key sequences
//!
//! Keys are named the way X11 names them (see `/usr/include/X11/keysymdef.h`),
//! e.g. `Control_L`, `Page_Up`, `F3` or `XF86AudioRaiseVolume`. A few friendly
//! aliases (`ctrl`, `shift`, `enter`, ...) and any single character are accepted
//! as well.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// What the injector actually needs to synthesize a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character, typed through its unicode value
    Char(char),
    /// An X11 keysym
    Keysym(u32),
}

/// A symbolic key as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    name: String,
    code: KeyCode,
}

/// X11 keysyms for the named keys we accept
const KEYSYMS: &[(&str, u32)] = &[
    // Modifiers
    ("Shift_L", 0xffe1),
    ("Shift_R", 0xffe2),
    ("Control_L", 0xffe3),
    ("Control_R", 0xffe4),
    ("Caps_Lock", 0xffe5),
    ("Meta_L", 0xffe7),
    ("Meta_R", 0xffe8),
    ("Alt_L", 0xffe9),
    ("Alt_R", 0xffea),
    ("Super_L", 0xffeb),
    ("Super_R", 0xffec),
    ("Hyper_L", 0xffed),
    ("Hyper_R", 0xffee),
    // TTY function keys
    ("BackSpace", 0xff08),
    ("Tab", 0xff09),
    ("Return", 0xff0d),
    ("Pause", 0xff13),
    ("Scroll_Lock", 0xff14),
    ("Escape", 0xff1b),
    ("Delete", 0xffff),
    // Cursor control
    ("Home", 0xff50),
    ("Left", 0xff51),
    ("Up", 0xff52),
    ("Right", 0xff53),
    ("Down", 0xff54),
    ("Prior", 0xff55),
    ("Page_Up", 0xff55),
    ("Next", 0xff56),
    ("Page_Down", 0xff56),
    ("End", 0xff57),
    ("Print", 0xff61),
    ("Insert", 0xff63),
    ("Menu", 0xff67),
    ("Num_Lock", 0xff7f),
    // Keypad
    ("KP_Enter", 0xff8d),
    ("KP_Multiply", 0xffaa),
    ("KP_Add", 0xffab),
    ("KP_Subtract", 0xffad),
    ("KP_Divide", 0xffaf),
    // Multimedia (XF86keysym.h)
    ("XF86MonBrightnessUp", 0x1008ff02),
    ("XF86MonBrightnessDown", 0x1008ff03),
    ("XF86AudioLowerVolume", 0x1008ff11),
    ("XF86AudioMute", 0x1008ff12),
    ("XF86AudioRaiseVolume", 0x1008ff13),
    ("XF86AudioPlay", 0x1008ff14),
    ("XF86AudioStop", 0x1008ff15),
    ("XF86AudioPrev", 0x1008ff16),
    ("XF86AudioNext", 0x1008ff17),
];

/// Latin-1 keysym names that stand for a printable character
const CHAR_NAMES: &[(&str, char)] = &[
    ("space", ' '),
    ("exclam", '!'),
    ("quotedbl", '"'),
    ("numbersign", '#'),
    ("dollar", '$'),
    ("percent", '%'),
    ("ampersand", '&'),
    ("apostrophe", '\''),
    ("parenleft", '('),
    ("parenright", ')'),
    ("asterisk", '*'),
    ("plus", '+'),
    ("comma", ','),
    ("minus", '-'),
    ("period", '.'),
    ("slash", '/'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("less", '<'),
    ("equal", '='),
    ("greater", '>'),
    ("question", '?'),
    ("at", '@'),
    ("bracketleft", '['),
    ("backslash", '\\'),
    ("bracketright", ']'),
    ("asciicircum", '^'),
    ("underscore", '_'),
    ("grave", '`'),
    ("braceleft", '{'),
    ("bar", '|'),
    ("braceright", '}'),
    ("asciitilde", '~'),
];

/// Friendly spellings, matched case-insensitively
const ALIASES: &[(&str, &str)] = &[
    ("ctrl", "Control_L"),
    ("control", "Control_L"),
    ("shift", "Shift_L"),
    ("alt", "Alt_L"),
    ("meta", "Meta_L"),
    ("super", "Super_L"),
    ("win", "Super_L"),
    ("cmd", "Super_L"),
    ("enter", "Return"),
    ("return", "Return"),
    ("esc", "Escape"),
    ("escape", "Escape"),
    ("del", "Delete"),
    ("delete", "Delete"),
    ("backspace", "BackSpace"),
    ("tab", "Tab"),
    ("up", "Up"),
    ("down", "Down"),
    ("left", "Left"),
    ("right", "Right"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "Page_Up"),
    ("pagedown", "Page_Down"),
    ("insert", "Insert"),
    ("volumeup", "XF86AudioRaiseVolume"),
    ("volumedown", "XF86AudioLowerVolume"),
    ("mute", "XF86AudioMute"),
    ("playpause", "XF86AudioPlay"),
];

const F1_KEYSYM: u32 = 0xffbe;
const MAX_FUNCTION_KEY: u32 = 35;

fn lookup_code(name: &str) -> Option<KeyCode> {
    if let Some(&(_, sym)) = KEYSYMS.iter().find(|(n, _)| *n == name) {
        return Some(KeyCode::Keysym(sym));
    }
    if let Some(&(_, c)) = CHAR_NAMES.iter().find(|(n, _)| *n == name) {
        return Some(KeyCode::Char(c));
    }

    // F1 .. F35 are contiguous
    if let Some(n) = name
        .strip_prefix('F')
        .and_then(|digits| digits.parse::<u32>().ok())
    {
        if (1..=MAX_FUNCTION_KEY).contains(&n) {
            return Some(KeyCode::Keysym(F1_KEYSYM + n - 1));
        }
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(c));
    }

    let lower = name.to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .and_then(|(_, target)| lookup_code(target))
}

impl Key {
    /// Resolve a symbolic key name
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        let code = lookup_code(name).ok_or_else(|| ConfigError::UnknownKey(name.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            code,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> KeyCode {
        self.code
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Keys pressed together: modifiers first, main key last.
///
/// Pressed in order and released in reverse order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo(Vec<Key>);

impl KeyCombo {
    /// Parse a chord such as `Control_L+Shift_R+Left`
    pub fn parse(chord: &str) -> Result<Self, ConfigError> {
        let chord = chord.trim();
        // A lone "+" is the plus key itself
        if chord == "+" {
            return Ok(Self(vec![Key::parse(chord)?]));
        }
        if chord.is_empty() {
            return Err(ConfigError::EmptyChord(chord.to_string()));
        }

        let keys = chord
            .split('+')
            .map(|part| {
                if part.trim().is_empty() {
                    Err(ConfigError::EmptyChord(chord.to_string()))
                } else {
                    Key::parse(part)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(keys))
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

/// One element of a key sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStep {
    Chord(KeyCombo),
    Pause(Duration),
}

/// An ordered key sequence: chords with optional pauses between them
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeySpec(Vec<KeyStep>);

impl KeySpec {
    pub fn new(steps: Vec<KeyStep>) -> Self {
        Self(steps)
    }

    /// A sequence made of a single chord
    pub fn chord(combo: KeyCombo) -> Self {
        Self(vec![KeyStep::Chord(combo)])
    }

    pub fn steps(&self) -> &[KeyStep] {
        &self.0
    }

    /// Every key used anywhere in the sequence
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.0
            .iter()
            .filter_map(|step| match step {
                KeyStep::Chord(combo) => Some(combo),
                KeyStep::Pause(_) => None,
            })
            .flat_map(|combo| combo.keys().iter())
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match step {
                KeyStep::Chord(combo) => write!(f, "{}", combo)?,
                KeyStep::Pause(d) => write!(f, "{}ms", d.as_millis())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keysym_names() {
        assert_eq!(Key::parse("Control_L").unwrap().code(), KeyCode::Keysym(0xffe3));
        assert_eq!(Key::parse("Page_Down").unwrap().code(), KeyCode::Keysym(0xff56));
        assert_eq!(Key::parse("F1").unwrap().code(), KeyCode::Keysym(0xffbe));
        assert_eq!(Key::parse("F12").unwrap().code(), KeyCode::Keysym(0xffc9));
        assert_eq!(
            Key::parse("XF86AudioRaiseVolume").unwrap().code(),
            KeyCode::Keysym(0x1008ff13)
        );
    }

    #[test]
    fn test_parse_chars_and_aliases() {
        assert_eq!(Key::parse("s").unwrap().code(), KeyCode::Char('s'));
        assert_eq!(Key::parse("slash").unwrap().code(), KeyCode::Char('/'));
        assert_eq!(Key::parse("ctrl").unwrap().code(), KeyCode::Keysym(0xffe3));
        assert_eq!(Key::parse("Enter").unwrap().code(), KeyCode::Keysym(0xff0d));
        // The configured spelling is kept for display
        assert_eq!(Key::parse("ctrl").unwrap().name(), "ctrl");
    }

    #[test]
    fn test_unknown_key() {
        assert!(matches!(
            Key::parse("NotAKey"),
            Err(ConfigError::UnknownKey(name)) if name == "NotAKey"
        ));
        assert!(Key::parse("F36").is_err());
        assert!(Key::parse("F0").is_err());
    }

    #[test]
    fn test_parse_chord() {
        let combo = KeyCombo::parse("Control_L+Shift_R+Left").unwrap();
        let names: Vec<_> = combo.keys().iter().map(|k| k.name()).collect();
        assert_eq!(names, ["Control_L", "Shift_R", "Left"]);
        assert_eq!(combo.to_string(), "Control_L+Shift_R+Left");

        assert_eq!(KeyCombo::parse("+").unwrap().keys()[0].code(), KeyCode::Char('+'));
        assert!(KeyCombo::parse("").is_err());
        assert!(KeyCombo::parse("ctrl+").is_err());
    }

    #[test]
    fn test_spec_keys_and_display() {
        let spec = KeySpec::new(vec![
            KeyStep::Chord(KeyCombo::parse("Meta_L+3").unwrap()),
            KeyStep::Pause(Duration::from_millis(20)),
            KeyStep::Chord(KeyCombo::parse("Right").unwrap()),
        ]);
        let names: Vec<_> = spec.keys().map(|k| k.name()).collect();
        assert_eq!(names, ["Meta_L", "3", "Right"]);
        assert_eq!(spec.to_string(), "Meta_L+3, 20ms, Right");
    }
}
