use enigo::{Direction, Enigo, Key as EnigoKey, Keyboard, Settings};
use tracing::debug;

use super::Injector;
use crate::error::InjectError;
use crate::mapping::{Key, KeyCode, KeyCombo};

/// Keysyms enigo has a named key for on every platform
const NAMED_KEYS: &[(u32, EnigoKey)] = &[
    (0xffe1, EnigoKey::Shift),
    (0xffe2, EnigoKey::Shift),
    (0xffe3, EnigoKey::Control),
    (0xffe4, EnigoKey::Control),
    (0xffe5, EnigoKey::CapsLock),
    (0xffe7, EnigoKey::Meta),
    (0xffe8, EnigoKey::Meta),
    (0xffe9, EnigoKey::Alt),
    (0xffea, EnigoKey::Alt),
    (0xffeb, EnigoKey::Meta),
    (0xffec, EnigoKey::Meta),
    (0xff08, EnigoKey::Backspace),
    (0xff09, EnigoKey::Tab),
    (0xff0d, EnigoKey::Return),
    (0xff1b, EnigoKey::Escape),
    (0xffff, EnigoKey::Delete),
    (0xff50, EnigoKey::Home),
    (0xff51, EnigoKey::LeftArrow),
    (0xff52, EnigoKey::UpArrow),
    (0xff53, EnigoKey::RightArrow),
    (0xff54, EnigoKey::DownArrow),
    (0xff55, EnigoKey::PageUp),
    (0xff56, EnigoKey::PageDown),
    (0xff57, EnigoKey::End),
    (0xffbe, EnigoKey::F1),
    (0xffbf, EnigoKey::F2),
    (0xffc0, EnigoKey::F3),
    (0xffc1, EnigoKey::F4),
    (0xffc2, EnigoKey::F5),
    (0xffc3, EnigoKey::F6),
    (0xffc4, EnigoKey::F7),
    (0xffc5, EnigoKey::F8),
    (0xffc6, EnigoKey::F9),
    (0xffc7, EnigoKey::F10),
    (0xffc8, EnigoKey::F11),
    (0xffc9, EnigoKey::F12),
];

/// Map a symbolic key to what enigo can type.
///
/// On X11 every keysym can be sent as-is; elsewhere only the keys in
/// [`NAMED_KEYS`] and printable characters are available.
fn enigo_key(code: KeyCode) -> Option<EnigoKey> {
    match code {
        KeyCode::Char(c) if c.is_control() => None,
        KeyCode::Char(c) => Some(EnigoKey::Unicode(c)),
        KeyCode::Keysym(sym) => NAMED_KEYS
            .iter()
            .find(|(s, _)| *s == sym)
            .map(|(_, key)| *key)
            .or_else(|| raw_keysym(sym)),
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn raw_keysym(sym: u32) -> Option<EnigoKey> {
    Some(EnigoKey::Other(sym))
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn raw_keysym(_sym: u32) -> Option<EnigoKey> {
    None
}

/// Sends keystrokes to the focused window
pub struct KeystrokeSender {
    enigo: Enigo,
}

impl KeystrokeSender {
    pub fn new() -> Result<Self, InjectError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InjectError::Init(e.to_string()))?;
        Ok(Self { enigo })
    }

    fn send(&mut self, key: &Key, direction: Direction) -> Result<(), InjectError> {
        let enigo_key = enigo_key(key.code()).ok_or_else(|| InjectError::Key {
            key: key.to_string(),
            reason: "not available on this platform".to_string(),
        })?;
        debug!("Sending key {} {:?}", key, direction);
        self.enigo
            .key(enigo_key, direction)
            .map_err(|e| InjectError::Key {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Injector for KeystrokeSender {
    fn supports(&self, key: &Key) -> bool {
        enigo_key(key.code()).is_some()
    }

    fn press(&mut self, combo: &KeyCombo) -> Result<(), InjectError> {
        press_keys(combo.keys(), |key, dir| self.send(key, dir))
    }

    fn release(&mut self, combo: &KeyCombo) -> Result<(), InjectError> {
        release_keys(combo.keys(), |key, dir| self.send(key, dir))
    }

    fn click(&mut self, combo: &KeyCombo) -> Result<(), InjectError> {
        click_keys(combo.keys(), |key, dir| self.send(key, dir))
    }
}

/// Press keys in order. If one fails, the keys already down are released
/// again before the error is returned.
fn press_keys<F>(keys: &[Key], mut send: F) -> Result<(), InjectError>
where
    F: FnMut(&Key, Direction) -> Result<(), InjectError>,
{
    for (i, key) in keys.iter().enumerate() {
        if let Err(e) = send(key, Direction::Press) {
            let _ = release_keys(&keys[..i], &mut send);
            return Err(e);
        }
    }
    Ok(())
}

/// Release keys in reverse order, carrying on past failures
fn release_keys<F>(keys: &[Key], mut send: F) -> Result<(), InjectError>
where
    F: FnMut(&Key, Direction) -> Result<(), InjectError>,
{
    let mut result = Ok(());
    for key in keys.iter().rev() {
        if let Err(e) = send(key, Direction::Release) {
            result = result.and(Err(e));
        }
    }
    result
}

/// Press modifiers, click the main key, release modifiers in reverse order.
/// Modifiers that went down are always released.
fn click_keys<F>(keys: &[Key], mut send: F) -> Result<(), InjectError>
where
    F: FnMut(&Key, Direction) -> Result<(), InjectError>,
{
    let Some((main, modifiers)) = keys.split_last() else {
        return Ok(());
    };
    press_keys(modifiers, &mut send)?;
    let clicked = send(main, Direction::Click);
    let released = release_keys(modifiers, &mut send);
    clicked.and(released)
}
