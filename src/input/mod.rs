//! Synthetic keyboard input

pub mod keystrokes;

use tracing::info;

use crate::error::InjectError;
use crate::mapping::{Key, KeyCombo};

pub use keystrokes::KeystrokeSender;

/// Delivers key chords to the display server
///
/// A chord is pressed in order and released in reverse order.
pub trait Injector: Send {
    /// Whether this injector can synthesize `key` at all
    fn supports(&self, key: &Key) -> bool;

    fn press(&mut self, combo: &KeyCombo) -> Result<(), InjectError>;

    fn release(&mut self, combo: &KeyCombo) -> Result<(), InjectError>;

    fn click(&mut self, combo: &KeyCombo) -> Result<(), InjectError> {
        self.press(combo)?;
        self.release(combo)
    }
}

/// Injector for `--dry-run`: logs what would be typed
#[derive(Debug, Default)]
pub struct DryRunInjector;

impl Injector for DryRunInjector {
    fn supports(&self, _key: &Key) -> bool {
        true
    }

    fn press(&mut self, combo: &KeyCombo) -> Result<(), InjectError> {
        info!("[dry-run] press {}", combo);
        Ok(())
    }

    fn release(&mut self, combo: &KeyCombo) -> Result<(), InjectError> {
        info!("[dry-run] release {}", combo);
        Ok(())
    }

    fn click(&mut self, combo: &KeyCombo) -> Result<(), InjectError> {
        info!("[dry-run] {}", combo);
        Ok(())
    }
}
