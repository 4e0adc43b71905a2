//! Control-surface transports
//!
//! Each transport normalizes raw device input into [`ControlEvent`]s and
//! pushes them into an [`EventStream`]. Transports that can light LEDs or
//! move knobs also provide a [`FeedbackSink`].

pub mod joystick;
pub mod layout;
pub mod message;
#[cfg(feature = "midi")]
pub mod midi;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::mapping::ControlId;

pub use layout::{Layout, RawControl};

/// Kind of physical control an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlClass {
    /// Button that is down while held (value > 0 pressed, 0 released)
    Momentary,
    /// Button whose raw value is on/off (value > 0 on, 0 off)
    ToggleRaw,
    /// Endless encoder reporting a signed delta
    RelativeRotary,
    /// Knob reporting an absolute position 0..=127
    AbsoluteRotary,
    /// Fader reporting an absolute position 0..=127
    Slider,
}

/// One normalized input from the control surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    pub id: ControlId,
    pub class: ControlClass,
    pub value: i32,
}

impl ControlEvent {
    pub fn new(id: impl Into<ControlId>, class: ControlClass, value: i32) -> Self {
        Self {
            id: id.into(),
            class,
            value,
        }
    }
}

/// Receiving end of a transport; an `Err` item means the surface is gone
pub type EventStream = mpsc::UnboundedReceiver<Result<ControlEvent, TransportError>>;

/// Sending end handed to transport threads
pub type EventSender = mpsc::UnboundedSender<Result<ControlEvent, TransportError>>;

/// Writes feedback (LEDs, knob positions) back to the control surface
pub trait FeedbackSink: Send {
    /// Turn an LED on or off
    fn set_feedback(&mut self, led: &ControlId, on: bool) -> Result<(), TransportError>;

    /// Move a knob (and its LED ring) to an absolute position
    fn set_value(&mut self, control: &ControlId, value: u8) -> Result<(), TransportError>;
}

/// Feedback sink for surfaces without LEDs
#[derive(Debug, Default)]
pub struct NullSink;

impl FeedbackSink for NullSink {
    fn set_feedback(&mut self, _led: &ControlId, _on: bool) -> Result<(), TransportError> {
        Ok(())
    }

    fn set_value(&mut self, _control: &ControlId, _value: u8) -> Result<(), TransportError> {
        Ok(())
    }
}
