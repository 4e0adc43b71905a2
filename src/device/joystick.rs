//! Linux joystick transport (`/dev/input/jsN`)
//!
//! See <https://www.kernel.org/doc/Documentation/input/joystick-api.txt>.
//! Each read yields an 8-byte `js_event`: `u32 time, i16 value, u8 type,
//! u8 number`. Sticks and triggers are treated as switches: an axis counts
//! as pressed in one direction while it is pushed to (or past) the threshold.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use super::layout::{AxisDirection, Layout, RawControl};
use super::{ControlEvent, EventSender};
use crate::error::TransportError;

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_AXIS: u8 = 0x02;
const JS_EVENT_INIT: u8 = 0x80;

/// Size of one `js_event` record
pub const JS_EVENT_SIZE: usize = 8;

/// Default axis deflection that counts as a press
pub const DEFAULT_AXIS_THRESHOLD: i16 = 32767;

/// A raw `js_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsEvent {
    pub time: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl JsEvent {
    pub fn parse(buf: &[u8; JS_EVENT_SIZE]) -> Self {
        Self {
            time: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            value: i16::from_ne_bytes([buf[4], buf[5]]),
            kind: buf[6],
            number: buf[7],
        }
    }
}

/// Previous axis positions for edge detection
#[derive(Debug)]
pub struct JoystickState {
    axes: HashMap<u8, Option<AxisDirection>>,
    threshold: i16,
}

impl JoystickState {
    pub fn new(threshold: i16) -> Self {
        Self {
            axes: HashMap::new(),
            threshold: threshold.max(1),
        }
    }

    /// Translate one raw record into zero or more control events
    pub fn translate(&mut self, event: JsEvent, layout: &Layout) -> Vec<ControlEvent> {
        if event.kind & JS_EVENT_INIT != 0 {
            // Synthetic events describing the initial state
            return Vec::new();
        }

        match event.kind {
            JS_EVENT_BUTTON => {
                let (id, class) = layout.resolve(RawControl::Button(event.number));
                vec![ControlEvent {
                    id,
                    class,
                    value: i32::from(event.value != 0),
                }]
            }
            JS_EVENT_AXIS => {
                let position = if event.value >= self.threshold {
                    Some(AxisDirection::Positive)
                } else if event.value <= -self.threshold {
                    Some(AxisDirection::Negative)
                } else {
                    None
                };

                let previous = self.axes.insert(event.number, position).flatten();
                if previous == position {
                    return Vec::new();
                }

                let mut events = Vec::new();
                if let Some(dir) = previous {
                    let (id, class) = layout.resolve(RawControl::Axis(event.number, dir));
                    events.push(ControlEvent { id, class, value: 0 });
                }
                if let Some(dir) = position {
                    let (id, class) = layout.resolve(RawControl::Axis(event.number, dir));
                    events.push(ControlEvent { id, class, value: 1 });
                }
                events
            }
            other => {
                debug!("Unknown joystick event type 0x{:02x}", other);
                Vec::new()
            }
        }
    }
}

/// Open a joystick device and forward its events from a reader thread
pub fn spawn(
    path: &Path,
    layout: Layout,
    threshold: i16,
    events: EventSender,
) -> Result<JoinHandle<()>, TransportError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TransportError::NotFound(path.display().to_string()),
        _ => TransportError::Io(e),
    })?;
    info!("Mapping inputs from {}", path.display());

    let path = path.to_path_buf();
    let handle = std::thread::Builder::new()
        .name("joystick".to_string())
        .spawn(move || read_loop(file, path, layout, threshold, events))?;
    Ok(handle)
}

fn read_loop(mut file: File, path: PathBuf, layout: Layout, threshold: i16, events: EventSender) {
    let mut state = JoystickState::new(threshold);
    let mut buf = [0u8; JS_EVENT_SIZE];

    loop {
        if let Err(e) = file.read_exact(&mut buf) {
            // ENODEV is how the kernel reports an unplugged joystick
            let disconnected =
                e.kind() == ErrorKind::UnexpectedEof || e.raw_os_error() == Some(libc::ENODEV);
            let err = if disconnected {
                TransportError::Disconnected(path.display().to_string())
            } else {
                warn!("Error reading {}: {}", path.display(), e);
                TransportError::Io(e)
            };
            let _ = events.send(Err(err));
            return;
        }

        let raw = JsEvent::parse(&buf);
        debug!(
            "Joystick event: type {} number {} value {}",
            raw.kind, raw.number, raw.value
        );
        for event in state.translate(raw, &layout) {
            if events.send(Ok(event)).is_err() {
                // Receiver gone: the app is shutting down
                return;
            }
        }
    }
}
