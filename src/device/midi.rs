//! MIDI transport built on `midir`

use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::layout::{Layout, RawControl};
use super::message::MidiMessage;
use super::{EventSender, FeedbackSink};
use crate::error::TransportError;
use crate::mapping::ControlId;

const CLIENT_NAME: &str = "surface-keys";
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);
const LED_ON_VELOCITY: u8 = 127;

/// List the names of all MIDI input ports
pub fn list_ports() -> Result<Vec<String>, TransportError> {
    let input = MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Midi(e.to_string()))?;
    Ok(input
        .ports()
        .iter()
        .filter_map(|port| input.port_name(port).ok())
        .collect())
}

fn find_input_port(input: &MidiInput, device: &str) -> Option<(MidiInputPort, String)> {
    input.ports().into_iter().find_map(|port| {
        let name = input.port_name(&port).ok()?;
        name.contains(device).then_some((port, name))
    })
}

/// Open MIDI connection to a control surface
///
/// Dropping this closes both directions and stops the watchdog.
pub struct MidiSurface {
    _input: MidiInputConnection<()>,
    running: Arc<AtomicBool>,
}

impl MidiSurface {
    /// Connect to the first input port whose name contains `device`.
    ///
    /// `channel` is 1-based. Messages on other channels are ignored. Returns
    /// the surface plus a feedback sink for the matching output port, if any.
    pub fn connect(
        device: &str,
        channel: u8,
        layout: Layout,
        events: EventSender,
    ) -> Result<(Self, Option<MidiFeedback>), TransportError> {
        let mut input =
            MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Midi(e.to_string()))?;
        input.ignore(Ignore::All);

        let (port, port_name) = find_input_port(&input, device)
            .ok_or_else(|| TransportError::NotFound(device.to_string()))?;
        info!("Mapping inputs from {}", port_name);

        let wire_channel = channel.saturating_sub(1);
        let feedback = MidiFeedback::connect(device, wire_channel, layout.clone());

        let callback_events = events.clone();
        let connection = input
            .connect(
                &port,
                "surface-keys-in",
                move |_stamp, bytes, _| {
                    let message = MidiMessage::parse(bytes);
                    if message.channel() != Some(wire_channel) {
                        return;
                    }
                    debug!("MIDI message: {:?}", message);
                    if let Some(event) = layout.midi_event(message) {
                        let _ = callback_events.send(Ok(event));
                    }
                },
                (),
            )
            .map_err(|e| TransportError::Midi(e.to_string()))?;

        let running = Arc::new(AtomicBool::new(true));
        spawn_watchdog(device.to_string(), port_name, running.clone(), events)?;

        Ok((
            Self {
                _input: connection,
                running,
            },
            feedback,
        ))
    }
}

impl Drop for MidiSurface {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// midir has no disconnect notification, so poll the port list instead
fn spawn_watchdog(
    device: String,
    port_name: String,
    running: Arc<AtomicBool>,
    events: EventSender,
) -> Result<(), TransportError> {
    let watcher = MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Midi(e.to_string()))?;
    std::thread::Builder::new()
        .name("midi-watchdog".to_string())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                std::thread::sleep(WATCHDOG_INTERVAL);
                let present = watcher
                    .ports()
                    .iter()
                    .any(|port| watcher.port_name(port).is_ok_and(|name| name == port_name));
                if !present {
                    warn!("MIDI port '{}' went away", port_name);
                    let _ = events.send(Err(TransportError::Disconnected(device)));
                    return;
                }
            }
        })?;
    Ok(())
}

/// Feedback sink writing Note On/Off for LEDs and CC for knob positions
pub struct MidiFeedback {
    connection: MidiOutputConnection,
    channel: u8,
    layout: Layout,
}

impl MidiFeedback {
    fn connect(device: &str, channel: u8, layout: Layout) -> Option<Self> {
        let output = match MidiOutput::new(CLIENT_NAME) {
            Ok(output) => output,
            Err(e) => {
                warn!("MIDI output unavailable, no LED feedback: {}", e);
                return None;
            }
        };
        let port = output.ports().into_iter().find(|port| {
            output
                .port_name(port)
                .is_ok_and(|name| name.contains(device))
        });
        let Some(port) = port else {
            warn!("No MIDI output port matching '{}', no LED feedback", device);
            return None;
        };

        match output.connect(&port, "surface-keys-out") {
            Ok(connection) => Some(Self {
                connection,
                channel,
                layout,
            }),
            Err(e) => {
                warn!("Failed to open MIDI output: {}", e);
                None
            }
        }
    }

    fn send(&mut self, message: MidiMessage) -> Result<(), TransportError> {
        self.connection
            .send(&message.to_bytes())
            .map_err(|e| TransportError::Midi(e.to_string()))
    }

    fn address(&self, control: &ControlId) -> Result<RawControl, TransportError> {
        self.layout
            .raw_for(control)
            .ok_or_else(|| TransportError::Midi(format!("no MIDI address for control {}", control)))
    }
}

impl FeedbackSink for MidiFeedback {
    fn set_feedback(&mut self, led: &ControlId, on: bool) -> Result<(), TransportError> {
        let channel = self.channel;
        let message = match self.address(led)? {
            RawControl::Note(note) if on => MidiMessage::NoteOn {
                channel,
                note,
                velocity: LED_ON_VELOCITY,
            },
            RawControl::Note(note) => MidiMessage::NoteOff {
                channel,
                note,
                velocity: 0,
            },
            RawControl::Cc(param) => MidiMessage::ControlChange {
                channel,
                param,
                value: if on { LED_ON_VELOCITY } else { 0 },
            },
            other => {
                return Err(TransportError::Midi(format!(
                    "control {} ({:?}) has no MIDI LED",
                    led, other
                )))
            }
        };
        self.send(message)
    }

    fn set_value(&mut self, control: &ControlId, value: u8) -> Result<(), TransportError> {
        match self.address(control)? {
            RawControl::Cc(param) => self.send(MidiMessage::ControlChange {
                channel: self.channel,
                param,
                value: value.min(127),
            }),
            other => Err(TransportError::Midi(format!(
                "control {} ({:?}) is not a MIDI knob",
                control, other
            ))),
        }
    }
}
