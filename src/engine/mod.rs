//! Translation engine: control events in, effects out
//!
//! The engine owns all mutable mapping state (active mode, per-control
//! latches and last-seen values, LED shadow). [`Engine::handle`] runs to
//! completion for one event and returns the effects the caller must apply;
//! nothing else mutates the state.

mod feedback;
pub mod motion;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::device::{ControlClass, ControlEvent};
use crate::mapping::{Action, Binding, ControlId, KeyCombo, KeySpec, KeyStep, MappingTable, Trigger};

use motion::{Motion, KNOB_CENTRE};

/// How a chord is sent to the injector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    /// Press then release
    Click,
    /// Key-down only
    Press,
    /// Key-up only
    Release,
}

/// Something the caller must do as a result of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Key { combo: KeyCombo, phase: KeyPhase },
    Pause(Duration),
    RunCommand(Vec<String>),
    Intro,
    SetValue { control: ControlId, value: u8 },
    Feedback { led: ControlId, on: bool },
}

pub type Effects = Vec<Effect>;

/// Per-control bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    /// Latch for toggle-style bindings
    pub latched: bool,
    /// Last raw value seen (buttons) or last emitting position (knobs, sliders)
    pub last_value: Option<i32>,
    /// Keys left down by a hold binding, released on the next release edge
    pub held: Option<KeySpec>,
}

/// Transition of a button between released and pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Pressed,
    Released,
}

impl ControlState {
    /// Record a raw button value and report the edge it represents, if any
    fn edge(&mut self, value: i32) -> Option<Edge> {
        let was_pressed = self.last_value.is_some_and(|v| v > 0);
        let pressed = value > 0;
        self.last_value = Some(value);

        match (was_pressed, pressed) {
            (false, true) => Some(Edge::Pressed),
            (true, false) => Some(Edge::Released),
            _ => None,
        }
    }
}

/// All mutable state of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub active_mode: String,
    pub controls: HashMap<ControlId, ControlState>,
    /// Last feedback state sent per LED
    pub leds: BTreeMap<ControlId, bool>,
}

impl EngineState {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            active_mode: mode.into(),
            controls: HashMap::new(),
            leds: BTreeMap::new(),
        }
    }
}

/// Effects collected while handling one event, kept in their output groups
#[derive(Default)]
struct Output {
    actions: Vec<Effect>,
    values: Vec<Effect>,
    feedback: Vec<Effect>,
}

impl Output {
    fn click(&mut self, spec: &KeySpec) {
        for step in spec.steps() {
            self.actions.push(match step {
                KeyStep::Chord(combo) => Effect::Key {
                    combo: combo.clone(),
                    phase: KeyPhase::Click,
                },
                KeyStep::Pause(d) => Effect::Pause(*d),
            });
        }
    }

    fn hold(&mut self, spec: &KeySpec, phase: KeyPhase) {
        let chords = spec.steps().iter().filter_map(|step| match step {
            KeyStep::Chord(combo) => Some(combo),
            KeyStep::Pause(_) => None,
        });
        let chords: Vec<_> = match phase {
            KeyPhase::Release => chords.rev().collect(),
            _ => chords.collect(),
        };
        for combo in chords {
            self.actions.push(Effect::Key {
                combo: combo.clone(),
                phase,
            });
        }
    }

    fn into_effects(self) -> Effects {
        let mut effects = self.actions;
        effects.extend(self.values);
        effects.extend(self.feedback);
        effects
    }
}

/// Maps control events to effects according to a [`MappingTable`]
pub struct Engine {
    table: Arc<MappingTable>,
    state: EngineState,
}

impl Engine {
    pub fn new(table: Arc<MappingTable>) -> Self {
        let state = EngineState::new(table.initial_mode());
        Self { table, state }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn active_mode(&self) -> &str {
        &self.state.active_mode
    }

    /// Full LED refresh for the active mode (startup, reconnect)
    pub fn refresh(&mut self) -> Effects {
        self.state.refresh_leds(&self.table)
    }

    /// Reset knobs to their centre position, e.g. after the intro animation
    pub fn recenter(&mut self, knobs: &[ControlId]) -> Effects {
        knobs
            .iter()
            .map(|knob| {
                self.state.controls.entry(knob.clone()).or_default().last_value = Some(KNOB_CENTRE);
                Effect::SetValue {
                    control: knob.clone(),
                    value: KNOB_CENTRE as u8,
                }
            })
            .collect()
    }

    /// Handle one control event and return the effects to apply, in order:
    /// key and command effects first, then knob positions, then LEDs.
    pub fn handle(&mut self, event: &ControlEvent) -> Effects {
        if !self.table.is_known(&event.id) {
            warn!(
                "Dropping event for unknown control {} ({:?}, value {})",
                event.id, event.class, event.value
            );
            return Effects::new();
        }

        let table = Arc::clone(&self.table);
        let Some(binding) = table.lookup(&self.state.active_mode, &event.id) else {
            debug!(
                "Control {} has no binding in mode '{}'",
                event.id, self.state.active_mode
            );
            return Effects::new();
        };

        let mut out = Output::default();
        match event.class {
            ControlClass::Momentary | ControlClass::ToggleRaw => {
                // Edges are tracked in every mode so a press seen while the
                // control is unmapped still pairs with its release.
                let state = self.control(&event.id);
                let edge = state.edge(event.value);
                if edge == Some(Edge::Released) {
                    if let Some(spec) = state.held.take() {
                        debug!("{} released, letting go of {}", event.id, spec);
                        out.hold(&spec, KeyPhase::Release);
                    }
                }

                if binding.action == Action::NoOp {
                    debug!("Control {} is unmapped in mode '{}'", event.id, self.state.active_mode);
                } else if let Some(edge) = edge {
                    self.on_edge(&event.id, binding, edge, &mut out);
                }
            }
            _ if binding.action == Action::NoOp => {
                debug!("Control {} is unmapped in mode '{}'", event.id, self.state.active_mode);
            }
            ControlClass::RelativeRotary | ControlClass::AbsoluteRotary | ControlClass::Slider => {
                let motion = self.motion(event, binding, &mut out);
                if let Some(motion) = motion {
                    self.on_motion(&event.id, binding, motion, &mut out);
                }
            }
        }

        out.into_effects()
    }

    fn control(&mut self, id: &ControlId) -> &mut ControlState {
        self.state.controls.entry(id.clone()).or_default()
    }

    fn motion(&mut self, event: &ControlEvent, binding: &Binding, out: &mut Output) -> Option<Motion> {
        let state = self.state.controls.entry(event.id.clone()).or_default();
        match event.class {
            ControlClass::RelativeRotary => motion::relative(event.value),
            ControlClass::AbsoluteRotary => {
                let (motion, wrap) = motion::spinner(state, event.value);
                if let Some(position) = wrap {
                    out.values.push(Effect::SetValue {
                        control: event.id.clone(),
                        value: position as u8,
                    });
                }
                motion
            }
            ControlClass::Slider => {
                let (threshold, has_zero) = match &binding.action {
                    Action::Directional { threshold, zero, .. } => {
                        (i32::from(*threshold), zero.is_some())
                    }
                    _ => (0, false),
                };
                motion::slider(state, event.value, threshold, has_zero)
            }
            ControlClass::Momentary | ControlClass::ToggleRaw => None,
        }
    }

    fn on_edge(&mut self, id: &ControlId, binding: &Binding, edge: Edge, out: &mut Output) {
        let fires = match binding.trigger {
            Trigger::Press | Trigger::Hold => edge == Edge::Pressed,
            Trigger::Release => edge == Edge::Released,
        };

        match &binding.action {
            // Key-up comes from `held` in `handle`, whichever mode is active then
            Action::EmitKeyCombo(spec) if binding.trigger == Trigger::Hold => {
                if fires {
                    debug!("{} held => {}", id, binding.label());
                    out.hold(spec, KeyPhase::Press);
                    self.control(id).held = Some(spec.clone());
                }
            }
            Action::Directional { up, .. } if fires => {
                info!("Control {} => {}", id, binding.label());
                out.click(up);
            }
            _ if fires => self.fire(id, binding, out),
            _ => {}
        }
    }

    fn on_motion(&mut self, id: &ControlId, binding: &Binding, motion: Motion, out: &mut Output) {
        match &binding.action {
            Action::Directional { up, down, zero, .. } => {
                let spec = match motion {
                    Motion::Up => Some(up),
                    Motion::Down => Some(down),
                    Motion::Zero => zero.as_ref(),
                };
                if let Some(spec) = spec {
                    info!("Control {} {:?} => {}", id, motion, spec);
                    out.click(spec);
                }
            }
            _ => self.fire(id, binding, out),
        }
    }

    /// Perform a binding's action once
    fn fire(&mut self, id: &ControlId, binding: &Binding, out: &mut Output) {
        match &binding.action {
            Action::EmitKeyCombo(spec) => {
                info!("Control {} => {}", id, binding.label());
                out.click(spec);
            }
            Action::ToggleAndEmit { on, off } => {
                let state = self.control(id);
                state.latched = !state.latched;
                let latched = state.latched;
                info!(
                    "Control {} => {} {}",
                    id,
                    binding.label(),
                    if latched { "ON" } else { "OFF" }
                );
                out.click(if latched { on } else { off });
                out.feedback.extend(self.state.reconcile_leds(&self.table));
            }
            Action::SwitchMode(target) => self.switch_mode(target, out),
            Action::RunCommand(argv) => {
                info!("Control {} => {}", id, binding.label());
                out.actions.push(Effect::RunCommand(argv.clone()));
            }
            Action::Intro => {
                info!("Control {} => intro", id);
                out.actions.push(Effect::Intro);
            }
            Action::Directional { up, .. } => out.click(up),
            Action::NoOp => {}
        }
    }

    fn switch_mode(&mut self, target: &str, out: &mut Output) {
        if self.state.active_mode != target {
            info!("Mode '{}' -> '{}'", self.state.active_mode, target);
            self.state.active_mode = target.to_string();
        } else {
            debug!("Mode '{}' re-entered", target);
        }
        out.feedback = self.state.refresh_leds(&self.table);
    }
}
