//! LED feedback reconciliation
//!
//! The engine remembers the last state it sent for every LED. A full refresh
//! is emitted on mode entry; otherwise only LEDs whose desired state changed
//! are written, so the feedback channel is never flooded.

use std::collections::BTreeMap;

use super::{Effect, EngineState};
use crate::mapping::{Action, ControlId, MappingTable};

impl EngineState {
    /// Desired state of every LED the table knows about, for the active mode
    pub fn desired_leds(&self, table: &MappingTable) -> BTreeMap<ControlId, bool> {
        let mut desired: BTreeMap<ControlId, bool> = table
            .feedback_leds()
            .iter()
            .map(|led| (led.clone(), false))
            .collect();

        for (control, binding) in table.bindings(&self.active_mode) {
            let Some(led) = binding.led(control) else {
                continue;
            };
            let on = match &binding.action {
                Action::ToggleAndEmit { .. } => {
                    self.controls.get(control).is_some_and(|state| state.latched)
                }
                Action::SwitchMode(target) => *target == self.active_mode,
                _ => false,
            };
            if on {
                desired.insert(led, true);
            }
        }

        desired
    }

    /// Every LED with its desired state, whether or not it changed
    pub fn refresh_leds(&mut self, table: &MappingTable) -> Vec<Effect> {
        let desired = self.desired_leds(table);
        let effects = desired
            .iter()
            .map(|(led, &on)| Effect::Feedback {
                led: led.clone(),
                on,
            })
            .collect();
        self.leds = desired;
        effects
    }

    /// Only the LEDs whose desired state differs from what was last sent
    pub fn reconcile_leds(&mut self, table: &MappingTable) -> Vec<Effect> {
        let mut effects = Vec::new();
        for (led, on) in self.desired_leds(table) {
            if self.leds.get(&led) != Some(&on) {
                self.leds.insert(led.clone(), on);
                effects.push(Effect::Feedback { led, on });
            }
        }
        effects
    }
}
