//! Interpretation of knob and slider values as directions of travel

use super::ControlState;

/// Knobs are assumed to start at the middle of their range
pub const KNOB_CENTRE: i32 = 64;

/// Top of the 7-bit range used by absolute controls
pub const MAX_VALUE: i32 = 127;

/// Direction a continuous control moved in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Up,
    Down,
    /// Slider pulled all the way down
    Zero,
}

/// Relative encoders report the delta directly
pub fn relative(delta: i32) -> Option<Motion> {
    match delta {
        d if d > 0 => Some(Motion::Up),
        d if d < 0 => Some(Motion::Down),
        _ => None,
    }
}

/// Absolute knob treated as an endless spinner.
///
/// When the knob reaches either end of its travel it is wrapped around to the
/// other end; the returned position must be written back to the device.
pub fn spinner(state: &mut ControlState, value: i32) -> (Option<Motion>, Option<i32>) {
    let previous = state.last_value.unwrap_or(KNOB_CENTRE);

    let (motion, position, wrap) = if value <= 0 {
        (Some(Motion::Down), MAX_VALUE, Some(MAX_VALUE))
    } else if value >= MAX_VALUE {
        (Some(Motion::Up), 0, Some(0))
    } else if value < previous {
        (Some(Motion::Down), value, None)
    } else if value > previous {
        (Some(Motion::Up), value, None)
    } else {
        (None, value, None)
    };

    state.last_value = Some(position);
    (motion, wrap)
}

/// Absolute fader, bucketed by `threshold`.
///
/// The first reading only records the position since there is no way to know
/// where the fader was before.
pub fn slider(state: &mut ControlState, value: i32, threshold: i32, has_zero: bool) -> Option<Motion> {
    if value == 0 && has_zero {
        if state.last_value == Some(0) {
            return None;
        }
        state.last_value = Some(0);
        return Some(Motion::Zero);
    }

    let Some(previous) = state.last_value else {
        state.last_value = Some(value);
        return None;
    };
    if value == previous {
        return None;
    }

    if value < previous - threshold {
        state.last_value = Some(value);
        Some(Motion::Down)
    } else if value == MAX_VALUE || value > previous + threshold {
        state.last_value = Some(value);
        Some(Motion::Up)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative() {
        assert_eq!(relative(3), Some(Motion::Up));
        assert_eq!(relative(-1), Some(Motion::Down));
        assert_eq!(relative(0), None);
    }

    #[test]
    fn test_spinner_starts_from_centre() {
        let mut state = ControlState::default();
        assert_eq!(spinner(&mut state, 65), (Some(Motion::Up), None));
        assert_eq!(spinner(&mut state, 64), (Some(Motion::Down), None));
        assert_eq!(spinner(&mut state, 64), (None, None));
        assert_eq!(state.last_value, Some(64));
    }

    #[test]
    fn test_spinner_wraps_at_ends() {
        let mut state = ControlState::default();
        assert_eq!(spinner(&mut state, 127), (Some(Motion::Up), Some(0)));
        assert_eq!(state.last_value, Some(0));
        assert_eq!(spinner(&mut state, 1), (Some(Motion::Up), None));
        assert_eq!(spinner(&mut state, 0), (Some(Motion::Down), Some(127)));
        assert_eq!(state.last_value, Some(127));
    }

    #[test]
    fn test_slider_first_reading_only_records() {
        let mut state = ControlState::default();
        assert_eq!(slider(&mut state, 40, 5, false), None);
        assert_eq!(state.last_value, Some(40));
    }

    #[test]
    fn test_slider_threshold() {
        let mut state = ControlState::default();
        slider(&mut state, 40, 5, false);
        assert_eq!(slider(&mut state, 44, 5, false), None);
        assert_eq!(slider(&mut state, 46, 5, false), Some(Motion::Up));
        assert_eq!(slider(&mut state, 42, 5, false), None);
        assert_eq!(slider(&mut state, 40, 5, false), Some(Motion::Down));
    }

    #[test]
    fn test_slider_top_and_bottom() {
        let mut state = ControlState::default();
        slider(&mut state, 125, 5, true);
        assert_eq!(slider(&mut state, 127, 5, true), Some(Motion::Up));
        // Unchanged value never emits
        assert_eq!(slider(&mut state, 127, 5, true), None);
        assert_eq!(slider(&mut state, 0, 5, true), Some(Motion::Zero));
        assert_eq!(slider(&mut state, 0, 5, true), None);
        // Without a zero action the bottom is an ordinary step down
        let mut state = ControlState::default();
        slider(&mut state, 20, 5, false);
        assert_eq!(slider(&mut state, 0, 5, false), Some(Motion::Down));
    }
}
