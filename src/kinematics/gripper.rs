//! Gripper opening ↔ pulse width ↔ tool length.
//!
//! The gripper is not modelled geometrically. Its behaviour comes from the measured
//! [`GRIPPER_TABLE`]: opening the jaws pulls the fingertips back towards the wrist,
//! so a wider grip shortens the effective tool length the solver has to reach with.
use crate::config::GRIPPER_TABLE;
use crate::error::InvalidArgument;

/// Result of a width request: what to drive and what the solver should assume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GripperSetting {
    pub duty: u16,
    pub effective_length: f32,
}

fn lerp(from: f32, to: f32, ratio: f32) -> f32 {
    from + (to - from) * ratio
}

/// Interpolates the table by jaw width in cm.
pub fn width_to_setting(width: f32) -> Result<GripperSetting, InvalidArgument> {
    let (first, last) = (GRIPPER_TABLE[0], GRIPPER_TABLE[GRIPPER_TABLE.len() - 1]);
    if !(first.1..=last.1).contains(&width) {
        return Err(InvalidArgument::Width(width));
    }

    for pair in GRIPPER_TABLE.windows(2) {
        let ((duty_a, width_a, len_a), (duty_b, width_b, len_b)) = (pair[0], pair[1]);
        if width <= width_b {
            let ratio = (width - width_a) / (width_b - width_a);
            let duty = lerp(duty_a as f32, duty_b as f32, ratio);
            return Ok(GripperSetting {
                duty: (duty + 0.5) as u16,
                effective_length: lerp(len_a, len_b, ratio),
            });
        }
    }

    Ok(GripperSetting {
        duty: last.0,
        effective_length: last.2,
    })
}

/// Effective tool length for a raw gripper pulse. Pulses beyond the table clamp to
/// its ends.
pub fn duty_to_length(duty: u16) -> f32 {
    let (first, last) = (GRIPPER_TABLE[0], GRIPPER_TABLE[GRIPPER_TABLE.len() - 1]);
    // Duty falls as width grows.
    if duty >= first.0 {
        return first.2;
    }
    if duty <= last.0 {
        return last.2;
    }

    for pair in GRIPPER_TABLE.windows(2) {
        let ((duty_a, _, len_a), (duty_b, _, len_b)) = (pair[0], pair[1]);
        if duty >= duty_b {
            let ratio = (duty_a - duty) as f32 / (duty_a - duty_b) as f32;
            return lerp(len_a, len_b, ratio);
        }
    }
    last.2
}
