//! Per-joint calibration: angle → normalized angle → pulse width.
use core::str::FromStr;

use crate::config::{DEFAULT_CALIBRATION, JOINT_COUNT, MAX_NORMALIZED_DEGREE};

/// Which end of a joint's duty range an operator command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
}

impl FromStr for Bound {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOWER" => Ok(Bound::Lower),
            "UPPER" => Ok(Bound::Upper),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub scale: f32,
    pub bias: f32,
    /// Duty at normalized 0°, in µs.
    pub lower_limit: u16,
    /// Duty at normalized 90°, in µs.
    pub upper_limit: u16,
}

impl Calibration {
    /// Compiled-in calibration of `joint`.
    pub fn default_for(joint: usize) -> Self {
        let (scale, bias, lower_limit, upper_limit) = DEFAULT_CALIBRATION[joint];
        Self {
            scale,
            bias,
            lower_limit,
            upper_limit,
        }
    }

    pub fn normalize(&self, angle: f32) -> f32 {
        self.scale * angle + self.bias
    }

    /// Pulse width for a normalized angle, `None` outside `[0, 90]`.
    pub fn duty(&self, normalized: f32) -> Option<u16> {
        if !(0.0..=MAX_NORMALIZED_DEGREE).contains(&normalized) {
            return None;
        }
        let span = self.upper_limit as f32 - self.lower_limit as f32;
        let duty = self.lower_limit as f32 + normalized / MAX_NORMALIZED_DEGREE * span;
        Some((duty + 0.5) as u16)
    }

    pub fn limit(&self, bound: Bound) -> u16 {
        match bound {
            Bound::Lower => self.lower_limit,
            Bound::Upper => self.upper_limit,
        }
    }

    /// Replaces one limit if the range stays non-empty. Returns whether it did.
    pub fn set_limit(&mut self, bound: Bound, duty: u16) -> bool {
        let valid = match bound {
            Bound::Lower => duty < self.upper_limit,
            Bound::Upper => duty > self.lower_limit,
        };
        if valid {
            match bound {
                Bound::Lower => self.lower_limit = duty,
                Bound::Upper => self.upper_limit = duty,
            }
        }
        valid
    }
}

pub fn default_calibration() -> [Calibration; JOINT_COUNT] {
    core::array::from_fn(Calibration::default_for)
}
