//! Channel enumeration and display helpers.
//!
//! Defines the [`Joint`] enum for identifying each PWM channel of the arm, and
//! provides display formatting for debugging and logging.
use core::fmt::Display;

use crate::error::InvalidArgument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Base = 0,
    Shoulder = 1,
    Elbow = 2,
    Wrist = 3,
    Roll = 4,
    Gripper = 5,
}

impl Joint {
    pub const ALL: [Joint; 6] = [
        Joint::Base,
        Joint::Shoulder,
        Joint::Elbow,
        Joint::Wrist,
        Joint::Roll,
        Joint::Gripper,
    ];

    /// Whether the kinematic solver and the calibration table cover this channel.
    pub fn is_calibrated(self) -> bool {
        self != Joint::Gripper
    }
}

impl Display for Joint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Joint::Base => f.write_str("base"),
            Joint::Shoulder => f.write_str("shoulder"),
            Joint::Elbow => f.write_str("elbow"),
            Joint::Wrist => f.write_str("wrist"),
            Joint::Roll => f.write_str("roll"),
            Joint::Gripper => f.write_str("gripper"),
        }
    }
}

impl TryFrom<usize> for Joint {
    type Error = InvalidArgument;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Joint::ALL
            .get(value)
            .copied()
            .ok_or(InvalidArgument::Channel(value))
    }
}
