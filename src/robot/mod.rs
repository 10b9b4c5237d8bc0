//! Core arm types.
//!
//! This module defines the state the firmware keeps about the arm, including:
//! - [`joint`]: Channel enumeration and display helpers.
//! - [`calibration`]: Per-joint angle to duty mapping and limits.
//! - [`channel`]: One servo channel's position, target and trajectory.
//! - [`state`]: The servo handle and the context tasks share it through.
//! - [`servo`]: Pulse-width servo output over any `SetDutyCycle` pin.
//! - [`commands`]: Wire commands and the actions they request.
pub mod calibration;
pub mod channel;
pub mod commands;
pub mod joint;
pub mod servo;
pub mod state;
