//! Kinematics and motion planning for the arm.
//!
//! This module holds the math that turns operator requests into pulse widths:
//!
//! - [`solver`] handles inverse kinematics and calibrated duty mapping.
//! - [`gripper`] maps jaw width to pulse width and effective tool length.
//! - [`trajectory`] generates the LSPB profile each channel follows between targets.
//!
//! Used by the dispatcher to set targets and by the control task to step channels.
pub mod gripper;
pub mod solver;
pub mod trajectory;
