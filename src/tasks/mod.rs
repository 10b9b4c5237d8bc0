//! Asynchronous tasks for the arm firmware.
//!
//! This module contains Embassy async tasks for the arm's runtime, including:
//! - [`control_task`]: Steps every channel on each control tick and exports duties.
//! - [`serial_task`]: Reads command frames from UART0 and writes status responses.
//!
//! Tasks are spawned from `main.rs` and share one [`ArmContext`](crate::robot::state::ArmContext).
pub mod control_task;
pub mod serial_task;
