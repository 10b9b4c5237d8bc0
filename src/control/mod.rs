//! Runtime control of the arm, independent of the hardware it runs on.
//!
//! - [`scheduler`]: tick events from the timer interrupt and the control loop
//!   that consumes them.
//! - [`dispatcher`]: the serial command state machine.
//!
//! The embassy tasks in `tasks` wire both to the ESP32 peripherals.
pub mod dispatcher;
pub mod scheduler;
