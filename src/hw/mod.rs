//! ESP32 bindings for the hardware seams of the arm.
//!
//! - [`pwm`]: MCPWM servo outputs behind [`PwmSink`](crate::robot::servo::PwmSink).
//! - [`flash`]: [`KvStore`](crate::storage::KvStore) on SPI flash.
//! - [`timer`]: the control tick interrupt and its event queue.
pub mod flash;
pub mod pwm;
pub mod timer;
