//! Library root for the servo arm firmware.
//!
//! The motion core ([`kinematics`], [`robot`], [`control`], [`protocol`],
//! [`storage`]) has no hardware dependency and is tested on the host. [`hw`] and
//! [`tasks`] bind it to the ESP32 and only build for the target.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod control;
pub mod error;
pub mod kinematics;
pub mod protocol;
pub mod robot;
pub mod storage;

#[cfg(target_arch = "xtensa")]
pub mod hw;
#[cfg(target_arch = "xtensa")]
pub mod tasks;
