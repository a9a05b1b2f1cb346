//! Hardware-independent core library for the LilyGO T-SIM A7670
//!
//! This crate holds everything that does not touch ESP32 peripherals directly:
//! the board wiring descriptors, compile-time modem family selection, the AT
//! command drivers, the power-up sequencer and the post-boot self test.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both the
//! ESP32 target and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod board;
pub mod bringup;
pub mod config;
pub mod modem;
pub mod selftest;

pub use board::BOARD;
// atat version the modem drivers are built on
pub use atat;
pub use modem::{ClientType, PrimaryModemType};
