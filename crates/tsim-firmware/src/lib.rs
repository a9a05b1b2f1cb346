//! ESP32 firmware-specific modules for the T-SIM A7670
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral initialization for the modem link, the `atat`
//! ingress task, the ring indicator task and the build-time cellular
//! settings.

#![no_std]

pub mod hardware;
pub mod link;
pub mod ring;
pub mod settings;
