#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Control core for the temperature/humidity logger.
//
// Everything here is free of the Rust standard library so the same logic can
// run behind real peripherals or inside the host emulator.

pub mod capabilities;
pub mod config;
pub mod console;
pub mod controller;
pub mod recovery;
pub mod session;
pub mod status;
pub mod telemetry;
pub mod time;
