//! Bench console shared by the emulator and test rigs.
//!
//! [`grammar`] turns a line into a [`grammar::Command`] without allocating;
//! [`commands`] applies it to a [`commands::BenchControls`] implementation.

pub mod catalog;
pub mod commands;
pub mod grammar;
