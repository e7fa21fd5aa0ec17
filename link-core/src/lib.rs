#![no_std]

// Shared logic for the ping link monitor.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Transports, clocks and consoles are supplied by the
// firmware and emulator crates through the traits exposed here.

pub mod clock;
pub mod config;
pub mod ping;
pub mod repl;
pub mod scenario;
pub mod telemetry;
pub mod tracker;
