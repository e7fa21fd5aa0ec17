//! Operator console tooling shared between firmware and emulator targets.
//!
//! Commands are single keystrokes ([`commands`]); everything printed to the
//! console is rendered from structured data by [`status`] so the firmware and
//! the emulator produce identical text.

pub mod commands;
pub mod status;
