//! # Tessera
//!
//! Library side of the `tessera` binary: the CLI and its configuration.
//! Exposed so the commands can be tested without spawning a process.

pub mod cli;
pub mod config;
