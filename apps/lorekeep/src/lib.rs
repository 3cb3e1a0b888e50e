//! # Lorekeep
//!
//! The command-line application over `lorekeep-core`: CLI commands against a
//! registry file, TOML configuration and the remote operation sink.

pub mod cli;
pub mod config;
pub mod sync;
