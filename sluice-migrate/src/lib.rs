//! Sluice Migration Library
//!
//! Argument parsing, command handlers and output rendering for the
//! `sluice-migrate` CLI. The binary (main.rs) is a thin wrapper over this.

pub mod cli;
pub mod commands;
pub mod render;
