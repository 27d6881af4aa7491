//! CLI command handlers

pub mod commands;

pub use commands::{add, archive_sweep, list, overview, quarantine, serve, update, validate};
