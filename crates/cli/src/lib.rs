//! reprint-gcs CLI library
//!
//! This module exports the CLI components for use in tests.

pub mod commands;
pub mod exit_code;
pub mod output;
