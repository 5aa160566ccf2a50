//! duckform CLI library
//!
//! Argument parsing, command handlers and output rendering for the
//! `duckform` binary. Exposed as a library so integration tests can drive
//! the handlers directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod metrics_export;
pub mod output;
pub mod suite;
