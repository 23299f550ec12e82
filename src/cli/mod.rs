//! Command-line interface: argument definitions and command handlers.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
pub use commands::run;
