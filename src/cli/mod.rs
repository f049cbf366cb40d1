//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, interrupt handling,
//! and the command runners.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod presenter;
pub mod signals;

// Re-export commonly used types
pub use app::{run_convert, run_encode, CommandError, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction, ConvertArgs, EncodeArgs};
pub use presenter::Presenter;
