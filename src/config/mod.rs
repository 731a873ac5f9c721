//! Command-line and settings-file configuration.

mod settings;

pub use settings::{Cli, Command, EngineArgs, SessionConfig, Settings};
