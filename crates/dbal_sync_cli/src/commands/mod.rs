//! CLI command implementations.

pub mod admin;
pub mod detect;
pub mod pull;
pub mod push;
pub mod snapshot;

/// Error type shared by the command implementations.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;
