//! Command-line interface

pub mod args;
pub mod commands;
pub mod context;

pub use args::{Cli, Commands};
pub use context::AppContext;
