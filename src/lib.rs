//! Vigil - IaC scan coordinator
//!
//! Installs Checkov, runs it on infrastructure files as they are edited,
//! caches results by content and reports findings as diagnostics.

pub mod activity;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod installer;
pub mod orchestration;
pub mod scan;
pub mod severity;
pub mod state;
pub mod ui;

pub use error::{VigilError, VigilResult};
