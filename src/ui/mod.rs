//! Terminal output helpers
//!
//! Spinners and coloured markers when attached to a terminal, plain
//! `[OK]`/`[WARN]` lines otherwise.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, section, step_ok, step_ok_detail, step_warn_hint};
pub use progress::TaskSpinner;
