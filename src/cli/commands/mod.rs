//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod config;
pub mod info;
pub mod install;
pub mod logs;
pub mod scan;
pub mod serve;
pub mod version_cache;

pub use cache::execute as cache;
pub use completions::execute as completions;
pub use config::execute as config;
pub use info::execute as info;
pub use install::execute as install;
pub use logs::execute as logs;
pub use scan::execute as scan;
pub use serve::execute as serve;
pub use version_cache::execute as version_cache;
