//! Scanning a single file
//!
//! | Piece        | Role                                           |
//! |--------------|------------------------------------------------|
//! | `request`    | What to scan and with which options            |
//! | `repo`       | Repository identifier hint from git remotes    |
//! | `invocation` | Container or native command line               |
//! | `output`     | Noise skipping, ANSI stripping, report parsing |
//! | `runner`     | Process lifecycle and cancellation             |

mod finding;
pub mod invocation;
pub mod output;
pub mod repo;
mod request;
mod runner;

pub use finding::{Finding, Severity};
pub use invocation::{build_invocation, Invocation};
pub use request::{is_supported_file, DocumentId, ScanRequest, ScanSettings};
pub use runner::{ProcessRunner, ScanRunner, DEFAULT_KILL_GRACE};
