//! Content-addressed scan result cache
//!
//! Results are keyed by file path and the SHA256 of the document text, so an
//! unchanged document never reaches the scanner twice.
//!
//! # Expiry
//!
//! | Rule | Effect |
//! |------|--------|
//! | New local day | whole store wiped on next access |
//! | More than 10 results for a file | oldest insert overwritten |
//! | Scanner version or settings change | whole store cleared |

pub mod results;
pub mod ring;

pub use results::{content_hash, CacheEntry, ResultCache, ENTRIES_PER_FILE};
pub use ring::RingBuffer;
