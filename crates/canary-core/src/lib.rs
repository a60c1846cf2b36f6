//! Foundational low-level utilities shared across ticket-canary crates.
//!
//! Provides atomic file-write helpers and the pluggable set of already
//! processed ticket ids consulted by the polling loop.

pub mod atomic_io;
pub mod processed_ids;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use processed_ids::{JsonFileProcessedIdStore, MemoryProcessedIdStore, ProcessedIdStore};
pub use time_utils::current_unix_timestamp_ms;
