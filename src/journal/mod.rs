//! Restore journal
//!
//! Append-only record of every backup, restore and cleanup the engine runs,
//! one JSON object per line. Diagnostics go through `tracing`; the journal is
//! the durable operational history an operator reads afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use app_backup::journal::{JournalEntry, JournalLogger};
//!
//! let logger = JournalLogger::new(paths.journal_file());
//! logger.log(&JournalEntry::backup(app_id, 42))?;
//!
//! for entry in logger.read_recent(10)? {
//!     println!("{}", entry.format_human_readable());
//! }
//! ```

mod entry;
mod logger;

pub use entry::{JournalEntry, Operation, Outcome};
pub use logger::JournalLogger;
