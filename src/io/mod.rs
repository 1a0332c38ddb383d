//! Table I/O at the pipeline boundary.

pub mod export;
pub mod store;
pub mod timestamp;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use store::{CsvDirStore, MemoryStore, TableStore};

/// A row type that can be stored as a named table.
pub trait TableRow: Serialize + DeserializeOwned {
    /// Columns a stored table of this row type must carry.
    const COLUMNS: &'static [&'static str];
}
