//! Local history of completed conversions.
//!
//! - [`HistoryStore`]: ordered record collection with write-through persistence
//! - [`KeyValueStore`]: the blob storage it persists into
//! - [`HistoryRecord`]: one completed conversion

mod record;
mod storage;
mod store;

pub use record::{DateRange, HistoryFilters, HistoryPatch, HistoryRecord, NewHistoryRecord};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use store::{parse_id, validate_id, Clock, HistoryStore, SystemClock, STORAGE_KEY};
