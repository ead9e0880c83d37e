pub mod entry;

pub use entry::{EntryId, StreamBatch, StreamEntry};
