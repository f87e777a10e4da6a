//! Checksummed, versioned state kept in retained memory across deep sleep

pub mod crc;
pub mod record;
pub mod store;

pub use record::{
    HISTORY_CAPACITY, History, Ipv4Settings, PersistentRecord, RECORD_SIZE, RECORD_VERSION,
    RETAINED_MEMORY_CAPACITY, RecordError, WifiCache,
};
pub use store::{LoadOrigin, RetainedMemory, StateStore, StoreError, Unvalidated};
