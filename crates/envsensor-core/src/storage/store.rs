//! Load, validate and save the state record
//!
//! The record has two states. [`Unvalidated`] holds the raw bytes just read
//! from retained memory; [`Unvalidated::validate`] turns it into a
//! [`StateStore`], which always holds a trusted record: either the decoded
//! contents or, after any validation failure, the cold-boot default.

use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use super::record::{PersistentRecord, RECORD_SIZE, RecordError};

/// Battery-backed memory region holding one encoded record.
pub trait RetainedMemory {
    type Error: core::fmt::Debug;

    fn read(&mut self, buffer: &mut [u8; RECORD_SIZE]) -> Result<(), Self::Error>;

    /// Replace the whole record.
    fn write(&mut self, record: &[u8; RECORD_SIZE]) -> Result<(), Self::Error>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("retained memory write failed")]
    WriteFailed,
}

/// How the current record came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Checksum and version matched; contents were kept.
    Validated,
    /// The retained record was rejected and replaced by defaults.
    ColdBoot(RecordError),
}

/// Record bytes as read at boot, not yet trusted.
pub struct Unvalidated<M> {
    memory: M,
    bytes: Result<[u8; RECORD_SIZE], RecordError>,
}

impl<M: RetainedMemory> Unvalidated<M> {
    pub fn load(mut memory: M) -> Self {
        let mut bytes = [0u8; RECORD_SIZE];
        let bytes = match memory.read(&mut bytes) {
            Ok(()) => Ok(bytes),
            Err(e) => {
                error!("Retained memory read failed: {:?}", e);
                Err(RecordError::Unreadable)
            }
        };
        Self { memory, bytes }
    }

    pub fn validate(self) -> StateStore<M> {
        let decoded = self
            .bytes
            .and_then(|bytes| PersistentRecord::decode(&bytes));

        let (record, origin) = match decoded {
            Ok(record) => {
                match &record.wifi {
                    Some(wifi) => info!(
                        "State record valid: {} samples, channel {}, BSSID {:02x?}",
                        record.history.len(),
                        wifi.channel,
                        wifi.bssid
                    ),
                    None => info!(
                        "State record valid: {} samples, no Wi-Fi cache",
                        record.history.len()
                    ),
                }
                (record, LoadOrigin::Validated)
            }
            Err(e) => {
                warn!("State record rejected ({}), starting from defaults", e);
                (PersistentRecord::default(), LoadOrigin::ColdBoot(e))
            }
        };

        StateStore {
            memory: self.memory,
            record,
            origin,
        }
    }
}

/// The validated record and the memory it is saved to.
pub struct StateStore<M> {
    memory: M,
    record: PersistentRecord,
    origin: LoadOrigin,
}

impl<M: RetainedMemory> StateStore<M> {
    /// Read and validate in one step.
    pub fn load(memory: M) -> Self {
        Unvalidated::load(memory).validate()
    }

    pub const fn origin(&self) -> LoadOrigin {
        self.origin
    }

    pub const fn is_validated(&self) -> bool {
        matches!(self.origin, LoadOrigin::Validated)
    }

    pub const fn record(&self) -> &PersistentRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut PersistentRecord {
        &mut self.record
    }

    /// Re-encode with the current version and checksum and write the full
    /// record back.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let bytes = self.record.encode();
        self.memory.write(&bytes).map_err(|e| {
            error!("Retained memory write failed: {:?}", e);
            StoreError::WriteFailed
        })?;
        debug!(
            "State record saved ({} samples)",
            self.record.history.len()
        );
        Ok(())
    }

    pub fn into_memory(self) -> M {
        self.memory
    }
}
