//! Record storage in RTC fast memory
//!
//! The region is not cleared by the bootloader on a deep-sleep wake. After a
//! power-on reset it holds whatever the SRAM powered up with, which the record
//! checksum rejects.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

use envsensor_core::storage::{RECORD_SIZE, RETAINED_MEMORY_CAPACITY, RetainedMemory};

#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut RETAINED: [u8; RETAINED_MEMORY_CAPACITY] = [0; RETAINED_MEMORY_CAPACITY];

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Exclusive handle to the retained region.
pub struct RtcRetainedMemory {
    _private: (),
}

impl RtcRetainedMemory {
    /// Returns `None` if the handle was already taken this boot.
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self { _private: () })
    }
}

impl RetainedMemory for RtcRetainedMemory {
    type Error = Infallible;

    fn read(&mut self, buffer: &mut [u8; RECORD_SIZE]) -> Result<(), Self::Error> {
        // SAFETY: `take` hands out at most one handle and only the handle
        // touches RETAINED.
        let region = unsafe { &*(&raw const RETAINED) };
        buffer.copy_from_slice(&region[..RECORD_SIZE]);
        Ok(())
    }

    fn write(&mut self, record: &[u8; RECORD_SIZE]) -> Result<(), Self::Error> {
        // SAFETY: see `read`.
        let region = unsafe { &mut *(&raw mut RETAINED) };
        region[..RECORD_SIZE].copy_from_slice(record);
        Ok(())
    }
}
