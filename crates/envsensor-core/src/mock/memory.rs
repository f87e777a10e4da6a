//! In-memory retained region

use crate::storage::{RECORD_SIZE, RETAINED_MEMORY_CAPACITY, RetainedMemory};

/// Marker error for injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockMemoryFault;

/// A zeroed retained region, as after first power-on.
///
/// Contents survive for as long as the value does, so passing it from one
/// simulated boot to the next models deep sleep.
#[derive(Debug, Clone)]
pub struct MockRetainedMemory {
    bytes: [u8; RETAINED_MEMORY_CAPACITY],
    read_fault: bool,
    write_fault: bool,
    writes: u32,
}

impl Default for MockRetainedMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRetainedMemory {
    pub const fn new() -> Self {
        Self {
            bytes: [0; RETAINED_MEMORY_CAPACITY],
            read_fault: false,
            write_fault: false,
            writes: 0,
        }
    }

    pub fn bytes(&self) -> &[u8; RETAINED_MEMORY_CAPACITY] {
        &self.bytes
    }

    /// Flip one bit of the stored record, counted from the first byte.
    pub fn flip_bit(&mut self, bit: usize) {
        self.bytes[bit / 8] ^= 1 << (bit % 8);
    }

    /// Lose everything, as after the battery was removed.
    pub fn power_loss(&mut self) {
        self.bytes = [0; RETAINED_MEMORY_CAPACITY];
    }

    pub fn set_read_fault(&mut self, fault: bool) {
        self.read_fault = fault;
    }

    pub fn set_write_fault(&mut self, fault: bool) {
        self.write_fault = fault;
    }

    /// Successful writes so far.
    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl RetainedMemory for MockRetainedMemory {
    type Error = MockMemoryFault;

    fn read(&mut self, buffer: &mut [u8; RECORD_SIZE]) -> Result<(), MockMemoryFault> {
        if self.read_fault {
            return Err(MockMemoryFault);
        }
        buffer.copy_from_slice(&self.bytes[..RECORD_SIZE]);
        Ok(())
    }

    fn write(&mut self, record: &[u8; RECORD_SIZE]) -> Result<(), MockMemoryFault> {
        if self.write_fault {
            return Err(MockMemoryFault);
        }
        self.bytes[..RECORD_SIZE].copy_from_slice(record);
        self.writes += 1;
        Ok(())
    }
}
