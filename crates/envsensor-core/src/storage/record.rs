//! Retained state record
//!
//! Binary layout, little-endian and packed:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | CRC-32 over bytes 4.. |
//! | 4 | 1 | version |
//! | 5 | 1 | Wi-Fi channel (0 = no cache) |
//! | 6 | 6 | BSSID |
//! | 12 | 16 | IPv4 address, gateway, netmask, DNS (address 0.0.0.0 = not cached) |
//! | 28 | 1 | stored sample count |
//! | 29 | 384 | 32 samples of (temperature, pressure, humidity) as `i32` |

use core::net::Ipv4Addr;

use thiserror_no_std::Error;

use super::crc::checksum;
use crate::sample::SensorSample;

/// Samples kept across sleep cycles.
pub const HISTORY_CAPACITY: usize = 32;
/// Size of the RTC retained region available to the record.
pub const RETAINED_MEMORY_CAPACITY: usize = 512;
pub const RECORD_VERSION: u8 = 1;

const CRC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const CHANNEL_OFFSET: usize = 5;
const BSSID_OFFSET: usize = 6;
const IPV4_OFFSET: usize = 12;
const COUNT_OFFSET: usize = 28;
const SAMPLES_OFFSET: usize = 29;

pub const RECORD_SIZE: usize = SAMPLES_OFFSET + HISTORY_CAPACITY * SensorSample::ENCODED_LEN;

const _: () = assert!(
    RECORD_SIZE < RETAINED_MEMORY_CAPACITY,
    "state record does not fit in retained memory"
);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("record version {found}, expected {expected}")]
    VersionMismatch { expected: u8, found: u8 },
    #[error("stored sample count {count} exceeds capacity")]
    CountOutOfRange { count: u8 },
    #[error("retained memory could not be read")]
    Unreadable,
}

/// Static addressing learned from the last association, so the next boot can
/// skip DHCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Settings {
    pub address: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub dns: Ipv4Addr,
}

impl Ipv4Settings {
    /// Netmask as a CIDR prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.netmask.to_bits().leading_ones() as u8
    }
}

/// Fast-reconnect cache: where the access point was last found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCache {
    pub channel: u8,
    pub bssid: [u8; 6],
    pub ipv4: Option<Ipv4Settings>,
}

/// Bounded sample history, oldest first.
///
/// When full, appending drops the oldest sample: the remaining samples shift
/// down one slot and the new one takes the last slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    samples: heapless::Vec<SensorSample, HISTORY_CAPACITY>,
}

impl History {
    pub const fn new() -> Self {
        Self {
            samples: heapless::Vec::new(),
        }
    }

    /// Append a sample, returning the one evicted to make room.
    pub fn push(&mut self, sample: SensorSample) -> Option<SensorSample> {
        let evicted = if self.samples.is_full() {
            Some(self.samples.remove(0))
        } else {
            None
        };
        // Cannot fail: a slot was freed above if the buffer was full.
        let _ = self.samples.push(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.is_full()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &SensorSample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[SensorSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.last()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Decoded state record. The default value is the cold-boot state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistentRecord {
    pub wifi: Option<WifiCache>,
    pub history: History,
}

fn read_ipv4(bytes: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    )
}

impl PersistentRecord {
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        self.encode_versioned(RECORD_VERSION)
    }

    /// Serialize with an explicit version. The checksum is computed last,
    /// over everything after it.
    pub fn encode_versioned(&self, version: u8) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[VERSION_OFFSET] = version;

        // Channel 0 and address 0.0.0.0 mean "not cached", so nothing else of
        // such a cache is written.
        if let Some(wifi) = self.wifi.filter(|wifi| wifi.channel != 0) {
            bytes[CHANNEL_OFFSET] = wifi.channel;
            bytes[BSSID_OFFSET..BSSID_OFFSET + 6].copy_from_slice(&wifi.bssid);
            if let Some(ipv4) = wifi.ipv4.filter(|ipv4| !ipv4.address.is_unspecified()) {
                let addresses = [ipv4.address, ipv4.gateway, ipv4.netmask, ipv4.dns];
                for (i, address) in addresses.iter().enumerate() {
                    let at = IPV4_OFFSET + i * 4;
                    bytes[at..at + 4].copy_from_slice(&address.octets());
                }
            }
        }

        bytes[COUNT_OFFSET] = self.history.len() as u8;
        for (i, sample) in self.history.iter().enumerate() {
            let at = SAMPLES_OFFSET + i * SensorSample::ENCODED_LEN;
            bytes[at..at + SensorSample::ENCODED_LEN].copy_from_slice(&sample.to_le_bytes());
        }

        let crc = checksum(&bytes[VERSION_OFFSET..]);
        bytes[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Result<Self, RecordError> {
        Self::decode_versioned(bytes, RECORD_VERSION)
    }

    /// Validate and parse. Nothing is taken from a record that fails the
    /// checksum, the version check or the count bound.
    pub fn decode_versioned(bytes: &[u8; RECORD_SIZE], expected: u8) -> Result<Self, RecordError> {
        let stored = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let computed = checksum(&bytes[VERSION_OFFSET..]);
        if stored != computed {
            return Err(RecordError::ChecksumMismatch { stored, computed });
        }

        let found = bytes[VERSION_OFFSET];
        if found != expected {
            return Err(RecordError::VersionMismatch { expected, found });
        }

        let count = bytes[COUNT_OFFSET];
        if count as usize > HISTORY_CAPACITY {
            return Err(RecordError::CountOutOfRange { count });
        }

        let channel = bytes[CHANNEL_OFFSET];
        let wifi = (channel != 0).then(|| {
            let mut bssid = [0u8; 6];
            bssid.copy_from_slice(&bytes[BSSID_OFFSET..BSSID_OFFSET + 6]);
            let address = read_ipv4(bytes, IPV4_OFFSET);
            let ipv4 = (!address.is_unspecified()).then(|| Ipv4Settings {
                address,
                gateway: read_ipv4(bytes, IPV4_OFFSET + 4),
                netmask: read_ipv4(bytes, IPV4_OFFSET + 8),
                dns: read_ipv4(bytes, IPV4_OFFSET + 12),
            });
            WifiCache {
                channel,
                bssid,
                ipv4,
            }
        });

        let mut history = History::new();
        for i in 0..count as usize {
            let at = SAMPLES_OFFSET + i * SensorSample::ENCODED_LEN;
            let mut sample = [0u8; SensorSample::ENCODED_LEN];
            sample.copy_from_slice(&bytes[at..at + SensorSample::ENCODED_LEN]);
            history.push(SensorSample::from_le_bytes(&sample));
        }

        Ok(Self { wifi, history })
    }
}
