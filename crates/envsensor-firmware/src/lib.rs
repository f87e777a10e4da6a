//! ESP32-S3 firmware-specific modules for envsensor
//!
//! Hardware-bound code that cannot compile on desktop targets: the RTC
//! memory region that survives deep sleep, the esp-radio station driver and
//! the credentials baked in at build time.

#![no_std]

extern crate alloc;

pub mod retained;
pub mod wifi;
pub mod wifi_secrets;
