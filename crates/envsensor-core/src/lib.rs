//! Hardware-independent core library for envsensor
//!
//! This crate contains all platform-agnostic logic for the battery-powered
//! environmental node: the BME280 register protocol and fixed-point
//! compensation, the checksummed state record kept in retained memory across
//! deep sleep, the Wi-Fi quick-connect policy and the per-wake node lifecycle.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3) and
//! desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "mock", not(test)))]
extern crate std;

pub mod app_state;
pub mod config;
pub mod network;
pub mod sample;
pub mod sensors;
pub mod storage;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
