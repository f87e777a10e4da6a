//! Desktop simulator for the envsensor wake cycle.
//!
//! Runs `boot → init_sensor → measure → connect → prepare_sleep` once per
//! simulated wake against the core's mock BME280, retained memory and Wi-Fi
//! station. Retained memory is carried from one wake to the next the way RTC
//! memory survives deep sleep. Each wake applies one scripted event:
//!
//! | Event         | Effect                                                    |
//! |---------------|-----------------------------------------------------------|
//! | `Normal`      | Healthy sensor and access point                           |
//! | `CorruptBit`  | One bit of the retained record flips during sleep         |
//! | `PowerLoss`   | Retained memory is wiped                                  |
//! | `ApMoved`     | The access point changed channel; quick connect must fail |
//! | `Outage`      | No access point answers                                   |
//! | `BusFault`    | The I2C bus fails after sensor init                       |
//!
//! The number of wakes defaults to one pass over the script and can be given
//! as the first argument. Set `RUST_LOG=debug` for driver-level detail.

use core::net::Ipv4Addr;

use embassy_futures::block_on;
use log::{error, info, warn};

use envsensor_core::app_state::EnvNode;
use envsensor_core::config::{InternetConfig, NodeConfig};
use envsensor_core::mock::{MockBme280, MockRetainedMemory, MockStation, NoopDelay};
use envsensor_core::network::WifiStation;
use envsensor_core::sensors::bme280::RawFrame;
use envsensor_core::storage::{Ipv4Settings, LoadOrigin, WifiCache};
use envsensor_core::transport::{BME280_PRIMARY_ADDRESS, I2cTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeEvent {
    Normal,
    CorruptBit,
    PowerLoss,
    ApMoved,
    Outage,
    BusFault,
}

const SCRIPT: [WakeEvent; 12] = [
    WakeEvent::Normal,
    WakeEvent::Normal,
    WakeEvent::Normal,
    WakeEvent::CorruptBit,
    WakeEvent::Normal,
    WakeEvent::ApMoved,
    WakeEvent::Normal,
    WakeEvent::Outage,
    WakeEvent::Normal,
    WakeEvent::BusFault,
    WakeEvent::PowerLoss,
    WakeEvent::Normal,
];

type SimNode = EnvNode<I2cTransport<MockBme280>, NoopDelay, MockRetainedMemory>;

fn access_point(channel: u8) -> WifiCache {
    WifiCache {
        channel,
        bssid: [0x24, 0x0A, 0xC4, 0x00, 0x00, channel],
        ipv4: Some(Ipv4Settings {
            address: Ipv4Addr::new(192, 168, 1, 42),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            dns: Ipv4Addr::new(192, 168, 1, 1),
        }),
    }
}

/// Raw output codes drifting slowly around the datasheet operating point.
fn synthetic_frame(wake: usize) -> RawFrame {
    let t = wake as f64;
    let adc_t = 519_888.0 + 1_500.0 * (t / 5.0).sin();
    let adc_p = 415_148.0 + 800.0 * (t / 9.0).cos();
    let adc_h = 30_000.0 + 2_500.0 * (t / 7.0).sin();
    RawFrame {
        pressure: (adc_p as u32) << 4,
        temperature: (adc_t as u32) << 4,
        humidity: adc_h as u32,
    }
}

fn run_wake(
    wake: usize,
    event: WakeEvent,
    mut memory: MockRetainedMemory,
    config: &NodeConfig<'_>,
    ap_channel: &mut u8,
) -> MockRetainedMemory {
    info!("--- wake {} ({:?}) ---", wake, event);

    match event {
        // byte 28: stored sample count
        WakeEvent::CorruptBit => memory.flip_bit(28 * 8 + 1),
        WakeEvent::PowerLoss => memory.power_loss(),
        WakeEvent::ApMoved => *ap_channel = if *ap_channel == 11 { 6 } else { 11 },
        _ => {}
    }

    let mut node = SimNode::boot(memory);
    if let LoadOrigin::ColdBoot(reason) = node.load_origin() {
        warn!("Wake {} started cold: {}", wake, reason);
    }

    let bus = MockBme280::new().with_frame(synthetic_frame(wake));
    let transport = I2cTransport::new(bus, BME280_PRIMARY_ADDRESS);
    match block_on(node.init_sensor(transport, NoopDelay::new(), config.sampling)) {
        Ok(()) => {
            if event == WakeEvent::BusFault {
                if let Some(sensor) = node.sensor_mut() {
                    sensor.transport_mut().bus_mut().set_bus_fault(true);
                }
            }
            if let Err(e) = block_on(node.measure()) {
                warn!("No sample this wake: {}", e);
            }
        }
        Err(e) => error!("Sensor unavailable: {}", e),
    }

    let mut station = MockStation::new(access_point(*ap_channel))
        .with_quick_connect(node.store().record().wifi.map(|w| w.channel) == Some(*ap_channel));
    if event == WakeEvent::Outage {
        station = station.unreachable();
    }
    let mut delay = NoopDelay::new();
    match block_on(node.connect(&mut station, &mut delay, &config.reconnect)) {
        Ok(report) => info!(
            "Connected to {} after {} polls ({}{}), {} ms",
            config.internet.ssid,
            report.polls,
            if report.quick_connect { "quick" } else { "full" },
            if report.fell_back { ", fell back" } else { "" },
            delay.elapsed_ms()
        ),
        Err(e) => error!("Upload skipped: {}", e),
    }
    if let Err(e) = block_on(station.shut_down()) {
        error!("Radio shutdown failed: {:?}", e);
    }

    if let Err(e) = node.prepare_sleep() {
        error!("State not saved: {}", e);
    }

    let history = node.history();
    info!(
        "History {}/{}, latest: {}",
        history.len(),
        envsensor_core::storage::HISTORY_CAPACITY,
        history
            .latest()
            .map(|sample| sample.to_line())
            .unwrap_or_default()
    );
    info!("Sleeping {} ms", config.interval_ms);

    node.into_memory()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let wakes = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<usize>().ok())
        .unwrap_or(SCRIPT.len());

    let config = NodeConfig {
        internet: InternetConfig {
            ssid: "simulated-ap",
            password: "",
        },
        database_url: "http://localhost:8086/write?db=envsensor",
        ..NodeConfig::default()
    };
    info!("Starting envsensor simulator: {} wakes", wakes);

    let mut memory = MockRetainedMemory::new();
    let mut ap_channel = 11;
    for wake in 0..wakes {
        let event = SCRIPT[wake % SCRIPT.len()];
        memory = run_wake(wake, event, memory, &config, &mut ap_channel);
    }

    info!("Simulator exiting");
}
