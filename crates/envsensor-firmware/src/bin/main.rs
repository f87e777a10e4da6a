#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::time::Duration;

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::StackResources;
use embassy_time::Delay;
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use esp_hal::rtc_cntl::{Rtc, reset_reason, wakeup_cause};
use esp_hal::system::Cpu;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use static_cell::StaticCell;

use envsensor_core::app_state::EnvNode;
use envsensor_core::network::WifiStation;
use envsensor_core::storage::LoadOrigin;
use envsensor_core::transport::{BME280_PRIMARY_ADDRESS, I2cTransport};
use envsensor_firmware::retained::RtcRetainedMemory;
use envsensor_firmware::wifi::EspStation;
use envsensor_firmware::wifi_secrets;

const NET_SEED: u64 = 0x3C5E_91A0_47D2_B86F;

static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

fn deep_sleep(rtc: &mut Rtc<'_>, interval_ms: u32) -> ! {
    info!("Sleeping {} ms", interval_ms);
    let timer = TimerWakeupSource::new(Duration::from_millis(u64::from(interval_ms)));
    rtc.sleep_deep(&[&timer])
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut rtc = Rtc::new(peripherals.LPWR);
    let config = wifi_secrets::node_config();
    info!(
        "Wake: reset={:?} cause={:?}",
        reset_reason(Cpu::ProCpu),
        wakeup_cause()
    );

    let Some(memory) = RtcRetainedMemory::take() else {
        error!("Retained memory already in use");
        deep_sleep(&mut rtc, config.interval_ms);
    };
    let mut node = EnvNode::boot(memory);
    if let LoadOrigin::ColdBoot(reason) = node.load_origin() {
        warn!("Starting without retained state: {}", reason);
    }

    match I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    ) {
        Ok(i2c) => {
            let bus = i2c
                .with_sda(peripherals.GPIO8)
                .with_scl(peripherals.GPIO9)
                .into_async();
            let transport = I2cTransport::new(bus, BME280_PRIMARY_ADDRESS);
            match node.init_sensor(transport, Delay, config.sampling).await {
                Ok(()) => match node.measure().await {
                    Ok(sample) => info!("Line: {}", sample.to_line()),
                    Err(e) => warn!("No sample this wake: {}", e),
                },
                Err(e) => error!("Sensor unavailable: {}", e),
            }
        }
        Err(e) => error!("I2C config rejected: {:?}", e),
    }

    match esp_radio::init() {
        Ok(radio) => match esp_radio::wifi::new(&radio, peripherals.WIFI, Default::default()) {
            Ok((controller, interfaces)) => {
                let (stack, mut runner) = embassy_net::new(
                    interfaces.sta,
                    embassy_net::Config::dhcpv4(Default::default()),
                    NET_RESOURCES.init(StackResources::new()),
                    NET_SEED,
                );
                let mut station = EspStation::new(controller, stack, config.internet);

                let cycle = async {
                    match node.connect(&mut station, &mut Delay, &config.reconnect).await {
                        Ok(report) => info!(
                            "Connected to {} after {} polls (quick={}, fell_back={})",
                            config.internet.ssid, report.polls, report.quick_connect, report.fell_back
                        ),
                        Err(e) => error!("Upload skipped: {}", e),
                    }
                    if let Err(e) = station.shut_down().await {
                        error!("Radio shutdown failed: {:?}", e);
                    }
                };

                if let Either::First(_) = select(runner.run(), cycle).await {
                    error!("Network runner stopped");
                }
            }
            Err(e) => error!("Wi-Fi controller init failed: {:?}", e),
        },
        Err(e) => error!("Radio init failed: {:?}", e),
    }

    if let Err(e) = node.prepare_sleep() {
        error!("State not saved: {}", e);
    }
    info!("History holds {} samples", node.history().len());

    deep_sleep(&mut rtc, config.interval_ms)
}
