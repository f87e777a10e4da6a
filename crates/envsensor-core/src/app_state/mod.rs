//! Per-wake node lifecycle and its error type
//!
//! One wake runs `boot → init_sensor → measure → connect → prepare_sleep`,
//! driven by the firmware entry point or the simulator. The node owns the
//! sensor session and the state store; nothing else touches the record.

use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::network::{self, ConnectReport, NetworkError, ReconnectPolicy, WifiStation};
use crate::sample::SensorSample;
use crate::sensors::bme280::{Bme280, Bme280Error, SamplingConfig};
use crate::storage::{History, LoadOrigin, RetainedMemory, StateStore, StoreError};
use crate::transport::RegisterTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRunState {
    Booted,
    SensorReady,
    Measured,
    Connected,
    ReadyToSleep,
    Error,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    #[error("sensor error: {0}")]
    Sensor(Bme280Error),
    #[error("state store error: {0}")]
    Store(StoreError),
    #[error("network error: {0}")]
    Network(NetworkError),
    #[error("no sensor session")]
    SensorNotInitialized,
}

impl From<Bme280Error> for NodeError {
    fn from(value: Bme280Error) -> Self {
        Self::Sensor(value)
    }
}

impl From<StoreError> for NodeError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<NetworkError> for NodeError {
    fn from(value: NetworkError) -> Self {
        Self::Network(value)
    }
}

pub struct EnvNode<T, D, M> {
    run_state: NodeRunState,
    sensor: Option<Bme280<T, D>>,
    store: StateStore<M>,
}

impl<T, D, M> EnvNode<T, D, M>
where
    T: RegisterTransport,
    D: DelayNs,
    M: RetainedMemory,
{
    /// Load and validate the retained record.
    pub fn boot(memory: M) -> Self {
        let store = StateStore::load(memory);
        if let LoadOrigin::ColdBoot(reason) = store.origin() {
            info!("Cold boot: {}", reason);
        }
        Self {
            run_state: NodeRunState::Booted,
            sensor: None,
            store,
        }
    }

    /// Open the sensor session. The session is kept even when `init` fails so
    /// [`retry_sensor_init`](Self::retry_sensor_init) can run it again.
    pub async fn init_sensor(
        &mut self,
        transport: T,
        delay: D,
        sampling: SamplingConfig,
    ) -> Result<(), NodeError> {
        let sensor = self.sensor.insert(Bme280::new(transport, delay));
        let result = sensor.init(sampling).await;
        self.settle(result.map_err(NodeError::from), NodeRunState::SensorReady)
    }

    pub async fn retry_sensor_init(&mut self, sampling: SamplingConfig) -> Result<(), NodeError> {
        let sensor = self
            .sensor
            .as_mut()
            .ok_or(NodeError::SensorNotInitialized)?;
        let result = sensor.init(sampling).await;
        self.settle(result.map_err(NodeError::from), NodeRunState::SensorReady)
    }

    /// One measurement cycle: read, compensate, append to history.
    ///
    /// On failure the cycle is skipped and the record is left as it was.
    pub async fn measure(&mut self) -> Result<SensorSample, NodeError> {
        let sensor = self
            .sensor
            .as_mut()
            .ok_or(NodeError::SensorNotInitialized)?;

        let sample = match sensor.read_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Measurement cycle skipped: {}", e);
                self.run_state = NodeRunState::Error;
                return Err(e.into());
            }
        };

        if let Some(evicted) = self.store.record_mut().history.push(sample) {
            debug!("History full, dropped oldest sample {}", evicted);
        }
        info!("Measured {}", sample);
        self.run_state = NodeRunState::Measured;
        Ok(sample)
    }

    /// Associate using the cached access point when the record holds one, and
    /// replace the cache with the new link. A link the station cannot
    /// describe clears the cache so the next wake joins fully.
    pub async fn connect<W, P>(
        &mut self,
        station: &mut W,
        delay: &mut P,
        policy: &ReconnectPolicy,
    ) -> Result<ConnectReport, NodeError>
    where
        W: WifiStation,
        P: DelayNs,
    {
        let cache = self.store.record().wifi;
        let result = network::connect(station, delay, policy, cache.as_ref()).await;
        let report = self.settle(result.map_err(NodeError::from), NodeRunState::Connected)?;
        self.store.record_mut().wifi = report.link;
        Ok(report)
    }

    /// Save the record; the last call before power-down.
    pub fn prepare_sleep(&mut self) -> Result<(), NodeError> {
        let result = self.store.save().map_err(NodeError::from);
        self.settle(result, NodeRunState::ReadyToSleep)
    }

    fn settle<R>(&mut self, result: Result<R, NodeError>, next: NodeRunState) -> Result<R, NodeError> {
        self.run_state = match result {
            Ok(_) => next,
            Err(_) => NodeRunState::Error,
        };
        result
    }

    pub const fn run_state(&self) -> NodeRunState {
        self.run_state
    }

    pub const fn load_origin(&self) -> LoadOrigin {
        self.store.origin()
    }

    pub const fn history(&self) -> &History {
        &self.store.record().history
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.history().latest()
    }

    /// Empty the history, e.g. once the samples have been uploaded.
    pub fn clear_history(&mut self) {
        self.store.record_mut().history.clear();
    }

    pub const fn store(&self) -> &StateStore<M> {
        &self.store
    }

    pub fn sensor_mut(&mut self) -> Option<&mut Bme280<T, D>> {
        self.sensor.as_mut()
    }

    /// Hand the retained memory back for the next boot.
    pub fn into_memory(self) -> M {
        self.store.into_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBme280, MockJoin, MockRetainedMemory, MockStation, NoopDelay};
    use crate::storage::{HISTORY_CAPACITY, Ipv4Settings, WifiCache};
    use crate::transport::{BME280_PRIMARY_ADDRESS, I2cTransport};
    use core::net::Ipv4Addr;
    use embassy_futures::block_on;

    type TestNode = EnvNode<I2cTransport<MockBme280>, NoopDelay, MockRetainedMemory>;

    fn link() -> WifiCache {
        WifiCache {
            channel: 11,
            bssid: [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01],
            ipv4: Some(Ipv4Settings {
                address: Ipv4Addr::new(10, 0, 0, 20),
                gateway: Ipv4Addr::new(10, 0, 0, 1),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                dns: Ipv4Addr::new(10, 0, 0, 1),
            }),
        }
    }

    fn wake(memory: MockRetainedMemory, station: &mut MockStation) -> TestNode {
        let mut node = TestNode::boot(memory);
        let transport = I2cTransport::new(MockBme280::new(), BME280_PRIMARY_ADDRESS);
        block_on(node.init_sensor(transport, NoopDelay::new(), SamplingConfig::default())).unwrap();
        block_on(node.measure()).unwrap();
        block_on(node.connect(station, &mut NoopDelay::new(), &ReconnectPolicy::default()))
            .unwrap();
        node.prepare_sleep().unwrap();
        node
    }

    #[test]
    fn test_first_boot_then_quick_connect() {
        let mut station = MockStation::new(link());
        let node = wake(MockRetainedMemory::new(), &mut station);
        assert!(matches!(node.load_origin(), LoadOrigin::ColdBoot(_)));
        assert_eq!(node.run_state(), NodeRunState::ReadyToSleep);
        assert_eq!(station.joins(), &[MockJoin::Full]);
        assert_eq!(node.store().record().wifi, Some(link()));

        let mut station = MockStation::new(link());
        let node = wake(node.into_memory(), &mut station);
        assert_eq!(node.load_origin(), LoadOrigin::Validated);
        assert_eq!(station.joins(), &[MockJoin::Quick(link())]);
        assert_eq!(node.history().len(), 2);
        assert_eq!(node.latest().unwrap().temperature, 642_238);
    }

    #[test]
    fn test_transport_failure_skips_cycle() {
        let mut node = TestNode::boot(MockRetainedMemory::new());
        let transport = I2cTransport::new(MockBme280::new(), BME280_PRIMARY_ADDRESS);
        block_on(node.init_sensor(transport, NoopDelay::new(), SamplingConfig::default())).unwrap();
        block_on(node.measure()).unwrap();
        let before = node.store().record().clone();

        node.sensor_mut()
            .unwrap()
            .transport_mut()
            .bus_mut()
            .set_bus_fault(true);
        let err = block_on(node.measure()).unwrap_err();
        assert!(matches!(err, NodeError::Sensor(Bme280Error::Transport(_))));
        assert_eq!(node.run_state(), NodeRunState::Error);
        assert_eq!(node.store().record(), &before);
    }

    #[test]
    fn test_measure_without_sensor() {
        let mut node = TestNode::boot(MockRetainedMemory::new());
        assert_eq!(
            block_on(node.measure()).unwrap_err(),
            NodeError::SensorNotInitialized
        );
    }

    #[test]
    fn test_missing_sensor_is_reported() {
        let mut node = TestNode::boot(MockRetainedMemory::new());
        let transport = I2cTransport::new(MockBme280::new().with_chip_id(0x58), BME280_PRIMARY_ADDRESS);
        let err = block_on(node.init_sensor(transport, NoopDelay::new(), SamplingConfig::default()))
            .unwrap_err();
        assert_eq!(err, NodeError::Sensor(Bme280Error::SensorNotFound { chip_id: 0x58 }));
        assert_eq!(node.run_state(), NodeRunState::Error);
        assert_eq!(
            block_on(node.measure()).unwrap_err(),
            NodeError::Sensor(Bme280Error::NotInitialized)
        );
    }

    #[test]
    fn test_retry_after_failed_init() {
        let mut node = TestNode::boot(MockRetainedMemory::new());
        let mut bus = MockBme280::new();
        bus.set_bus_fault(true);
        let transport = I2cTransport::new(bus, BME280_PRIMARY_ADDRESS);
        assert!(block_on(node.init_sensor(transport, NoopDelay::new(), SamplingConfig::default())).is_err());
        assert_eq!(node.run_state(), NodeRunState::Error);

        node.sensor_mut()
            .unwrap()
            .transport_mut()
            .bus_mut()
            .set_bus_fault(false);
        block_on(node.retry_sensor_init(SamplingConfig::default())).unwrap();
        assert_eq!(node.run_state(), NodeRunState::SensorReady);
        assert_eq!(block_on(node.measure()).unwrap().temperature, 642_238);
    }

    #[test]
    fn test_retry_without_session() {
        let mut node = TestNode::boot(MockRetainedMemory::new());
        assert_eq!(
            block_on(node.retry_sensor_init(SamplingConfig::default())).unwrap_err(),
            NodeError::SensorNotInitialized
        );
    }

    #[test]
    fn test_clear_history_is_saved() {
        let mut station = MockStation::new(link());
        let mut node = wake(MockRetainedMemory::new(), &mut station);
        assert_eq!(node.history().len(), 1);
        node.clear_history();
        node.prepare_sleep().unwrap();

        let node = TestNode::boot(node.into_memory());
        assert_eq!(node.load_origin(), LoadOrigin::Validated);
        assert!(node.history().is_empty());
        assert_eq!(node.store().record().wifi, Some(link()));
    }

    #[test]
    fn test_network_outage_keeps_old_cache() {
        let mut station = MockStation::new(link());
        let memory = wake(MockRetainedMemory::new(), &mut station).into_memory();

        let mut node = TestNode::boot(memory);
        let mut station = MockStation::new(link()).unreachable();
        let err = block_on(node.connect(
            &mut station,
            &mut NoopDelay::new(),
            &ReconnectPolicy::default(),
        ))
        .unwrap_err();
        assert_eq!(
            err,
            NodeError::Network(NetworkError::ReconnectTimeout { attempts: 200 })
        );
        assert_eq!(node.run_state(), NodeRunState::Error);
        assert_eq!(node.store().record().wifi, Some(link()));

        node.prepare_sleep().unwrap();
        assert_eq!(node.run_state(), NodeRunState::ReadyToSleep);
    }

    #[test]
    fn test_fallback_without_link_info_clears_cache() {
        let mut station = MockStation::new(link());
        let memory = wake(MockRetainedMemory::new(), &mut station).into_memory();

        let mut node = TestNode::boot(memory);
        let mut station = MockStation::new(link())
            .with_quick_connect(false)
            .without_link_info();
        let report = block_on(node.connect(
            &mut station,
            &mut NoopDelay::new(),
            &ReconnectPolicy::default(),
        ))
        .unwrap();
        assert!(report.fell_back);
        assert!(!report.quick_connect);
        assert_eq!(node.store().record().wifi, None);
        node.prepare_sleep().unwrap();

        let mut node = TestNode::boot(node.into_memory());
        let mut station = MockStation::new(link());
        block_on(node.connect(
            &mut station,
            &mut NoopDelay::new(),
            &ReconnectPolicy::default(),
        ))
        .unwrap();
        assert_eq!(station.joins(), &[MockJoin::Full]);
        assert_eq!(node.store().record().wifi, Some(link()));
    }

    #[test]
    fn test_history_is_bounded_across_wakes() {
        let mut memory = MockRetainedMemory::new();
        for _ in 0..HISTORY_CAPACITY + 3 {
            let mut station = MockStation::new(link());
            memory = wake(memory, &mut station).into_memory();
        }
        let node = TestNode::boot(memory);
        assert_eq!(node.history().len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_corrupted_record_forces_full_join() {
        let mut station = MockStation::new(link());
        let mut memory = wake(MockRetainedMemory::new(), &mut station).into_memory();
        memory.flip_bit(5 * 8);

        let mut station = MockStation::new(link());
        let node = wake(memory, &mut station);
        assert!(matches!(node.load_origin(), LoadOrigin::ColdBoot(_)));
        assert_eq!(station.joins(), &[MockJoin::Full]);
        assert_eq!(node.history().len(), 1);
    }
}
