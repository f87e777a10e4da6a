use serde::{Deserialize, Serialize};

use crate::network::ReconnectPolicy;
use crate::sensors::bme280::SamplingConfig;

/// Default wake interval between measurement cycles.
pub const DEFAULT_INTERVAL_MS: u32 = 30_000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct NodeConfig<'a> {
    pub internet: InternetConfig<'a>,
    /// Line-protocol write endpoint the external uploader posts to.
    pub database_url: &'a str,
    pub interval_ms: u32,
    pub reconnect: ReconnectPolicy,
    pub sampling: SamplingConfig,
}

impl Default for NodeConfig<'_> {
    fn default() -> Self {
        Self {
            internet: InternetConfig::default(),
            database_url: "",
            interval_ms: DEFAULT_INTERVAL_MS,
            reconnect: ReconnectPolicy::default(),
            sampling: SamplingConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bme280::{Mode, Oversampling};

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.interval_ms, 30_000);
        assert_eq!(config.reconnect.fallback_after, 100);
        assert_eq!(config.reconnect.give_up_after, 200);
        assert_eq!(config.reconnect.poll_interval_ms, 50);
        assert_eq!(config.sampling.mode, Mode::Normal);
        assert_eq!(config.sampling.humidity, Oversampling::X16);
        assert!(config.internet.ssid.is_empty());
    }
}
