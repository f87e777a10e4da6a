use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use super::{JoinTarget, WifiStation};
use crate::storage::WifiCache;

/// Poll budget for association. Both thresholds count `is_connected` polls,
/// not wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Polls after which the station is reset and a full join started.
    pub fallback_after: u32,
    /// Polls after which the attempt is abandoned.
    pub give_up_after: u32,
    pub poll_interval_ms: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            fallback_after: 100,
            give_up_after: 200,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    #[error("not connected after {attempts} polls")]
    ReconnectTimeout { attempts: u32 },
    #[error("station driver error")]
    Station,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectReport {
    /// Unsuccessful polls before the link came up.
    pub polls: u32,
    /// The association that came up was the quick join.
    pub quick_connect: bool,
    pub fell_back: bool,
    /// What the record's Wi-Fi cache should now hold.
    pub link: Option<WifiCache>,
}

fn station_error<E: core::fmt::Debug>(operation: &'static str, e: E) -> NetworkError {
    error!("Wi-Fi {} failed: {:?}", operation, e);
    NetworkError::Station
}

/// Associate, preferring the cached access point.
///
/// With a cache the station is sent straight to the cached channel and BSSID;
/// without one, a full join runs. Once `fallback_after` polls have passed the
/// station is reset and a full join started; at `give_up_after` polls the
/// attempt fails with [`NetworkError::ReconnectTimeout`].
pub async fn connect<W, D>(
    station: &mut W,
    delay: &mut D,
    policy: &ReconnectPolicy,
    cache: Option<&WifiCache>,
) -> Result<ConnectReport, NetworkError>
where
    W: WifiStation,
    D: DelayNs,
{
    let target = match cache {
        Some(cache) => {
            info!(
                "Wi-Fi quick connect: channel {}, BSSID {:02x?}",
                cache.channel, cache.bssid
            );
            JoinTarget::Quick(cache)
        }
        None => {
            info!("Wi-Fi full connect");
            JoinTarget::Full
        }
    };
    station
        .begin(target)
        .await
        .map_err(|e| station_error("begin", e))?;

    let mut polls = 0;
    let mut fell_back = false;
    while !station.is_connected().map_err(|e| station_error("status", e))? {
        polls += 1;
        if polls == policy.fallback_after {
            warn!(
                "Wi-Fi not up after {} polls, resetting for a full connect",
                polls
            );
            station.reset().await.map_err(|e| station_error("reset", e))?;
            station
                .begin(JoinTarget::Full)
                .await
                .map_err(|e| station_error("begin", e))?;
            fell_back = true;
        }
        if polls >= policy.give_up_after {
            error!("Could not connect to Wi-Fi after {} polls", polls);
            return Err(NetworkError::ReconnectTimeout { attempts: polls });
        }
        delay.delay_ms(policy.poll_interval_ms).await;
    }

    info!("Wi-Fi connected, r:{}", polls);
    Ok(ConnectReport {
        polls,
        quick_connect: cache.is_some() && !fell_back,
        fell_back,
        link: station.link_info(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockJoin, MockStation, NoopDelay};
    use embassy_futures::block_on;

    fn cached() -> WifiCache {
        WifiCache {
            channel: 6,
            bssid: [0x10, 0x20, 0x30, 0x40, 0x50, 0x60],
            ipv4: None,
        }
    }

    #[test]
    fn test_quick_connect() {
        let mut station = MockStation::new(cached()).with_polls_to_connect(3);
        let mut delay = NoopDelay::new();
        let report = block_on(connect(
            &mut station,
            &mut delay,
            &ReconnectPolicy::default(),
            Some(&cached()),
        ))
        .unwrap();

        assert_eq!(report.polls, 3);
        assert!(report.quick_connect);
        assert!(!report.fell_back);
        assert_eq!(report.link, Some(cached()));
        assert_eq!(station.joins(), &[MockJoin::Quick(cached())]);
        assert_eq!(delay.elapsed_ms(), 3 * 50);
        assert!(station.is_powered());

        block_on(station.shut_down()).unwrap();
        assert!(!station.is_powered());
        assert_eq!(station.link_info(), None);
    }

    #[test]
    fn test_no_cache_joins_fully() {
        let mut station = MockStation::new(cached()).with_polls_to_connect(0);
        let mut delay = NoopDelay::new();
        let report = block_on(connect(
            &mut station,
            &mut delay,
            &ReconnectPolicy::default(),
            None,
        ))
        .unwrap();

        assert_eq!(report.polls, 0);
        assert!(!report.quick_connect);
        assert_eq!(station.joins(), &[MockJoin::Full]);
    }

    #[test]
    fn test_stale_cache_falls_back_to_full_join() {
        let mut station = MockStation::new(cached())
            .with_quick_connect(false)
            .with_polls_to_connect(5);
        let mut delay = NoopDelay::new();
        let report = block_on(connect(
            &mut station,
            &mut delay,
            &ReconnectPolicy::default(),
            Some(&cached()),
        ))
        .unwrap();

        assert_eq!(report.polls, 105);
        assert!(report.fell_back);
        assert!(!report.quick_connect);
        assert_eq!(station.resets(), 1);
        assert_eq!(station.joins(), &[MockJoin::Quick(cached()), MockJoin::Full]);
    }

    #[test]
    fn test_gives_up_at_second_threshold() {
        let mut station = MockStation::new(cached()).unreachable();
        let mut delay = NoopDelay::new();
        let policy = ReconnectPolicy::default();
        let err = block_on(connect(&mut station, &mut delay, &policy, Some(&cached()))).unwrap_err();

        assert_eq!(err, NetworkError::ReconnectTimeout { attempts: 200 });
        assert_eq!(station.resets(), 1);
        assert_eq!(delay.elapsed_ms(), 199 * policy.poll_interval_ms);
    }

    #[test]
    fn test_custom_thresholds() {
        let mut station = MockStation::new(cached()).unreachable();
        let mut delay = NoopDelay::new();
        let policy = ReconnectPolicy {
            fallback_after: 2,
            give_up_after: 4,
            poll_interval_ms: 10,
        };
        let err = block_on(connect(&mut station, &mut delay, &policy, None)).unwrap_err();
        assert_eq!(err, NetworkError::ReconnectTimeout { attempts: 4 });
        assert_eq!(station.joins(), &[MockJoin::Full, MockJoin::Full]);
    }

    #[test]
    fn test_station_error_is_surfaced() {
        let mut station = MockStation::new(cached()).with_begin_fault(true);
        let mut delay = NoopDelay::new();
        let err = block_on(connect(
            &mut station,
            &mut delay,
            &ReconnectPolicy::default(),
            None,
        ))
        .unwrap_err();
        assert_eq!(err, NetworkError::Station);
    }
}
