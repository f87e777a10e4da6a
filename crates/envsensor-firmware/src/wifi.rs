//! esp-radio station driver for the reconnect procedure
//!
//! A quick join pins the cached channel and BSSID and, when the cache holds
//! addressing, installs it as a static IPv4 config so DHCP is skipped. A full
//! join scans for the configured SSID first so the chosen access point can be
//! cached afterwards.

use embassy_net::{ConfigV4, Ipv4Cidr, Stack, StaticConfigV4};
use esp_radio::wifi::{ClientConfig, ModeConfig, ScanConfig, WifiController, WifiError};
use log::{debug, info, warn};

use envsensor_core::config::InternetConfig;
use envsensor_core::network::{JoinTarget, WifiStation};
use envsensor_core::storage::{Ipv4Settings, WifiCache};

/// Channel and BSSID the current attempt is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AccessPoint {
    channel: u8,
    bssid: [u8; 6],
}

pub struct EspStation<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
    credentials: InternetConfig<'static>,
    target: Option<AccessPoint>,
}

impl<'d> EspStation<'d> {
    pub fn new(
        controller: WifiController<'d>,
        stack: Stack<'d>,
        credentials: InternetConfig<'static>,
    ) -> Self {
        Self {
            controller,
            stack,
            credentials,
            target: None,
        }
    }

    async fn ensure_started(&mut self) -> Result<(), WifiError> {
        if !self.controller.is_started()? {
            self.controller.start_async().await?;
        }
        Ok(())
    }

    /// Strongest access point advertising the configured SSID.
    async fn scan_for_network(&mut self) -> Result<Option<AccessPoint>, WifiError> {
        let found = self
            .controller
            .scan_with_config_async(ScanConfig::default())
            .await?;
        debug!("Wi-Fi scan: {} access points", found.len());

        Ok(found
            .iter()
            .filter(|ap| ap.ssid.as_str() == self.credentials.ssid)
            .max_by_key(|ap| ap.signal_strength)
            .map(|ap| AccessPoint {
                channel: ap.channel,
                bssid: ap.bssid,
            }))
    }

    fn use_cached_addressing(&self, ipv4: &Ipv4Settings) {
        let mut config = StaticConfigV4 {
            address: Ipv4Cidr::new(ipv4.address, ipv4.prefix_len()),
            gateway: Some(ipv4.gateway),
            dns_servers: Default::default(),
        };
        let _ = config.dns_servers.push(ipv4.dns);
        self.stack.set_config_v4(ConfigV4::Static(config));
    }
}

impl WifiStation for EspStation<'_> {
    type Error = WifiError;

    async fn begin(&mut self, target: JoinTarget<'_>) -> Result<(), WifiError> {
        self.ensure_started().await?;

        let mut client = ClientConfig::default()
            .with_ssid(self.credentials.ssid.into())
            .with_password(self.credentials.password.into());

        match target {
            JoinTarget::Quick(cache) => {
                client = client.with_channel(cache.channel).with_bssid(cache.bssid);
                self.target = Some(AccessPoint {
                    channel: cache.channel,
                    bssid: cache.bssid,
                });
                match &cache.ipv4 {
                    Some(ipv4) => self.use_cached_addressing(ipv4),
                    None => self.stack.set_config_v4(ConfigV4::Dhcp(Default::default())),
                }
            }
            JoinTarget::Full => {
                self.target = self.scan_for_network().await?;
                match self.target {
                    Some(ap) => {
                        info!("Wi-Fi joining channel {}, BSSID {:02x?}", ap.channel, ap.bssid);
                        client = client.with_channel(ap.channel).with_bssid(ap.bssid);
                    }
                    None => warn!("Wi-Fi scan did not see {}", self.credentials.ssid),
                }
                self.stack.set_config_v4(ConfigV4::Dhcp(Default::default()));
            }
        }

        self.controller.set_config(&ModeConfig::Client(client))?;

        // A failed association shows up as polls that never see a link.
        if let Err(e) = self.controller.connect_async().await {
            warn!("Wi-Fi association not completed: {:?}", e);
        }
        Ok(())
    }

    fn is_connected(&mut self) -> Result<bool, WifiError> {
        Ok(self.controller.is_connected()? && self.stack.config_v4().is_some())
    }

    async fn reset(&mut self) -> Result<(), WifiError> {
        if self.controller.is_connected()? {
            self.controller.disconnect_async().await?;
        }
        self.controller.stop_async().await?;
        self.target = None;
        Ok(())
    }

    fn link_info(&self) -> Option<WifiCache> {
        let ap = self.target?;
        let ipv4 = self.stack.config_v4().map(|config| Ipv4Settings {
            address: config.address.address(),
            gateway: config.gateway.unwrap_or(core::net::Ipv4Addr::UNSPECIFIED),
            netmask: config.address.netmask(),
            dns: config
                .dns_servers
                .first()
                .copied()
                .unwrap_or(core::net::Ipv4Addr::UNSPECIFIED),
        });
        Some(WifiCache {
            channel: ap.channel,
            bssid: ap.bssid,
            ipv4,
        })
    }

    async fn shut_down(&mut self) -> Result<(), WifiError> {
        if self.controller.is_connected()? {
            self.controller.disconnect_async().await?;
        }
        self.controller.stop_async().await
    }
}
