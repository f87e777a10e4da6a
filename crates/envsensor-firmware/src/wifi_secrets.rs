//! Credentials baked in by `build.rs` from `.env`.

use envsensor_core::config::{InternetConfig, NodeConfig};

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
pub const DATABASE_URL: &str = env!("DATABASE_URL");

pub fn node_config() -> NodeConfig<'static> {
    NodeConfig {
        internet: InternetConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
        database_url: DATABASE_URL,
        ..NodeConfig::default()
    }
}
