//! Wi-Fi station contract and the quick-connect procedure

mod reconnect;

pub use reconnect::{ConnectReport, NetworkError, ReconnectPolicy, connect};

use crate::storage::WifiCache;

/// How to join the configured network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTarget<'a> {
    /// Go straight to the cached channel and BSSID, reusing cached addressing
    /// when present.
    Quick(&'a WifiCache),
    /// Scan and run DHCP.
    Full,
}

/// Radio driver as seen by the reconnect procedure.
///
/// `begin` only starts an association; completion is observed by polling
/// `is_connected`.
pub trait WifiStation {
    type Error: core::fmt::Debug;

    fn begin(&mut self, target: JoinTarget<'_>) -> impl Future<Output = Result<(), Self::Error>>;

    fn is_connected(&mut self) -> Result<bool, Self::Error>;

    /// Drop any association attempt and cycle the radio.
    fn reset(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Channel, BSSID and addressing of the current association.
    fn link_info(&self) -> Option<WifiCache>;

    /// Disconnect and power the radio down before sleep.
    fn shut_down(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}
