//! Scripted Wi-Fi station

use std::vec::Vec;

use crate::network::{JoinTarget, WifiStation};
use crate::storage::WifiCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockStationFault;

/// A join request as the station saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockJoin {
    Quick(WifiCache),
    Full,
}

/// Access point model: after a join that can succeed, `is_connected` reports
/// false for a set number of polls, then true.
#[derive(Debug, Clone)]
pub struct MockStation {
    link: WifiCache,
    reachable: bool,
    quick_connect_works: bool,
    polls_to_connect: u32,
    begin_fault: bool,
    reports_link: bool,
    pending: Option<u32>,
    connected: bool,
    powered: bool,
    joins: Vec<MockJoin>,
    resets: u32,
}

impl MockStation {
    /// A reachable access point that reports `link` once associated.
    pub fn new(link: WifiCache) -> Self {
        Self {
            link,
            reachable: true,
            quick_connect_works: true,
            polls_to_connect: 3,
            begin_fault: false,
            reports_link: true,
            pending: None,
            connected: false,
            powered: false,
            joins: Vec::new(),
            resets: 0,
        }
    }

    /// Quick joins never complete, as when the AP moved channel.
    pub fn with_quick_connect(mut self, works: bool) -> Self {
        self.quick_connect_works = works;
        self
    }

    pub fn with_polls_to_connect(mut self, polls: u32) -> Self {
        self.polls_to_connect = polls;
        self
    }

    pub fn with_begin_fault(mut self, fault: bool) -> Self {
        self.begin_fault = fault;
        self
    }

    /// Associations complete but `link_info` has nothing to report.
    pub fn without_link_info(mut self) -> Self {
        self.reports_link = false;
        self
    }

    /// No join of any kind completes.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn joins(&self) -> &[MockJoin] {
        &self.joins
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }
}

impl WifiStation for MockStation {
    type Error = MockStationFault;

    async fn begin(&mut self, target: JoinTarget<'_>) -> Result<(), MockStationFault> {
        if self.begin_fault {
            return Err(MockStationFault);
        }
        self.powered = true;
        self.connected = false;
        let completes = match target {
            JoinTarget::Quick(cache) => {
                self.joins.push(MockJoin::Quick(*cache));
                self.reachable && self.quick_connect_works
            }
            JoinTarget::Full => {
                self.joins.push(MockJoin::Full);
                self.reachable
            }
        };
        self.pending = completes.then_some(self.polls_to_connect);
        Ok(())
    }

    fn is_connected(&mut self) -> Result<bool, MockStationFault> {
        match self.pending {
            Some(0) => self.connected = true,
            Some(n) => self.pending = Some(n - 1),
            None => {}
        }
        Ok(self.connected)
    }

    async fn reset(&mut self) -> Result<(), MockStationFault> {
        self.resets += 1;
        self.pending = None;
        self.connected = false;
        Ok(())
    }

    fn link_info(&self) -> Option<WifiCache> {
        (self.connected && self.reports_link).then_some(self.link)
    }

    async fn shut_down(&mut self) -> Result<(), MockStationFault> {
        self.pending = None;
        self.connected = false;
        self.powered = false;
        Ok(())
    }
}
