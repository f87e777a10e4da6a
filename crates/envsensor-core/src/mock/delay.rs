use embedded_hal_async::delay::DelayNs;

/// Returns immediately and keeps a tally of the time it was asked to wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopDelay {
    elapsed_ns: u64,
}

impl NoopDelay {
    pub const fn new() -> Self {
        Self { elapsed_ns: 0 }
    }

    pub const fn elapsed_ms(&self) -> u32 {
        (self.elapsed_ns / 1_000_000) as u32
    }
}

impl DelayNs for NoopDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}
