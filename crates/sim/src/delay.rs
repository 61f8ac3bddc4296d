//! `DelayNs` over `tokio::time`, for running `ChainBus`/`Dispatcher` against
//! the simulated bus without an embedded timer.

use embedded_hal_async::delay::DelayNs;

/// Delay source backed by the tokio runtime's timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

impl DelayNs for TokioDelay {
    async fn delay_ns(&mut self, ns: u32) {
        tokio::time::sleep(std::time::Duration::from_nanos(u64::from(ns))).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        tokio::time::sleep(std::time::Duration::from_millis(u64::from(ms))).await;
    }
}
