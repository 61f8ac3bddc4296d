//! Peripheral-side bus I/O: the thin adapter between an I2C slave interrupt
//! and the command dispatcher (C2 peripheral half, §4.2).
//!
//! On hardware this is the one place that needs a `critical_section`-guarded
//! static shared between the I2C slave ISR and the rest of the firmware —
//! everything in this module is written so that sharing is the *only* unsafe
//! surface, and the type below stays plain, safe, and unit-testable without
//! any interrupt involved.

use heapless::Vec as HVec;
use protocol::constants::NACK_SENTINEL;

/// Staged outgoing bytes for the next "request to respond" event. Reset to
/// [`NACK_SENTINEL`] after every read, so a dispatcher that forgets to stage
/// a response fails loudly on the controller side rather than replaying
/// stale data (§4.2).
pub struct BusAdapter<const N: usize> {
    response: HVec<u8, N>,
}

impl<const N: usize> Default for BusAdapter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BusAdapter<N> {
    /// A fresh adapter with no response staged.
    #[must_use]
    pub fn new() -> Self {
        let mut response = HVec::new();
        let _ = response.extend_from_slice(&NACK_SENTINEL);
        Self { response }
    }

    /// Called from the command dispatcher once it has built an answer frame.
    pub fn stage_response(&mut self, bytes: &[u8]) -> Result<(), ()> {
        self.response = HVec::from_slice(bytes).map_err(|_| ())?;
        Ok(())
    }

    /// Called from the I2C slave's "request to respond" event. Returns
    /// whatever was staged, then resets to the NACK sentinel so a second read
    /// without an intervening write can't replay the same bytes.
    pub fn take_response(&mut self) -> HVec<u8, N> {
        let out = self.response.clone();
        self.response.clear();
        let _ = self.response.extend_from_slice(&NACK_SENTINEL);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_adapter_answers_nack_sentinel() {
        let mut adapter: BusAdapter<8> = BusAdapter::new();
        assert_eq!(adapter.take_response().as_slice(), &NACK_SENTINEL);
    }

    #[test]
    fn staged_response_is_returned_once() {
        let mut adapter: BusAdapter<8> = BusAdapter::new();
        adapter.stage_response(&[0x03, 0x02, 0x01, 0xAA]).unwrap();
        assert_eq!(adapter.take_response().as_slice(), &[0x03, 0x02, 0x01, 0xAA]);
        assert_eq!(adapter.take_response().as_slice(), &NACK_SENTINEL);
    }
}
