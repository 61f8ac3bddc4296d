//! Configuration shadow: the controller's record of "what this peripheral was
//! last told to do", replayed into it after every reset (C6, §4.4/§4.6).
//!
//! Storage is keyed by [`ShadowKey`] (for dedup/overwrite semantics) but each
//! entry also carries the exact [`Arg`] it was set with, since several
//! `set`/`begin-*` opcodes can all end up writing the same logical slot
//! (e.g. every `begin-channel-as-*` writes `ShadowKey::Channel`). Replay
//! resends precisely what was last accepted, not a reconstructed frame.

use heapless::Vec as HVec;
use protocol::frame::Arg;
use protocol::ShadowKey;

/// Large enough for the biggest payload §4.6 describes: `set-pwm`/
/// `set-default-pwm`'s `channel + period_us(4) + pulse_us(4)`.
const ENTRY_CAPACITY: usize = 9;

/// Upper bound on distinct configuration slots tracked per peripheral. Sized
/// for the largest typed family in §4.9 (analog, 8 channels + 4 PWM).
const MAX_ENTRIES: usize = 48;

pub(crate) type EntryPayload = HVec<u8, ENTRY_CAPACITY>;

struct Entry {
    key: ShadowKey,
    arg: Arg,
    payload: EntryPayload,
}

/// A sparse, insertion-ordered record of the configuration last pushed to one
/// peripheral.
pub struct Shadow {
    entries: HVec<Entry, MAX_ENTRIES>,
}

impl Default for Shadow {
    fn default() -> Self {
        Self::new()
    }
}

impl Shadow {
    /// An empty shadow, as a freshly discovered peripheral starts with.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HVec::new() }
    }

    /// Whether any configuration has been recorded yet.
    ///
    /// `true` here is the signal to push the platform default instead of
    /// replaying (§4.4, Open Question #4: replaces `device_is_used`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record (or overwrite) the arg+bytes last sent for `key`.
    pub fn set(&mut self, key: ShadowKey, arg: Arg, payload: &[u8]) -> Result<(), ()> {
        let bytes = EntryPayload::from_slice(payload).map_err(|_| ())?;
        if let Some(slot) = self.entries.iter_mut().find(|e| e.key == key) {
            slot.arg = arg;
            slot.payload = bytes;
            return Ok(());
        }
        self.entries
            .push(Entry { key, arg, payload: bytes })
            .map_err(|_| ())
    }

    /// Look up the last bytes recorded for `key`.
    #[must_use]
    pub fn get(&self, key: ShadowKey) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.payload.as_slice())
    }

    /// Drop any recorded value for `key` (role cleared back to undefined, etc).
    pub fn clear(&mut self, key: ShadowKey) {
        if let Some(i) = self.entries.iter().position(|e| e.key == key) {
            self.entries.swap_remove(i);
        }
    }

    /// Iterate every recorded `(key, arg, payload)` triple in insertion order.
    ///
    /// Prefer [`Shadow::iter_ordered`] for replay; this is kept for callers
    /// that only care about the full set, not sequencing.
    pub fn iter(&self) -> impl Iterator<Item = (ShadowKey, Arg, &[u8])> {
        self.entries.iter().map(|e| (e.key, e.arg, e.payload.as_slice()))
    }

    /// Iterate recorded entries ordered by ascending [`ShadowKey::to_offset`]
    /// (§5 Ordering guarantee (iii)), given the replaying peripheral's channel
    /// and PWM-channel counts.
    #[must_use]
    pub fn iter_ordered(&self, k: usize, p: usize) -> HVec<(ShadowKey, Arg, EntryPayload), MAX_ENTRIES> {
        let mut ordered: HVec<(usize, ShadowKey, Arg, EntryPayload), MAX_ENTRIES> = HVec::new();
        for e in &self.entries {
            // Capacity matches `entries`, so this can never overflow.
            let _ = ordered.push((e.key.to_offset(k, p), e.key, e.arg, e.payload.clone()));
        }
        ordered.sort_unstable_by_key(|(offset, ..)| *offset);

        let mut out = HVec::new();
        for (_, key, arg, payload) in ordered {
            let _ = out.push((key, arg, payload));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_shadow_is_empty() {
        assert!(Shadow::new().is_empty());
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut shadow = Shadow::new();
        shadow.set(ShadowKey::Led, Arg::SetLed, &[0b0000_0101]).unwrap();
        assert_eq!(shadow.get(ShadowKey::Led), Some([0b0000_0101].as_slice()));
    }

    #[test]
    fn set_overwrites_existing_entry_for_same_key() {
        let mut shadow = Shadow::new();
        shadow.set(ShadowKey::Timeout, Arg::SetTimeout, &[0x00, 0x10]).unwrap();
        shadow.set(ShadowKey::Timeout, Arg::SetTimeout, &[0xFF, 0xFF]).unwrap();
        assert_eq!(shadow.entries_len_for_test(), 1);
        assert_eq!(shadow.get(ShadowKey::Timeout), Some([0xFF, 0xFF].as_slice()));
    }

    #[test]
    fn clear_removes_the_entry() {
        let mut shadow = Shadow::new();
        shadow.set(ShadowKey::Channel(2), Arg::BeginAdc, &[0x01]).unwrap();
        shadow.clear(ShadowKey::Channel(2));
        assert_eq!(shadow.get(ShadowKey::Channel(2)), None);
        assert!(shadow.is_empty());
    }

    impl Shadow {
        fn entries_len_for_test(&self) -> usize {
            self.entries.len()
        }
    }
}
