//! Logical offset space for the configuration shadow (C6, §4.6).
//!
//! The source indexes configuration with `base + offset` magic numbers; this
//! is the typed replacement the Design Notes ask for. `ShadowKey` names what
//! a piece of configuration *is*; [`ShadowKey::to_offset`] is the only place
//! that still knows the flat wire-offset layout.

#![allow(clippy::arithmetic_side_effects)] // offset math over channel counts bounded by the peripheral family

/// A logical configuration slot, keyed by kind and (where applicable) channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShadowKey {
    /// Per-channel primary role configuration.
    Channel(u8),
    /// Per-PWM-channel configuration.
    Pwm(u8),
    /// RTD update interval (single entry).
    RtdUpdateTime,
    /// Per-channel "additional ADC overlay" configuration.
    AddAdc(u8),
    /// Per-channel last-commanded DAC value.
    DacValue(u8),
    /// LED mask (single entry).
    Led,
    /// Per-channel default DAC value applied on watchdog expiry.
    DacDefault(u8),
    /// Per-PWM-channel default applied on watchdog expiry.
    PwmDefault(u8),
    /// Safe-state timeout (single entry).
    Timeout,
}

impl ShadowKey {
    /// Map to the flat offset space of §4.6, given the peripheral family's
    /// channel count `k` and PWM-channel count `p`.
    #[must_use]
    pub fn to_offset(self, k: usize, p: usize) -> usize {
        match self {
            Self::Channel(ch) => usize::from(ch),
            Self::Pwm(ch) => k + usize::from(ch),
            Self::RtdUpdateTime => k + p,
            Self::AddAdc(ch) => k + p + 1 + usize::from(ch),
            Self::DacValue(ch) => 2 * k + p + 1 + usize::from(ch),
            Self::Led => 3 * k + p + 1,
            Self::DacDefault(ch) => 3 * k + p + 2 + usize::from(ch),
            Self::PwmDefault(ch) => 4 * k + p + 2 + usize::from(ch),
            Self::Timeout => 4 * k + 2 * p + 2,
        }
    }

    /// Highest valid offset for a family with `k` channels and `p` PWM channels.
    #[must_use]
    pub const fn max_offset(k: usize, p: usize) -> usize {
        4 * k + 2 * p + 2
    }

    /// Recover a `ShadowKey` from its flat offset, the inverse of
    /// [`ShadowKey::to_offset`]. Used by `replay_into` callers that iterate
    /// offsets ascending and want to know what they're replaying.
    #[must_use]
    pub fn from_offset(offset: usize, k: usize, p: usize) -> Option<Self> {
        if offset < k {
            return Some(Self::Channel(offset as u8));
        }
        let offset = offset - k;
        if offset < p {
            return Some(Self::Pwm(offset as u8));
        }
        let offset = offset - p;
        if offset == 0 {
            return Some(Self::RtdUpdateTime);
        }
        let offset = offset - 1;
        if offset < k {
            return Some(Self::AddAdc(offset as u8));
        }
        let offset = offset - k;
        if offset < k {
            return Some(Self::DacValue(offset as u8));
        }
        let offset = offset - k;
        if offset == 0 {
            return Some(Self::Led);
        }
        let offset = offset - 1;
        if offset < k {
            return Some(Self::DacDefault(offset as u8));
        }
        let offset = offset - k;
        if offset < p {
            return Some(Self::PwmDefault(offset as u8));
        }
        let offset = offset - p;
        if offset == 0 {
            return Some(Self::Timeout);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: usize = 8;
    const P: usize = 4;

    #[test]
    fn offsets_are_disjoint_and_round_trip() {
        let mut seen = std::collections::HashSet::new();
        let mut keys = Vec::new();
        for ch in 0..K as u8 {
            keys.push(ShadowKey::Channel(ch));
            keys.push(ShadowKey::AddAdc(ch));
            keys.push(ShadowKey::DacValue(ch));
            keys.push(ShadowKey::DacDefault(ch));
        }
        for ch in 0..P as u8 {
            keys.push(ShadowKey::Pwm(ch));
            keys.push(ShadowKey::PwmDefault(ch));
        }
        keys.push(ShadowKey::RtdUpdateTime);
        keys.push(ShadowKey::Led);
        keys.push(ShadowKey::Timeout);

        for key in keys {
            let offset = key.to_offset(K, P);
            assert!(seen.insert(offset), "duplicate offset {offset} for {key:?}");
            assert_eq!(ShadowKey::from_offset(offset, K, P), Some(key));
        }
    }

    #[test]
    fn timeout_is_the_last_offset() {
        assert_eq!(ShadowKey::Timeout.to_offset(K, P), ShadowKey::max_offset(K, P));
    }
}
