//! Safe-state fail-safe engine (C8, §4.7).
//!
//! Every successful `set-*`/`begin-*` request from the controller feeds the
//! watchdog. If `protocol::constants::WATCHDOG_TICK_MS` passes
//! `timeout_ms` times without a feed, the peripheral has lost its
//! controller and must fall back to the safe-state values last pushed via
//! `set-default-dac`/`set-default-pwm` (§4.4).

use protocol::constants::WATCHDOG_NEVER;

/// Countdown timer driving the "controller went away" fail-safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Watchdog {
    timeout_ms: u16,
    remaining_ms: u16,
    tripped: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// A watchdog configured to never expire, the reset-time default (§4.4).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout_ms: WATCHDOG_NEVER,
            remaining_ms: WATCHDOG_NEVER,
            tripped: false,
        }
    }

    /// Reconfigure the timeout (`set-timeout`/`default-and-timeout`).
    /// `WATCHDOG_NEVER` disables expiry entirely. Feeds the watchdog as a
    /// side effect, matching the source's "changing the timeout also resets
    /// the countdown" behaviour.
    pub fn set_timeout(&mut self, timeout_ms: u16) {
        self.timeout_ms = timeout_ms;
        self.feed();
    }

    /// Current configured timeout.
    #[must_use]
    pub const fn timeout_ms(&self) -> u16 {
        self.timeout_ms
    }

    /// Reset the countdown; call on every accepted `set-*`/`begin-*` request.
    pub fn feed(&mut self) {
        self.remaining_ms = self.timeout_ms;
        self.tripped = false;
    }

    /// Advance the countdown by `elapsed_ms`. Returns `true` exactly once,
    /// the tick where the countdown first reaches zero — the caller should
    /// apply the safe-state defaults on that edge, not on every subsequent
    /// tick while still untripped.
    pub fn tick(&mut self, elapsed_ms: u32) -> bool {
        if self.timeout_ms == WATCHDOG_NEVER || self.tripped {
            return false;
        }
        let elapsed = u16::try_from(elapsed_ms).unwrap_or(u16::MAX);
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed);
        if self.remaining_ms == 0 {
            self.tripped = true;
            return true;
        }
        false
    }

    /// Whether the watchdog has expired since the last `feed`.
    #[must_use]
    pub const fn is_tripped(&self) -> bool {
        self.tripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_timeout_does_not_trip() {
        let mut wd = Watchdog::new();
        assert!(!wd.tick(u32::from(WATCHDOG_NEVER) + 1));
    }

    #[test]
    fn trips_exactly_once_on_the_expiry_tick() {
        let mut wd = Watchdog::new();
        wd.set_timeout(100);
        assert!(!wd.tick(99));
        assert!(wd.tick(1));
        assert!(!wd.tick(1), "must not re-trip every subsequent tick");
    }

    #[test]
    fn feed_resets_the_countdown() {
        let mut wd = Watchdog::new();
        wd.set_timeout(100);
        wd.tick(90);
        wd.feed();
        assert!(!wd.tick(90));
    }
}
