//! Per-channel role, range configuration, and the optional ADC moving-average
//! overlay (§3, §4.4, supplemented from the source's `add_average` behaviour).

use heapless::HistoryBuffer;
use protocol::ChannelRole;

use crate::config::MAX_ADC_AVERAGE_WINDOW;
use crate::error::PeripheralError;

/// A moving-average filter stacked on top of a channel's raw ADC reading.
/// Window size is caller-supplied (via the `begin-channel-as-adc` payload)
/// and capped at [`MAX_ADC_AVERAGE_WINDOW`].
pub struct AdcOverlay {
    history: HistoryBuffer<u16, MAX_ADC_AVERAGE_WINDOW>,
    window: usize,
}

impl AdcOverlay {
    /// A fresh overlay with an empty history, averaging over `window` samples.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            history: HistoryBuffer::new(),
            window: window.clamp(1, MAX_ADC_AVERAGE_WINDOW),
        }
    }

    /// Feed one new raw sample into the history.
    pub fn push(&mut self, sample: u16) {
        self.history.write(sample);
    }

    /// The moving average over the configured window (or fewer samples, if
    /// the channel hasn't been sampled `window` times yet).
    #[must_use]
    pub fn average(&self) -> u16 {
        let mut sum: u32 = 0;
        let mut count: u32 = 0;
        for &sample in self.history.oldest_ordered().rev().take(self.window) {
            sum += u32::from(sample);
            count += 1;
        }
        if count == 0 {
            0
        } else {
            u16::try_from(sum / count).unwrap_or(u16::MAX)
        }
    }
}

/// An analog (or digital-as-analog) channel's current configuration.
pub struct ChannelState {
    role: ChannelRole,
    /// Opaque range/gain selector carried by `begin-channel-as-*` (§3, grounded
    /// on the source's `range_code` field — this firmware never interprets
    /// its meaning, only stores and echoes it back on `get-address-and-type`
    /// family queries).
    range_code: u8,
    overlay: Option<AdcOverlay>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelState {
    /// An undefined channel, the platform-default safe state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            role: ChannelRole::Undefined,
            range_code: 0,
            overlay: None,
        }
    }

    /// Current role.
    #[must_use]
    pub const fn role(&self) -> ChannelRole {
        self.role
    }

    /// Assign a new role (any `begin-channel-as-*` opcode). Clears any ADC
    /// overlay, since the role determines whether one is even legal.
    pub fn set_role(&mut self, role: ChannelRole, range_code: u8) {
        self.role = role;
        self.range_code = range_code;
        self.overlay = None;
    }

    /// Opaque range/gain selector last set with this role.
    #[must_use]
    pub const fn range_code(&self) -> u8 {
        self.range_code
    }

    /// Attach a moving-average overlay (§4.4: rejected if the role is already
    /// an ADC or RTD measurement).
    pub fn begin_adc_overlay(&mut self, window: usize) -> Result<(), PeripheralError> {
        if !self.role.accepts_adc_overlay() {
            return Err(PeripheralError::OverlayNotAllowed);
        }
        self.overlay = Some(AdcOverlay::new(window));
        Ok(())
    }

    /// Feed a new raw sample through the overlay, if one is attached.
    pub fn feed_overlay(&mut self, raw: u16) {
        if let Some(overlay) = &mut self.overlay {
            overlay.push(raw);
        }
    }

    /// Current overlaid reading, or the raw value if no overlay is attached.
    #[must_use]
    pub fn overlaid_or(&self, raw: u16) -> u16 {
        self.overlay.as_ref().map_or(raw, AdcOverlay::average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::PowerSource;

    #[test]
    fn undefined_channel_accepts_overlay() {
        let mut ch = ChannelState::new();
        assert!(ch.begin_adc_overlay(4).is_ok());
    }

    #[test]
    fn voltage_input_rejects_overlay() {
        let mut ch = ChannelState::new();
        ch.set_role(ChannelRole::VoltageInput, 0);
        assert_eq!(ch.begin_adc_overlay(4), Err(PeripheralError::OverlayNotAllowed));
    }

    #[test]
    fn current_input_rejects_overlay_regardless_of_power_source() {
        let mut ch = ChannelState::new();
        ch.set_role(ChannelRole::CurrentInput(PowerSource::LoopPower), 0);
        assert_eq!(ch.begin_adc_overlay(4), Err(PeripheralError::OverlayNotAllowed));
    }

    #[test]
    fn overlay_average_tracks_recent_samples() {
        let mut ch = ChannelState::new();
        ch.begin_adc_overlay(2).unwrap();
        ch.feed_overlay(100);
        ch.feed_overlay(200);
        assert_eq!(ch.overlaid_or(0), 150);
    }

    #[test]
    fn no_overlay_returns_raw_value() {
        let ch = ChannelState::new();
        assert_eq!(ch.overlaid_or(42), 42);
    }
}
