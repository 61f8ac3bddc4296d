//! Digital I/O expansion family (§4.9): 8 digital outputs, 16 digital inputs,
//! 16 analog readings, plus a watchdog default-mask + timeout pair.

use protocol::{ChannelRole, PowerSource};

use crate::channel::ChannelState;
use crate::error::PeripheralError;

/// Number of 14-bit analog reading channels this family exposes (§4.9).
pub const ANALOG_READING_COUNT: usize = 16;

/// A digital expansion with `K` channels, generic over mechanical vs
/// solid-state output hardware (that distinction lives in `TypeTag`, not here
/// — this family only models the logical channel behaviour).
pub struct DigitalFamily<const K: usize> {
    channels: [ChannelState; K],
    /// Bitmask of commanded output levels, bit `n` is channel `n`.
    output_mask: u16,
    /// Bitmask of last-sampled input levels.
    input_mask: u16,
    /// Last-sampled 14-bit analog readings (§4.9).
    analog_readings: [u16; ANALOG_READING_COUNT],
    /// Output mask restored on watchdog expiry (§4.7).
    default_mask: u16,
    /// Watchdog timeout in milliseconds; `0xFFFF` means never expire.
    timeout_ms: u16,
}

impl<const K: usize> Default for DigitalFamily<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> DigitalFamily<K> {
    /// All channels undefined, matching the platform default (§4.4).
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: core::array::from_fn(|_| ChannelState::new()),
            output_mask: 0,
            input_mask: 0,
            analog_readings: [0; ANALOG_READING_COUNT],
            default_mask: 0,
            timeout_ms: protocol::constants::WATCHDOG_NEVER,
        }
    }

    /// `begin-digital-input`: assign a channel the digital-input role.
    pub fn begin_digital_input(
        &mut self,
        channel: u8,
        power_source: Option<PowerSource>,
    ) -> Result<(), PeripheralError> {
        let ch = self
            .channels
            .get_mut(usize::from(channel))
            .ok_or(PeripheralError::IndexOutOfRange)?;
        ch.set_role(ChannelRole::DigitalInput(power_source), 0);
        Ok(())
    }

    /// `set-digital-outputs`: commanded levels for every output channel at once.
    pub fn set_outputs(&mut self, mask: u16) -> Result<(), PeripheralError> {
        if mask >> K != 0 {
            return Err(PeripheralError::IndexOutOfRange);
        }
        self.output_mask = mask;
        Ok(())
    }

    /// Current commanded output mask.
    #[must_use]
    pub const fn outputs(&self) -> u16 {
        self.output_mask
    }

    /// Feed freshly sampled input levels (called by the board's GPIO-sampling
    /// task); `get-digital-inputs` reads this back.
    pub fn sample_inputs(&mut self, mask: u16) {
        self.input_mask = mask;
    }

    /// `get-digital-inputs`.
    #[must_use]
    pub const fn inputs(&self) -> u16 {
        self.input_mask
    }

    /// Role currently assigned to `channel`.
    pub fn role(&self, channel: u8) -> Result<ChannelRole, PeripheralError> {
        self.channels
            .get(usize::from(channel))
            .map(ChannelState::role)
            .ok_or(PeripheralError::IndexOutOfRange)
    }

    /// Feed a freshly sampled 14-bit analog reading (called by the board's
    /// ADC-sampling task); `get-analog-input`/`get-all-analog-inputs` read
    /// this back.
    pub fn sample_analog_reading(&mut self, channel: u8, value: u16) -> Result<(), PeripheralError> {
        let slot = self
            .analog_readings
            .get_mut(usize::from(channel))
            .ok_or(PeripheralError::IndexOutOfRange)?;
        *slot = value;
        Ok(())
    }

    /// `get-analog-input(channel)`.
    pub fn analog_reading(&self, channel: u8) -> Result<u16, PeripheralError> {
        self.analog_readings
            .get(usize::from(channel))
            .copied()
            .ok_or(PeripheralError::IndexOutOfRange)
    }

    /// `get-all-analog-inputs`.
    #[must_use]
    pub const fn all_analog_readings(&self) -> &[u16; ANALOG_READING_COUNT] {
        &self.analog_readings
    }

    /// `default-and-timeout`: watchdog safe-state output mask and the
    /// timeout after which it's applied (§4.7).
    pub fn set_default_and_timeout(&mut self, default_mask: u16, timeout_ms: u16) -> Result<(), PeripheralError> {
        if default_mask >> K != 0 {
            return Err(PeripheralError::IndexOutOfRange);
        }
        self.default_mask = default_mask;
        self.timeout_ms = timeout_ms;
        Ok(())
    }

    /// Configured watchdog safe-state output mask.
    #[must_use]
    pub const fn default_mask(&self) -> u16 {
        self.default_mask
    }

    /// Configured watchdog timeout in milliseconds.
    #[must_use]
    pub const fn timeout_ms(&self) -> u16 {
        self.timeout_ms
    }

    /// Apply the watchdog safe state: restore the commanded outputs to the
    /// configured default mask (§4.7).
    pub fn apply_watchdog_default(&mut self) {
        self.output_mask = self.default_mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_outputs_rejects_bits_beyond_channel_count() {
        let mut family: DigitalFamily<4> = DigitalFamily::new();
        assert_eq!(family.set_outputs(0b1_0000), Err(PeripheralError::IndexOutOfRange));
        assert!(family.set_outputs(0b1111).is_ok());
    }

    #[test]
    fn begin_digital_input_rejects_out_of_range_channel() {
        let mut family: DigitalFamily<4> = DigitalFamily::new();
        assert_eq!(
            family.begin_digital_input(9, None),
            Err(PeripheralError::IndexOutOfRange)
        );
    }

    #[test]
    fn sampled_inputs_round_trip() {
        let mut family: DigitalFamily<8> = DigitalFamily::new();
        family.sample_inputs(0b1010_1010);
        assert_eq!(family.inputs(), 0b1010_1010);
    }

    #[test]
    fn analog_reading_round_trips_per_channel() {
        let mut family: DigitalFamily<8> = DigitalFamily::new();
        family.sample_analog_reading(3, 0x1FFF).unwrap();
        assert_eq!(family.analog_reading(3), Ok(0x1FFF));
        assert_eq!(family.analog_reading(0), Ok(0));
    }

    #[test]
    fn analog_reading_rejects_out_of_range_channel() {
        let mut family: DigitalFamily<8> = DigitalFamily::new();
        assert_eq!(
            family.sample_analog_reading(16, 1),
            Err(PeripheralError::IndexOutOfRange)
        );
        assert_eq!(family.analog_reading(16), Err(PeripheralError::IndexOutOfRange));
    }

    #[test]
    fn all_analog_readings_exposes_every_channel() {
        let mut family: DigitalFamily<8> = DigitalFamily::new();
        family.sample_analog_reading(0, 10).unwrap();
        family.sample_analog_reading(15, 20).unwrap();
        let readings = family.all_analog_readings();
        assert_eq!(readings.len(), ANALOG_READING_COUNT);
        assert_eq!(readings[0], 10);
        assert_eq!(readings[15], 20);
    }

    #[test]
    fn default_and_timeout_round_trips_and_rejects_bits_beyond_channel_count() {
        let mut family: DigitalFamily<4> = DigitalFamily::new();
        assert_eq!(
            family.set_default_and_timeout(0b1_0000, 500),
            Err(PeripheralError::IndexOutOfRange)
        );
        family.set_default_and_timeout(0b1010, 500).unwrap();
        assert_eq!(family.default_mask(), 0b1010);
        assert_eq!(family.timeout_ms(), 500);
    }

    #[test]
    fn watchdog_default_restores_commanded_outputs() {
        let mut family: DigitalFamily<4> = DigitalFamily::new();
        family.set_outputs(0b1111).unwrap();
        family.set_default_and_timeout(0b0101, 200).unwrap();
        family.apply_watchdog_default();
        assert_eq!(family.outputs(), 0b0101);
    }
}
