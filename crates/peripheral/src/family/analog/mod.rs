//! Multi-function analog expansion family (§4.9): `K` analog channels
//! (voltage/current in, voltage/current out, RTD) plus `P` PWM channels.

pub mod rtd;

use protocol::{ChannelRole, PowerSource, RtdWiring};

use crate::channel::ChannelState;
use crate::error::PeripheralError;

/// One PWM output's current and safe-state-default configuration.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmChannel {
    /// Commanded period, microseconds. `0` stops the channel (Open Question #3).
    pub period_us: u32,
    /// Commanded duty cycle, parts per thousand of `period_us`.
    pub duty_permille: u16,
}

impl PwmChannel {
    /// Whether the channel is currently driven (a non-zero period).
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.period_us != 0
    }
}

/// An analog expansion with `K` analog channels and `P` PWM channels.
pub struct AnalogFamily<const K: usize, const P: usize> {
    channels: [ChannelState; K],
    dac_values: [u16; K],
    /// Codes written by `set-dac` but not yet committed by a load strobe.
    dac_staged: [Option<u16>; K],
    dac_defaults: [u16; K],
    /// Last overlaid ADC sample per channel, fed by `feed_and_read_adc`;
    /// distinct from `dac_values`, which is the output side (§4.4).
    adc_samples: [u16; K],
    pwm: [PwmChannel; P],
    pwm_defaults: [PwmChannel; P],
    rtd_update_time_ms: u16,
    /// 8-LED status bank (§4.9).
    led_mask: u8,
}

impl<const K: usize, const P: usize> Default for AnalogFamily<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize, const P: usize> AnalogFamily<K, P> {
    /// All channels undefined, all DACs/PWMs at zero, matching the platform
    /// default safe state (§4.4).
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: core::array::from_fn(|_| ChannelState::new()),
            dac_values: [0; K],
            dac_staged: [None; K],
            dac_defaults: [0; K],
            adc_samples: [0; K],
            pwm: [PwmChannel::default(); P],
            pwm_defaults: [PwmChannel::default(); P],
            rtd_update_time_ms: protocol::constants::DEFAULT_RTD_UPDATE_TIME_MS,
            led_mask: 0,
        }
    }

    fn channel_mut(&mut self, ch: u8) -> Result<&mut ChannelState, PeripheralError> {
        self.channels.get_mut(usize::from(ch)).ok_or(PeripheralError::IndexOutOfRange)
    }

    fn channel(&self, ch: u8) -> Result<&ChannelState, PeripheralError> {
        self.channels.get(usize::from(ch)).ok_or(PeripheralError::IndexOutOfRange)
    }

    /// `begin-channel-as-high-impedance`.
    pub fn begin_high_impedance(&mut self, ch: u8) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?.set_role(ChannelRole::HighImpedance, 0);
        Ok(())
    }

    /// `begin-channel-as-adc` (voltage input).
    pub fn begin_voltage_input(&mut self, ch: u8, range_code: u8) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?.set_role(ChannelRole::VoltageInput, range_code);
        Ok(())
    }

    /// `begin-channel-as-adc` (current input).
    pub fn begin_current_input(
        &mut self,
        ch: u8,
        power_source: PowerSource,
        range_code: u8,
    ) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?
            .set_role(ChannelRole::CurrentInput(power_source), range_code);
        Ok(())
    }

    /// `begin-channel-as-dac` (voltage output).
    pub fn begin_voltage_output(&mut self, ch: u8, range_code: u8) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?.set_role(ChannelRole::VoltageOutput, range_code);
        Ok(())
    }

    /// `begin-channel-as-dac` (current output).
    pub fn begin_current_output(&mut self, ch: u8, range_code: u8) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?.set_role(ChannelRole::CurrentOutput, range_code);
        Ok(())
    }

    /// `begin-channel-as-rtd`.
    pub fn begin_rtd(&mut self, ch: u8, wiring: RtdWiring, range_code: u8) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?
            .set_role(ChannelRole::ResistanceMeasurement(wiring), range_code);
        Ok(())
    }

    /// `begin-channel-as-di`: digital-input role, optionally loop-powered (§3, §4.9).
    pub fn begin_digital_input(
        &mut self,
        ch: u8,
        power_source: Option<PowerSource>,
    ) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?.set_role(ChannelRole::DigitalInput(power_source), 0);
        Ok(())
    }

    /// Attach a moving-average overlay to an ADC-capable channel (§4.4).
    pub fn begin_adc_overlay(&mut self, ch: u8, window: usize) -> Result<(), PeripheralError> {
        self.channel_mut(ch)?.begin_adc_overlay(window)
    }

    /// Feed one freshly sampled raw ADC reading (called by the board's
    /// conversion-complete task), latch the overlaid value for `get-adc`/
    /// `get-all-adc` to read back, and return it.
    pub fn feed_and_read_adc(&mut self, ch: u8, raw: u16) -> Result<u16, PeripheralError> {
        let channel = self.channel_mut(ch)?;
        channel.feed_overlay(raw);
        let value = channel.overlaid_or(raw);
        *self
            .adc_samples
            .get_mut(usize::from(ch))
            .ok_or(PeripheralError::IndexOutOfRange)? = value;
        Ok(value)
    }

    /// Last overlaid ADC sample latched for `channel` by
    /// [`AnalogFamily::feed_and_read_adc`]; `get-adc`/`get-all-adc` read this
    /// back rather than the DAC output register (§4.4).
    pub fn adc_sample(&self, ch: u8) -> Result<u16, PeripheralError> {
        self.adc_samples
            .get(usize::from(ch))
            .copied()
            .ok_or(PeripheralError::IndexOutOfRange)
    }

    /// `set-dac(channel, code, apply)`: stages `code` for `channel`, and if
    /// `apply` is set, atomically commits every channel with a staged
    /// value via [`AnalogFamily::load_strobe`] (§4.4).
    pub fn set_dac(&mut self, ch: u8, value: u16, apply: bool) -> Result<(), PeripheralError> {
        let role = self.channel(ch)?.role();
        if !matches!(role, ChannelRole::VoltageOutput | ChannelRole::CurrentOutput) {
            return Err(PeripheralError::RoleMismatch);
        }
        *self.dac_staged.get_mut(usize::from(ch)).ok_or(PeripheralError::IndexOutOfRange)? = Some(value);
        if apply {
            self.load_strobe();
        }
        Ok(())
    }

    /// `set-all-dac`: a pure load-strobe with no new codes — commits whatever
    /// is currently staged for every channel (§4.4).
    pub fn load_strobe(&mut self) {
        for (value, staged) in self.dac_values.iter_mut().zip(self.dac_staged.iter_mut()) {
            if let Some(code) = staged.take() {
                *value = code;
            }
        }
    }

    /// Current commanded (applied) DAC value.
    pub fn dac_value(&self, ch: u8) -> Result<u16, PeripheralError> {
        self.dac_values.get(usize::from(ch)).copied().ok_or(PeripheralError::IndexOutOfRange)
    }

    /// `set-default-dac`: the safe-state value applied on watchdog expiry (§4.7).
    pub fn set_default_dac(&mut self, ch: u8, value: u16) -> Result<(), PeripheralError> {
        *self.dac_defaults.get_mut(usize::from(ch)).ok_or(PeripheralError::IndexOutOfRange)? = value;
        Ok(())
    }

    /// `set-led`: replace the 8-LED status bank in one frame (§4.9).
    pub const fn set_led(&mut self, mask: u8) {
        self.led_mask = mask;
    }

    /// Current LED mask.
    #[must_use]
    pub const fn led(&self) -> u8 {
        self.led_mask
    }

    /// `set-pwm`. A `period_us` of `0` stops the channel (Open Question #3).
    pub fn set_pwm(&mut self, ch: u8, period_us: u32, duty_permille: u16) -> Result<(), PeripheralError> {
        let slot = self.pwm.get_mut(usize::from(ch)).ok_or(PeripheralError::IndexOutOfRange)?;
        slot.period_us = period_us;
        slot.duty_permille = duty_permille;
        Ok(())
    }

    /// Current PWM configuration.
    pub fn pwm(&self, ch: u8) -> Result<PwmChannel, PeripheralError> {
        self.pwm.get(usize::from(ch)).copied().ok_or(PeripheralError::IndexOutOfRange)
    }

    /// `set-default-pwm`.
    pub fn set_default_pwm(&mut self, ch: u8, period_us: u32, duty_permille: u16) -> Result<(), PeripheralError> {
        let slot = self.pwm_defaults.get_mut(usize::from(ch)).ok_or(PeripheralError::IndexOutOfRange)?;
        slot.period_us = period_us;
        slot.duty_permille = duty_permille;
        Ok(())
    }

    /// `set-rtd-update-time`.
    pub fn set_rtd_update_time_ms(&mut self, ms: u16) {
        self.rtd_update_time_ms = ms;
    }

    /// Current RTD update interval.
    #[must_use]
    pub const fn rtd_update_time_ms(&self) -> u16 {
        self.rtd_update_time_ms
    }

    /// `get-rtd` on a two-wire channel: resolve a raw ADC code straight into
    /// a temperature via the closed-form of §4.10.
    pub fn get_rtd_celsius_two_wire(&self, ch: u8, adc: u16) -> Result<f32, PeripheralError> {
        match self.channel(ch)?.role() {
            ChannelRole::ResistanceMeasurement(RtdWiring::TwoWire) => {
                Ok(rtd::ohms_to_celsius(rtd::two_wire_ohms(adc)))
            }
            _ => Err(PeripheralError::RoleMismatch),
        }
    }

    /// `get-rtd` on a three-wire channel: resolve the three-step excite/measure
    /// cycle's two voltage readings and excitation current into a temperature
    /// with the lead resistance cancelled (§4.10).
    pub fn get_rtd_celsius_three_wire(
        &self,
        ch: u8,
        v_rtd_plus_2rl: f32,
        v_rtd_plus_rl: f32,
        i_excite: f32,
    ) -> Result<f32, PeripheralError> {
        match self.channel(ch)?.role() {
            ChannelRole::ResistanceMeasurement(RtdWiring::ThreeWire) => Ok(rtd::ohms_to_celsius(
                rtd::three_wire_ohms(v_rtd_plus_2rl, v_rtd_plus_rl, i_excite),
            )),
            _ => Err(PeripheralError::RoleMismatch),
        }
    }

    /// Apply every channel's safe-state default, called by the watchdog
    /// engine on expiry (§4.7). Any DAC value staged but not yet
    /// load-strobed is discarded along with it.
    pub fn apply_safe_state(&mut self) {
        self.dac_values = self.dac_defaults;
        self.dac_staged = [None; K];
        self.pwm = self.pwm_defaults;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_dac_requires_output_role() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        assert_eq!(family.set_dac(0, 1000, true), Err(PeripheralError::RoleMismatch));
        family.begin_voltage_output(0, 0).unwrap();
        assert!(family.set_dac(0, 1000, true).is_ok());
    }

    #[test]
    fn unapplied_dac_code_is_staged_not_committed() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.begin_voltage_output(0, 0).unwrap();
        family.set_dac(0, 4096, false).unwrap();
        assert_eq!(family.dac_value(0).unwrap(), 0);
        family.load_strobe();
        assert_eq!(family.dac_value(0).unwrap(), 4096);
    }

    #[test]
    fn set_all_dac_load_strobe_commits_every_staged_channel_atomically() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.begin_voltage_output(0, 0).unwrap();
        family.begin_voltage_output(1, 0).unwrap();
        family.set_dac(0, 111, false).unwrap();
        family.set_dac(1, 222, false).unwrap();
        family.load_strobe();
        assert_eq!(family.dac_value(0).unwrap(), 111);
        assert_eq!(family.dac_value(1).unwrap(), 222);
    }

    #[test]
    fn zero_period_stops_pwm_channel() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.set_pwm(0, 1000, 500).unwrap();
        assert!(family.pwm(0).unwrap().is_running());
        family.set_pwm(0, 0, 500).unwrap();
        assert!(!family.pwm(0).unwrap().is_running());
    }

    #[test]
    fn watchdog_expiry_restores_defaults() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.begin_voltage_output(0, 0).unwrap();
        family.set_default_dac(0, 2048).unwrap();
        family.set_dac(0, 4095, true).unwrap();
        family.apply_safe_state();
        assert_eq!(family.dac_value(0).unwrap(), 2048);
    }

    #[test]
    fn rtd_requires_rtd_role() {
        let family: AnalogFamily<4, 2> = AnalogFamily::new();
        assert_eq!(
            family.get_rtd_celsius_two_wire(0, 1000),
            Err(PeripheralError::RoleMismatch)
        );
        assert_eq!(
            family.get_rtd_celsius_three_wire(0, 1.0, 0.5, 1e-3),
            Err(PeripheralError::RoleMismatch)
        );
    }

    #[test]
    fn led_mask_round_trips() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.set_led(0b0000_1111);
        assert_eq!(family.led(), 0b0000_1111);
    }

    #[test]
    fn adc_sample_is_independent_of_dac_value() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.begin_voltage_input(0, 0).unwrap();
        family.feed_and_read_adc(0, 3000).unwrap();
        assert_eq!(family.adc_sample(0).unwrap(), 3000);
        assert_eq!(family.dac_value(0).unwrap(), 0);
    }

    #[test]
    fn begin_digital_input_sets_role() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.begin_digital_input(0, Some(PowerSource::LoopPower)).unwrap();
        assert_eq!(
            family.channel(0).unwrap().role(),
            ChannelRole::DigitalInput(Some(PowerSource::LoopPower))
        );
    }
}
