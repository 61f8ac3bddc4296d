//! Typed host-visible operations (C7, §4.5/§6), built on top of
//! [`Dispatcher::set`]/[`Dispatcher::get`]. Each function here is exactly the
//! skeleton §4.5 describes: build a frame from typed inputs, `transact`,
//! parse, update the shadow, return a typed result.
//!
//! Wire payload layouts for the family-specific opcodes aren't spelled out
//! byte-for-byte in §6 beyond the core codes; the encodings below are this
//! crate's concrete choice, recorded in `DESIGN.md`.

use core::str::FromStr as _;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use protocol::frame::Arg;
use protocol::{ChannelRole, PowerSource, ProductString, RtdWiring, ShadowKey};

use crate::dispatcher::Dispatcher;
use crate::error::ControllerError;

fn power_source_byte(power: Option<PowerSource>) -> u8 {
    match power {
        None => 0,
        Some(PowerSource::ExtPower) => 1,
        Some(PowerSource::LoopPower) => 2,
    }
}

impl<I2C, DETECT, DELAY> Dispatcher<I2C, DETECT, DELAY>
where
    I2C: I2c,
    DETECT: OutputPin,
    DELAY: DelayNs + Clone,
{
    // -- Digital family (§4.9) ------------------------------------------

    /// `set-digital-outputs`: live output mask, not shadowed (it is not
    /// "configuration" the peripheral needs replayed, just a current value;
    /// the default applied on reset/watchdog-expiry is `default-and-timeout`).
    pub async fn set_digital_outputs(&mut self, index: usize, mask: u8) -> Result<(), ControllerError> {
        self.set_unshadowed(index, Arg::SetDigitalOutputs, &[mask]).await
    }

    /// `get-digital-inputs`.
    pub async fn get_digital_inputs(&mut self, index: usize) -> Result<u16, ControllerError> {
        let frame = self.get(index, Arg::GetDigitalInputs, &[], 2).await?;
        let bytes: [u8; 2] = frame.payload.as_slice().try_into().map_err(|_| ControllerError::ProtocolViolation)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// `get-analog-input`: one 14-bit reading from the digital family's bank
    /// of analog inputs.
    pub async fn get_analog_input(&mut self, index: usize, channel: u8) -> Result<u16, ControllerError> {
        let frame = self.get(index, Arg::GetAnalogInput, &[channel], 2).await?;
        let bytes: [u8; 2] = frame.payload.as_slice().try_into().map_err(|_| ControllerError::ProtocolViolation)?;
        Ok(u16::from_le_bytes(bytes) & 0x3FFF)
    }

    /// `get-all-analog-inputs`: all 16 readings in one frame.
    pub async fn get_all_analog_inputs(&mut self, index: usize) -> Result<heapless::Vec<u16, 16>, ControllerError> {
        let frame = self.get(index, Arg::GetAllAnalogInputs, &[], 32).await?;
        let mut out = heapless::Vec::new();
        for chunk in frame.payload.chunks(2) {
            let bytes: [u8; 2] = chunk.try_into().map_err(|_| ControllerError::ProtocolViolation)?;
            out.push(u16::from_le_bytes(bytes) & 0x3FFF)
                .map_err(|_| ControllerError::CapacityExceeded)?;
        }
        Ok(out)
    }

    /// `default-and-timeout`: the digital family's safe-state pair — default
    /// output mask plus watchdog timeout — shadowed under [`ShadowKey::Timeout`]
    /// since it is a single combined safe-state record, not per-channel (§4.9).
    pub async fn set_default_and_timeout(
        &mut self,
        index: usize,
        default_mask: u8,
        timeout_ms: u16,
    ) -> Result<(), ControllerError> {
        let mut payload = heapless::Vec::<u8, 3>::new();
        let _ = payload.push(default_mask);
        let _ = payload.extend_from_slice(&timeout_ms.to_le_bytes());
        self.set(index, Arg::DefaultAndTimeout, &payload, ShadowKey::Timeout).await
    }

    // -- Analog family channel roles (§4.9, §3) --------------------------

    fn channel_role_payload(channel: u8, role: ChannelRole, range_code: u8) -> heapless::Vec<u8, 4> {
        let mut payload = heapless::Vec::new();
        let _ = payload.push(channel);
        let power = match role {
            ChannelRole::CurrentInput(p) => power_source_byte(Some(p)),
            ChannelRole::DigitalInput(p) => power_source_byte(p),
            _ => 0,
        };
        let _ = payload.push(power);
        let _ = payload.push(range_code);
        payload
    }

    /// `begin-channel-as-high-impedance`.
    pub async fn begin_high_impedance(&mut self, index: usize, channel: u8) -> Result<(), ControllerError> {
        let payload = Self::channel_role_payload(channel, ChannelRole::HighImpedance, 0);
        self.set(index, Arg::BeginHighImpedance, &payload, ShadowKey::Channel(channel)).await
    }

    /// `begin-channel-as-voltage-adc` / `begin-channel-as-current-adc` (§4.9).
    pub async fn begin_adc(
        &mut self,
        index: usize,
        channel: u8,
        role: ChannelRole,
        range_code: u8,
    ) -> Result<(), ControllerError> {
        let payload = Self::channel_role_payload(channel, role, range_code);
        self.set(index, Arg::BeginAdc, &payload, ShadowKey::Channel(channel)).await
    }

    /// `begin-channel-as-voltage-dac` / `begin-channel-as-current-dac` (§4.9).
    pub async fn begin_dac(
        &mut self,
        index: usize,
        channel: u8,
        role: ChannelRole,
        range_code: u8,
    ) -> Result<(), ControllerError> {
        let payload = Self::channel_role_payload(channel, role, range_code);
        self.set(index, Arg::BeginDac, &payload, ShadowKey::Channel(channel)).await
    }

    /// `begin-channel-as-rtd`.
    pub async fn begin_rtd(
        &mut self,
        index: usize,
        channel: u8,
        wiring: RtdWiring,
        range_code: u8,
    ) -> Result<(), ControllerError> {
        let role = ChannelRole::ResistanceMeasurement(wiring);
        let payload = Self::channel_role_payload(channel, role, range_code);
        self.set(index, Arg::BeginRtd, &payload, ShadowKey::Channel(channel)).await
    }

    /// `begin-channel-as-di`, optionally loop-powered.
    pub async fn begin_digital_input(
        &mut self,
        index: usize,
        channel: u8,
        power: Option<PowerSource>,
    ) -> Result<(), ControllerError> {
        let payload = Self::channel_role_payload(channel, ChannelRole::DigitalInput(power), 0);
        self.set(index, Arg::BeginDi, &payload, ShadowKey::Channel(channel)).await
    }

    /// "add ADC on top of an existing role": stacks a moving-average overlay
    /// (§4.4). Rejected on the peripheral side if the channel is already an
    /// ADC or RTD role; the shadow entry lives under [`ShadowKey::AddAdc`]
    /// and is cleared whenever the channel's primary role changes.
    pub async fn add_adc_overlay(&mut self, index: usize, channel: u8, window: u8) -> Result<(), ControllerError> {
        self.set(index, Arg::BeginAdc, &[channel, window], ShadowKey::AddAdc(channel)).await
    }

    // -- Reads (§4.4 "Read-side commands") -------------------------------

    /// `get-adc(channel)`.
    pub async fn get_adc(&mut self, index: usize, channel: u8) -> Result<u16, ControllerError> {
        let frame = self.get(index, Arg::GetAdc, &[channel], 2).await?;
        let bytes: [u8; 2] = frame.payload.as_slice().try_into().map_err(|_| ControllerError::ProtocolViolation)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// `get-all-adc`.
    pub async fn get_all_adc(&mut self, index: usize, channel_count: usize) -> Result<heapless::Vec<u16, 8>, ControllerError> {
        let frame = self.get(index, Arg::GetAllAdc, &[], channel_count * 2).await?;
        let mut out = heapless::Vec::new();
        for chunk in frame.payload.chunks(2) {
            let bytes: [u8; 2] = chunk.try_into().map_err(|_| ControllerError::ProtocolViolation)?;
            out.push(u16::from_le_bytes(bytes)).map_err(|_| ControllerError::CapacityExceeded)?;
        }
        Ok(out)
    }

    /// `get-rtd(channel)`: the peripheral resolves wiring-mode-specific
    /// sampling internally and answers a 32-bit fixed-point Celsius value
    /// (milli-degrees) either way.
    pub async fn get_rtd(&mut self, index: usize, channel: u8) -> Result<i32, ControllerError> {
        let frame = self.get(index, Arg::GetRtd, &[channel], 4).await?;
        let bytes: [u8; 4] = frame.payload.as_slice().try_into().map_err(|_| ControllerError::ProtocolViolation)?;
        Ok(i32::from_le_bytes(bytes))
    }

    /// `get-di(channel)`.
    pub async fn get_di(&mut self, index: usize, channel: u8) -> Result<bool, ControllerError> {
        let frame = self.get(index, Arg::GetDi, &[channel], 1).await?;
        Ok(frame.payload.first().copied().unwrap_or(0) != 0)
    }

    // -- Writes (§4.4 "Output-side commands") ----------------------------

    /// `set-dac(channel, code, apply)`.
    pub async fn set_dac(&mut self, index: usize, channel: u8, code: u16, apply: bool) -> Result<(), ControllerError> {
        let mut payload = heapless::Vec::<u8, 4>::new();
        let _ = payload.push(channel);
        let _ = payload.extend_from_slice(&code.to_le_bytes());
        let _ = payload.push(u8::from(apply));
        self.set(index, Arg::SetDac, &payload, ShadowKey::DacValue(channel)).await
    }

    /// `set-all-dac`: a pure load strobe, no new codes.
    pub async fn set_all_dac(&mut self, index: usize) -> Result<(), ControllerError> {
        self.set_unshadowed(index, Arg::SetAllDac, &[]).await
    }

    /// `set-pwm(channel, period_us, pulse_us)`. Rejects `pulse_us >= period_us`
    /// unless `period_us == 0` (which stops the channel, Open Question #3).
    pub async fn set_pwm(
        &mut self,
        index: usize,
        channel: u8,
        period_us: u32,
        pulse_us: u32,
    ) -> Result<(), ControllerError> {
        if period_us != 0 && pulse_us >= period_us {
            return Err(ControllerError::ProtocolViolation);
        }
        let mut payload = heapless::Vec::<u8, 9>::new();
        let _ = payload.push(channel);
        let _ = payload.extend_from_slice(&period_us.to_le_bytes());
        let _ = payload.extend_from_slice(&pulse_us.to_le_bytes());
        self.set(index, Arg::SetPwm, &payload, ShadowKey::Pwm(channel)).await
    }

    /// `set-led`: replace the 8-LED status bank in one frame.
    pub async fn set_led(&mut self, index: usize, mask: u8) -> Result<(), ControllerError> {
        self.set(index, Arg::SetLed, &[mask], ShadowKey::Led).await
    }

    /// `set-rtd-update-time`.
    pub async fn set_rtd_update_time(&mut self, index: usize, ms: u16) -> Result<(), ControllerError> {
        self.set(index, Arg::SetRtdUpdateTime, &ms.to_le_bytes(), ShadowKey::RtdUpdateTime).await
    }

    /// `set-default-dac`: the watchdog safe-state value for a DAC channel.
    pub async fn set_default_dac(&mut self, index: usize, channel: u8, code: u16) -> Result<(), ControllerError> {
        let mut payload = heapless::Vec::<u8, 3>::new();
        let _ = payload.push(channel);
        let _ = payload.extend_from_slice(&code.to_le_bytes());
        self.set(index, Arg::SetDefaultDac, &payload, ShadowKey::DacDefault(channel)).await
    }

    /// `set-default-pwm`: the watchdog safe-state value for a PWM channel.
    pub async fn set_default_pwm(
        &mut self,
        index: usize,
        channel: u8,
        period_us: u32,
        pulse_us: u32,
    ) -> Result<(), ControllerError> {
        let mut payload = heapless::Vec::<u8, 9>::new();
        let _ = payload.push(channel);
        let _ = payload.extend_from_slice(&period_us.to_le_bytes());
        let _ = payload.extend_from_slice(&pulse_us.to_le_bytes());
        self.set(index, Arg::SetDefaultPwm, &payload, ShadowKey::PwmDefault(channel)).await
    }

    /// `set-timeout`: the watchdog expiry timeout, independent of any default value.
    pub async fn set_timeout(&mut self, index: usize, timeout_ms: u16) -> Result<(), ControllerError> {
        self.set(index, Arg::SetTimeout, &timeout_ms.to_le_bytes(), ShadowKey::Timeout).await
    }

    // -- Nameplate (C9, §4.8/§6) ------------------------------------------

    /// `write-flash(addr, bytes)`. `bytes.len() <= 32` (§6).
    pub async fn write_flash(&mut self, index: usize, addr: u16, bytes: &[u8]) -> Result<(), ControllerError> {
        if bytes.len() > 32 {
            return Err(ControllerError::ProtocolViolation);
        }
        let mut payload = heapless::Vec::<u8, 34>::new();
        let _ = payload.extend_from_slice(&addr.to_le_bytes());
        let _ = payload.extend_from_slice(bytes);
        self.set_unshadowed(index, Arg::WriteFlash, &payload).await
    }

    /// `read-flash(addr, len) -> bytes`. `len <= 32` (§6).
    pub async fn read_flash(&mut self, index: usize, addr: u16, len: usize) -> Result<heapless::Vec<u8, 32>, ControllerError> {
        if len > 32 {
            return Err(ControllerError::ProtocolViolation);
        }
        let frame = self.get(index, Arg::ReadFlash, &addr.to_le_bytes(), len).await?;
        heapless::Vec::from_slice(frame.payload.as_slice()).map_err(|_| ControllerError::CapacityExceeded)
    }

    // -- Post-discovery reconciliation (§4.3 "After discovery") ----------

    /// `get-product-type`: resolves a `Custom`/`Invalid` type tag to its
    /// product string, for factory lookup against a registered `ExpansionFactory`.
    pub async fn get_product_type(&mut self, index: usize) -> Result<ProductString, ControllerError> {
        let frame = self.get(index, Arg::GetProductType, &[], 32).await?;
        let text = core::str::from_utf8(frame.payload.as_slice())
            .map_err(|_| ControllerError::ProtocolViolation)?
            .trim_end_matches('\0');
        text.parse::<ProductString>().map_err(|()| ControllerError::CapacityExceeded)
    }

}
