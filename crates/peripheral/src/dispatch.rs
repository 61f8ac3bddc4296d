//! Frame-level command dispatch (§4.4/§6): decode an incoming request frame
//! and execute it against this peripheral's address/session state, watchdog,
//! nameplate, and typed family state, producing the answer payload the bus
//! adapter stages for the next "request to respond" event.
//!
//! Each hardware build compiles in exactly one family (§4.9's families are
//! mutually exclusive per physical board), so dispatch is a plain function
//! per family rather than a runtime-dispatched trait object -- nothing here
//! ever needs to branch on which family it's talking to.

use heapless::Vec as HVec;
use protocol::constants::{MAX_PAYLOAD, NAMEPLATE_PRODUCTION_DATA, NAMEPLATE_TYPE_EXTRA};
use protocol::frame::Arg;
use protocol::{ChannelRole, Frame, FirmwareVersion, PowerSource, ProductString, RtdWiring, TypeTag};

use crate::error::PeripheralError;
use crate::family::analog::AnalogFamily;
use crate::family::digital::DigitalFamily;
use crate::family::display::DisplayFamily;
use crate::nameplate::{Nameplate, NvmStore};
use crate::state::PeripheralState;
use crate::watchdog::Watchdog;

/// An answer payload, sized for the largest frame body (§6).
pub type Answer = HVec<u8, MAX_PAYLOAD>;

fn power_source_from_byte(byte: u8) -> Option<PowerSource> {
    match byte {
        1 => Some(PowerSource::ExtPower),
        2 => Some(PowerSource::LoopPower),
        _ => None,
    }
}

fn power_source_byte(power: Option<PowerSource>) -> u8 {
    match power {
        None => 0,
        Some(PowerSource::ExtPower) => 1,
        Some(PowerSource::LoopPower) => 2,
    }
}

/// Handle the opcodes common to every family: address lifecycle, version,
/// product string, nameplate flash, and reboot (§4.4, §4.8, §6).
///
/// Returns `None` when `frame.arg` isn't one of these, so the caller falls
/// through to its family-specific handler.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_core<S: NvmStore>(
    frame: &Frame,
    state: PeripheralState,
    type_tag: TypeTag,
    version: FirmwareVersion,
    product: &ProductString,
    nameplate: &mut Nameplate<S>,
) -> Option<Result<(PeripheralState, Answer), PeripheralError>> {
    let mut answer = Answer::new();
    match frame.arg {
        Arg::ControllerReset => Some(Ok((state.begin_reset(), answer))),
        Arg::AssignAddress => {
            let Some(&addr) = frame.payload.first() else {
                return Some(Err(PeripheralError::Protocol(protocol::ParseError::WrongLen)));
            };
            Some(Ok((state.assign(addr), answer)))
        }
        Arg::GetAddressAndType => {
            let addr = state.address().unwrap_or(protocol::constants::DEFAULT_ADDRESS);
            let _ = answer.push(addr);
            let _ = answer.push(type_tag.to_wire());
            Some(Ok((state, answer)))
        }
        Arg::GetVersion => {
            let _ = answer.extend_from_slice(&version.to_wire());
            Some(Ok((state, answer)))
        }
        Arg::GetProductType => {
            let _ = answer.extend_from_slice(product.as_bytes());
            while answer.len() < 32 {
                let _ = answer.push(0);
            }
            Some(Ok((state, answer)))
        }
        Arg::Reboot => Some(Ok((state.begin_reboot(), answer))),
        Arg::ConfirmAddressRx => Some(Ok((state, answer))),
        Arg::WriteFlash => {
            if frame.payload.len() < 2 {
                return Some(Err(PeripheralError::Protocol(protocol::ParseError::WrongLen)));
            }
            let addr_bytes: [u8; 2] = match frame.payload.as_slice().get(..2)?.try_into() {
                Ok(b) => b,
                Err(_) => return Some(Err(PeripheralError::IndexOutOfRange)),
            };
            let addr = u16::from_le_bytes(addr_bytes);
            let data = frame.payload.as_slice().get(2..)?;
            Some(nameplate.write(addr, data).map(|()| (state, answer)))
        }
        Arg::ReadFlash => {
            let addr_bytes: [u8; 2] = match frame.payload.as_slice().get(..2)?.try_into() {
                Ok(b) => b,
                Err(_) => return Some(Err(PeripheralError::IndexOutOfRange)),
            };
            let addr = u16::from_le_bytes(addr_bytes);
            let len = match addr {
                NAMEPLATE_PRODUCTION_DATA => 32,
                NAMEPLATE_TYPE_EXTRA => 1,
                _ => return Some(Err(PeripheralError::IndexOutOfRange)),
            };
            Some(nameplate.read(addr, len).map(|bytes| {
                let mut out = Answer::new();
                let _ = out.extend_from_slice(&bytes);
                (state, out)
            }))
        }
        _ => None,
    }
}

/// Dispatch one request against a [`DigitalFamily`] build (§4.9).
pub fn dispatch_digital<const K: usize>(
    frame: &Frame,
    family: &mut DigitalFamily<K>,
    watchdog: &mut Watchdog,
) -> Result<Answer, PeripheralError> {
    let mut answer = Answer::new();
    match frame.arg {
        Arg::SetDigitalOutputs => {
            let mask = u16::from(*frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?);
            family.set_outputs(mask)?;
            watchdog.feed();
            Ok(answer)
        }
        Arg::GetDigitalInputs => {
            let _ = answer.extend_from_slice(&family.inputs().to_le_bytes());
            Ok(answer)
        }
        Arg::GetAnalogInput => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let value = family.analog_reading(ch)?;
            let _ = answer.extend_from_slice(&value.to_le_bytes());
            Ok(answer)
        }
        Arg::GetAllAnalogInputs => {
            for value in family.all_analog_readings() {
                let _ = answer.extend_from_slice(&value.to_le_bytes());
            }
            Ok(answer)
        }
        Arg::DefaultAndTimeout => {
            let mask = u16::from(*frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?);
            let timeout_bytes: [u8; 2] = frame
                .payload
                .as_slice()
                .get(1..3)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            family.set_default_and_timeout(mask, u16::from_le_bytes(timeout_bytes))?;
            watchdog.set_timeout(u16::from_le_bytes(timeout_bytes));
            Ok(answer)
        }
        Arg::BeginDi => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let power = frame.payload.get(1).copied().and_then(power_source_from_byte);
            family.begin_digital_input(ch, power)?;
            Ok(answer)
        }
        _ => Err(PeripheralError::RoleMismatch),
    }
}

/// Dispatch one request against an [`AnalogFamily`] build (§4.9, §4.10).
///
/// `BeginAdc` is overloaded on the wire: a 3-byte payload
/// `(channel, power, range_code)` assigns the ADC role, while a 2-byte
/// payload `(channel, window)` stacks a moving-average overlay on a channel
/// that already has one (the source's `add_average`, supplemented per §4.4).
pub fn dispatch_analog<const K: usize, const P: usize>(
    frame: &Frame,
    family: &mut AnalogFamily<K, P>,
    watchdog: &mut Watchdog,
) -> Result<Answer, PeripheralError> {
    let mut answer = Answer::new();
    match frame.arg {
        Arg::BeginHighImpedance => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            family.begin_high_impedance(ch)?;
            Ok(answer)
        }
        Arg::BeginAdc if frame.payload.len() == 2 => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let window = usize::from(*frame.payload.get(1).ok_or(PeripheralError::IndexOutOfRange)?);
            family.begin_adc_overlay(ch, window)?;
            Ok(answer)
        }
        Arg::BeginAdc => {
            let (ch, power, range_code) = channel_role_triple(frame)?;
            match power_source_from_byte(power) {
                Some(p) => family.begin_current_input(ch, p, range_code)?,
                None => family.begin_voltage_input(ch, range_code)?,
            }
            Ok(answer)
        }
        Arg::BeginDac => {
            let (ch, power, range_code) = channel_role_triple(frame)?;
            if power == 0 {
                family.begin_voltage_output(ch, range_code)?;
            } else {
                family.begin_current_output(ch, range_code)?;
            }
            Ok(answer)
        }
        Arg::BeginRtd => {
            let (ch, power, range_code) = channel_role_triple(frame)?;
            let wiring = if power == 0 { RtdWiring::TwoWire } else { RtdWiring::ThreeWire };
            family.begin_rtd(ch, wiring, range_code)?;
            Ok(answer)
        }
        Arg::BeginDi => {
            let (ch, power, _range_code) = channel_role_triple(frame)?;
            family.begin_digital_input(ch, power_source_from_byte(power))?;
            Ok(answer)
        }
        Arg::GetAdc => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            match family.role(ch)? {
                ChannelRole::VoltageInput | ChannelRole::CurrentInput(_) => {}
                _ => return Err(PeripheralError::RoleMismatch),
            }
            let _ = answer.extend_from_slice(&family.adc_sample(ch).unwrap_or(0).to_le_bytes());
            Ok(answer)
        }
        Arg::GetAllAdc => {
            for ch in 0..u8::try_from(K).unwrap_or(u8::MAX) {
                let value = match family.role(ch) {
                    Ok(ChannelRole::VoltageInput | ChannelRole::CurrentInput(_)) => family.adc_sample(ch).unwrap_or(0),
                    _ => 0,
                };
                let _ = answer.extend_from_slice(&value.to_le_bytes());
            }
            Ok(answer)
        }
        Arg::GetRtd => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let celsius = match family.role(ch)? {
                ChannelRole::ResistanceMeasurement(RtdWiring::TwoWire) => {
                    family.get_rtd_celsius_two_wire(ch, 0)?
                }
                ChannelRole::ResistanceMeasurement(RtdWiring::ThreeWire) => {
                    family.get_rtd_celsius_three_wire(ch, 0.0, 0.0, 1e-3)?
                }
                _ => return Err(PeripheralError::RoleMismatch),
            };
            let milli_celsius = (celsius * 1000.0) as i32;
            let _ = answer.extend_from_slice(&milli_celsius.to_le_bytes());
            Ok(answer)
        }
        Arg::GetDi => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            match family.role(ch)? {
                ChannelRole::DigitalInput(_) => {}
                _ => return Err(PeripheralError::RoleMismatch),
            }
            let _ = answer.push(0);
            Ok(answer)
        }
        Arg::SetDac => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let code_bytes: [u8; 2] = frame
                .payload
                .as_slice()
                .get(1..3)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            let apply = frame.payload.get(3).copied().unwrap_or(0) != 0;
            family.set_dac(ch, u16::from_le_bytes(code_bytes), apply)?;
            watchdog.feed();
            Ok(answer)
        }
        Arg::SetAllDac => {
            family.load_strobe();
            watchdog.feed();
            Ok(answer)
        }
        Arg::SetPwm => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let period_bytes: [u8; 4] = frame
                .payload
                .as_slice()
                .get(1..5)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            let pulse_bytes: [u8; 4] = frame
                .payload
                .as_slice()
                .get(5..9)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            let period_us = u32::from_le_bytes(period_bytes);
            let pulse_us = u32::from_le_bytes(pulse_bytes);
            let duty_permille = if period_us == 0 {
                0
            } else {
                u16::try_from(u64::from(pulse_us) * 1000 / u64::from(period_us)).unwrap_or(1000)
            };
            family.set_pwm(ch, period_us, duty_permille)?;
            watchdog.feed();
            Ok(answer)
        }
        Arg::SetLed => {
            let mask = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            family.set_led(mask);
            Ok(answer)
        }
        Arg::SetRtdUpdateTime => {
            let bytes: [u8; 2] = frame
                .payload
                .as_slice()
                .get(..2)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            family.set_rtd_update_time_ms(u16::from_le_bytes(bytes));
            Ok(answer)
        }
        Arg::SetDefaultDac => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let bytes: [u8; 2] = frame
                .payload
                .as_slice()
                .get(1..3)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            family.set_default_dac(ch, u16::from_le_bytes(bytes))?;
            Ok(answer)
        }
        Arg::SetDefaultPwm => {
            let ch = *frame.payload.first().ok_or(PeripheralError::IndexOutOfRange)?;
            let period_bytes: [u8; 4] = frame
                .payload
                .as_slice()
                .get(1..5)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            let pulse_bytes: [u8; 4] = frame
                .payload
                .as_slice()
                .get(5..9)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            let period_us = u32::from_le_bytes(period_bytes);
            let pulse_us = u32::from_le_bytes(pulse_bytes);
            let duty_permille = if period_us == 0 {
                0
            } else {
                u16::try_from(u64::from(pulse_us) * 1000 / u64::from(period_us)).unwrap_or(1000)
            };
            family.set_default_pwm(ch, period_us, duty_permille)?;
            Ok(answer)
        }
        Arg::SetTimeout => {
            let bytes: [u8; 2] = frame
                .payload
                .as_slice()
                .get(..2)
                .and_then(|b| b.try_into().ok())
                .ok_or(PeripheralError::IndexOutOfRange)?;
            watchdog.set_timeout(u16::from_le_bytes(bytes));
            Ok(answer)
        }
        _ => Err(PeripheralError::RoleMismatch),
    }
}

fn channel_role_triple(frame: &Frame) -> Result<(u8, u8, u8), PeripheralError> {
    let bytes = frame.payload.as_slice();
    let ch = *bytes.first().ok_or(PeripheralError::IndexOutOfRange)?;
    let power = *bytes.get(1).ok_or(PeripheralError::IndexOutOfRange)?;
    let range_code = *bytes.get(2).ok_or(PeripheralError::IndexOutOfRange)?;
    Ok((ch, power, range_code))
}

/// Dispatch one request against a [`DisplayFamily`] build: the button bank
/// is reported through the same `get-digital-inputs` opcode a digital family
/// uses, since this family only ever answers `get-*` reads (§4.9).
pub fn dispatch_display(frame: &Frame, family: &DisplayFamily) -> Result<Answer, PeripheralError> {
    let mut answer = Answer::new();
    match frame.arg {
        Arg::GetDigitalInputs => {
            let _ = answer.extend_from_slice(&family.state().to_le_bytes());
            Ok(answer)
        }
        _ => Err(PeripheralError::RoleMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::frame::{build, Cmd};

    fn req(arg: Arg, payload: &[u8]) -> Frame {
        let bytes = build(Cmd::SetRequest, arg, payload).unwrap();
        protocol::frame::parse(&bytes, Cmd::SetRequest, arg, payload.len()).unwrap()
    }

    #[test]
    fn set_digital_outputs_feeds_watchdog_and_updates_mask() {
        let mut family: DigitalFamily<8> = DigitalFamily::new();
        let mut wd = Watchdog::new();
        wd.set_timeout(100);
        wd.tick(99);
        let frame = req(Arg::SetDigitalOutputs, &[0b1010]);
        dispatch_digital(&frame, &mut family, &mut wd).unwrap();
        assert_eq!(family.outputs(), 0b1010);
        assert!(!wd.tick(99));
    }

    #[test]
    fn get_all_analog_inputs_reports_every_channel() {
        let mut family: DigitalFamily<8> = DigitalFamily::new();
        family.sample_analog_reading(0, 0x1234).unwrap();
        let mut wd = Watchdog::new();
        let frame = req(Arg::GetAllAnalogInputs, &[]);
        let answer = dispatch_digital(&frame, &mut family, &mut wd).unwrap();
        assert_eq!(answer.len(), 32);
        assert_eq!(u16::from_le_bytes([answer[0], answer[1]]), 0x1234);
    }

    #[test]
    fn begin_adc_assigns_voltage_role_by_default() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        let mut wd = Watchdog::new();
        let frame = req(Arg::BeginAdc, &[0, 0, 7]);
        dispatch_analog(&frame, &mut family, &mut wd).unwrap();
        assert_eq!(family.role(0), Ok(ChannelRole::VoltageInput));
    }

    #[test]
    fn begin_adc_two_byte_payload_stacks_overlay_instead() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        family.begin_voltage_input(0, 0).unwrap();
        let mut wd = Watchdog::new();
        let frame = req(Arg::BeginAdc, &[0, 4]);
        assert!(dispatch_analog(&frame, &mut family, &mut wd).is_ok());
    }

    #[test]
    fn set_pwm_converts_pulse_width_to_duty_permille() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        let mut wd = Watchdog::new();
        let mut payload = HVec::<u8, 9>::new();
        payload.extend_from_slice(&[0]).unwrap();
        payload.extend_from_slice(&1000u32.to_le_bytes()).unwrap();
        payload.extend_from_slice(&500u32.to_le_bytes()).unwrap();
        let frame = req(Arg::SetPwm, &payload);
        dispatch_analog(&frame, &mut family, &mut wd).unwrap();
        assert_eq!(family.pwm(0).unwrap().duty_permille, 500);
    }

    #[test]
    fn get_all_adc_reports_zero_for_non_adc_channels() {
        let mut family: AnalogFamily<4, 2> = AnalogFamily::new();
        let mut wd = Watchdog::new();
        let frame = req(Arg::BeginAdc, &[1, 0, 0]);
        dispatch_analog(&frame, &mut family, &mut wd).unwrap();
        family.feed_and_read_adc(1, 0x2222).unwrap();
        let frame = req(Arg::GetAllAdc, &[]);
        let answer = dispatch_analog(&frame, &mut family, &mut wd).unwrap();
        assert_eq!(answer.len(), 8);
        assert_eq!(u16::from_le_bytes([answer[0], answer[1]]), 0);
        assert_eq!(u16::from_le_bytes([answer[2], answer[3]]), 0x2222);
    }

    #[test]
    fn display_family_reports_pressed_mask_as_digital_inputs() {
        let mut family = DisplayFamily::new();
        family.sample(0b11);
        let frame = req(Arg::GetDigitalInputs, &[]);
        let answer = dispatch_display(&frame, &family).unwrap();
        assert_eq!(u16::from_le_bytes([answer[0], answer[1]]), 0b11);
    }
}
