//! Three-byte-header frame codec (C1).
#![allow(clippy::arithmetic_side_effects)] // header/length math over values already bounded by MAX_PAYLOAD
//!
//! ```text
//! byte 0: cmd       (0x01 set-req, 0x02 get-req, 0x03 get-resp, 0x04 set-resp)
//! byte 1: arg       (operation code)
//! byte 2: len       (payload length, 0..=45)
//! bytes 3..3+len:   payload
//! byte 3+len:       crc8 over bytes 0..3+len-1 (only when the `crc` feature is on)
//! ```
//!
//! The codec is stateless and side-effect-free: it never touches the bus,
//! never retries, and never knows about addresses. `crates::controller` and
//! `crates::peripheral` are the only callers.

use crate::constants::MAX_PAYLOAD;
use heapless::Vec;

/// CRC-8, polynomial `0x07`, initial value `0`, no input/output reflection.
#[must_use]
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Frame direction/kind (byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Cmd {
    /// Controller → peripheral, host is setting state.
    SetRequest = 0x01,
    /// Controller → peripheral, host is asking for state.
    GetRequest = 0x02,
    /// Peripheral → controller, answer to a `GetRequest`.
    GetResponse = 0x03,
    /// Peripheral → controller, answer (ack) to a `SetRequest`.
    SetResponse = 0x04,
}

impl Cmd {
    /// Decode a wire byte, rejecting anything outside the four known opcodes.
    pub fn from_wire(byte: u8) -> Result<Self, ParseError> {
        match byte {
            0x01 => Ok(Self::SetRequest),
            0x02 => Ok(Self::GetRequest),
            0x03 => Ok(Self::GetResponse),
            0x04 => Ok(Self::SetResponse),
            _ => Err(ParseError::UnknownCmd(byte)),
        }
    }

    /// The response `Cmd` a request of this kind expects.
    #[must_use]
    pub const fn response(self) -> Self {
        match self {
            Self::SetRequest => Self::SetResponse,
            Self::GetRequest => Self::GetResponse,
            Self::GetResponse | Self::SetResponse => self,
        }
    }
}

/// Operation code (byte 1). Core codes plus the digital- and analog-family
/// argument space of §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)] // one-for-one with the wire table in spec §6
pub enum Arg {
    ControllerReset = 0x01,
    AssignAddress = 0x02,
    GetAddressAndType = 0x03,
    GetDigitalInputs = 0x04,
    GetAnalogInput = 0x05,
    SetDigitalOutputs = 0x06,
    GetAllAnalogInputs = 0x07,
    DefaultAndTimeout = 0x08,
    BeginAdc = 0x09,
    GetAdc = 0x0A,
    GetAllAdc = 0x0B,
    BeginDac = 0x0C,
    SetDac = 0x0D,
    BeginRtd = 0x0E,
    GetRtd = 0x0F,
    SetRtdUpdateTime = 0x10,
    BeginDi = 0x11,
    GetDi = 0x12,
    SetPwm = 0x13,
    SetLed = 0x15,
    GetVersion = 0x16,
    WriteFlash = 0x17,
    ReadFlash = 0x18,
    SetDefaultDac = 0x20,
    SetDefaultPwm = 0x21,
    SetAllDac = 0x22,
    SetTimeout = 0x23,
    BeginHighImpedance = 0x24,
    GetProductType = 0x25,
    ConfirmAddressRx = 0x26,
    Reboot = 0xF3,
}

impl Arg {
    /// Decode a wire byte, rejecting anything outside the known argument space.
    pub fn from_wire(byte: u8) -> Result<Self, ParseError> {
        Ok(match byte {
            0x01 => Self::ControllerReset,
            0x02 => Self::AssignAddress,
            0x03 => Self::GetAddressAndType,
            0x04 => Self::GetDigitalInputs,
            0x05 => Self::GetAnalogInput,
            0x06 => Self::SetDigitalOutputs,
            0x07 => Self::GetAllAnalogInputs,
            0x08 => Self::DefaultAndTimeout,
            0x09 => Self::BeginAdc,
            0x0A => Self::GetAdc,
            0x0B => Self::GetAllAdc,
            0x0C => Self::BeginDac,
            0x0D => Self::SetDac,
            0x0E => Self::BeginRtd,
            0x0F => Self::GetRtd,
            0x10 => Self::SetRtdUpdateTime,
            0x11 => Self::BeginDi,
            0x12 => Self::GetDi,
            0x13 => Self::SetPwm,
            0x15 => Self::SetLed,
            0x16 => Self::GetVersion,
            0x17 => Self::WriteFlash,
            0x18 => Self::ReadFlash,
            0x20 => Self::SetDefaultDac,
            0x21 => Self::SetDefaultPwm,
            0x22 => Self::SetAllDac,
            0x23 => Self::SetTimeout,
            0x24 => Self::BeginHighImpedance,
            0x25 => Self::GetProductType,
            0x26 => Self::ConfirmAddressRx,
            0xF3 => Self::Reboot,
            other => return Err(ParseError::UnknownArg(other)),
        })
    }
}

/// A decoded frame: direction, operation, and payload bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame direction/kind.
    pub cmd: Cmd,
    /// Operation code.
    pub arg: Arg,
    /// Payload bytes (0..=45).
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

/// Why a byte buffer failed to parse as a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Buffer shorter than the three-byte header (plus CRC byte, if enabled).
    Truncated,
    /// `cmd` byte didn't match the caller's expectation.
    WrongCmd,
    /// `cmd` byte wasn't one of the four known opcodes.
    UnknownCmd(u8),
    /// `arg` byte didn't match the caller's expectation.
    WrongArg,
    /// `arg` byte wasn't in the known argument space.
    UnknownArg(u8),
    /// Declared `len` didn't match the caller's expectation for this `(cmd, arg)`.
    WrongLen,
    /// Declared `len` exceeds [`MAX_PAYLOAD`].
    LenTooLarge,
    /// CRC-8 trailer didn't match the computed checksum.
    CrcFail,
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame shorter than its header"),
            Self::WrongCmd => write!(f, "unexpected cmd byte"),
            Self::UnknownCmd(b) => write!(f, "unknown cmd byte {b:#04x}"),
            Self::WrongArg => write!(f, "unexpected arg byte"),
            Self::UnknownArg(b) => write!(f, "unknown arg byte {b:#04x}"),
            Self::WrongLen => write!(f, "declared len did not match the (cmd, arg) contract"),
            Self::LenTooLarge => write!(f, "declared len exceeds the maximum payload size"),
            Self::CrcFail => write!(f, "CRC-8 mismatch"),
        }
    }
}

/// Build a `SetRequest` frame ready for the wire.
///
/// # Errors
/// Returns [`ParseError::LenTooLarge`] if `payload` exceeds [`MAX_PAYLOAD`].
pub fn build_set(arg: Arg, payload: &[u8]) -> Result<Vec<u8, { MAX_PAYLOAD + 4 }>, ParseError> {
    build(Cmd::SetRequest, arg, payload)
}

/// Build a `GetRequest` frame ready for the wire.
///
/// # Errors
/// Returns [`ParseError::LenTooLarge`] if `payload` exceeds [`MAX_PAYLOAD`].
pub fn build_get(arg: Arg, payload: &[u8]) -> Result<Vec<u8, { MAX_PAYLOAD + 4 }>, ParseError> {
    build(Cmd::GetRequest, arg, payload)
}

/// Build an arbitrary frame (used by the peripheral side to answer requests).
///
/// # Errors
/// Returns [`ParseError::LenTooLarge`] if `payload` exceeds [`MAX_PAYLOAD`].
pub fn build(
    cmd: Cmd,
    arg: Arg,
    payload: &[u8],
) -> Result<Vec<u8, { MAX_PAYLOAD + 4 }>, ParseError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ParseError::LenTooLarge);
    }
    let mut bytes: Vec<u8, { MAX_PAYLOAD + 4 }> = Vec::new();
    let _ = bytes.push(cmd as u8);
    let _ = bytes.push(arg as u8);
    let _ = bytes.push(payload.len() as u8);
    let _ = bytes.extend_from_slice(payload);
    if cfg!(feature = "crc") {
        let crc = crc8(&bytes);
        let _ = bytes.push(crc);
    }
    Ok(bytes)
}

/// Parse a received buffer, checking it against the caller's expected
/// `cmd`/`arg`/`len` contract for the `(cmd, arg)` pair, and (when the `crc`
/// feature is enabled) the trailing CRC-8.
///
/// # Errors
/// See [`ParseError`] for the individual rejection reasons.
pub fn parse(
    bytes: &[u8],
    expected_cmd: Cmd,
    expected_arg: Arg,
    expected_len: usize,
) -> Result<Frame, ParseError> {
    let header_len = 3 + if cfg!(feature = "crc") { 1 } else { 0 };
    if bytes.len() < header_len {
        return Err(ParseError::Truncated);
    }
    let cmd_byte = *bytes.first().ok_or(ParseError::Truncated)?;
    let arg_byte = *bytes.get(1).ok_or(ParseError::Truncated)?;
    let len_byte = *bytes.get(2).ok_or(ParseError::Truncated)?;

    let cmd = Cmd::from_wire(cmd_byte)?;
    if cmd != expected_cmd {
        return Err(ParseError::WrongCmd);
    }
    let arg = Arg::from_wire(arg_byte)?;
    if arg != expected_arg {
        return Err(ParseError::WrongArg);
    }
    let len = len_byte as usize;
    if len > MAX_PAYLOAD {
        return Err(ParseError::LenTooLarge);
    }
    if len != expected_len {
        return Err(ParseError::WrongLen);
    }
    let body_end = 3 + len;
    if bytes.len() < body_end + if cfg!(feature = "crc") { 1 } else { 0 } {
        return Err(ParseError::Truncated);
    }
    let body = bytes.get(..body_end).ok_or(ParseError::Truncated)?;
    if cfg!(feature = "crc") {
        let computed = crc8(body);
        let received = *bytes.get(body_end).ok_or(ParseError::Truncated)?;
        if computed != received {
            return Err(ParseError::CrcFail);
        }
    }
    let payload_bytes = bytes.get(3..body_end).ok_or(ParseError::Truncated)?;
    let mut payload = Vec::new();
    let _ = payload.extend_from_slice(payload_bytes);
    Ok(Frame { cmd, arg, payload })
}

/// Given the nominal answer payload length, return the number of bytes the
/// bus must solicit from the peripheral (adds 1 for the CRC trailer when the
/// `crc` feature is enabled). Callers use this to size the response request
/// passed to [`crate`]`::controller`'s `transact`.
#[must_use]
pub const fn answer_len(nominal_payload_len: usize) -> usize {
    3 + nominal_payload_len + if cfg!(feature = "crc") { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_without_crc() {
        let payload = [0x0B, 0x03];
        let bytes = build(Cmd::GetResponse, Arg::GetAddressAndType, &payload).unwrap();
        let frame = parse(
            &bytes,
            Cmd::GetResponse,
            Arg::GetAddressAndType,
            payload.len(),
        )
        .unwrap();
        assert_eq!(frame.cmd, Cmd::GetResponse);
        assert_eq!(frame.arg, Arg::GetAddressAndType);
        assert_eq!(&frame.payload[..], &payload[..]);
    }

    #[test]
    fn wrong_cmd_is_rejected() {
        let bytes = build(Cmd::SetResponse, Arg::AssignAddress, &[]).unwrap();
        let err = parse(&bytes, Cmd::GetResponse, Arg::AssignAddress, 0).unwrap_err();
        assert_eq!(err, ParseError::WrongCmd);
    }

    #[test]
    fn wrong_arg_is_rejected() {
        let bytes = build(Cmd::GetRequest, Arg::GetVersion, &[]).unwrap();
        let err = parse(&bytes, Cmd::GetRequest, Arg::GetAdc, 0).unwrap_err();
        assert_eq!(err, ParseError::WrongArg);
    }

    #[test]
    fn wrong_len_is_rejected() {
        let bytes = build(Cmd::GetResponse, Arg::GetVersion, &[1, 2, 3]).unwrap();
        let err = parse(&bytes, Cmd::GetResponse, Arg::GetVersion, 2).unwrap_err();
        assert_eq!(err, ParseError::WrongLen);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let err = parse(&[0x03, 0x16], Cmd::GetResponse, Arg::GetVersion, 3).unwrap_err();
        assert_eq!(err, ParseError::Truncated);
    }

    #[test]
    fn unknown_cmd_byte_is_rejected() {
        let err = parse(&[0x09, 0x16, 0x00], Cmd::GetResponse, Arg::GetVersion, 0).unwrap_err();
        assert_eq!(err, ParseError::UnknownCmd(0x09));
    }

    #[test]
    fn answer_len_matches_header_plus_payload() {
        assert_eq!(answer_len(2), 5);
    }
}

#[cfg(all(test, feature = "crc"))]
mod crc_tests {
    use super::*;

    #[test]
    #[allow(clippy::indexing_slicing)] // exhaustive bit-flip fuzz over a small known-size buffer
    fn single_bit_flip_is_detected() {
        let bytes = build(Cmd::SetRequest, Arg::SetDigitalOutputs, &[0xA5]).unwrap();
        for bit in 0..(bytes.len() * 8) {
            let mut corrupt = bytes.clone();
            corrupt[bit / 8] ^= 1 << (bit % 8);
            let result = parse(&corrupt, Cmd::SetRequest, Arg::SetDigitalOutputs, 1);
            assert!(result.is_err(), "bit {bit} flip went undetected");
        }
    }

    #[test]
    fn crc8_known_vector() {
        // Poly 0x07, init 0, no reflection, computed over a SetRequest header
        // with arg=0x02 (assign-address) and an empty payload.
        assert_eq!(crc8(&[0x01, 0x02, 0x00]), 0x41);
    }
}
