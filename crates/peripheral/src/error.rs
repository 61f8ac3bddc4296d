//! Errors raised by the peripheral side of the bus.

use protocol::ParseError;

/// Everything that can go wrong handling an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralError {
    /// The request frame failed to parse.
    Protocol(ParseError),
    /// The opcode doesn't apply to this channel's current role (§4.4, §7).
    RoleMismatch,
    /// Channel or PWM index named in the request is out of range for this family.
    IndexOutOfRange,
    /// An "additional ADC overlay" was requested on a channel that is itself
    /// an ADC or RTD role (§4.4 "reject add-on-top-of-ADC-or-RTD").
    OverlayNotAllowed,
    /// A bounded collection (history buffer, response payload) would have exceeded capacity.
    CapacityExceeded,
}

impl core::fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::RoleMismatch => write!(f, "opcode does not apply to this channel's role"),
            Self::IndexOutOfRange => write!(f, "channel or pwm index out of range"),
            Self::OverlayNotAllowed => write!(f, "channel already has an adc or rtd role"),
            Self::CapacityExceeded => write!(f, "bounded collection exceeded its capacity"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PeripheralError {}

impl From<ParseError> for PeripheralError {
    fn from(e: ParseError) -> Self {
        Self::Protocol(e)
    }
}
