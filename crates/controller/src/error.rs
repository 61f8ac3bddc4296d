//! Errors raised by the controller side of the bus.

use protocol::ParseError;

/// Everything that can go wrong talking to the expansion chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerError {
    /// The underlying I2C transaction failed (NACK, arbitration loss, bus error).
    Bus,
    /// A response frame failed to parse or didn't match what was requested.
    Protocol(ParseError),
    /// A peripheral answered with the two-byte NACK sentinel (§4.2).
    PeripheralNack,
    /// Discovery could not bring a candidate peripheral up within its retry budget (§4.3).
    DiscoveryFailed,
    /// More peripherals answered the default address than the chain supports.
    TooManyExpansions,
    /// Requested an operation against an index with no expansion discovered there.
    NoSuchExpansion,
    /// The request doesn't apply to the peripheral family at that slot (wrong typed family, wrong channel count).
    ProtocolViolation,
    /// A bounded collection (payload, shadow, registry) would have exceeded its capacity.
    CapacityExceeded,
}

impl core::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus => write!(f, "i2c transaction failed"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::PeripheralNack => write!(f, "peripheral returned nack"),
            Self::DiscoveryFailed => write!(f, "discovery failed to bring up candidate"),
            Self::TooManyExpansions => write!(f, "more peripherals answered than the chain supports"),
            Self::NoSuchExpansion => write!(f, "no expansion discovered at that index"),
            Self::ProtocolViolation => write!(f, "request does not apply to this peripheral"),
            Self::CapacityExceeded => write!(f, "bounded collection exceeded its capacity"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ControllerError {}

impl From<ParseError> for ControllerError {
    fn from(e: ParseError) -> Self {
        Self::Protocol(e)
    }
}
