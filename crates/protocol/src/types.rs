//! Wire-level value types shared by the controller and the peripheral.

/// Up to 32 bytes of UTF-8 product identity (§3).
pub type ProductString = heapless::String<32>;

/// A small helper for decoding a `u8`/`u16` "count on the wire" without
/// writing the same `try_into` dance at every call site.
pub trait WireCount: Sized {
    /// Decode from a little-endian byte pair.
    fn from_le_bytes2(bytes: [u8; 2]) -> Self;
    /// Encode to a little-endian byte pair.
    fn to_le_bytes2(self) -> [u8; 2];
}

impl WireCount for u16 {
    fn from_le_bytes2(bytes: [u8; 2]) -> Self {
        u16::from_le_bytes(bytes)
    }
    fn to_le_bytes2(self) -> [u8; 2] {
        self.to_le_bytes()
    }
}

/// Discriminated peripheral family, reported in `get-address-and-type`
/// responses and driving factory lookup on the controller (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TypeTag {
    /// Digital I/O expansion, generic (role undetermined from the wire byte alone).
    DigitalGeneric,
    /// Digital I/O expansion with mechanical-relay outputs.
    DigitalMechanical,
    /// Digital I/O expansion with solid-state outputs.
    DigitalSolidState,
    /// Multi-function analog expansion.
    Analog,
    /// A family this build doesn't know the name of yet; resolved later via
    /// `get-product-type` and factory lookup (§4.3 "After discovery").
    Custom(u32),
    /// Reported type byte didn't decode to anything meaningful.
    Invalid,
}

impl TypeTag {
    const WIRE_DIGITAL_GENERIC: u8 = 0x00;
    const WIRE_DIGITAL_MECHANICAL: u8 = 0x01;
    const WIRE_DIGITAL_SOLID_STATE: u8 = 0x02;
    const WIRE_ANALOG: u8 = 0x03;
    const WIRE_INVALID: u8 = 0xFF;

    /// Decode the single type byte carried by `get-address-and-type`.
    #[must_use]
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            Self::WIRE_DIGITAL_GENERIC => Self::DigitalGeneric,
            Self::WIRE_DIGITAL_MECHANICAL => Self::DigitalMechanical,
            Self::WIRE_DIGITAL_SOLID_STATE => Self::DigitalSolidState,
            Self::WIRE_ANALOG => Self::Analog,
            Self::WIRE_INVALID => Self::Invalid,
            other => Self::Custom(u32::from(other)),
        }
    }

    /// Encode back to the single type byte carried by `get-address-and-type`.
    ///
    /// `Custom` values above `0xFE` saturate to `Invalid` since the wire byte
    /// only has room for one octet; a peripheral whose real type code would
    /// collide with a reserved value must resolve via `get-product-type`
    /// instead of relying on this byte.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::DigitalGeneric => Self::WIRE_DIGITAL_GENERIC,
            Self::DigitalMechanical => Self::WIRE_DIGITAL_MECHANICAL,
            Self::DigitalSolidState => Self::WIRE_DIGITAL_SOLID_STATE,
            Self::Analog => Self::WIRE_ANALOG,
            Self::Invalid => Self::WIRE_INVALID,
            Self::Custom(code) => u8::try_from(code).unwrap_or(Self::WIRE_INVALID),
        }
    }

    /// Whether this tag needs a `get-product-type` round-trip to resolve to a
    /// concrete registered family (§4.3 "After discovery").
    #[must_use]
    pub const fn needs_product_lookup(self) -> bool {
        matches!(self, Self::Custom(_) | Self::Invalid)
    }
}

/// Three-byte firmware version (major, minor, release) (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Release/patch version.
    pub release: u8,
}

impl FirmwareVersion {
    /// Decode the three-byte `get-version` response payload.
    #[must_use]
    pub const fn from_wire(bytes: [u8; 3]) -> Self {
        Self {
            major: bytes[0],
            minor: bytes[1],
            release: bytes[2],
        }
    }

    /// Encode to the three-byte `get-version` response payload.
    #[must_use]
    pub const fn to_wire(self) -> [u8; 3] {
        [self.major, self.minor, self.release]
    }
}

/// Power-sourcing mode for current-input and loop-powered digital-input
/// channel roles (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSource {
    /// Channel is driven by an external power supply.
    ExtPower,
    /// Channel draws its excitation from the 4-20mA current loop itself.
    LoopPower,
}

/// RTD wiring scheme (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtdWiring {
    /// Single voltage reading, closed-form lead-resistance-free formula.
    TwoWire,
    /// Three-step excite/measure/measure cycle cancelling lead resistance.
    ThreeWire,
}

/// The role last assigned to an analog channel by a `begin-channel-as-*`
/// frame (§3). Determines which register writes a subsequent `set-*`/`get-*`
/// frame is valid against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelRole {
    /// Not driven or sensed; the platform-default safe state.
    HighImpedance,
    /// Voltage-sensing ADC input.
    VoltageInput,
    /// Current-sensing ADC input.
    CurrentInput(PowerSource),
    /// Voltage-output DAC channel.
    VoltageOutput,
    /// Current-output DAC channel.
    CurrentOutput,
    /// Resistance-temperature-detector measurement.
    ResistanceMeasurement(RtdWiring),
    /// Digital input, optionally loop-powered.
    DigitalInput(Option<PowerSource>),
    /// Role never assigned (peripheral just booted, or role was cleared).
    Undefined,
}

impl ChannelRole {
    /// Whether an "additional ADC overlay" can be stacked on top of this role
    /// (§4.4: rejected if the channel is already an ADC or RTD role).
    #[must_use]
    pub const fn accepts_adc_overlay(self) -> bool {
        !matches!(
            self,
            Self::VoltageInput | Self::CurrentInput(_) | Self::ResistanceMeasurement(_)
        )
    }
}
