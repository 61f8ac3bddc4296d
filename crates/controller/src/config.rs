//! Named constants for the controller task set.
//!
//! Bus addressing and wire-timing constants that are shared with the
//! peripheral live in `protocol::constants`; this module only holds values
//! that are specific to how the controller schedules its own work.

/// I2C bus clock used to talk to the chain (§5: "100 kHz or 400 kHz").
pub const I2C_FREQUENCY_HZ: u32 = 400_000;

/// How often the discovery task re-scans for a changed chain length once
/// steady state is reached (§4.3 "detect-line edge triggers rediscovery").
pub const REDISCOVERY_DEBOUNCE_MS: u32 = 50;

/// Depth of the command-dispatcher's request channel (§5).
pub const DISPATCH_QUEUE_DEPTH: usize = 8;

/// Depth of the discovery task's detect-line edge-event channel.
pub const DETECT_EVENT_QUEUE_DEPTH: usize = 4;

/// Per-request bus retry budget before a dispatch call reports `ControllerError::Bus`.
pub const BUS_RETRY_ATTEMPTS: u8 = 3;
