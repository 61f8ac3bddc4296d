//! Bus addressing and timing constants.
//!
//! All branding-free magic numbers in the discovery state machine, the
//! watchdog, and the codec should reference these constants rather than
//! repeating literals, the way `platform::config` centralises naming for the
//! rest of the stack.

/// Maximum number of peripherals addressable on one chain.
pub const MAX_EXPANSIONS: usize = 5;

/// Shared address every unaddressed peripheral listens on at power-up.
pub const DEFAULT_ADDRESS: u8 = 0x0A;

/// First of the five final addresses (`FIRST_FINAL .. FIRST_FINAL + N`).
pub const FIRST_FINAL_ADDRESS: u8 = 0x0B;

/// First of the five temporary addresses used during phase 1 of discovery.
pub const FIRST_TEMP_ADDRESS: u8 = 0x10;

/// Final address assigned to physical position `index` (`0` = closest to controller).
#[must_use]
pub const fn final_address(index: usize) -> u8 {
    FIRST_FINAL_ADDRESS + index as u8
}

/// Temporary address assigned to the `n`th peripheral discovered in phase 1.
#[must_use]
pub const fn temp_address(n: usize) -> u8 {
    FIRST_TEMP_ADDRESS + n as u8
}

/// Maximum payload length declared in a frame header (`len` is 0..=45).
pub const MAX_PAYLOAD: usize = 45;

/// Retry budget per candidate address during discovery (§4.3).
pub const DISCOVERY_ATTEMPTS: u8 = 3;

/// Controller-side detect-line debounce sample count (§6: "≥ 50 samples").
pub const DETECT_DEBOUNCE_SAMPLES: u32 = 50;

/// Debounce sample interval.
pub const DETECT_DEBOUNCE_INTERVAL_MS: u32 = 1;

/// Minimum hold time a peripheral drives detect-out low during its reset
/// sequence, so downstream neighbours reliably observe it (§6).
pub const DETECT_HOLD_MS: u32 = 1000;

/// Minimum delay the controller leaves between consecutive shadow-replay
/// frames so the peripheral has time to reprogram its channels (§4.4/R1).
pub const SHADOW_REPLAY_INTER_FRAME_MS: u32 = 20;

/// Time a peripheral waits between acknowledging `reboot` and handing off to
/// the bootloader (§4.4).
pub const WAIT_FOR_REBOOT_MS: u32 = 500;

/// Watchdog tick granularity (§4.7).
pub const WATCHDOG_TICK_MS: u32 = 1;

/// Sentinel `timeout_ms` value meaning "never expire".
pub const WATCHDOG_NEVER: u16 = 0xFFFF;

/// Default RTD update interval pushed as part of the platform default (§4.4).
pub const DEFAULT_RTD_UPDATE_TIME_MS: u16 = 1000;

/// Two-byte sentinel a peripheral writes to the response buffer when no
/// response has been prepared for an incoming request-to-respond event (§4.2).
pub const NACK_SENTINEL: [u8; 2] = [0xFA, 0xFE];

/// Nameplate address of the 32-byte production-data block (§6).
pub const NAMEPLATE_PRODUCTION_DATA: u16 = 0x1C00;

/// Nameplate address of the 1-byte type-extra field (§6).
pub const NAMEPLATE_TYPE_EXTRA: u16 = 0x1C20;

/// Size in bytes of the production-data nameplate block.
pub const PRODUCTION_DATA_LEN: usize = 32;

/// Upper bound on analog channels for any registered family (§4.9), used as
/// the `k` in [`crate::ShadowKey::to_offset`] when an exact per-peripheral
/// channel count isn't available (e.g. sorting shadow entries for replay).
pub const MAX_ANALOG_CHANNELS: usize = 8;

/// Upper bound on PWM channels for any registered family (§4.9), the `p`
/// counterpart to [`MAX_ANALOG_CHANNELS`].
pub const MAX_PWM_CHANNELS: usize = 4;
