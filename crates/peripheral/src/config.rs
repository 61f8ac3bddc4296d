//! Named constants for the peripheral task set.

/// Watchdog tick period, matching `protocol::constants::WATCHDOG_TICK_MS` but
/// kept local so the firmware's own timer task doesn't reach across crates
/// for a value it owns the behaviour of.
pub const WATCHDOG_TICK_MS: u32 = protocol::constants::WATCHDOG_TICK_MS;

/// Depth of the incoming-request queue between the I2C slave ISR/task and
/// the command dispatcher (§5).
pub const REQUEST_QUEUE_DEPTH: usize = 4;

/// Moving-average window applied to the "additional ADC overlay" unless the
/// `begin-channel-as-adc` payload specifies a different one (§4.4, supplemented
/// from the dropped `add_average` behaviour).
pub const DEFAULT_ADC_AVERAGE_WINDOW: usize = 8;

/// Largest moving-average window this build supports; bounds the
/// `heapless::HistoryBuffer` backing store.
pub const MAX_ADC_AVERAGE_WINDOW: usize = 16;
