//! Desktop-only software bus and simulated peripherals, for integration
//! testing `controller`/`peripheral` against each other without hardware. In
//! the same spirit as the teacher's desktop emulator feature, but scoped to
//! this project's discovery/dispatch logic rather than an audio pipeline.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod bus;
pub mod delay;

pub use bus::{SimChain, SimDetectPin, SimI2c, SimNode};
pub use delay::TokioDelay;
