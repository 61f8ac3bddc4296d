//! Peripheral-side firmware for one board on the I2C expansion daisy chain.
//!
//! # Architecture
//!
//! ```text
//! I2C slave interrupt (main.rs, hardware only)
//!         ↓
//! BusAdapter (C2 peripheral half)  — staged response bytes
//!         ↓
//! dispatch::dispatch_core / dispatch_digital / dispatch_analog / dispatch_display
//!         ↓
//! PeripheralState (C3) + Watchdog (C8) + Nameplate (C9) + one typed family (§4.9)
//! ```
//!
//! Each hardware build compiles in exactly one family from [`family`]; which
//! one is a board-level choice made in `main.rs`, not something this crate
//! decides at runtime.
//!
//! # Features
//!
//! - `hardware` — build for an STM32F407-based reference expansion board
//! - `crc` — append/verify a CRC-8 trailer on every frame
//! - `std` — standard library (host-side tests, the `sim` crate)

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic))]

pub mod bus_adapter;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod family;
pub mod nameplate;
pub mod state;
pub mod watchdog;

pub use bus_adapter::BusAdapter;
pub use error::PeripheralError;
pub use nameplate::{Nameplate, NvmStore};
pub use state::{BootloaderHandoff, PeripheralState};
pub use watchdog::Watchdog;
