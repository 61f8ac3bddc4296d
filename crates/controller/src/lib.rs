//! Controller-side firmware for the I2C expansion daisy chain.
//!
//! # Architecture
//!
//! ```text
//! Application task (main.rs)
//!         ↓
//! Dispatcher (C7)  — set/get requests, shadow replay, reboot handshake
//!         ↓
//! ExpansionRegistry (C5) + Shadow (C6)
//!         ↓
//! ChainBus (C2)  — frame codec over I2C + detect-enable GPIO
//!         ↓
//! Discovery (C4) — two-phase address arbitration
//! ```
//!
//! # Features
//!
//! - `hardware` — build for the STM32F407 reference controller board
//! - `confirm-address` — best-effort confirm-address-rx handshake (§4.3 Open Question #2)
//! - `crc` — append/verify a CRC-8 trailer on every frame
//! - `std` — standard library (host-side tests, the `sim` crate)

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic))]

pub mod bus;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod ops;
pub mod registry;
pub mod shadow;

pub use bus::ChainBus;
pub use discovery::{discover_chain, DiscoveredExpansion};
pub use dispatcher::Dispatcher;
pub use error::ControllerError;
pub use registry::{ExpansionRegistry, ExpansionSlot};
pub use shadow::Shadow;
