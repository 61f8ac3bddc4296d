//! Wire protocol for the daisy-chained expansion bus.
//!
//! This crate is the one piece of the control plane shared verbatim by both
//! ends of the bus: the three-byte-header frame codec (`frame`), the bus
//! address space and timing constants (`constants`), the small set of typed
//! values that travel over the wire (`types`), and the logical offset space
//! used by the controller's configuration shadow (`shadow_key`).
//!
//! It is intentionally inert: no I/O, no state, no allocation. Both the
//! controller and the peripheral firmware build frames with it and hand the
//! resulting bytes to their own transport.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic))]

pub mod constants;
pub mod frame;
pub mod shadow_key;
pub mod types;

pub use frame::{Arg, Cmd, Frame, ParseError};
pub use shadow_key::ShadowKey;
pub use types::{ChannelRole, FirmwareVersion, PowerSource, ProductString, RtdWiring, TypeTag, WireCount};
