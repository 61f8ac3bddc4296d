//! Typed peripheral families (§4.9).
//!
//! The source's base class with virtual methods is replaced here not with a
//! runtime trait object but with a compile-time choice: a given hardware
//! build links in exactly one of these families (a digital-I/O board can't
//! become an analog board by receiving a frame), so [`crate::dispatch`]
//! dispatches to the one family the binary was built with directly rather
//! than through a vtable. The tagged-variant-over-families shape the source's
//! dynamic dispatch calls for still exists -- it lives on the controller side
//! as `protocol::TypeTag` plus `controller::registry::ExpansionFactory`,
//! which is the end that actually needs to hold several families' state at
//! once.

pub mod analog;
pub mod digital;
pub mod display;

pub use analog::AnalogFamily;
pub use digital::DigitalFamily;
pub use display::DisplayFamily;
