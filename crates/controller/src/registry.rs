//! Chain membership and per-slot configuration shadow (C5/C6, §4.4/§4.6).

use heapless::Vec as HVec;
use protocol::constants::MAX_EXPANSIONS;
use protocol::{FirmwareVersion, ProductString, TypeTag};

use crate::discovery::DiscoveredExpansion;
use crate::error::ControllerError;
use crate::shadow::Shadow;

/// Maximum number of distinct product families a controller build can register.
pub const MAX_FACTORIES: usize = 16;

/// Registered for a product string so the registry can invoke a one-time
/// startup callback once discovery has resolved a `Custom`/`Invalid` slot's
/// real product identity (§9 Design Notes: lazy materialization by product string).
pub trait ExpansionFactory {
    /// The product string this factory answers for (must match `get-product-type`'s answer exactly).
    fn product(&self) -> &str;
    /// Invoked exactly once per discovery completion, for every slot whose
    /// resolved product matches [`ExpansionFactory::product`] (R1).
    fn on_discovered(&self, index: usize, type_tag: TypeTag);
}

/// One physically-discovered peripheral and everything the controller
/// remembers about it between discovery runs.
pub struct ExpansionSlot {
    /// Current bus address (`final_address(index)`).
    pub address: u8,
    /// Physical position, `0` closest to the controller.
    pub index: usize,
    /// Reported family.
    pub type_tag: TypeTag,
    /// Resolved product string, populated lazily for `Custom`/`Invalid` tags (§4.3).
    pub product: Option<ProductString>,
    /// Firmware version, populated by `get-version` once per discovery completion.
    pub firmware_version: Option<FirmwareVersion>,
    /// Configuration shadow replayed into the peripheral after every reset (§4.4/§4.6).
    pub shadow: Shadow,
    /// Whether this slot's factory startup callback has already run since its
    /// last (re)discovery — guards the "exactly once per discovery completion" rule (R1).
    startup_invoked: bool,
}

impl ExpansionSlot {
    fn new(discovered: DiscoveredExpansion) -> Self {
        Self {
            address: discovered.address,
            index: discovered.index,
            type_tag: discovered.type_tag,
            product: None,
            firmware_version: None,
            shadow: Shadow::new(),
            startup_invoked: false,
        }
    }

    /// Whether this slot has ever held committed configuration.
    ///
    /// Used to decide, on a reset-vs-discovery race, whether to replay saved
    /// config (`false`) or push the platform default for the first time
    /// (`true`) — replacing the source's `device_is_used` flag.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.shadow.is_empty()
    }
}

/// Tracks every expansion currently on the chain, indexed by physical position.
pub struct ExpansionRegistry {
    slots: HVec<ExpansionSlot, MAX_EXPANSIONS>,
    factories: HVec<&'static dyn ExpansionFactory, MAX_FACTORIES>,
}

impl Default for ExpansionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpansionRegistry {
    /// An empty registry, as it exists before the first discovery run.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: HVec::new(),
            factories: HVec::new(),
        }
    }

    /// Register a factory for a custom product family. Call once at startup,
    /// before the first `discover_chain`/`reconcile`.
    pub fn register_factory(&mut self, factory: &'static dyn ExpansionFactory) -> Result<(), ControllerError> {
        self.factories.push(factory).map_err(|_| ControllerError::CapacityExceeded)
    }

    /// Resolve `slot.product` against the registered factories and invoke the
    /// matching one's startup callback, exactly once per discovery completion (R1).
    /// A slot with no resolved product, or no matching factory, is skipped —
    /// this is the "known built-in family" path and has no factory to call.
    pub fn invoke_startup_callbacks(&mut self) {
        let factories = &self.factories;
        for slot in &mut self.slots {
            if slot.startup_invoked {
                continue;
            }
            let Some(product) = slot.product.as_deref() else {
                continue;
            };
            if let Some(factory) = factories.iter().find(|f| f.product() == product) {
                factory.on_discovered(slot.index, slot.type_tag);
            }
            slot.startup_invoked = true;
        }
    }

    /// Replace the registry's membership with a fresh discovery result.
    ///
    /// Slots whose physical index is unchanged keep their existing shadow
    /// (the peripheral there may simply have rebooted); slots beyond the new
    /// chain length are dropped.
    pub fn reconcile(&mut self, discovered: &[DiscoveredExpansion]) -> Result<(), ControllerError> {
        let mut next = HVec::new();
        for d in discovered {
            let carried = self
                .slots
                .iter()
                .position(|s| s.index == d.index && s.type_tag == d.type_tag)
                .and_then(|i| self.slots.get_mut(i))
                .map(|slot| core::mem::replace(&mut slot.shadow, Shadow::new()));

            let mut slot = ExpansionSlot::new(*d);
            if let Some(shadow) = carried {
                slot.shadow = shadow;
            }
            next.push(slot).map_err(|_| ControllerError::TooManyExpansions)?;
        }
        self.slots = next;
        Ok(())
    }

    /// Number of expansions currently on the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up a slot by physical index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ExpansionSlot> {
        self.slots.iter().find(|s| s.index == index)
    }

    /// Look up a slot by physical index, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut ExpansionSlot> {
        self.slots.iter_mut().find(|s| s.index == index)
    }

    /// Iterate slots in chain order.
    pub fn iter(&self) -> impl Iterator<Item = &ExpansionSlot> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveredExpansion;

    fn discovered(index: usize) -> DiscoveredExpansion {
        DiscoveredExpansion {
            address: protocol::constants::final_address(index),
            index,
            type_tag: TypeTag::DigitalGeneric,
        }
    }

    #[test]
    fn fresh_slot_is_empty() {
        let mut reg = ExpansionRegistry::new();
        reg.reconcile(&[discovered(0)]).unwrap();
        assert!(reg.get(0).unwrap().is_fresh());
    }

    #[test]
    fn reconcile_drops_slots_beyond_new_chain_length() {
        let mut reg = ExpansionRegistry::new();
        reg.reconcile(&[discovered(0), discovered(1)]).unwrap();
        assert_eq!(reg.len(), 2);
        reg.reconcile(&[discovered(0)]).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.get(1).is_none());
    }

    #[test]
    fn reconcile_carries_shadow_for_same_index_and_type() {
        let mut reg = ExpansionRegistry::new();
        reg.reconcile(&[discovered(0)]).unwrap();
        reg.get_mut(0)
            .unwrap()
            .shadow
            .set(protocol::ShadowKey::Led, protocol::frame::Arg::SetLed, &[0xFF])
            .unwrap();
        reg.reconcile(&[discovered(0)]).unwrap();
        assert!(!reg.get(0).unwrap().is_fresh());
    }
}
