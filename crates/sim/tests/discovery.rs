//! End-to-end discovery over the simulated chain: confirms the reverse
//! final-address assignment this crate's `discovery.rs` was fixed to
//! implement actually produces `index 0` closest to the controller.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use controller::{discover_chain, ChainBus};
use protocol::constants::final_address;
use protocol::TypeTag;
use sim::{SimChain, SimDetectPin, SimNode, TokioDelay};

#[tokio::test(start_paused = true)]
async fn discovers_every_node_with_index_0_closest_to_controller() {
    let chain = SimChain::new(vec![
        SimNode::new(TypeTag::DigitalGeneric),
        SimNode::new(TypeTag::Analog),
        SimNode::new(TypeTag::DigitalMechanical),
    ]);

    let mut bus = ChainBus::new(chain.i2c(), SimDetectPin, TokioDelay);
    let found = discover_chain(&mut bus).await.expect("discovery should succeed");

    assert_eq!(found.len(), 3);
    for (i, expansion) in found.iter().enumerate() {
        assert_eq!(expansion.index, i);
        assert_eq!(expansion.address, final_address(i));
    }
    assert_eq!(found[0].type_tag, TypeTag::DigitalGeneric);
    assert_eq!(found[1].type_tag, TypeTag::Analog);
    assert_eq!(found[2].type_tag, TypeTag::DigitalMechanical);

    for i in 0..3 {
        assert_eq!(chain.address_of(i), Some(final_address(i)));
    }
}

#[tokio::test(start_paused = true)]
async fn empty_chain_discovers_nothing() {
    let chain = SimChain::new(vec![]);
    let mut bus = ChainBus::new(chain.i2c(), SimDetectPin, TokioDelay);
    let found = discover_chain(&mut bus).await.expect("discovery should succeed");
    assert!(found.is_empty());
}
