//! Software I2C bus: a shared chain of [`SimNode`]s addressed exactly the way
//! the real bus is, so `controller::discover_chain` and `Dispatcher` can run
//! against it unmodified.

use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};
use protocol::constants::DEFAULT_ADDRESS;
use protocol::frame::{self, Arg, Cmd};
use protocol::TypeTag;

/// One simulated peripheral's view of the chain: its reported family and a
/// generic register bank standing in for whatever state a real peripheral of
/// that family would hold. Per-family semantics (DAC staging, RTD formulas,
/// watchdog expiry, ...) are exercised by `crates/peripheral`'s own unit
/// tests; this only needs to answer the wire protocol plausibly enough to
/// drive the controller's discovery and dispatch logic end to end.
pub struct SimNode {
    pub type_tag: TypeTag,
    claimed: bool,
    address: Option<u8>,
    registers: std::collections::HashMap<u8, Vec<u8>>,
}

impl SimNode {
    #[must_use]
    pub fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            claimed: false,
            address: None,
            registers: std::collections::HashMap::new(),
        }
    }
}

struct ChainState {
    nodes: Vec<SimNode>,
    claimed_count: usize,
}

/// Shared handle to a simulated chain; clone to hand a fresh [`SimI2c`] to the
/// controller while keeping a reference for test assertions.
#[derive(Clone)]
pub struct SimChain {
    state: Arc<Mutex<ChainState>>,
}

impl SimChain {
    /// Build a chain with `nodes` attached in physical order, `nodes[0]`
    /// closest to the controller.
    #[must_use]
    pub fn new(nodes: Vec<SimNode>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                nodes,
                claimed_count: 0,
            })),
        }
    }

    /// Build an I2C handle wired to this chain.
    #[must_use]
    pub fn i2c(&self) -> SimI2c {
        SimI2c { chain: self.clone() }
    }

    /// Final bus address the node at physical `index` currently answers on,
    /// if discovery has assigned it one yet.
    #[must_use]
    pub fn address_of(&self, index: usize) -> Option<u8> {
        self.state.lock().expect("sim chain mutex poisoned").nodes.get(index)?.address
    }
}

/// A no-op detect-enable pin: the sim bus gates phase-1 responses on claim
/// order directly (see [`SimI2c::handle`]), so driving this pin doesn't need
/// to do anything beyond satisfying `OutputPin`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimDetectPin;

impl PinErrorType for SimDetectPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimDetectPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Handle to the shared [`SimChain`], implementing `embedded-hal-async`'s
/// `I2c` trait so it plugs straight into `controller::ChainBus`.
pub struct SimI2c {
    chain: SimChain,
}

/// The simulated bus never fails at the transport level; protocol-level
/// rejections are expressed as [`frame::ParseError`] surfacing through
/// `ChainBus::request`, exactly as a real NACK would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimBusError;

impl core::fmt::Display for SimBusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "simulated i2c transaction failed")
    }
}

impl embedded_hal::i2c::Error for SimBusError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        embedded_hal::i2c::ErrorKind::Other
    }
}

impl ErrorType for SimI2c {
    type Error = SimBusError;
}

impl SimI2c {
    /// Resolve which physical node, if any, answers `addr` right now, and run
    /// the request/answer pair against it.
    fn handle(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<(), SimBusError> {
        let mut state = self.chain.state.lock().expect("sim chain mutex poisoned");
        let (cmd, arg, payload) = parse_request(write).ok_or(SimBusError)?;

        if addr == DEFAULT_ADDRESS {
            // Phase 1: only the next unclaimed node may answer the broadcast.
            // Per the original firmware, temp addresses are claimed
            // farthest-from-controller-first (the node's own detect-out only
            // exposes its *upstream* neighbour once it has an address), so
            // `nodes[0]` (closest, by this crate's convention) claims last.
            let claimed_count = state.claimed_count;
            let node_count = state.nodes.len();
            let Some(physical_index) = node_count.checked_sub(1 + claimed_count) else {
                return Err(SimBusError);
            };
            let Some(node) = state.nodes.get_mut(physical_index) else {
                return Err(SimBusError);
            };
            if node.claimed || cmd != Cmd::SetRequest || arg != Arg::AssignAddress {
                return Err(SimBusError);
            }
            let temp = *payload.first().ok_or(SimBusError)?;
            node.address = Some(temp);
            node.claimed = true;
            state.claimed_count += 1;
            return respond(read, Cmd::SetResponse, Arg::AssignAddress, &[]);
        }

        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.address == Some(addr))
            .ok_or(SimBusError)?;

        match (cmd, arg) {
            (Cmd::SetRequest, Arg::AssignAddress) => {
                let new_addr = *payload.first().ok_or(SimBusError)?;
                node.address = Some(new_addr);
                respond(read, Cmd::SetResponse, Arg::AssignAddress, &[])
            }
            (Cmd::GetRequest, Arg::GetAddressAndType) => {
                respond(read, Cmd::GetResponse, Arg::GetAddressAndType, &[node.type_tag.to_wire(), 0])
            }
            (Cmd::GetRequest, Arg::GetProductType) => {
                respond(read, Cmd::GetResponse, Arg::GetProductType, b"sim-product\0")
            }
            (Cmd::GetRequest, Arg::GetVersion) => {
                respond(read, Cmd::GetResponse, Arg::GetVersion, &[1, 0, 0])
            }
            (Cmd::SetRequest, _) => {
                node.registers.insert(arg as u8, payload.to_vec());
                respond(read, Cmd::SetResponse, arg, &[])
            }
            (Cmd::GetRequest, _) => {
                // No register written yet for this op: nothing plausible to
                // answer with, so fail the transaction rather than guess a
                // zero-filled length that might not match the caller's
                // `expected_len`.
                let stored = node.registers.get(&(arg as u8)).cloned().ok_or(SimBusError)?;
                respond(read, Cmd::GetResponse, arg, &stored)
            }
            _ => Err(SimBusError),
        }
    }
}

fn parse_request(write: &[u8]) -> Option<(Cmd, Arg, &[u8])> {
    let cmd_byte = *write.first()?;
    let arg_byte = *write.get(1)?;
    let len = usize::from(*write.get(2)?);
    let cmd = Cmd::from_wire(cmd_byte).ok()?;
    let arg = Arg::from_wire(arg_byte).ok()?;
    let payload = write.get(3..3 + len)?;
    Some((cmd, arg, payload))
}

fn respond(read: &mut [u8], cmd: Cmd, arg: Arg, payload: &[u8]) -> Result<(), SimBusError> {
    let bytes = frame::build(cmd, arg, payload).map_err(|_| SimBusError)?;
    let slot = read.get_mut(..bytes.len()).ok_or(SimBusError)?;
    slot.copy_from_slice(&bytes);
    Ok(())
}

impl I2c for SimI2c {
    async fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        match operations {
            [Operation::Write(write), Operation::Read(read)] => self.handle(address, write, read),
            [Operation::Write(write)] => {
                let mut scratch = [0u8; 4];
                self.handle(address, write, &mut scratch)
            }
            _ => Err(SimBusError),
        }
    }
}
