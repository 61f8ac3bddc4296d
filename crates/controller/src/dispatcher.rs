//! Command dispatcher (C7): the single point where a high-level request
//! becomes a frame on the wire, and a successful `set` is recorded into the
//! addressed peripheral's configuration shadow.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use protocol::constants::{
    MAX_ANALOG_CHANNELS, MAX_PWM_CHANNELS, SHADOW_REPLAY_INTER_FRAME_MS, WAIT_FOR_REBOOT_MS,
};
use protocol::frame::{Arg, Cmd, Frame};
use protocol::{FirmwareVersion, ShadowKey};

use crate::bus::ChainBus;
use crate::error::ControllerError;
use crate::registry::ExpansionRegistry;

/// Ties the transport (`ChainBus`), the chain membership (`ExpansionRegistry`)
/// and a delay source together behind one request-response API.
pub struct Dispatcher<I2C, DETECT, DELAY> {
    bus: ChainBus<I2C, DETECT, DELAY>,
    registry: ExpansionRegistry,
    delay: DELAY,
}

impl<I2C, DETECT, DELAY> Dispatcher<I2C, DETECT, DELAY>
where
    I2C: I2c,
    DETECT: OutputPin,
    DELAY: DelayNs + Clone,
{
    /// Wire up a dispatcher around an already-constructed bus and registry.
    pub fn new(bus: ChainBus<I2C, DETECT, DELAY>, registry: ExpansionRegistry, delay: DELAY) -> Self {
        Self { bus, registry, delay }
    }

    /// Borrow the chain membership (e.g. to iterate expansions for a UI/status read).
    #[must_use]
    pub fn registry(&self) -> &ExpansionRegistry {
        &self.registry
    }

    /// Borrow the chain membership mutably (used by the discovery task to `reconcile`).
    pub fn registry_mut(&mut self) -> &mut ExpansionRegistry {
        &mut self.registry
    }

    fn address_of(&self, index: usize) -> Result<u8, ControllerError> {
        self.registry
            .get(index)
            .map(|s| s.address)
            .ok_or(ControllerError::NoSuchExpansion)
    }

    /// Send a `set-*` request, and on success record it in the shadow under
    /// `key` so it survives a reset.
    pub async fn set(
        &mut self,
        index: usize,
        arg: Arg,
        payload: &[u8],
        key: ShadowKey,
    ) -> Result<(), ControllerError> {
        let addr = self.address_of(index)?;
        self.bus
            .request(addr, Cmd::SetRequest, arg, payload, 0)
            .await?;
        let slot = self.registry.get_mut(index).ok_or(ControllerError::NoSuchExpansion)?;
        slot.shadow
            .set(key, arg, payload)
            .map_err(|()| ControllerError::CapacityExceeded)?;
        Ok(())
    }

    /// Send a `set-*` request that has no standing configuration to shadow
    /// (one-shot actions like `set-dac`, whose current value is tracked
    /// separately via [`ShadowKey::DacValue`] by the caller if desired).
    pub async fn set_unshadowed(
        &mut self,
        index: usize,
        arg: Arg,
        payload: &[u8],
    ) -> Result<(), ControllerError> {
        let addr = self.address_of(index)?;
        self.bus
            .request(addr, Cmd::SetRequest, arg, payload, 0)
            .await?;
        Ok(())
    }

    /// Send a `get-*` request and return the raw answer frame.
    pub async fn get(
        &mut self,
        index: usize,
        arg: Arg,
        payload: &[u8],
        expected_len: usize,
    ) -> Result<Frame, ControllerError> {
        let addr = self.address_of(index)?;
        self.bus
            .request(addr, Cmd::GetRequest, arg, payload, expected_len)
            .await
    }

    /// `get-version` (C7 first-class operation per the production OptaMsgCommon behaviour).
    pub async fn get_version(&mut self, index: usize) -> Result<FirmwareVersion, ControllerError> {
        let frame = self.get(index, Arg::GetVersion, &[], 3).await?;
        let bytes: [u8; 3] = frame
            .payload
            .as_slice()
            .try_into()
            .map_err(|_| ControllerError::ProtocolViolation)?;
        Ok(FirmwareVersion::from_wire(bytes))
    }

    /// `reboot`: no answer is expected, the peripheral hands off to its
    /// bootloader after [`WAIT_FOR_REBOOT_MS`] (§4.4). Actually jumping the
    /// bootloader is out of scope here; this only performs the handshake.
    pub async fn reboot(&mut self, index: usize) -> Result<(), ControllerError> {
        let addr = self.address_of(index)?;
        self.bus
            .request_no_answer(addr, Cmd::SetRequest, Arg::Reboot, &[])
            .await?;
        self.delay.delay_ms(WAIT_FOR_REBOOT_MS).await;
        Ok(())
    }

    /// `controller-reset`: same handshake as [`Dispatcher::reboot`] but for the
    /// peripheral-initiated soft reset opcode.
    pub async fn controller_reset(&mut self, index: usize) -> Result<(), ControllerError> {
        let addr = self.address_of(index)?;
        self.bus
            .request_no_answer(addr, Cmd::SetRequest, Arg::ControllerReset, &[])
            .await?;
        self.delay.delay_ms(WAIT_FOR_REBOOT_MS).await;
        Ok(())
    }

    /// Replay every shadowed configuration entry back into a peripheral,
    /// pacing frames [`SHADOW_REPLAY_INTER_FRAME_MS`] apart so it has time to
    /// act on each one (§4.4/R1).
    pub async fn replay_shadow(&mut self, index: usize) -> Result<(), ControllerError> {
        let addr = self.address_of(index)?;
        let slot = self.registry.get(index).ok_or(ControllerError::NoSuchExpansion)?;

        let ordered = slot.shadow.iter_ordered(MAX_ANALOG_CHANNELS, MAX_PWM_CHANNELS);

        for (_, arg, payload) in ordered {
            self.bus
                .request(addr, Cmd::SetRequest, arg, &payload, 0)
                .await?;
            self.delay.delay_ms(SHADOW_REPLAY_INTER_FRAME_MS).await;
        }
        Ok(())
    }

    /// `confirm-address-rx`: best-effort, feature-gated, never blocks phase
    /// transitions (§4.3 Open Question #2). Errors are swallowed by design —
    /// this is a courtesy ping, not part of the arbitration contract.
    #[cfg(feature = "confirm-address")]
    pub async fn confirm_address_rx(&mut self, index: usize) {
        let Ok(addr) = self.address_of(index) else {
            return;
        };
        let _ = self
            .bus
            .request_no_answer(addr, Cmd::SetRequest, Arg::ConfirmAddressRx, &[0xC9, 0xB1])
            .await;
    }
}
