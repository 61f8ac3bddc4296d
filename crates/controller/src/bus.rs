//! Transport layer: frame codec wired onto an I2C bus plus the detect line (C2).
//!
//! `ChainBus` owns the one I2C peripheral shared by every expansion and the
//! single GPIO output the controller uses to kick off phase 1 of discovery
//! (§4.3: driving the first peripheral's detect-in so it can hand the signal
//! down the chain once it has claimed a temporary address). Everything above
//! this module talks in `protocol::Frame`, never raw bytes.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::i2c::I2c;
use protocol::constants::MAX_PAYLOAD;
use protocol::frame::{self, Arg, Cmd};

use crate::config::BUS_RETRY_ATTEMPTS;
use crate::error::ControllerError;

/// Answer buffer sized for the largest possible frame (header + payload + crc).
pub type AnswerBuf = heapless::Vec<u8, { MAX_PAYLOAD + 4 }>;

/// Owns the shared I2C bus and the detect-enable output pin.
pub struct ChainBus<I2C, DETECT, DELAY> {
    i2c: I2C,
    detect_enable: DETECT,
    delay: DELAY,
}

impl<I2C, DETECT, DELAY> ChainBus<I2C, DETECT, DELAY>
where
    I2C: I2c,
    DETECT: OutputPin,
    DELAY: DelayNs,
{
    /// Take ownership of the bus peripheral, the detect-enable pin, and a
    /// delay source for the hold times in §4.3/§6.
    pub fn new(i2c: I2C, detect_enable: DETECT, delay: DELAY) -> Self {
        Self {
            i2c,
            detect_enable,
            delay,
        }
    }

    /// Drive the detect-enable line low, hold it, then release it. This is
    /// the controller's half of phase 1: it tells the first (and only the
    /// first) peripheral on the chain that it may claim the default address.
    pub async fn pulse_detect_enable(&mut self, hold_ms: u32) -> Result<(), ControllerError> {
        self.detect_enable.set_low().map_err(|_| ControllerError::Bus)?;
        self.delay.delay_ms(hold_ms).await;
        self.detect_enable.set_high().map_err(|_| ControllerError::Bus)?;
        Ok(())
    }

    /// Send a request frame to `addr` and read back the matching response,
    /// retrying bus-level failures up to [`BUS_RETRY_ATTEMPTS`] times.
    ///
    /// `expected_len` is the payload length the caller expects in the answer
    /// (variable for `read-flash`, fixed for everything else); parsing
    /// rejects any frame whose length disagrees.
    pub async fn request(
        &mut self,
        addr: u8,
        cmd: Cmd,
        arg: Arg,
        payload: &[u8],
        expected_len: usize,
    ) -> Result<frame::Frame, ControllerError> {
        let out = frame::build(cmd, arg, payload).map_err(ControllerError::Protocol)?;
        let mut last_err = ControllerError::Bus;
        for _ in 0..BUS_RETRY_ATTEMPTS {
            let mut answer = [0u8; MAX_PAYLOAD + 4];
            let answer_len = frame::answer_len(expected_len).min(answer.len());
            let slot = answer.get_mut(..answer_len).ok_or(ControllerError::CapacityExceeded)?;
            match self.i2c.write_read(addr, &out, slot).await {
                Ok(()) => {
                    return frame::parse(slot, cmd.response(), arg, expected_len)
                        .map_err(ControllerError::Protocol)
                }
                Err(_) => last_err = ControllerError::Bus,
            }
        }
        Err(last_err)
    }

    /// Fire-and-forget write, used by `reboot`/`controller-reset` where no
    /// answer is expected because the peripheral is about to reset itself.
    pub async fn request_no_answer(
        &mut self,
        addr: u8,
        cmd: Cmd,
        arg: Arg,
        payload: &[u8],
    ) -> Result<(), ControllerError> {
        let out = frame::build(cmd, arg, payload).map_err(ControllerError::Protocol)?;
        self.i2c.write(addr, &out).await.map_err(|_| ControllerError::Bus)
    }
}

/// Optional: a controller board that can also *sense* the detect line (used
/// in the confirm-address-rx variant, §4.3 Open Question #2).
pub trait DetectSense {
    /// Wait for the detect line to go low, signalling the next peripheral in
    /// line is ready to be interrogated.
    async fn wait_low(&mut self) -> Result<(), ControllerError>;
}

impl<T: Wait> DetectSense for T {
    async fn wait_low(&mut self) -> Result<(), ControllerError> {
        self.wait_for_low().await.map_err(|_| ControllerError::Bus)
    }
}
