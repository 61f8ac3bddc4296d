//! Expansion-bus peripheral — digital-generic reference board.
//!
//! Hardware-only entry point for an STM32F407-based digital I/O expansion
//! (§4.9 `DigitalFamily`, 8 outputs / 16 inputs / 16 analog readings). An
//! analog or display board follows the same shape with a different typed
//! family wired into [`dispatch`] and a different `TypeTag`.

#![no_std]
#![no_main]

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::interrupt;
use embassy_stm32::pac::i2c::vals::Ack;
use embassy_stm32::pac::I2C1;
use embassy_time::{Delay, Duration, Timer};
use embedded_hal_async::delay::DelayNs;
use protocol::constants::DEFAULT_ADDRESS;
use protocol::{FirmwareVersion, ProductString, TypeTag};

use peripheral::bus_adapter::BusAdapter;
use peripheral::config::WATCHDOG_TICK_MS;
use peripheral::dispatch::{dispatch_core, dispatch_digital};
use peripheral::family::DigitalFamily;
use peripheral::nameplate::{InMemoryNvm, Nameplate};
use peripheral::state::PeripheralState;
use peripheral::watchdog::Watchdog;

// Panic handler
use panic_probe as _;

const ANSWER_CAPACITY: usize = 48;

/// Bytes accumulated from the controller since the last `ADDR` match, and the
/// staged answer for the next read. This is the one place firmware state is
/// shared between the I2C1 event interrupt and the application task; every
/// access goes through `critical_section` so the two never observe a torn
/// update (§4.2).
struct SlaveChannel {
    request: heapless::Vec<u8, 64>,
    adapter: BusAdapter<ANSWER_CAPACITY>,
    request_ready: bool,
}

impl SlaveChannel {
    fn new() -> Self {
        Self {
            request: heapless::Vec::new(),
            adapter: BusAdapter::new(),
            request_ready: false,
        }
    }
}

static SLAVE: Mutex<RefCell<Option<SlaveChannel>>> = Mutex::new(RefCell::new(None));

/// I2C1 event interrupt: the hardware state machine for address match, byte
/// reception, and byte transmission. Runs with interrupts masked at the NVIC
/// level for I2C1 only, so it never races the application task for anything
/// outside [`SLAVE`].
#[interrupt]
fn I2C1_EV() {
    critical_section::with(|cs| {
        let regs = I2C1;
        let sr1 = regs.sr1().read();

        if sr1.addr() {
            // Reading SR2 after SR1.ADDR clears the match flag (RM0090 §27.6.6).
            let _ = regs.sr2().read();
            let mut slot = SLAVE.borrow(cs).borrow_mut();
            if let Some(chan) = slot.as_mut() {
                chan.request.clear();
                chan.request_ready = false;
            }
            return;
        }

        if sr1.rx_ne() {
            let byte = regs.dr().read().dr();
            let mut slot = SLAVE.borrow(cs).borrow_mut();
            if let Some(chan) = slot.as_mut() {
                let _ = chan.request.push(byte);
            }
            return;
        }

        if sr1.tx_e() {
            let mut slot = SLAVE.borrow(cs).borrow_mut();
            if let Some(chan) = slot.as_mut() {
                let byte = chan.adapter.take_response().first().copied().unwrap_or(0);
                regs.dr().write(|w| w.set_dr(byte));
            }
            return;
        }

        if sr1.stopf() {
            // Clearing STOPF requires a read of SR1 (already done above) then
            // a write to CR1 (RM0090 §27.6.6).
            regs.cr1().modify(|w| w.set_pe(true));
            let mut slot = SLAVE.borrow(cs).borrow_mut();
            if let Some(chan) = slot.as_mut() {
                chan.request_ready = true;
            }
        }
    });
}

fn take_ready_request() -> Option<heapless::Vec<u8, 64>> {
    critical_section::with(|cs| {
        let mut slot = SLAVE.borrow(cs).borrow_mut();
        let chan = slot.as_mut()?;
        if !chan.request_ready {
            return None;
        }
        chan.request_ready = false;
        let bytes = chan.request.clone();
        chan.request.clear();
        Some(bytes)
    })
}

fn stage_answer(bytes: &[u8]) {
    critical_section::with(|cs| {
        let mut slot = SLAVE.borrow(cs).borrow_mut();
        if let Some(chan) = slot.as_mut() {
            let _ = chan.adapter.stage_response(bytes);
        }
    });
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    defmt::info!("expansion-bus peripheral starting (digital-generic)");

    let p = embassy_stm32::init(Default::default());

    critical_section::with(|cs| {
        SLAVE.borrow(cs).borrow_mut().replace(SlaveChannel::new());
    });

    // Detect-out: released (pulled high) once this board has committed any
    // pending address assignment, so its downstream neighbour can start its
    // own arbitration step (§4.3/§4.4).
    let detect_out = Input::new(p.PB5, Pull::Up);

    I2C1.cr1().modify(|w| {
        w.set_pe(true);
        w.set_ack(Ack::ACK);
    });
    I2C1.oar1().modify(|w| w.set_add7_0(DEFAULT_ADDRESS));
    I2C1.cr2().modify(|w| {
        w.set_iterren(true);
        w.set_itevten(true);
    });

    let mut state = PeripheralState::Unaddressed;
    let mut watchdog = Watchdog::new();
    let mut family: DigitalFamily<8> = DigitalFamily::new();
    let version = FirmwareVersion {
        major: 0,
        minor: 1,
        release: 0,
    };
    let product: ProductString = "expansion-digital-generic".parse().unwrap_or_default();
    let mut nameplate = Nameplate::new(product.clone(), version, InMemoryNvm::default());

    defmt::info!("entering main loop");
    loop {
        Timer::after(Duration::from_millis(u64::from(WATCHDOG_TICK_MS))).await;

        if watchdog.tick(WATCHDOG_TICK_MS) {
            defmt::warn!("watchdog expired, restoring safe-state outputs");
            family.apply_watchdog_default();
        }

        state = state.commit_pending_assign(detect_out.is_high());

        if state == PeripheralState::ResetPending {
            Delay.delay_ms(protocol::constants::DETECT_HOLD_MS).await;
            state = state.finish_reset();
        }

        let Some(bytes) = take_ready_request() else {
            continue;
        };
        // The peripheral has no fixed (cmd, arg) expectation of its own --
        // it decodes whatever the controller sent -- so `parse`'s validation
        // is handed back exactly what's on the wire, and only the length
        // contract still does real work.
        let Some(&cmd_byte) = bytes.first() else {
            continue;
        };
        let Some(&arg_byte) = bytes.get(1) else {
            continue;
        };
        let Ok(cmd) = protocol::frame::Cmd::from_wire(cmd_byte) else {
            continue;
        };
        let Ok(arg) = protocol::frame::Arg::from_wire(arg_byte) else {
            continue;
        };
        let header_len = 3 + if cfg!(feature = "crc") { 1 } else { 0 };
        let payload_len = bytes.len().saturating_sub(header_len);
        let Ok(frame) = protocol::frame::parse(&bytes, cmd, arg, payload_len) else {
            continue;
        };
        // §4.7: any well-formed host frame resets the watchdog, not only the
        // opcodes that touch an output.
        watchdog.feed();

        if let Some(result) =
            dispatch_core(&frame, state, TypeTag::DigitalGeneric, version, &product, &mut nameplate)
        {
            match result {
                Ok((next_state, answer)) => {
                    state = next_state;
                    stage_answer(&answer);
                }
                Err(e) => defmt::warn!("core dispatch error: {}", defmt::Debug2Format(&e)),
            }
            continue;
        }

        match dispatch_digital(&frame, &mut family, &mut watchdog) {
            Ok(answer) => stage_answer(&answer),
            Err(e) => defmt::warn!("digital dispatch error: {}", defmt::Debug2Format(&e)),
        }
    }
}
