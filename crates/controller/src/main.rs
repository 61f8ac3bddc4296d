//! Expansion-bus controller — Main Entry Point
//!
//! Hardware-only entry point for the STM32F407 reference controller board.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, Ordering};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::time::Hertz;
use embassy_time::{Delay, Duration, Timer};

use controller::bus::ChainBus;
use controller::registry::ExpansionRegistry;
use controller::{discover_chain, Dispatcher};

// Panic handler
use panic_probe as _;

// Heartbeat flag the main loop feeds its own watchdog from. When the
// discovery/dispatch task set becomes multi-task, each task gets its own
// flag and the watchdog-feed check below must AND them all together --
// see crates/controller/src/main.rs history for the pattern this follows.
static TASK_ALIVE_MAIN: AtomicBool = AtomicBool::new(true);

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    defmt::info!("expansion-bus controller starting");

    let p = embassy_stm32::init(Default::default());

    let mut watchdog = embassy_stm32::wdg::IndependentWatchdog::new(
        p.IWDG,
        8_000_000, // 8s timeout, microseconds
    );
    watchdog.unleash();
    defmt::info!("IWDG watchdog armed");

    // I2C1: bus shared by every expansion on the chain.
    let i2c = I2c::new_blocking(p.I2C1, p.PB6, p.PB7, Hertz(controller::config::I2C_FREQUENCY_HZ));

    // Detect-enable: low pulse tells the first unaddressed peripheral it may
    // claim the default address and hand the signal downstream (§4.3).
    let detect_enable = Output::new(p.PA4, Level::High, Speed::Low);

    let mut bus = ChainBus::new(i2c, detect_enable, Delay);

    defmt::info!("running chain discovery");
    let discovered = match discover_chain(&mut bus).await {
        Ok(found) => found,
        Err(e) => {
            defmt::error!("discovery failed: {}", defmt::Debug2Format(&e));
            heapless::Vec::new()
        }
    };
    defmt::info!("discovery found {=usize} expansion(s)", discovered.len());

    let mut registry = ExpansionRegistry::new();
    let _ = registry.reconcile(&discovered);

    let mut dispatcher = Dispatcher::new(bus, registry, Delay);

    // "After discovery" reconciliation (§4.3): resolve Custom/Invalid type
    // tags to a product string, pull firmware version, then either replay the
    // saved configuration shadow or push the platform default (R1), and
    // finally let any registered factory know about its slots.
    for expansion in discovered.iter() {
        if expansion.type_tag.needs_product_lookup() {
            if let Ok(product) = dispatcher.get_product_type(expansion.index).await {
                if let Some(slot) = dispatcher.registry_mut().get_mut(expansion.index) {
                    slot.product = Some(product);
                }
            }
        }

        let version = dispatcher.get_version(expansion.index).await.ok();
        if let Some(slot) = dispatcher.registry_mut().get_mut(expansion.index) {
            slot.firmware_version = version;
        }
        if let Some(v) = version {
            defmt::info!(
                "expansion {=usize}: addr={=u8:#x} fw={=u8}.{=u8}.{=u8}",
                expansion.index,
                expansion.address,
                v.major,
                v.minor,
                v.release
            );
        }

        let is_fresh = dispatcher
            .registry()
            .get(expansion.index)
            .is_some_and(controller::registry::ExpansionSlot::is_fresh);
        if is_fresh {
            defmt::info!("expansion {=usize}: fresh slot, pushing platform default", expansion.index);
            // Platform default config is the responsibility of the typed
            // family handle (C7/ops) once it begins a channel; a slot with no
            // prior shadow entries simply starts with every channel at its
            // post-reset default and nothing to replay.
        } else if dispatcher.replay_shadow(expansion.index).await.is_err() {
            defmt::error!("expansion {=usize}: shadow replay failed", expansion.index);
        }
    }

    dispatcher.registry_mut().invoke_startup_callbacks();

    defmt::info!("entering main loop");
    loop {
        Timer::after(Duration::from_secs(1)).await;
        TASK_ALIVE_MAIN.store(true, Ordering::Release);

        if TASK_ALIVE_MAIN.swap(false, Ordering::AcqRel) {
            watchdog.pet();
        } else {
            defmt::error!("heartbeat missing -- watchdog not fed, reset imminent");
        }
    }
}
