//! Ring indicator monitoring
//!
//! The modem pulls RING low on an incoming call, SMS or data URC. The task
//! below turns each falling edge into a [`RING`] notification so the main
//! loop can poll the modem instead of the UART being read speculatively.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use esp_hal::gpio::Input;
use log::debug;

/// Raised on every falling edge of the ring indicator.
pub static RING: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[embassy_executor::task]
pub async fn ring_task(mut ring: Input<'static>) {
    loop {
        ring.wait_for_falling_edge().await;
        debug!("Ring indicator asserted");
        RING.signal(());
    }
}
