#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use static_cell::StaticCell;

use tsim_core::bringup::{ReadyPolicy, Unpowered};
use tsim_core::modem::{ModemDriver, SELECTED_FAMILY};
use tsim_core::{BOARD, PrimaryModemType, selftest};
use tsim_firmware::hardware::{ModemPeripherals, init_modem_hardware};
use tsim_firmware::link::{ModemLink, ingress_task, init_at_link};
use tsim_firmware::ring::{RING, ring_task};
use tsim_firmware::settings;

type Modem = PrimaryModemType<ModemLink>;

/// Registration polls before attaching anyway
const REGISTRATION_POLLS: u32 = 30;
const REGISTRATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Park the firmware after an unrecoverable error; the log already says why.
async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");
    info!("{}", BOARD);

    let hardware = match init_modem_hardware(ModemPeripherals {
        uart: peripherals.UART1,
        tx: peripherals.GPIO26,
        rx: peripherals.GPIO27,
        dtr: peripherals.GPIO25,
        ring: peripherals.GPIO33,
        power_on: peripherals.GPIO12,
        power_key: peripherals.GPIO4,
        reset: peripherals.GPIO5,
    }) {
        Ok(hardware) => hardware,
        Err(e) => {
            error!("Modem UART configuration failed: {:?}", e);
            halt().await
        }
    };

    let (ingress, rx, link) = match init_at_link(hardware.uart) {
        Ok(parts) => parts,
        Err(e) => {
            error!("AT link setup failed: {:?}", e);
            halt().await
        }
    };
    match ingress_task(ingress, rx) {
        Ok(task) => spawner.spawn(task),
        Err(e) => {
            error!("AT ingress task not started: {:?}", e);
            halt().await
        }
    }

    match ring_task(hardware.ring) {
        Ok(task) => spawner.spawn(task),
        Err(e) => warn!("Ring indicator task not started: {:?}", e),
    }

    static MODEM: StaticCell<Modem> = StaticCell::new();
    let modem = MODEM.init(Modem::new(link));
    let mut delay = Delay;

    // Power sequencing: rail, reset, power key, wait for AT
    let ready = async {
        let mut powered = Unpowered::new(hardware.pins, &BOARD, SELECTED_FAMILY)
            .power_on(&mut delay)
            .await?;
        powered.reset(&mut delay).await?;
        powered
            .press_power_key(&mut delay)
            .await?
            .wait_ready(modem, &mut delay, &ReadyPolicy::default())
            .await
    }
    .await;
    let _ready = match ready {
        Ok(ready) => ready,
        Err(e) => {
            error!("Modem bring-up failed: {}", e);
            halt().await
        }
    };

    let settings = settings::config();
    match selftest::run(modem, settings.cellular.sim_pin()).await {
        Ok(report) => info!("Self test passed: {:?}", report),
        Err(e) => {
            error!("Modem self test failed: {}", e);
            halt().await
        }
    }

    for _ in 0..REGISTRATION_POLLS {
        match modem.registration().await {
            Ok(status) if status.is_registered() => {
                info!("Registered ({:?})", status);
                break;
            }
            Ok(status) => info!("Waiting for network ({:?})", status),
            Err(e) => warn!("Registration query failed: {}", e),
        }
        Timer::after(REGISTRATION_POLL_INTERVAL).await;
    }

    match modem.attach(&settings.cellular).await {
        Ok(()) => info!("Packet data attached"),
        Err(e) => error!("Packet data attach failed: {}", e),
    }

    if settings.gps {
        match modem.set_gps_power(true).await {
            Ok(()) => info!("GNSS receiver powered"),
            Err(e) => warn!("GNSS power on failed: {}", e),
        }
    }

    loop {
        match select(RING.wait(), Timer::after(STATUS_INTERVAL)).await {
            Either::First(()) => info!("Ring indicator: modem has pending events"),
            Either::Second(()) => {}
        }
        match modem.signal_quality().await {
            Ok(signal) => info!("Signal: {}", signal),
            Err(e) => warn!("Signal query failed: {}", e),
        }
    }
}
