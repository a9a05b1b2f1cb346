//! Modem link initialization for the T-SIM A7670
//!
//! `esp-hal` hands out each GPIO as its own type, so the pins are named
//! here concretely and tied back to [`BOARD`] by compile-time checks. A
//! descriptor that moves a modem signal fails the firmware build until this
//! table follows.

use esp_hal::Async;
use esp_hal::gpio::{Input, InputConfig, Level as GpioLevel, Output, OutputConfig, Pull};
use esp_hal::peripherals::{GPIO4, GPIO5, GPIO12, GPIO25, GPIO26, GPIO27, GPIO33, UART1};
use esp_hal::uart::{Config as UartConfig, ConfigError, Uart};
use log::info;
use tsim_core::BOARD;
use tsim_core::board::{Level, Pin, UartPort};
use tsim_core::bringup::ModemPins;

const fn wired_to(pin: Option<Pin>, gpio: u8) -> bool {
    match pin {
        Some(pin) => pin.number() == gpio,
        None => false,
    }
}

const _: () = {
    assert!(matches!(BOARD.modem.uart, UartPort::Uart1), "modem UART moved");
    assert!(BOARD.modem.tx.number() == 26, "MODEM_TX moved");
    assert!(BOARD.modem.rx.number() == 27, "MODEM_RX moved");
    assert!(wired_to(BOARD.modem.dtr, 25), "MODEM_DTR moved");
    assert!(wired_to(BOARD.modem.ring, 33), "MODEM_RING moved");
    assert!(BOARD.power.power_on.number() == 12, "BOARD_POWERON moved");
    assert!(BOARD.power.power_key.number() == 4, "BOARD_PWRKEY moved");
    assert!(BOARD.power.reset.number() == 5, "MODEM_RESET moved");
};

/// Peripherals claimed by the modem link
pub struct ModemPeripherals {
    pub uart: UART1<'static>,
    pub tx: GPIO26<'static>,
    pub rx: GPIO27<'static>,
    pub dtr: GPIO25<'static>,
    pub ring: GPIO33<'static>,
    pub power_on: GPIO12<'static>,
    pub power_key: GPIO4<'static>,
    pub reset: GPIO5<'static>,
}

/// Initialized modem link
pub struct ModemHardware {
    pub uart: Uart<'static, Async>,
    pub pins: ModemPins<Output<'static>>,
    pub ring: Input<'static>,
}

fn gpio_level(level: Level) -> GpioLevel {
    match level {
        Level::Low => GpioLevel::Low,
        Level::High => GpioLevel::High,
    }
}

/// Configure the modem UART and control lines.
///
/// Every output starts inactive: rail off, power key released, reset
/// released and DTR low (modem awake).
pub fn init_modem_hardware(p: ModemPeripherals) -> Result<ModemHardware, ConfigError> {
    let uart = Uart::new(
        p.uart,
        UartConfig::default().with_baudrate(BOARD.modem.baud_rate),
    )?
    .with_tx(p.tx)
    .with_rx(p.rx)
    .into_async();
    info!(
        "Modem UART on {:?} at {} baud",
        BOARD.modem.uart, BOARD.modem.baud_rate
    );

    let pins = ModemPins {
        power_on: Output::new(p.power_on, GpioLevel::Low, OutputConfig::default()),
        power_key: Output::new(p.power_key, GpioLevel::Low, OutputConfig::default()),
        reset: Output::new(
            p.reset,
            gpio_level(!BOARD.power.reset_level),
            OutputConfig::default(),
        ),
        dtr: Some(Output::new(p.dtr, GpioLevel::Low, OutputConfig::default())),
    };

    let ring = Input::new(p.ring, InputConfig::default().with_pull(Pull::Up));

    Ok(ModemHardware { uart, pins, ring })
}
