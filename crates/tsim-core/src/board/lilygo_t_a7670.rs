//! LilyGO T-SIM A7670 (T-A7670E/G/SA) wiring
//!
//! Product page: <https://www.lilygo.cc/products/t-sim-a7670e>

use super::{
    AnalogPins, BoardDescriptor, BoardRevision, Level, ModemLink, Pin, PowerPins, SdCardPins,
    UartPort,
};

const PRODUCT_URL: &str = "https://www.lilygo.cc/products/t-sim-a7670e";

const MODEM_LINK: ModemLink = ModemLink {
    uart: UartPort::Uart1,
    baud_rate: 115_200,
    tx: Pin::new(26),
    rx: Pin::new(27),
    dtr: Some(Pin::new(25)),
    ring: Some(Pin::new(33)),
};

const POWER: PowerPins = PowerPins {
    // Must be HIGH for the modem rail to be supplied at all
    power_on: Pin::new(12),
    power_key: Pin::new(4),
    reset: Pin::new(5),
    reset_level: Level::High,
};

const SD_CARD: SdCardPins = SdCardPins {
    miso: Pin::new(2),
    mosi: Pin::new(15),
    sck: Pin::new(14),
    cs: Pin::new(13),
};

/// T-A7670 V1.4: adds the solar input divider on IO36.
pub const T_A7670_V1_4: BoardDescriptor = BoardDescriptor {
    name: "LilyGO T-A7670",
    revision: BoardRevision::V1_4,
    product_url: PRODUCT_URL,
    modem: MODEM_LINK,
    power: POWER,
    sd_card: Some(SD_CARD),
    analog: AnalogPins {
        adc: Some(Pin::new(35)),
        battery: Some(Pin::new(35)),
        solar: Some(Pin::new(36)),
    },
    gps_enable: None,
};

/// T-A7670 before V1.4; IO36 is not connected.
pub const T_A7670_LEGACY: BoardDescriptor = BoardDescriptor {
    revision: BoardRevision::Legacy,
    analog: AnalogPins {
        solar: None,
        ..T_A7670_V1_4.analog
    },
    ..T_A7670_V1_4
};
