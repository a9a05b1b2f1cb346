//! Board descriptors for the LilyGO T-SIM A7670 family
//!
//! A [`BoardDescriptor`] is the complete physical wiring of one board
//! revision: which ESP32 GPIO drives each modem control line, which UART
//! carries the AT link and at what speed, and which optional peripherals
//! (SD card, analog inputs, GPS enable) are wired at all.
//!
//! Exactly one descriptor is published as [`BOARD`], selected by the
//! `board-*` cargo feature. It is validated in a `const` item, so an
//! inconsistent wiring table fails the build rather than the modem boot.
//!
//! # Optional signals
//!
//! A signal that is not wired on a revision is `None`. The raw `-1`
//! convention used by vendor pin tables is accepted by [`Pin::from_raw`]
//! and produced by [`Pin::to_raw`], but never stored.

mod lilygo_t_a7670;

pub use lilygo_t_a7670::{T_A7670_LEGACY, T_A7670_V1_4};

use core::fmt;
use core::ops::Not;

use thiserror_no_std::Error;

/// Highest GPIO number on the ESP32
pub const MAX_GPIO: u8 = 39;

/// First input-only GPIO on the ESP32 (34..=39 have no output driver)
pub const FIRST_INPUT_ONLY_GPIO: u8 = 34;

/// Raw value used by vendor pin tables for "not wired"
pub const NOT_WIRED: i32 = -1;

#[cfg(all(feature = "board-v1-4", feature = "board-legacy"))]
compile_error!("features `board-v1-4` and `board-legacy` are mutually exclusive");

#[cfg(not(any(feature = "board-v1-4", feature = "board-legacy")))]
compile_error!("select a board revision: enable `board-v1-4` or `board-legacy`");

/// Descriptor of the board this build targets.
#[cfg(feature = "board-v1-4")]
pub const BOARD: BoardDescriptor = T_A7670_V1_4;

/// Descriptor of the board this build targets.
#[cfg(all(feature = "board-legacy", not(feature = "board-v1-4")))]
pub const BOARD: BoardDescriptor = T_A7670_LEGACY;

const _: () = match BOARD.validate() {
    Ok(()) => (),
    Err(_) => panic!("selected board descriptor is inconsistent"),
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    #[error("GPIO{0} does not exist on the ESP32")]
    OutOfRange(i32),
    #[error("GPIO{0} is not bonded out on the ESP32")]
    NotBonded(u8),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("modem baud rate must be non-zero")]
    ZeroBaudRate,
    #[error("{signal:?} is an output but GPIO{pin} is input-only")]
    InputOnlyOutput { signal: Signal, pin: u8 },
    #[error("{first:?} and {second:?} are both wired to GPIO{pin}")]
    PinConflict {
        first: Signal,
        second: Signal,
        pin: u8,
    },
}

/// A validated ESP32 GPIO number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin(u8);

impl Pin {
    /// Create a pin from a GPIO number.
    ///
    /// Panics on an invalid number; in a `const` context that is a build error.
    pub const fn new(gpio: u8) -> Self {
        match Self::try_new(gpio) {
            Ok(pin) => pin,
            Err(_) => panic!("invalid ESP32 GPIO number"),
        }
    }

    pub const fn try_new(gpio: u8) -> Result<Self, PinError> {
        if gpio > MAX_GPIO {
            return Err(PinError::OutOfRange(gpio as i32));
        }
        // GPIO20, 24 and 28..=31 are not bonded out of the ESP32 package
        if gpio == 20 || gpio == 24 || (gpio >= 28 && gpio <= 31) {
            return Err(PinError::NotBonded(gpio));
        }
        Ok(Self(gpio))
    }

    /// Convert a raw vendor table value where `-1` means "not wired".
    pub const fn from_raw(raw: i32) -> Result<Option<Self>, PinError> {
        if raw == NOT_WIRED {
            return Ok(None);
        }
        if raw < 0 || raw > MAX_GPIO as i32 {
            return Err(PinError::OutOfRange(raw));
        }
        match Self::try_new(raw as u8) {
            Ok(pin) => Ok(Some(pin)),
            Err(e) => Err(e),
        }
    }

    /// Inverse of [`Pin::from_raw`].
    pub const fn to_raw(pin: Option<Self>) -> i32 {
        match pin {
            Some(pin) => pin.0 as i32,
            None => NOT_WIRED,
        }
    }

    pub const fn number(self) -> u8 {
        self.0
    }

    /// GPIO34..=39 can only be used as inputs.
    pub const fn is_input_only(self) -> bool {
        self.0 >= FIRST_INPUT_ONLY_GPIO
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Logic level of a control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Not for Level {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// Hardware UART the modem AT link is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartPort {
    Uart0,
    Uart1,
    Uart2,
}

/// Every signal a board descriptor can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    ModemTx,
    ModemRx,
    ModemDtr,
    ModemRing,
    PowerOn,
    PowerKey,
    ModemReset,
    SdMiso,
    SdMosi,
    SdSck,
    SdCs,
    Adc,
    BatteryAdc,
    SolarAdc,
    GpsEnable,
}

impl Signal {
    /// Name as printed on the vendor pin table.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ModemTx => "MODEM_TX",
            Self::ModemRx => "MODEM_RX",
            Self::ModemDtr => "MODEM_DTR",
            Self::ModemRing => "MODEM_RING",
            Self::PowerOn => "BOARD_POWERON",
            Self::PowerKey => "BOARD_PWRKEY",
            Self::ModemReset => "MODEM_RESET",
            Self::SdMiso => "BOARD_MISO",
            Self::SdMosi => "BOARD_MOSI",
            Self::SdSck => "BOARD_SCK",
            Self::SdCs => "BOARD_SD_CS",
            Self::Adc => "BOARD_ADC",
            Self::BatteryAdc => "BOARD_BAT_ADC",
            Self::SolarAdc => "BOARD_SOLAR_ADC",
            Self::GpsEnable => "MODEM_GPS_ENABLE",
        }
    }
}

/// Hardware revision of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardRevision {
    /// Revisions before V1.4; IO36 is not connected.
    Legacy,
    V1_4,
}

/// Serial link between the ESP32 and the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemLink {
    pub uart: UartPort,
    pub baud_rate: u32,
    pub tx: Pin,
    pub rx: Pin,
    /// Sleep control; high lets the modem enter sleep.
    pub dtr: Option<Pin>,
    /// Ring indicator; pulled low by the modem on incoming calls and SMS.
    pub ring: Option<Pin>,
}

/// Modem power and reset wiring
///
/// The power rail (`power_on`) must be driven high before the power key is
/// pulsed; [`crate::bringup`] enforces that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerPins {
    pub power_on: Pin,
    pub power_key: Pin,
    pub reset: Pin,
    pub reset_level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdCardPins {
    pub miso: Pin,
    pub mosi: Pin,
    pub sck: Pin,
    pub cs: Pin,
}

/// ADC inputs. Several channels may sample the same pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogPins {
    pub adc: Option<Pin>,
    pub battery: Option<Pin>,
    pub solar: Option<Pin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsEnable {
    pub pin: Pin,
    pub level: Level,
}

/// Complete wiring of one board revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardDescriptor {
    pub name: &'static str,
    pub revision: BoardRevision,
    pub product_url: &'static str,
    pub modem: ModemLink,
    pub power: PowerPins,
    pub sd_card: Option<SdCardPins>,
    pub analog: AnalogPins,
    pub gps_enable: Option<GpsEnable>,
}

/// Number of entries returned by [`BoardDescriptor::signals`].
pub const SIGNAL_COUNT: usize = 15;

const OUTPUT_COUNT: usize = 9;
const INPUT_COUNT: usize = 3;

impl BoardDescriptor {
    /// Every signal and the pin it is wired to, in pin-table order.
    pub const fn signals(&self) -> [(Signal, Option<Pin>); SIGNAL_COUNT] {
        let sd = self.sd_card;
        [
            (Signal::ModemDtr, self.modem.dtr),
            (Signal::ModemTx, Some(self.modem.tx)),
            (Signal::ModemRx, Some(self.modem.rx)),
            (Signal::PowerKey, Some(self.power.power_key)),
            (Signal::Adc, self.analog.adc),
            (Signal::PowerOn, Some(self.power.power_on)),
            (Signal::ModemRing, self.modem.ring),
            (Signal::ModemReset, Some(self.power.reset)),
            (Signal::SdMiso, sd_pin(sd, Signal::SdMiso)),
            (Signal::SdMosi, sd_pin(sd, Signal::SdMosi)),
            (Signal::SdSck, sd_pin(sd, Signal::SdSck)),
            (Signal::SdCs, sd_pin(sd, Signal::SdCs)),
            (Signal::BatteryAdc, self.analog.battery),
            (Signal::SolarAdc, self.analog.solar),
            (Signal::GpsEnable, gps_pin(self.gps_enable)),
        ]
    }

    /// Pin wired to `signal`, if any.
    pub const fn pin(&self, signal: Signal) -> Option<Pin> {
        let signals = self.signals();
        let mut i = 0;
        while i < SIGNAL_COUNT {
            if signals[i].0 as u8 == signal as u8 {
                return signals[i].1;
            }
            i += 1;
        }
        None
    }

    /// Check that the wiring table is internally consistent.
    ///
    /// Outputs must be output-capable and must not share a pin with any
    /// other digital signal. Analog inputs may share pins with each other.
    pub const fn validate(&self) -> Result<(), DescriptorError> {
        if self.modem.baud_rate == 0 {
            return Err(DescriptorError::ZeroBaudRate);
        }

        let sd = self.sd_card;
        let outputs: [(Signal, Option<Pin>); OUTPUT_COUNT] = [
            (Signal::ModemTx, Some(self.modem.tx)),
            (Signal::ModemDtr, self.modem.dtr),
            (Signal::PowerOn, Some(self.power.power_on)),
            (Signal::PowerKey, Some(self.power.power_key)),
            (Signal::ModemReset, Some(self.power.reset)),
            (Signal::SdMosi, sd_pin(sd, Signal::SdMosi)),
            (Signal::SdSck, sd_pin(sd, Signal::SdSck)),
            (Signal::SdCs, sd_pin(sd, Signal::SdCs)),
            (Signal::GpsEnable, gps_pin(self.gps_enable)),
        ];
        let inputs: [(Signal, Option<Pin>); INPUT_COUNT] = [
            (Signal::ModemRx, Some(self.modem.rx)),
            (Signal::ModemRing, self.modem.ring),
            (Signal::SdMiso, sd_pin(sd, Signal::SdMiso)),
        ];

        let mut i = 0;
        while i < OUTPUT_COUNT {
            if let (signal, Some(pin)) = outputs[i] {
                if pin.is_input_only() {
                    return Err(DescriptorError::InputOnlyOutput {
                        signal,
                        pin: pin.number(),
                    });
                }

                let mut j = i + 1;
                while j < OUTPUT_COUNT {
                    if let (other, Some(other_pin)) = outputs[j] {
                        if other_pin.number() == pin.number() {
                            return Err(DescriptorError::PinConflict {
                                first: signal,
                                second: other,
                                pin: pin.number(),
                            });
                        }
                    }
                    j += 1;
                }

                let mut k = 0;
                while k < INPUT_COUNT {
                    if let (input, Some(input_pin)) = inputs[k] {
                        if input_pin.number() == pin.number() {
                            return Err(DescriptorError::PinConflict {
                                first: signal,
                                second: input,
                                pin: pin.number(),
                            });
                        }
                    }
                    k += 1;
                }
            }
            i += 1;
        }

        Ok(())
    }
}

impl fmt::Display for BoardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({:?})", self.name, self.revision)?;
        writeln!(
            f,
            "  {:<18} {:?} @ {} baud",
            "MODEM_UART", self.modem.uart, self.modem.baud_rate
        )?;
        for (signal, pin) in self.signals() {
            match pin {
                Some(pin) => writeln!(f, "  {:<18} {}", signal.label(), pin)?,
                None => writeln!(f, "  {:<18} not wired", signal.label())?,
            }
        }
        let level = match self.power.reset_level {
            Level::High => "HIGH",
            Level::Low => "LOW",
        };
        write!(f, "  {:<18} {}", "MODEM_RESET_LEVEL", level)
    }
}

const fn sd_pin(sd: Option<SdCardPins>, signal: Signal) -> Option<Pin> {
    match sd {
        Some(sd) => match signal {
            Signal::SdMiso => Some(sd.miso),
            Signal::SdMosi => Some(sd.mosi),
            Signal::SdSck => Some(sd.sck),
            Signal::SdCs => Some(sd.cs),
            _ => None,
        },
        None => None,
    }
}

const fn gps_pin(gps: Option<GpsEnable>) -> Option<Pin> {
    match gps {
        Some(gps) => Some(gps.pin),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::string::ToString;

    #[test]
    fn test_pin_validation() {
        assert_eq!(Pin::try_new(26), Ok(Pin::new(26)));
        assert_eq!(Pin::try_new(40), Err(PinError::OutOfRange(40)));
        assert_eq!(Pin::try_new(20), Err(PinError::NotBonded(20)));
        assert_eq!(Pin::try_new(30), Err(PinError::NotBonded(30)));
        assert!(Pin::new(35).is_input_only());
        assert!(!Pin::new(33).is_input_only());
    }

    #[test]
    fn test_sentinel_conversion() {
        assert_eq!(Pin::from_raw(-1), Ok(None));
        assert_eq!(Pin::from_raw(36), Ok(Some(Pin::new(36))));
        assert_eq!(Pin::from_raw(-2), Err(PinError::OutOfRange(-2)));
        assert_eq!(Pin::from_raw(64), Err(PinError::OutOfRange(64)));
        assert_eq!(Pin::to_raw(None), NOT_WIRED);
        assert_eq!(Pin::to_raw(Some(Pin::new(12))), 12);
    }

    #[test]
    fn test_optional_signals_are_sentinel_or_valid() {
        for board in [T_A7670_V1_4, T_A7670_LEGACY] {
            for (signal, pin) in board.signals() {
                let raw = Pin::to_raw(pin);
                assert!(
                    raw == NOT_WIRED || Pin::try_new(raw as u8).is_ok(),
                    "{:?} has raw value {}",
                    signal,
                    raw
                );
                assert_eq!(Pin::from_raw(raw), Ok(pin));
            }
        }
    }

    #[test]
    fn test_mandatory_fields_present() {
        let board = BOARD;
        assert!(board.modem.baud_rate > 0);
        for signal in [
            Signal::ModemTx,
            Signal::ModemRx,
            Signal::PowerOn,
            Signal::PowerKey,
            Signal::ModemReset,
        ] {
            assert!(board.pin(signal).is_some(), "{:?} must be wired", signal);
        }
    }

    #[test]
    fn test_t_a7670_wiring() {
        let board = T_A7670_V1_4;
        assert_eq!(board.modem.baud_rate, 115_200);
        assert_eq!(board.modem.uart, UartPort::Uart1);
        assert_eq!(board.pin(Signal::ModemDtr), Some(Pin::new(25)));
        assert_eq!(board.pin(Signal::ModemTx), Some(Pin::new(26)));
        assert_eq!(board.pin(Signal::ModemRx), Some(Pin::new(27)));
        assert_eq!(board.pin(Signal::PowerKey), Some(Pin::new(4)));
        assert_eq!(board.pin(Signal::PowerOn), Some(Pin::new(12)));
        assert_eq!(board.pin(Signal::ModemRing), Some(Pin::new(33)));
        assert_eq!(board.pin(Signal::ModemReset), Some(Pin::new(5)));
        assert_eq!(board.power.reset_level, Level::High);
        assert_eq!(board.pin(Signal::SdCs), Some(Pin::new(13)));
        assert_eq!(board.pin(Signal::BatteryAdc), Some(Pin::new(35)));
        assert_eq!(board.pin(Signal::GpsEnable), None);
    }

    #[test]
    fn test_solar_adc_only_on_v1_4() {
        assert_eq!(T_A7670_V1_4.pin(Signal::SolarAdc), Some(Pin::new(36)));
        assert_eq!(T_A7670_LEGACY.pin(Signal::SolarAdc), None);
    }

    #[test]
    fn test_shipped_descriptors_validate() {
        assert_eq!(T_A7670_V1_4.validate(), Ok(()));
        assert_eq!(T_A7670_LEGACY.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_input_only_output() {
        let mut board = T_A7670_V1_4;
        board.power.power_on = Pin::new(34);
        assert_eq!(
            board.validate(),
            Err(DescriptorError::InputOnlyOutput {
                signal: Signal::PowerOn,
                pin: 34
            })
        );
    }

    #[test]
    fn test_validate_rejects_shared_outputs() {
        let mut board = T_A7670_V1_4;
        board.power.reset = board.power.power_key;
        assert_eq!(
            board.validate(),
            Err(DescriptorError::PinConflict {
                first: Signal::PowerKey,
                second: Signal::ModemReset,
                pin: 4
            })
        );
    }

    #[test]
    fn test_validate_rejects_output_on_input() {
        let mut board = T_A7670_V1_4;
        board.modem.dtr = board.modem.ring;
        assert_eq!(
            board.validate(),
            Err(DescriptorError::PinConflict {
                first: Signal::ModemDtr,
                second: Signal::ModemRing,
                pin: 33
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_baud() {
        let mut board = T_A7670_V1_4;
        board.modem.baud_rate = 0;
        assert_eq!(board.validate(), Err(DescriptorError::ZeroBaudRate));
    }

    #[test]
    fn test_shared_analog_pin_is_allowed() {
        let board = T_A7670_V1_4;
        assert_eq!(board.analog.adc, board.analog.battery);
        assert_eq!(board.validate(), Ok(()));
    }

    #[test]
    fn test_reset_level_inverts() {
        assert_eq!(!Level::High, Level::Low);
        assert_eq!(!Level::Low, Level::High);
    }

    #[test]
    fn test_display_lists_every_signal() {
        let table = T_A7670_LEGACY.to_string();
        for (signal, _) in T_A7670_LEGACY.signals() {
            assert!(table.contains(signal.label()), "missing {}", signal.label());
        }
        assert!(table.contains("BOARD_SOLAR_ADC    not wired"));
        assert!(table.contains("MODEM_TX           GPIO26"));
    }
}
