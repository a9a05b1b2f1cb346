//! Post-boot checks of the modem link
//!
//! [`check_alive`] answers "is the UART wired and the modem on?". [`run`]
//! goes on to read the SIM, registration and signal state once the modem
//! answers.

use core::fmt;

use embassy_futures::select::{Either, select};
use embedded_hal_async::delay::DelayNs;
use log::{debug, info};
use thiserror_no_std::Error;

use crate::board::{BoardDescriptor, Level, Pin, Signal, UartPort};
use crate::modem::{AtError, ModemDriver, ModemFamily, RegistrationStatus, SignalQuality, SimStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelfTestError {
    #[error("no answer to AT after {attempts} attempts")]
    Unresponsive { attempts: u8 },
    #[error("SIM card not inserted")]
    NoSim,
    #[error("SIM is PUK locked")]
    SimLocked,
    #[error("SIM needs a PIN and none is configured")]
    PinRequired,
    #[error("AT command failed: {0}")]
    At(#[from] AtError),
}

/// Send `AT` up to `attempts` times, waiting at most `timeout_ms` for each
/// reply. Returns the attempt (1-based) that succeeded.
pub async fn check_alive<M: ModemDriver, D: DelayNs>(
    modem: &mut M,
    delay: &mut D,
    attempts: u8,
    timeout_ms: u32,
) -> Result<u8, SelfTestError> {
    for attempt in 1..=attempts {
        match select(modem.test_at(), delay.delay_ms(timeout_ms)).await {
            Either::First(Ok(())) => return Ok(attempt),
            Either::First(Err(e)) => debug!("AT attempt {}: {}", attempt, e),
            Either::Second(()) => debug!("AT attempt {} timed out", attempt),
        }
    }
    Err(SelfTestError::Unresponsive { attempts })
}

/// Wiring facts to check when the modem stays silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnosis {
    pub family: ModemFamily,
    pub uart: UartPort,
    pub baud_rate: u32,
    pub tx: Pin,
    pub rx: Pin,
    pub power_on: Pin,
    pub power_key: Pin,
    pub reset: Pin,
    pub reset_level: Level,
}

impl Diagnosis {
    pub const fn for_board(board: &BoardDescriptor, family: ModemFamily) -> Self {
        Self {
            family,
            uart: board.modem.uart,
            baud_rate: board.modem.baud_rate,
            tx: board.modem.tx,
            rx: board.modem.rx,
            power_on: board.power.power_on,
            power_key: board.power.power_key,
            reset: board.power.reset,
            reset_level: board.power.reset_level,
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} did not answer AT on {:?} at {} baud. Check:",
            self.family.name(),
            self.uart,
            self.baud_rate
        )?;
        writeln!(
            f,
            "  {} ({}) is driven high to enable the modem supply",
            Signal::PowerOn.label(),
            self.power_on
        )?;
        writeln!(
            f,
            "  {} ({}) reaches the modem PWRKEY",
            Signal::PowerKey.label(),
            self.power_key
        )?;
        writeln!(
            f,
            "  {} ({}) is not held at its active level ({:?})",
            Signal::ModemReset.label(),
            self.reset,
            self.reset_level
        )?;
        writeln!(
            f,
            "  {} ({}) and {} ({}) are not swapped",
            Signal::ModemTx.label(),
            self.tx,
            Signal::ModemRx.label(),
            self.rx
        )?;
        write!(f, "  the modem UART is set to {} baud", self.baud_rate)
    }
}

/// State of a modem that answered the self test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestReport {
    pub family: ModemFamily,
    pub sim: SimStatus,
    pub registration: RegistrationStatus,
    pub signal: SignalQuality,
}

/// Configure the modem and read its SIM, registration and signal state,
/// unlocking the SIM with `sim_pin` when it asks for one.
pub async fn run<M: ModemDriver>(
    modem: &mut M,
    sim_pin: Option<&str>,
) -> Result<SelfTestReport, SelfTestError> {
    modem.init().await?;

    let sim = match modem.sim_status().await? {
        SimStatus::NotInserted => return Err(SelfTestError::NoSim),
        SimStatus::PukRequired => return Err(SelfTestError::SimLocked),
        SimStatus::PinRequired => {
            let pin = sim_pin.ok_or(SelfTestError::PinRequired)?;
            modem.unlock_sim(pin).await?;
            modem.sim_status().await?
        }
        status => status,
    };

    let registration = modem.registration().await?;
    let signal = modem.signal_quality().await?;

    let report = SelfTestReport {
        family: M::FAMILY,
        sim,
        registration,
        signal,
    };
    info!(
        "{} self test: SIM {:?}, network {:?}, signal {}",
        report.family.name(),
        report.sim,
        report.registration,
        report.signal
    );
    Ok(report)
}
