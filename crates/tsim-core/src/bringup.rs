//! Modem power-up sequencing
//!
//! The modem only boots if its power rail is stable before the power key is
//! pulsed. That order is encoded in the types: the power key can only be
//! pressed through a [`Powered`] handle, and a [`Powered`] handle can only be
//! obtained from [`Unpowered::power_on`].
//!
//! ```text
//! Unpowered --power_on--> Powered --press_power_key--> Booting --wait_ready--> Ready
//!     ^                      |                                                 |
//!     +------power_off-------+------------------power_off---------------------+
//! ```

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::board::{BoardDescriptor, Level, Signal};
use crate::modem::{ModemDriver, ModemFamily};
use crate::selftest::{self, Diagnosis};

#[derive(Error, Debug)]
pub enum BringUpError<E> {
    #[error("GPIO error: {0:?}")]
    Gpio(E),
    #[error("{0:?} is not wired on this board")]
    NotWired(Signal),
    #[error("{0}")]
    Unresponsive(Diagnosis),
}

/// Delays of the power-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTimings {
    /// After enabling the power rail
    pub power_settle: Duration,
    /// Reset line inactive before the reset pulse
    pub reset_release: Duration,
    /// Reset line held at its active level
    pub reset_hold: Duration,
    /// Power key held high
    pub power_key_pulse: Duration,
}

impl PowerTimings {
    pub const fn from_millis(
        power_settle: u64,
        reset_release: u64,
        reset_hold: u64,
        power_key_pulse: u64,
    ) -> Self {
        Self {
            power_settle: Duration::from_millis(power_settle),
            reset_release: Duration::from_millis(reset_release),
            reset_hold: Duration::from_millis(reset_hold),
            power_key_pulse: Duration::from_millis(power_key_pulse),
        }
    }

    pub const fn power_key_pulse_ms(&self) -> u32 {
        self.power_key_pulse.as_millis() as u32
    }

    pub const fn reset_hold_ms(&self) -> u32 {
        self.reset_hold.as_millis() as u32
    }
}

/// How long [`Booting::wait_ready`] keeps trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPolicy {
    /// `AT` attempts before the power key is pressed again
    pub attempts_per_press: u8,
    /// Power key presses, including the first one, before giving up
    pub max_presses: u8,
    /// Time to wait for each `AT` reply
    pub attempt_timeout_ms: u32,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            attempts_per_press: 10,
            max_presses: 3,
            attempt_timeout_ms: 1000,
        }
    }
}

/// Output pins driving the modem's control lines.
pub struct ModemPins<O> {
    pub power_on: O,
    pub power_key: O,
    pub reset: O,
    /// Sleep control, when wired
    pub dtr: Option<O>,
}

struct Sequencer<O> {
    pins: ModemPins<O>,
    reset_level: Level,
    timings: PowerTimings,
    diagnosis: Diagnosis,
}

impl<O: OutputPin> Sequencer<O> {
    async fn pulse_power_key<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), BringUpError<O::Error>> {
        debug!("Pulsing power key");
        drive(&mut self.pins.power_key, Level::Low)?;
        delay.delay_ms(100).await;
        drive(&mut self.pins.power_key, Level::High)?;
        delay.delay_ms(self.timings.power_key_pulse_ms()).await;
        drive(&mut self.pins.power_key, Level::Low)
    }

    fn power_off(mut self) -> Result<Unpowered<O>, BringUpError<O::Error>> {
        info!("Disabling modem power rail");
        drive(&mut self.pins.power_on, Level::Low)?;
        Ok(Unpowered { seq: self })
    }
}

fn drive<O: OutputPin>(pin: &mut O, level: Level) -> Result<(), BringUpError<O::Error>> {
    match level {
        Level::High => pin.set_high(),
        Level::Low => pin.set_low(),
    }
    .map_err(BringUpError::Gpio)
}

/// Modem rail off. Starting state.
pub struct Unpowered<O> {
    seq: Sequencer<O>,
}

impl<O: OutputPin> Unpowered<O> {
    /// Sequencer for `family` wired as described by `board`.
    pub fn new(pins: ModemPins<O>, board: &BoardDescriptor, family: ModemFamily) -> Self {
        Self::with_timings(pins, board, family, family.power_timings())
    }

    pub fn with_timings(
        pins: ModemPins<O>,
        board: &BoardDescriptor,
        family: ModemFamily,
        timings: PowerTimings,
    ) -> Self {
        Self {
            seq: Sequencer {
                pins,
                reset_level: board.power.reset_level,
                timings,
                diagnosis: Diagnosis::for_board(board, family),
            },
        }
    }

    /// Enable the modem power rail and wait for it to settle.
    pub async fn power_on<D: DelayNs>(
        mut self,
        delay: &mut D,
    ) -> Result<Powered<O>, BringUpError<O::Error>> {
        info!("Enabling modem power rail");
        drive(&mut self.seq.pins.power_on, Level::High)?;
        drive(&mut self.seq.pins.reset, !self.seq.reset_level)?;
        drive(&mut self.seq.pins.power_key, Level::Low)?;
        // DTR low keeps the modem awake
        if let Some(dtr) = self.seq.pins.dtr.as_mut() {
            drive(dtr, Level::Low)?;
        }
        delay
            .delay_ms(self.seq.timings.power_settle.as_millis() as u32)
            .await;
        Ok(Powered { seq: self.seq })
    }

    /// Give the pins back.
    pub fn release(self) -> ModemPins<O> {
        self.seq.pins
    }
}

/// Modem rail on, modem not started.
pub struct Powered<O> {
    seq: Sequencer<O>,
}

impl<O: OutputPin> Powered<O> {
    /// Pulse the reset line to its active level.
    pub async fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), BringUpError<O::Error>> {
        let active = self.seq.reset_level;
        debug!("Resetting modem (active {:?})", active);
        drive(&mut self.seq.pins.reset, !active)?;
        delay
            .delay_ms(self.seq.timings.reset_release.as_millis() as u32)
            .await;
        drive(&mut self.seq.pins.reset, active)?;
        delay.delay_ms(self.seq.timings.reset_hold_ms()).await;
        drive(&mut self.seq.pins.reset, !active)
    }

    /// Pulse the power key to start the modem.
    pub async fn press_power_key<D: DelayNs>(
        mut self,
        delay: &mut D,
    ) -> Result<Booting<O>, BringUpError<O::Error>> {
        self.seq.pulse_power_key(delay).await?;
        Ok(Booting { seq: self.seq })
    }

    pub fn power_off(self) -> Result<Unpowered<O>, BringUpError<O::Error>> {
        self.seq.power_off()
    }
}

/// Power key pressed, waiting for the modem to answer.
pub struct Booting<O> {
    seq: Sequencer<O>,
}

impl<O: OutputPin> Booting<O> {
    /// Poll the modem until it answers `AT`, pressing the power key again
    /// after every `policy.attempts_per_press` silent attempts. The press
    /// already made counts as the first; `max_presses` below 1 is taken as 1.
    pub async fn wait_ready<M: ModemDriver, D: DelayNs>(
        mut self,
        modem: &mut M,
        delay: &mut D,
        policy: &ReadyPolicy,
    ) -> Result<Ready<O>, BringUpError<O::Error>> {
        let max_presses = policy.max_presses.max(1);
        for press in 1..=max_presses {
            match selftest::check_alive(
                modem,
                delay,
                policy.attempts_per_press,
                policy.attempt_timeout_ms,
            )
            .await
            {
                Ok(attempt) => {
                    info!(
                        "{} answered after {} press(es), attempt {}",
                        M::FAMILY.name(),
                        press,
                        attempt
                    );
                    return Ok(Ready { seq: self.seq });
                }
                Err(e) if press < max_presses => {
                    warn!("{}; pressing power key again", e);
                    self.seq.pulse_power_key(delay).await?;
                }
                Err(e) => warn!("{}", e),
            }
        }
        Err(BringUpError::Unresponsive(self.seq.diagnosis))
    }

    pub fn power_off(self) -> Result<Unpowered<O>, BringUpError<O::Error>> {
        self.seq.power_off()
    }
}

/// Modem answering AT commands.
pub struct Ready<O> {
    seq: Sequencer<O>,
}

impl<O: OutputPin> Ready<O> {
    /// Allow the modem to enter sleep (DTR high).
    pub fn sleep(&mut self) -> Result<(), BringUpError<O::Error>> {
        let dtr = self
            .seq
            .pins
            .dtr
            .as_mut()
            .ok_or(BringUpError::NotWired(Signal::ModemDtr))?;
        drive(dtr, Level::High)
    }

    /// Wake the modem (DTR low).
    pub fn wake(&mut self) -> Result<(), BringUpError<O::Error>> {
        let dtr = self
            .seq
            .pins
            .dtr
            .as_mut()
            .ok_or(BringUpError::NotWired(Signal::ModemDtr))?;
        drive(dtr, Level::Low)
    }

    pub fn power_off(self) -> Result<Unpowered<O>, BringUpError<O::Error>> {
        self.seq.power_off()
    }
}
