//! Simulated board: GPIO lines, a virtual clock and a SIMCom-style modem
//! answering on the AT link.
//!
//! Everything shares one [`World`] behind `Rc<RefCell<..>>`. Delays advance
//! the virtual clock and only sleep a short real slice, so a full bring-up
//! with multi-second boot times runs in about a second while `atat` still
//! gets real time for its command cooldown and timeouts.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::poll_fn;
use std::rc::Rc;
use std::task::Poll;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embassy_time::Timer;
use embedded_io_async::{ErrorType, Read, Write};
use log::{debug, info, warn};

use tsim_core::BOARD;
use tsim_core::board::Level;
use tsim_core::modem::SELECTED_FAMILY;

/// Time from a valid power key press to the modem answering `AT`
const BOOT_MS: u64 = 3500;

/// RSSI reported by `+CSQ` (-77 dBm)
const SIGNAL_RSSI: u8 = 18;

/// Real time spent in every simulated delay
const REAL_SLICE_MS: u64 = 50;

/// Hardware fault injected into the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    /// POWERON is not connected to the modem supply
    NoPower,
    /// The first power key press is not registered
    SlowBoot,
    NoSim,
}

impl Fault {
    pub fn parse(arg: &str) -> Option<Self> {
        match arg {
            "none" => Some(Self::None),
            "no-power" => Some(Self::NoPower),
            "slow-boot" => Some(Self::SlowBoot),
            "no-sim" => Some(Self::NoSim),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Power {
    Off,
    Booting { ready_at: u64 },
    Ready,
}

/// Control line driven by a [`SimPin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    PowerOn,
    PowerKey,
    Reset,
    Dtr,
}

struct PendingSend {
    link: u8,
    requested: usize,
    remaining: usize,
}

pub struct World {
    now_ms: u64,
    fault: Fault,
    rail: bool,
    key_pressed_at: Option<u64>,
    ignored_presses: u8,
    power: Power,
    echo: bool,
    network_open: bool,
    command: Vec<u8>,
    pending_send: Option<PendingSend>,
    output: VecDeque<u8>,
    /// Loopback socket: everything sent comes back
    socket: VecDeque<u8>,
}

pub type SharedWorld = Rc<RefCell<World>>;

impl World {
    pub fn new(fault: Fault) -> SharedWorld {
        Rc::new(RefCell::new(Self {
            now_ms: 0,
            fault,
            rail: false,
            key_pressed_at: None,
            ignored_presses: 0,
            power: Power::Off,
            echo: true,
            network_open: false,
            command: Vec::new(),
            pending_send: None,
            output: VecDeque::new(),
            socket: VecDeque::new(),
        }))
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
        if let Power::Booting { ready_at } = self.power {
            if self.now_ms >= ready_at {
                info!("[t={}ms] modem booted", self.now_ms);
                self.power = Power::Ready;
                self.echo = true;
                self.reply("RDY");
                if self.fault != Fault::NoSim {
                    self.reply("SMS DONE");
                    self.reply("PB DONE");
                }
            }
        }
    }

    fn set_line(&mut self, line: Line, high: bool) {
        match line {
            Line::PowerOn => {
                self.rail = high && self.fault != Fault::NoPower;
                if !self.rail {
                    self.power = Power::Off;
                    self.network_open = false;
                }
                debug!("[t={}ms] modem rail {}", self.now_ms, if self.rail { "on" } else { "off" });
            }
            Line::PowerKey if high => self.key_pressed_at = Some(self.now_ms),
            Line::PowerKey => {
                if let Some(pressed_at) = self.key_pressed_at.take() {
                    self.release_power_key(self.now_ms - pressed_at);
                }
            }
            Line::Reset => {
                let active = high == (BOARD.power.reset_level == Level::High);
                if active && self.power != Power::Off {
                    info!("[t={}ms] modem held in reset", self.now_ms);
                    self.power = Power::Off;
                    self.network_open = false;
                }
            }
            Line::Dtr => debug!(
                "[t={}ms] DTR {}",
                self.now_ms,
                if high { "high (sleep allowed)" } else { "low (awake)" }
            ),
        }
    }

    fn release_power_key(&mut self, held_ms: u64) {
        let needed = u64::from(SELECTED_FAMILY.power_timings().power_key_pulse_ms());
        if !self.rail || held_ms < needed || self.power != Power::Off {
            debug!("[t={}ms] power key press ignored ({} ms)", self.now_ms, held_ms);
            return;
        }
        if self.fault == Fault::SlowBoot && self.ignored_presses == 0 {
            self.ignored_presses += 1;
            info!("[t={}ms] modem missed the power key press", self.now_ms);
            return;
        }
        info!("[t={}ms] modem booting", self.now_ms);
        self.power = Power::Booting {
            ready_at: self.now_ms + BOOT_MS,
        };
    }

    fn push(&mut self, bytes: &[u8]) {
        self.output.extend(bytes);
    }

    fn reply(&mut self, line: &str) {
        self.push(format!("\r\n{line}\r\n").as_bytes());
    }

    fn ok(&mut self) {
        self.reply("OK");
    }

    fn receive(&mut self, data: &[u8]) {
        if self.power != Power::Ready {
            return;
        }
        for &byte in data {
            if let Some(send) = self.pending_send.as_mut() {
                self.socket.push_back(byte);
                send.remaining -= 1;
                if send.remaining == 0 {
                    let (link, requested) = (send.link, send.requested);
                    self.pending_send = None;
                    self.ok();
                    self.reply(&format!("+CIPSEND: {link},{requested},{requested}"));
                }
                continue;
            }
            if byte == b'\n' {
                let raw = std::mem::take(&mut self.command);
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches('\r');
                if !line.is_empty() {
                    self.execute(line);
                }
            } else {
                self.command.push(byte);
            }
        }
    }

    fn execute(&mut self, line: &str) {
        if self.echo {
            self.push(format!("{line}\r").as_bytes());
        }
        let Some(cmd) = line.strip_prefix("AT") else {
            return;
        };
        debug!("[t={}ms] modem <- AT{}", self.now_ms, cmd);

        if let Some(args) = cmd.strip_prefix("+CIPOPEN=") {
            let link = first_field(args);
            self.ok();
            self.reply(&format!("+CIPOPEN: {link},0"));
        } else if let Some(args) = cmd.strip_prefix("+CIPSEND=") {
            let mut fields = args.split(',');
            let link = fields.next().and_then(|f| f.parse().ok());
            let len = fields.next().and_then(|f| f.parse().ok());
            match (link, len) {
                (Some(link), Some(len)) if len > 0 => {
                    self.push(b"\r\n>");
                    self.pending_send = Some(PendingSend {
                        link,
                        requested: len,
                        remaining: len,
                    });
                }
                _ => self.reply("ERROR"),
            }
        } else if let Some(args) = cmd.strip_prefix("+CIPRXGET=4,") {
            let available = self.socket.len();
            self.reply(&format!("+CIPRXGET: 4,{},{available}", first_field(args)));
            self.ok();
        } else if let Some(args) = cmd.strip_prefix("+CIPRXGET=2,") {
            let mut fields = args.split(',');
            let link = fields.next().unwrap_or("0").to_owned();
            let wanted: usize = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
            let count = wanted.min(self.socket.len());
            let data: Vec<u8> = self.socket.drain(..count).collect();
            let remaining = self.socket.len();
            self.reply(&format!("+CIPRXGET: 2,{link},{count},{remaining}"));
            self.push(&data);
            self.ok();
        } else if let Some(args) = cmd.strip_prefix("+CIPCLOSE=") {
            let link = first_field(args);
            self.ok();
            self.reply(&format!("+CIPCLOSE: {link},0"));
        } else if cmd.starts_with("+CGDCONT=")
            || cmd.starts_with("+CGAUTH=")
            || cmd.starts_with("+CPIN=")
        {
            self.ok();
        } else {
            self.execute_simple(cmd);
        }
    }

    fn execute_simple(&mut self, cmd: &str) {
        match cmd {
            "" | "+CMEE=1" | "+CIPRXGET=1" | "+CGNSSPWR=1" | "+CGNSSPWR=0" | "+CGPS=1"
            | "+CGPS=0" => self.ok(),
            "E0" => {
                self.echo = false;
                self.ok();
            }
            "+CPIN?" if self.fault == Fault::NoSim => self.reply("+CME ERROR: 10"),
            "+CPIN?" => {
                self.reply("+CPIN: READY");
                self.ok();
            }
            "+CEREG?" | "+CGREG?" => {
                let prefix = &cmd[..cmd.len() - 1];
                self.reply(&format!("{prefix}: 0,1"));
                self.ok();
            }
            "+CSQ" => {
                self.reply(&format!("+CSQ: {SIGNAL_RSSI},99"));
                self.ok();
            }
            "+NETOPEN?" => {
                self.reply(&format!("+NETOPEN: {}", u8::from(self.network_open)));
                self.ok();
            }
            "+NETOPEN" => {
                self.network_open = true;
                self.ok();
                self.reply("+NETOPEN: 0");
            }
            _ => {
                warn!("[t={}ms] simulated modem does not know AT{}", self.now_ms, cmd);
                self.reply("ERROR");
            }
        }
    }
}

fn first_field(args: &str) -> &str {
    args.split(',').next().unwrap_or("0")
}

// ---------------------------------------------------------------------------
// embedded-hal / embedded-io adapters
// ---------------------------------------------------------------------------

/// GPIO output wired to one control line of the simulated modem.
pub struct SimPin {
    line: Line,
    world: SharedWorld,
}

impl SimPin {
    pub fn new(world: &SharedWorld, line: Line) -> Self {
        Self {
            line,
            world: world.clone(),
        }
    }
}

impl PinErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.world.borrow_mut().set_line(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.world.borrow_mut().set_line(self.line, true);
        Ok(())
    }
}

/// Delay that advances the virtual clock by the requested time and then
/// sleeps [`REAL_SLICE_MS`] of real time.
pub struct SimDelay {
    world: SharedWorld,
}

impl SimDelay {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: world.clone(),
        }
    }
}

impl DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.world
            .borrow_mut()
            .advance(u64::from(ns.div_ceil(1_000_000)));
        Timer::after_millis(REAL_SLICE_MS).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.world.borrow_mut().advance(u64::from(ms));
        Timer::after_millis(REAL_SLICE_MS).await;
    }
}

/// Modem UART. One handle feeds `atat`'s ingress, another carries the
/// client's writes. Reads stay pending while the modem has nothing to say.
pub struct SimSerial {
    world: SharedWorld,
}

impl SimSerial {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: world.clone(),
        }
    }
}

impl ErrorType for SimSerial {
    type Error = Infallible;
}

impl Read for SimSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        poll_fn(|_| {
            let mut world = self.world.borrow_mut();
            if world.output.is_empty() || buf.is_empty() {
                return Poll::Pending;
            }
            let n = buf.len().min(world.output.len());
            for (dst, src) in buf.iter_mut().zip(world.output.drain(..n)) {
                *dst = src;
            }
            Poll::Ready(Ok(n))
        })
        .await
    }
}

impl Write for SimSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.world.borrow_mut().receive(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
