//! Desktop simulator for the T-SIM A7670 bring-up sequence.
//!
//! Runs the same `tsim-core` code the firmware runs (power sequencing, self
//! test, packet data attach and a socket round trip) against simulated GPIO
//! lines and a simulated modem of the selected family.
//!
//! # Usage
//!
//! ```text
//! tsim-simulator [none|no-power|slow-boot|no-sim]
//! ```
//!
//! The argument injects a hardware fault. `RUST_LOG=debug` shows every pin
//! transition and AT command. `TSIM_APN`, `TSIM_APN_USER`,
//! `TSIM_APN_PASSWORD` and `TSIM_SIM_PIN` are read from the environment.

mod world;

use std::convert::Infallible;
use std::process::ExitCode;

use embassy_futures::block_on;
use embassy_futures::select::{Either, select};
use log::{error, info};
use thiserror_no_std::Error;
use tsim_core::atat::asynch::Client;
use tsim_core::atat::{self, AtatIngress};

use tsim_core::bringup::{BringUpError, ModemPins, ReadyPolicy, Unpowered};
use tsim_core::config::{CellularConfig, Config};
use tsim_core::modem::at::{self as at_link, INGRESS_BUF_SIZE, ResponseSlot, UrcChannel};
use tsim_core::modem::{AtError, AtLink, LinkId, ModemClient, ModemDriver, SELECTED_FAMILY};
use tsim_core::selftest::{self, SelfTestError};
use tsim_core::{BOARD, PrimaryModemType};

use world::{Fault, Line, SharedWorld, SimDelay, SimPin, SimSerial, World};

type Modem<'a> = PrimaryModemType<AtLink<'a, Client<'a, SimSerial, INGRESS_BUF_SIZE>>>;

/// Loopback peer for the socket round trip
const ECHO_HOST: &str = "tcpbin.com";
const ECHO_PORT: u16 = 4242;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
enum SimError {
    #[error("bring-up failed: {0}")]
    BringUp(#[from] BringUpError<Infallible>),
    #[error("self test failed: {0}")]
    SelfTest(#[from] SelfTestError),
    #[error("modem error: {0}")]
    Modem(#[from] AtError),
    #[error("no free URC subscriber")]
    UrcSubscriber,
    #[error("socket echo did not match")]
    EchoMismatch,
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

fn modem_pins(world: &SharedWorld) -> ModemPins<SimPin> {
    ModemPins {
        power_on: SimPin::new(world, Line::PowerOn),
        power_key: SimPin::new(world, Line::PowerKey),
        reset: SimPin::new(world, Line::Reset),
        dtr: BOARD.modem.dtr.map(|_| SimPin::new(world, Line::Dtr)),
    }
}

async fn socket_round_trip(modem: &mut Modem<'_>) -> Result<(), SimError> {
    let link = LinkId::new(0).ok_or(AtError::Unexpected("link id"))?;
    let mut client = modem.client(link);
    client.connect(ECHO_HOST, ECHO_PORT).await?;

    let message = b"hello from the T-SIM simulator";
    let sent = client.write(message).await?;
    let available = client.available().await?;
    info!("Sent {} bytes, {} waiting", sent, available);

    let mut buf = [0u8; 64];
    let got = client.read(&mut buf).await?;
    client.stop().await?;

    if &buf[..got] != message.as_slice() {
        return Err(SimError::EchoMismatch);
    }
    info!("Echo: {:?}", String::from_utf8_lossy(&buf[..got]));
    Ok(())
}

async fn scenario(
    world: &SharedWorld,
    config: &Config<'_>,
    modem: &mut Modem<'_>,
) -> Result<(), SimError> {
    let mut delay = SimDelay::new(world);

    let mut powered = Unpowered::new(modem_pins(world), &BOARD, SELECTED_FAMILY)
        .power_on(&mut delay)
        .await?;
    powered.reset(&mut delay).await?;
    let mut ready = powered
        .press_power_key(&mut delay)
        .await?
        .wait_ready(modem, &mut delay, &ReadyPolicy::default())
        .await?;
    info!("Modem ready at t={}ms", world.borrow().now_ms());

    let report = selftest::run(modem, config.cellular.sim_pin()).await?;
    info!("Self test: {:?}", report);

    modem.attach(&config.cellular).await?;
    if config.gps {
        modem.set_gps_power(true).await?;
    }

    socket_round_trip(modem).await?;

    match ready.sleep() {
        Ok(()) => info!("Modem allowed to sleep"),
        Err(e) => info!("Sleep skipped: {}", e),
    }
    ready.power_off()?;
    info!("Modem powered off at t={}ms", world.borrow().now_ms());
    Ok(())
}

/// Wire an `atat` client and ingress to the simulated UART and run the
/// scenario while the ingress digests modem output.
async fn run(world: &SharedWorld, config: &Config<'_>) -> Result<(), SimError> {
    let res_slot = ResponseSlot::new();
    let urc_channel = UrcChannel::new();
    let mut ingress_buf = [0u8; INGRESS_BUF_SIZE];
    let mut client_buf = [0u8; INGRESS_BUF_SIZE];

    let mut ingress = at_link::ingress(&mut ingress_buf, &res_slot, &urc_channel);
    let client = Client::new(
        SimSerial::new(world),
        &res_slot,
        &mut client_buf,
        atat::Config::default(),
    );
    let urcs = urc_channel
        .subscribe()
        .map_err(|_| SimError::UrcSubscriber)?;
    let mut modem = Modem::new(AtLink::new(client, urcs));

    match select(
        scenario(world, config, &mut modem),
        ingress.read_from(SimSerial::new(world)),
    )
    .await
    {
        Either::First(result) => result,
        Either::Second(never) => never,
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn env_or_empty(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let fault = match std::env::args().nth(1) {
        None => Fault::None,
        Some(arg) => match Fault::parse(&arg) {
            Some(fault) => fault,
            None => {
                error!("Unknown fault {:?}; expected none, no-power, slow-boot or no-sim", arg);
                return ExitCode::FAILURE;
            }
        },
    };

    info!("Starting T-SIM simulator");
    info!("Modem family: {}", SELECTED_FAMILY.name());
    info!("Fault: {:?}", fault);
    info!("{}", BOARD);

    let apn = env_or_empty("TSIM_APN");
    let username = env_or_empty("TSIM_APN_USER");
    let password = env_or_empty("TSIM_APN_PASSWORD");
    let sim_pin = env_or_empty("TSIM_SIM_PIN");
    let config = Config {
        cellular: CellularConfig {
            apn: &apn,
            username: &username,
            password: &password,
            sim_pin: &sim_pin,
        },
        gps: true,
    };

    let world = World::new(fault);
    match block_on(run(&world, &config)) {
        Ok(()) => {
            info!("Simulation finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
