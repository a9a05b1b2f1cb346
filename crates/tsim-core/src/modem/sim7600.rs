//! SIMCom SIM7600 (LTE Cat-4 with 3G/2G fallback)

use super::ModemFamily;
use super::simcom::{Dialect, GetGprsRegistration, SetGps, SimcomClient, SimcomModem};

pub const FAMILY: ModemFamily = ModemFamily::Sim7600;

pub struct Sim7600Dialect;

impl Dialect for Sim7600Dialect {
    const FAMILY: ModemFamily = FAMILY;

    type RegistrationQuery = GetGprsRegistration;
    const REGISTRATION_QUERY: GetGprsRegistration = GetGprsRegistration;

    type GpsPower = SetGps;

    fn gps_power(on: bool) -> SetGps {
        SetGps { on: u8::from(on) }
    }
}

pub type Sim7600<T> = SimcomModem<T, Sim7600Dialect>;
pub type GsmClientSim7600<'m, T> = SimcomClient<'m, T, Sim7600Dialect>;

/// Family-neutral name used by the primary modem aliases
pub type Modem<T> = Sim7600<T>;
pub type Client<'m, T> = GsmClientSim7600<'m, T>;
