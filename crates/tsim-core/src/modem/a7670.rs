//! SIMCom A7670 (LTE Cat-1, with GNSS on the -G/-SA variants)

use super::ModemFamily;
use super::simcom::{Dialect, GetEpsRegistration, SetGnssPower, SimcomClient, SimcomModem};

pub const FAMILY: ModemFamily = ModemFamily::A7670;

pub struct A7670Dialect;

impl Dialect for A7670Dialect {
    const FAMILY: ModemFamily = FAMILY;

    // LTE only; there is no circuit-switched or 2G/3G registration to query
    type RegistrationQuery = GetEpsRegistration;
    const REGISTRATION_QUERY: GetEpsRegistration = GetEpsRegistration;

    type GpsPower = SetGnssPower;

    fn gps_power(on: bool) -> SetGnssPower {
        SetGnssPower { on: u8::from(on) }
    }
}

pub type A7670<T> = SimcomModem<T, A7670Dialect>;
pub type GsmClientA7670<'m, T> = SimcomClient<'m, T, A7670Dialect>;

/// Family-neutral name used by the primary modem aliases
pub type Modem<T> = A7670<T>;
pub type Client<'m, T> = GsmClientA7670<'m, T>;
