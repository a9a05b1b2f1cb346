//! Modem family selection and the family-independent modem facade
//!
//! Exactly one modem family is compiled in as the *primary* modem, chosen by
//! the `modem-*` cargo feature. Application code programs against
//! [`PrimaryModemType`] and [`ClientType`] (or the [`ModemDriver`] and
//! [`ModemClient`] traits) and never names a family-specific type, so the
//! same source builds unchanged for every supported family.
//!
//! Selection works like a guard-then-define latch: a family may be
//! requested more than once as long as it is the same family, but two
//! different families, or none at all, fail the build.
//!
//! All families stay compiled so tests can drive the same application code
//! against each of them; only the aliases follow the feature.

pub mod a7670;
pub mod at;
pub mod sim7600;
pub mod simcom;
pub mod status;

pub use at::{AtChannel, AtError, AtLink};
pub use simcom::Urc;
pub use status::{RegistrationStatus, SignalQuality, SimStatus};

use core::future::Future;

use thiserror_no_std::Error;

use crate::bringup::PowerTimings;
use crate::config::CellularConfig;

#[cfg(all(feature = "modem-a7670", feature = "modem-sim7600"))]
compile_error!("features `modem-a7670` and `modem-sim7600` are mutually exclusive");

#[cfg(not(any(feature = "modem-a7670", feature = "modem-sim7600")))]
compile_error!("select a modem family: enable `modem-a7670` or `modem-sim7600`");

#[cfg(feature = "modem-a7670")]
use a7670 as selected;
#[cfg(all(feature = "modem-sim7600", not(feature = "modem-a7670")))]
use sim7600 as selected;

/// Modem controller of the family this build targets, over AT channel `T`.
pub type PrimaryModemType<T> = selected::Modem<T>;

/// Socket client of the family this build targets.
pub type ClientType<'m, T> = selected::Client<'m, T>;

/// Family requests made by the enabled cargo features, in declaration order.
const REQUESTED: [Option<ModemFamily>; 2] = [
    if cfg!(feature = "modem-a7670") {
        Some(ModemFamily::A7670)
    } else {
        None
    },
    if cfg!(feature = "modem-sim7600") {
        Some(ModemFamily::Sim7600)
    } else {
        None
    },
];

/// Family this build targets.
pub const SELECTED_FAMILY: ModemFamily = match select_family(&REQUESTED) {
    Ok(family) => family,
    Err(_) => panic!("exactly one modem family feature must be enabled"),
};

const _: () = assert!(
    selected::FAMILY.same_as(SELECTED_FAMILY),
    "primary modem aliases do not match the selected family"
);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    #[error("no modem family selected")]
    NoneSelected,
    #[error("modem family {requested:?} conflicts with {active:?}")]
    Conflict {
        active: ModemFamily,
        requested: ModemFamily,
    },
}

/// Vendor modem families with a driver in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModemFamily {
    /// SIMCom A7670 LTE Cat-1
    A7670,
    /// SIMCom SIM7600 LTE Cat-4
    Sim7600,
}

impl ModemFamily {
    pub const fn name(self) -> &'static str {
        match self {
            Self::A7670 => "A7670",
            Self::Sim7600 => "SIM7600",
        }
    }

    /// `PartialEq` is not usable in `const` contexts.
    pub const fn same_as(self, other: Self) -> bool {
        self as u8 == other as u8
    }

    /// Power sequencing delays from the family's hardware design guide.
    pub const fn power_timings(self) -> PowerTimings {
        match self {
            Self::A7670 => PowerTimings::from_millis(100, 100, 2600, 100),
            Self::Sim7600 => PowerTimings::from_millis(100, 100, 2600, 500),
        }
    }
}

/// Guard-then-define latch for the active modem family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyLatch {
    Unset,
    Set(ModemFamily),
}

impl FamilyLatch {
    /// Define the family. Re-defining the same family is a no-op; there is
    /// no transition back to `Unset`.
    pub const fn define(self, requested: ModemFamily) -> Result<Self, SelectError> {
        match self {
            Self::Unset => Ok(Self::Set(requested)),
            Self::Set(active) if active.same_as(requested) => Ok(self),
            Self::Set(active) => Err(SelectError::Conflict { active, requested }),
        }
    }

    pub const fn family(self) -> Option<ModemFamily> {
        match self {
            Self::Unset => None,
            Self::Set(family) => Some(family),
        }
    }
}

/// Fold every request through a [`FamilyLatch`]; `None` entries are skipped.
pub const fn select_family(requests: &[Option<ModemFamily>]) -> Result<ModemFamily, SelectError> {
    let mut latch = FamilyLatch::Unset;
    let mut i = 0;
    while i < requests.len() {
        if let Some(requested) = requests[i] {
            latch = match latch.define(requested) {
                Ok(latch) => latch,
                Err(e) => return Err(e),
            };
        }
        i += 1;
    }
    match latch.family() {
        Some(family) => Ok(family),
        None => Err(SelectError::NoneSelected),
    }
}

/// Socket link identifier (`0..MAX_LINKS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkId(u8);

impl LinkId {
    pub const MAX_LINKS: u8 = 10;

    pub const fn new(id: u8) -> Option<Self> {
        if id < Self::MAX_LINKS {
            Some(Self(id))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Capability set every modem family exposes.
pub trait ModemDriver {
    /// AT channel the modem is driven through.
    type Transport: AtChannel;

    /// Socket client borrowed from the modem.
    type Client<'m>: ModemClient
    where
        Self: 'm;

    const FAMILY: ModemFamily;

    fn new(transport: Self::Transport) -> Self;

    /// Dispatch any `atat` command.
    fn send<Cmd: atat::AtatCmd>(
        &mut self,
        cmd: &Cmd,
    ) -> impl Future<Output = Result<Cmd::Response, AtError>>;

    /// Plain `AT`; succeeds once the modem answers `OK`.
    fn test_at(&mut self) -> impl Future<Output = Result<(), AtError>>;

    /// Echo off, numeric error codes.
    fn init(&mut self) -> impl Future<Output = Result<(), AtError>>;

    fn sim_status(&mut self) -> impl Future<Output = Result<SimStatus, AtError>>;

    fn unlock_sim(&mut self, pin: &str) -> impl Future<Output = Result<(), AtError>>;

    fn registration(&mut self) -> impl Future<Output = Result<RegistrationStatus, AtError>>;

    fn signal_quality(&mut self) -> impl Future<Output = Result<SignalQuality, AtError>>;

    /// Define the PDP context and open the packet data network.
    fn attach(&mut self, config: &CellularConfig<'_>) -> impl Future<Output = Result<(), AtError>>;

    fn set_gps_power(&mut self, on: bool) -> impl Future<Output = Result<(), AtError>>;

    fn client(&mut self, link: LinkId) -> Self::Client<'_>;
}

/// TCP socket over the modem's internal IP stack.
pub trait ModemClient {
    fn connect(&mut self, host: &str, port: u16) -> impl Future<Output = Result<(), AtError>>;

    /// Send up to `data.len()` bytes; returns how many the modem accepted.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<usize, AtError>>;

    /// Bytes buffered in the modem waiting to be read.
    fn available(&mut self) -> impl Future<Output = Result<usize, AtError>>;

    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, AtError>>;

    fn stop(&mut self) -> impl Future<Output = Result<(), AtError>>;

    fn connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::modem::at::tests::ScriptedLink;
    use embassy_futures::block_on;

    #[test]
    fn test_latch_defines_once() {
        let latch = FamilyLatch::Unset.define(ModemFamily::A7670).unwrap();
        assert_eq!(latch, FamilyLatch::Set(ModemFamily::A7670));
    }

    #[test]
    fn test_latch_same_family_is_idempotent() {
        let latch = FamilyLatch::Unset
            .define(ModemFamily::A7670)
            .and_then(|l| l.define(ModemFamily::A7670))
            .unwrap();
        assert_eq!(latch.family(), Some(ModemFamily::A7670));
    }

    #[test]
    fn test_latch_conflict() {
        let result = FamilyLatch::Set(ModemFamily::A7670).define(ModemFamily::Sim7600);
        assert_eq!(
            result,
            Err(SelectError::Conflict {
                active: ModemFamily::A7670,
                requested: ModemFamily::Sim7600
            })
        );
    }

    #[test]
    fn test_select_family() {
        assert_eq!(
            select_family(&[Some(ModemFamily::Sim7600), None]),
            Ok(ModemFamily::Sim7600)
        );
        assert_eq!(
            select_family(&[Some(ModemFamily::A7670), Some(ModemFamily::A7670)]),
            Ok(ModemFamily::A7670)
        );
        assert_eq!(select_family(&[None, None]), Err(SelectError::NoneSelected));
        assert_eq!(select_family(&[]), Err(SelectError::NoneSelected));
        assert!(matches!(
            select_family(&[Some(ModemFamily::A7670), Some(ModemFamily::Sim7600)]),
            Err(SelectError::Conflict { .. })
        ));
    }

    #[test]
    fn test_exactly_one_feature_selected() {
        let active = REQUESTED.iter().filter(|r| r.is_some()).count();
        assert_eq!(active, 1);
        assert_eq!(select_family(&REQUESTED), Ok(SELECTED_FAMILY));
    }

    #[test]
    fn test_primary_alias_matches_selected_family() {
        assert_eq!(
            <PrimaryModemType<ScriptedLink> as ModemDriver>::FAMILY,
            SELECTED_FAMILY
        );
    }

    #[test]
    fn test_link_id_bounds() {
        assert_eq!(LinkId::new(0).map(LinkId::get), Some(0));
        assert_eq!(LinkId::new(9).map(LinkId::get), Some(9));
        assert_eq!(LinkId::new(10), None);
    }

    #[test]
    fn test_family_timings() {
        assert_eq!(ModemFamily::A7670.power_timings().power_key_pulse_ms(), 100);
        assert_eq!(ModemFamily::Sim7600.power_timings().power_key_pulse_ms(), 500);
        assert_eq!(ModemFamily::A7670.power_timings().reset_hold_ms(), 2600);
    }

    /// Application code that only uses the capability set.
    async fn fetch<M: ModemDriver>(modem: &mut M, out: &mut [u8]) -> Result<usize, AtError> {
        modem.init().await?;
        let mut client = modem.client(LinkId::new(0).unwrap());
        client.connect("example.com", 80).await?;
        client.write(b"GET").await?;
        let n = client.read(out).await?;
        client.stop().await?;
        Ok(n)
    }

    const FETCH_SCRIPT: &str = concat!(
        "\r\nOK\r\n",
        "\r\nOK\r\n",
        "\r\nOK\r\n\r\n+CIPOPEN: 0,0\r\n",
        "\r\n>",
        "\r\nOK\r\n\r\n+CIPSEND: 0,3,3\r\n",
        "\r\n+CIPRXGET: 2,0,2,0\r\nhi\r\nOK\r\n",
        "\r\nOK\r\n\r\n+CIPCLOSE: 0,0\r\n",
    );

    fn run_fetch<M: ModemDriver<Transport = ScriptedLink>>() -> usize {
        let mut modem = M::new(ScriptedLink::new(FETCH_SCRIPT));
        let mut out = [0u8; 8];
        let n = block_on(fetch(&mut modem, &mut out)).unwrap();
        assert_eq!(&out[..n], b"hi");
        n
    }

    #[test]
    fn test_same_application_runs_on_every_family() {
        assert_eq!(run_fetch::<a7670::A7670<ScriptedLink>>(), 2);
        assert_eq!(run_fetch::<sim7600::Sim7600<ScriptedLink>>(), 2);
        assert_eq!(run_fetch::<PrimaryModemType<ScriptedLink>>(), 2);
    }

    #[test]
    fn test_client_alias_is_the_primary_client() {
        let mut modem: PrimaryModemType<ScriptedLink> =
            ModemDriver::new(ScriptedLink::new(""));
        let client: ClientType<'_, ScriptedLink> = modem.client(LinkId::new(1).unwrap());
        assert!(!client.connected());
    }
}
