//! SIMCom command set shared by the A7670 and SIM7600 families
//!
//! Both families speak the same TCP/IP command set (`NETOPEN`, `CIPOPEN`,
//! `CIPSEND`, manual-receive `CIPRXGET`); the differences are captured by
//! a [`Dialect`].
//!
//! Replies whose prefix doubles as a URC (`+NETOPEN: <state>`,
//! `+CIPRXGET: <mode>,...`) are delivered on the URC channel, so their
//! commands are sent with [`NoResponse`] and the value is taken from the
//! following [`Urc`].

use core::marker::PhantomData;

use atat::atat_derive::{AtatCmd, AtatResp, AtatUrc};
use atat::serde_bytes::Bytes;
use atat::{CmeError, InternalError};
use heapless::Vec;
use log::{debug, info, warn};

use super::at::{AtChannel, AtError, URC_BUDGET};
use super::status::{RegistrationStatus, SignalQuality, SimStatus};
use super::{LinkId, ModemClient, ModemDriver, ModemFamily};
use crate::config::CellularConfig;

/// Largest payload handed to one `CIPSEND`
pub const MAX_SEND_CHUNK: usize = 1024;

/// Largest payload requested by one `CIPRXGET=2`
pub const MAX_READ_CHUNK: usize = 1024;

// ---------------------------------------------------------------------------
// Responses and URCs
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, AtatResp)]
pub struct NoResponse;

/// `+CPIN: <code>`
#[derive(Clone, Debug, AtatResp)]
pub struct PinStatus {
    #[at_arg(position = 0)]
    pub code: atat::heapless::String<16>,
}

/// `+CEREG: <n>,<stat>` / `+CGREG: <n>,<stat>`
#[derive(Clone, Debug, AtatResp)]
pub struct Registration {
    #[at_arg(position = 0)]
    pub mode: u8,
    #[at_arg(position = 1)]
    pub stat: u8,
}

/// `+NETOPEN: <code>`: 0 on success after `NETOPEN`, 1 = open after `NETOPEN?`
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct NetworkState {
    #[at_arg(position = 0)]
    pub code: u8,
}

/// `+CIPOPEN: <link>,<err>`, `+CIPCLOSE: <link>,<err>`, `+IPCLOSE: <link>,<reason>`
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct LinkEvent {
    #[at_arg(position = 0)]
    pub link: u8,
    #[at_arg(position = 1)]
    pub code: u8,
}

/// `+CIPSEND: <link>,<requested>,<sent>`
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct DataSent {
    #[at_arg(position = 0)]
    pub link: u8,
    #[at_arg(position = 1)]
    pub requested: u16,
    #[at_arg(position = 2)]
    pub sent: u16,
}

/// `+CIPRXGET: <mode>,<link>[,<len>[,<remaining>]]`
#[derive(Clone, Debug, PartialEq, Eq, AtatResp)]
pub struct ReceiveInfo {
    #[at_arg(position = 0)]
    pub mode: u8,
    #[at_arg(position = 1)]
    pub link: u8,
    #[at_arg(position = 2)]
    pub len: Option<u16>,
    #[at_arg(position = 3)]
    pub remaining: Option<u16>,
}

#[derive(Clone, Debug, AtatUrc)]
pub enum Urc {
    #[at_urc("RDY")]
    Ready,
    #[at_urc("SMS DONE")]
    SmsDone,
    #[at_urc("PB DONE")]
    PhonebookDone,
    #[at_urc("+NETOPEN")]
    NetworkOpened(NetworkState),
    #[at_urc("+CIPOPEN")]
    LinkOpened(LinkEvent),
    #[at_urc("+CIPSEND")]
    DataSent(DataSent),
    #[at_urc("+CIPRXGET")]
    Received(ReceiveInfo),
    #[at_urc("+CIPCLOSE")]
    LinkClosed(LinkEvent),
    #[at_urc("+IPCLOSE")]
    PeerClosed(LinkEvent),
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Clone, AtatCmd)]
#[at_cmd("", NoResponse, timeout_ms = 1000)]
pub struct At;

#[derive(Clone, AtatCmd)]
#[at_cmd("E0", NoResponse)]
pub struct EchoOff;

/// `1` = numeric `+CME ERROR` codes
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMEE", NoResponse)]
pub struct SetErrorFormat {
    #[at_arg(position = 0)]
    pub mode: u8,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN?", PinStatus, timeout_ms = 5000)]
pub struct GetPinStatus;

#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN", NoResponse, timeout_ms = 5000)]
pub struct EnterPin<'a> {
    #[at_arg(position = 0, len = 8)]
    pub pin: &'a str,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CEREG?", Registration)]
pub struct GetEpsRegistration;

#[derive(Clone, AtatCmd)]
#[at_cmd("+CGREG?", Registration)]
pub struct GetGprsRegistration;

#[derive(Clone, AtatCmd)]
#[at_cmd("+CSQ", SignalQuality)]
pub struct GetSignalQuality;

#[derive(Clone, AtatCmd)]
#[at_cmd("+CGDCONT", NoResponse)]
pub struct DefinePdpContext<'a> {
    #[at_arg(position = 0)]
    pub cid: u8,
    #[at_arg(position = 1, len = 8)]
    pub pdp_type: &'a str,
    #[at_arg(position = 2, len = 64)]
    pub apn: &'a str,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CGAUTH", NoResponse)]
pub struct SetPdpAuth<'a> {
    #[at_arg(position = 0)]
    pub cid: u8,
    /// 1 = PAP
    #[at_arg(position = 1)]
    pub auth_type: u8,
    #[at_arg(position = 2, len = 64)]
    pub username: &'a str,
    #[at_arg(position = 3, len = 64)]
    pub password: &'a str,
}

/// `1` keeps received data in the modem until fetched with [`ReadReceived`]
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPRXGET", NoResponse)]
pub struct SetReceiveMode {
    #[at_arg(position = 0)]
    pub mode: u8,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+NETOPEN?", NoResponse)]
pub struct GetNetworkState;

#[derive(Clone, AtatCmd)]
#[at_cmd("+NETOPEN", NoResponse, timeout_ms = 10000)]
pub struct OpenNetwork;

/// A7670 GNSS engine power
#[derive(Clone, AtatCmd)]
#[at_cmd("+CGNSSPWR", NoResponse, timeout_ms = 10000)]
pub struct SetGnssPower {
    #[at_arg(position = 0)]
    pub on: u8,
}

/// SIM7600 GPS session
#[derive(Clone, AtatCmd)]
#[at_cmd("+CGPS", NoResponse, timeout_ms = 10000)]
pub struct SetGps {
    #[at_arg(position = 0)]
    pub on: u8,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPOPEN", NoResponse, timeout_ms = 15000)]
pub struct OpenLink<'a> {
    #[at_arg(position = 0)]
    pub link: u8,
    #[at_arg(position = 1, len = 3)]
    pub protocol: &'a str,
    #[at_arg(position = 2, len = 128)]
    pub host: &'a str,
    #[at_arg(position = 3)]
    pub port: u16,
}

/// Completes on the `>` prompt
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSEND", NoResponse, timeout_ms = 5000)]
pub struct PrepareSend {
    #[at_arg(position = 0)]
    pub link: u8,
    #[at_arg(position = 1)]
    pub len: u16,
}

/// Raw payload after the `CIPSEND` prompt
#[derive(Clone, AtatCmd)]
#[at_cmd(
    "",
    NoResponse,
    value_sep = false,
    cmd_prefix = "",
    termination = "",
    timeout_ms = 10000
)]
pub struct SendPayload<'a> {
    #[at_arg(position = 0, len = 1024)]
    pub data: &'a Bytes,
}

/// `CIPRXGET=4`; the count arrives as [`Urc::Received`]
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPRXGET", NoResponse)]
pub struct QueryReceived {
    #[at_arg(position = 0)]
    pub mode: u8,
    #[at_arg(position = 1)]
    pub link: u8,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPRXGET", NoResponse, timeout_ms = 5000)]
struct ReadRequest {
    #[at_arg(position = 0)]
    mode: u8,
    #[at_arg(position = 1)]
    link: u8,
    #[at_arg(position = 2)]
    len: u16,
}

/// `CIPRXGET=2`. The `+CIPRXGET: 2,...` header arrives as a URC; the reply
/// body is the payload itself.
#[derive(Clone)]
pub struct ReadReceived {
    request: ReadRequest,
}

impl ReadReceived {
    pub fn new(link: u8, len: u16) -> Self {
        Self {
            request: ReadRequest { mode: 2, link, len },
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReceivedData(pub Vec<u8, MAX_READ_CHUNK>);

impl atat::AtatResp for ReceivedData {}

impl atat::AtatCmd for ReadReceived {
    type Response = ReceivedData;

    const MAX_LEN: usize = <ReadRequest as atat::AtatCmd>::MAX_LEN;
    const MAX_TIMEOUT_MS: u32 = 5000;

    fn write(&self, buf: &mut [u8]) -> usize {
        atat::AtatCmd::write(&self.request, buf)
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<ReceivedData, atat::Error> {
        let data = resp.map_err(atat::Error::from)?;
        Vec::from_slice(data)
            .map(ReceivedData)
            .map_err(|_| atat::Error::Parse)
    }
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPCLOSE", NoResponse, timeout_ms = 10000)]
pub struct CloseLink {
    #[at_arg(position = 0)]
    pub link: u8,
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Family-specific parts of the SIMCom command set.
pub trait Dialect {
    const FAMILY: ModemFamily;

    /// Registration query of the family's packet domain
    type RegistrationQuery: atat::AtatCmd<Response = Registration>;

    const REGISTRATION_QUERY: Self::RegistrationQuery;

    type GpsPower: atat::AtatCmd<Response = NoResponse>;

    fn gps_power(on: bool) -> Self::GpsPower;
}

/// Modem controller for a SIMCom family.
pub struct SimcomModem<T, D> {
    link: T,
    _dialect: PhantomData<D>,
}

impl<T: AtChannel, D: Dialect> SimcomModem<T, D> {
    /// Give the AT channel back.
    pub fn release(self) -> T {
        self.link
    }

    /// Wait for the URC `pick` accepts, skipping up to [`URC_BUDGET`] others.
    async fn wait_urc<R>(
        &mut self,
        what: &'static str,
        mut pick: impl FnMut(&Urc) -> Option<R>,
    ) -> Result<R, AtError> {
        for _ in 0..URC_BUDGET {
            let urc = self.link.next_urc().await?;
            match pick(&urc) {
                Some(value) => return Ok(value),
                None => debug!("Skipping {:?} while waiting for {}", urc, what),
            }
        }
        Err(AtError::Unexpected(what))
    }

    async fn network_open(&mut self) -> Result<bool, AtError> {
        self.link.send(&GetNetworkState).await?;
        self.wait_urc("+NETOPEN?", |urc| match urc {
            Urc::NetworkOpened(state) => Some(state.code == 1),
            _ => None,
        })
        .await
    }
}

impl<T: AtChannel, D: Dialect> ModemDriver for SimcomModem<T, D> {
    type Transport = T;
    type Client<'m>
        = SimcomClient<'m, T, D>
    where
        Self: 'm;

    const FAMILY: ModemFamily = D::FAMILY;

    fn new(transport: T) -> Self {
        Self {
            link: transport,
            _dialect: PhantomData,
        }
    }

    async fn send<Cmd: atat::AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, AtError> {
        self.link.send(cmd).await
    }

    async fn test_at(&mut self) -> Result<(), AtError> {
        self.link.send(&At).await.map(|_| ())
    }

    async fn init(&mut self) -> Result<(), AtError> {
        self.link.send(&EchoOff).await?;
        self.link.send(&SetErrorFormat { mode: 1 }).await?;
        info!("{} initialised", D::FAMILY.name());
        Ok(())
    }

    async fn sim_status(&mut self) -> Result<SimStatus, AtError> {
        match self.link.send(&GetPinStatus).await {
            Ok(status) => Ok(SimStatus::parse(&status.code)),
            Err(AtError::Cme(CmeError::SimNotInserted)) => Ok(SimStatus::NotInserted),
            Err(e) => Err(e),
        }
    }

    async fn unlock_sim(&mut self, pin: &str) -> Result<(), AtError> {
        self.link.send(&EnterPin { pin }).await.map(|_| ())
    }

    async fn registration(&mut self) -> Result<RegistrationStatus, AtError> {
        let reply = self.link.send(&D::REGISTRATION_QUERY).await?;
        Ok(RegistrationStatus::from_stat(reply.stat))
    }

    async fn signal_quality(&mut self) -> Result<SignalQuality, AtError> {
        self.link.send(&GetSignalQuality).await
    }

    async fn attach(&mut self, config: &CellularConfig<'_>) -> Result<(), AtError> {
        self.link
            .send(&DefinePdpContext {
                cid: 1,
                pdp_type: "IP",
                apn: config.apn,
            })
            .await?;
        if !config.username.is_empty() {
            self.link
                .send(&SetPdpAuth {
                    cid: 1,
                    auth_type: 1,
                    username: config.username,
                    password: config.password,
                })
                .await?;
        }
        self.link.send(&SetReceiveMode { mode: 1 }).await?;

        if self.network_open().await? {
            debug!("Packet network already open");
            return Ok(());
        }

        self.link.send(&OpenNetwork).await?;
        let code = self
            .wait_urc("+NETOPEN", |urc| match urc {
                Urc::NetworkOpened(state) => Some(state.code),
                _ => None,
            })
            .await?;
        if code == 0 {
            info!("Packet network open (APN \"{}\")", config.apn);
            Ok(())
        } else {
            warn!("NETOPEN failed ({})", code);
            Err(AtError::Unexpected("+NETOPEN"))
        }
    }

    async fn set_gps_power(&mut self, on: bool) -> Result<(), AtError> {
        self.link.send(&D::gps_power(on)).await.map(|_| ())
    }

    fn client(&mut self, link: LinkId) -> SimcomClient<'_, T, D> {
        SimcomClient {
            modem: self,
            link,
            connected: false,
        }
    }
}

/// TCP client on one modem link.
pub struct SimcomClient<'m, T, D> {
    modem: &'m mut SimcomModem<T, D>,
    link: LinkId,
    connected: bool,
}

impl<T: AtChannel, D: Dialect> SimcomClient<'_, T, D> {
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Wait for the URC `pick` maps to `(link, value)` for this link; the
    /// same URC for other links is skipped.
    async fn link_urc(
        &mut self,
        what: &'static str,
        pick: impl Fn(&Urc) -> Option<(u8, u16)>,
    ) -> Result<u16, AtError> {
        let link = self.link.get();
        self.modem
            .wait_urc(what, |urc| match pick(urc) {
                Some((id, value)) if id == link => Some(value),
                Some((id, _)) => {
                    debug!("{} for link {} while waiting on link {}", what, id, link);
                    None
                }
                None => None,
            })
            .await
    }
}

impl<T: AtChannel, D: Dialect> ModemClient for SimcomClient<'_, T, D> {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), AtError> {
        if self.connected {
            self.stop().await?;
        }

        let link = self.link.get();
        self.modem
            .link
            .send(&OpenLink {
                link,
                protocol: "TCP",
                host,
                port,
            })
            .await?;

        let code = self
            .link_urc("+CIPOPEN", |urc| match urc {
                Urc::LinkOpened(event) => Some((event.link, u16::from(event.code))),
                _ => None,
            })
            .await?;
        if code == 0 {
            debug!("Link {} connected to {}:{}", link, host, port);
            self.connected = true;
            Ok(())
        } else {
            warn!("Link {} connect to {}:{} failed ({})", link, host, port, code);
            Err(AtError::Unexpected("+CIPOPEN"))
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, AtError> {
        if data.is_empty() {
            return Ok(0);
        }
        let chunk = &data[..data.len().min(MAX_SEND_CHUNK)];

        self.modem
            .link
            .send(&PrepareSend {
                link: self.link.get(),
                len: chunk.len() as u16,
            })
            .await?;
        self.modem
            .link
            .send(&SendPayload {
                data: Bytes::new(chunk),
            })
            .await?;

        let sent = self
            .link_urc("+CIPSEND", |urc| match urc {
                Urc::DataSent(sent) => Some((sent.link, sent.sent)),
                _ => None,
            })
            .await?;
        Ok(usize::from(sent))
    }

    async fn available(&mut self) -> Result<usize, AtError> {
        self.modem
            .link
            .send(&QueryReceived {
                mode: 4,
                link: self.link.get(),
            })
            .await?;
        let len = self
            .link_urc("+CIPRXGET=4", |urc| match urc {
                Urc::Received(info) if info.mode == 4 => {
                    Some((info.link, info.len.unwrap_or(0)))
                }
                _ => None,
            })
            .await?;
        Ok(usize::from(len))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AtError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let wanted = buf.len().min(MAX_READ_CHUNK);

        let data = self
            .modem
            .link
            .send(&ReadReceived::new(self.link.get(), wanted as u16))
            .await?;
        let announced = self
            .link_urc("+CIPRXGET=2", |urc| match urc {
                Urc::Received(info) if info.mode == 2 => {
                    Some((info.link, info.len.unwrap_or(0)))
                }
                _ => None,
            })
            .await?;

        let got = data.0.len();
        if got != usize::from(announced) || got > wanted {
            warn!("CIPRXGET announced {} bytes, got {}", announced, got);
            return Err(AtError::Unexpected("+CIPRXGET=2"));
        }
        buf[..got].copy_from_slice(&data.0);
        Ok(got)
    }

    async fn stop(&mut self) -> Result<(), AtError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        let link = self.link.get();
        self.modem.link.send(&CloseLink { link }).await?;
        self.link_urc("+CIPCLOSE", |urc| match urc {
            Urc::LinkClosed(event) => Some((event.link, u16::from(event.code))),
            _ => None,
        })
        .await
        .map(|_| ())
    }

    fn connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::modem::a7670::A7670;
    use crate::modem::at::tests::ScriptedLink;
    use crate::modem::sim7600::Sim7600;
    use embassy_futures::block_on;

    fn a7670(script: &str) -> A7670<ScriptedLink> {
        A7670::new(ScriptedLink::new(script))
    }

    #[test]
    fn test_init_disables_echo() {
        let mut modem = a7670("ATE0\r\r\nOK\r\n\r\nOK\r\n");
        block_on(modem.init()).unwrap();
        assert_eq!(modem.release().written_str(), "ATE0\r\nAT+CMEE=1\r\n");
    }

    #[test]
    fn test_sim_status() {
        let mut modem = a7670("\r\n+CPIN: READY\r\n\r\nOK\r\n");
        assert_eq!(block_on(modem.sim_status()), Ok(SimStatus::Ready));

        let mut modem = a7670("\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n");
        assert_eq!(block_on(modem.sim_status()), Ok(SimStatus::PinRequired));

        let mut modem = a7670("\r\n+CME ERROR: 10\r\n");
        assert_eq!(block_on(modem.sim_status()), Ok(SimStatus::NotInserted));

        let mut modem = a7670("\r\n+CME ERROR: 13\r\n");
        assert_eq!(
            block_on(modem.sim_status()),
            Err(AtError::Cme(CmeError::SimFailure))
        );
    }

    #[test]
    fn test_unlock_sim_quotes_pin() {
        let mut modem = a7670("\r\nOK\r\n");
        block_on(modem.unlock_sim("1234")).unwrap();
        assert_eq!(modem.release().written_str(), "AT+CPIN=\"1234\"\r\n");
    }

    #[test]
    fn test_registration_uses_family_query() {
        let mut modem = a7670("\r\n+CEREG: 0,5\r\n\r\nOK\r\n");
        assert_eq!(block_on(modem.registration()), Ok(RegistrationStatus::Roaming));
        assert_eq!(modem.release().written_str(), "AT+CEREG?\r\n");

        let mut modem = Sim7600::new(ScriptedLink::new("\r\n+CGREG: 0,1\r\n\r\nOK\r\n"));
        assert_eq!(block_on(modem.registration()), Ok(RegistrationStatus::Home));
        assert_eq!(modem.release().written_str(), "AT+CGREG?\r\n");
    }

    #[test]
    fn test_signal_quality() {
        let mut modem = a7670("\r\n+CSQ: 18,99\r\n\r\nOK\r\n");
        let quality = block_on(modem.signal_quality()).unwrap();
        assert_eq!(quality, SignalQuality { rssi: 18, ber: 99 });
        assert_eq!(quality.dbm(), Some(-77));
    }

    #[test]
    fn test_attach_opens_network() {
        let mut modem = a7670(concat!(
            "\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n+NETOPEN: 0\r\n\r\nOK\r\n",
            "\r\nOK\r\n\r\n+NETOPEN: 0\r\n",
        ));
        let config = CellularConfig {
            apn: "internet",
            username: "user",
            password: "pass",
            sim_pin: "",
        };

        block_on(modem.attach(&config)).unwrap();

        assert_eq!(
            modem.release().written_str(),
            concat!(
                "AT+CGDCONT=1,\"IP\",\"internet\"\r\n",
                "AT+CGAUTH=1,1,\"user\",\"pass\"\r\n",
                "AT+CIPRXGET=1\r\n",
                "AT+NETOPEN?\r\n",
                "AT+NETOPEN\r\n",
            )
        );
    }

    #[test]
    fn test_attach_skips_open_network() {
        let mut modem = a7670(concat!(
            "\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n+NETOPEN: 1\r\n\r\nOK\r\n",
        ));
        let config = CellularConfig {
            apn: "iot",
            ..CellularConfig::default()
        };

        block_on(modem.attach(&config)).unwrap();

        let written = modem.release();
        assert!(!written.written_str().contains("CGAUTH"));
        assert!(written.written_str().ends_with("AT+NETOPEN?\r\n"));
    }

    #[test]
    fn test_attach_reports_netopen_failure() {
        let mut modem = a7670(concat!(
            "\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n+NETOPEN: 0\r\n\r\nOK\r\n",
            "\r\nOK\r\n\r\nPB DONE\r\n\r\n+NETOPEN: 1\r\n",
        ));
        let config = CellularConfig::default();
        assert_eq!(
            block_on(modem.attach(&config)),
            Err(AtError::Unexpected("+NETOPEN"))
        );
    }

    #[test]
    fn test_gps_power_commands_differ_per_family() {
        let mut modem = a7670("\r\nOK\r\n\r\nOK\r\n");
        block_on(modem.set_gps_power(true)).unwrap();
        block_on(modem.set_gps_power(false)).unwrap();
        assert_eq!(
            modem.release().written_str(),
            "AT+CGNSSPWR=1\r\nAT+CGNSSPWR=0\r\n"
        );

        let mut modem = Sim7600::new(ScriptedLink::new("\r\nOK\r\n"));
        block_on(modem.set_gps_power(true)).unwrap();
        assert_eq!(modem.release().written_str(), "AT+CGPS=1\r\n");
    }

    #[test]
    fn test_client_connect_failure() {
        let mut modem = a7670("\r\nOK\r\n\r\n+CIPOPEN: 2,4\r\n");
        let mut client = modem.client(LinkId::new(2).unwrap());

        assert_eq!(
            block_on(client.connect("10.0.0.1", 1883)),
            Err(AtError::Unexpected("+CIPOPEN"))
        );
        assert!(!client.connected());
    }

    #[test]
    fn test_client_skips_urc_of_other_link() {
        let mut modem = a7670("\r\nOK\r\n\r\n+CIPOPEN: 1,0\r\n\r\n+CIPOPEN: 0,0\r\n");
        let mut client = modem.client(LinkId::new(0).unwrap());

        assert_eq!(block_on(client.connect("10.0.0.1", 80)), Ok(()));
        assert!(client.connected());
        assert_eq!(
            modem.release().written_str(),
            "AT+CIPOPEN=0,\"TCP\",\"10.0.0.1\",80\r\n"
        );
    }

    #[test]
    fn test_client_gives_up_without_own_urc() {
        let mut modem = a7670("\r\nOK\r\n\r\n+CIPOPEN: 1,0\r\n");
        let mut client = modem.client(LinkId::new(0).unwrap());

        assert_eq!(
            block_on(client.connect("10.0.0.1", 80)),
            Err(AtError::NoResponse)
        );
        assert!(!client.connected());
    }

    #[test]
    fn test_client_available_and_chunked_write() {
        let mut modem = a7670(concat!(
            "\r\n+CIPRXGET: 4,0,12\r\n\r\nOK\r\n",
            "\r\n>",
            "\r\nOK\r\n\r\n+CIPSEND: 0,1024,1024\r\n",
        ));
        let mut client = modem.client(LinkId::new(0).unwrap());

        assert_eq!(block_on(client.available()), Ok(12));
        let big = [0x55u8; 1500];
        assert_eq!(block_on(client.write(&big)), Ok(MAX_SEND_CHUNK));

        let written = modem.release();
        assert!(written.written_str().starts_with("AT+CIPRXGET=4,0\r\nAT+CIPSEND=0,1024\r\n"));
        assert_eq!(written.written.len(), 36 + MAX_SEND_CHUNK);
    }

    #[test]
    fn test_client_read_checks_announced_length() {
        let mut modem = a7670("\r\n+CIPRXGET: 2,0,5,0\r\nhi\r\nOK\r\n");
        let mut client = modem.client(LinkId::new(0).unwrap());
        let mut buf = [0u8; 8];

        assert_eq!(
            block_on(client.read(&mut buf)),
            Err(AtError::Unexpected("+CIPRXGET=2"))
        );
    }

    #[test]
    fn test_client_stop_when_closed_is_noop() {
        let mut modem = a7670("");
        let mut client = modem.client(LinkId::new(0).unwrap());
        assert_eq!(block_on(client.stop()), Ok(()));
        assert_eq!(block_on(client.write(&[])), Ok(0));
        assert_eq!(block_on(client.read(&mut [])), Ok(0));
    }
}
