//! AT link on top of `atat`
//!
//! The serial line is split the way `atat` expects: an [`Ingress`] task
//! digests everything the modem sends, handing command replies to a
//! [`ResponseSlot`] and unsolicited result codes (URCs) to a [`UrcChannel`].
//! Commands go out through `atat`'s async client. [`AtLink`] pairs that
//! client with a URC subscription behind the [`AtChannel`] trait the modem
//! drivers are written against.

use core::future::Future;

use atat::asynch::AtatClient;
use atat::{AtatCmd, CmeError, DefaultDigester};
use embassy_time::{Duration, with_timeout};
use log::debug;
use thiserror_no_std::Error;

use super::simcom::Urc;

/// Ingress and response buffer size; also bounds one `CIPRXGET=2` reply
pub const INGRESS_BUF_SIZE: usize = 1536;

/// URCs buffered per subscriber
pub const URC_CAPACITY: usize = 8;

pub const URC_SUBSCRIBERS: usize = 1;

/// URCs examined while waiting for a specific one before giving up
pub const URC_BUDGET: usize = 32;

/// Longest wait for a single URC (`+NETOPEN` can take this long)
pub const URC_TIMEOUT: Duration = Duration::from_secs(30);

pub type ResponseSlot = atat::ResponseSlot<INGRESS_BUF_SIZE>;
pub type UrcChannel = atat::UrcChannel<Urc, URC_CAPACITY, URC_SUBSCRIBERS>;
pub type UrcSubscription<'a> = atat::UrcSubscription<'a, Urc, URC_CAPACITY, URC_SUBSCRIBERS>;
pub type Ingress<'a> =
    atat::Ingress<'a, DefaultDigester<Urc>, Urc, INGRESS_BUF_SIZE, URC_CAPACITY, URC_SUBSCRIBERS>;

/// Ingress for the SIMCom URC set.
pub fn ingress<'a>(
    buf: &'a mut [u8; INGRESS_BUF_SIZE],
    res_slot: &'a ResponseSlot,
    urc_channel: &'a UrcChannel,
) -> Ingress<'a> {
    Ingress::new(DefaultDigester::<Urc>::default(), buf, res_slot, urc_channel)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AtError {
    #[error("no response from modem")]
    NoResponse,
    #[error("modem answered ERROR")]
    Rejected,
    #[error("modem answered +CME ERROR: {0:?}")]
    Cme(CmeError),
    #[error("malformed response")]
    Parse,
    #[error("serial link failed")]
    Transport,
    #[error("unexpected response to {0}")]
    Unexpected(&'static str),
}

impl From<atat::Error> for AtError {
    fn from(e: atat::Error) -> Self {
        match e {
            atat::Error::Timeout => Self::NoResponse,
            atat::Error::Error => Self::Rejected,
            atat::Error::CmeError(code) => Self::Cme(code),
            atat::Error::Parse => Self::Parse,
            other => {
                debug!("AT exchange failed: {:?}", other);
                Self::Transport
            }
        }
    }
}

/// Command/URC channel to one modem.
pub trait AtChannel {
    /// Send `cmd` and wait for its final result code.
    fn send<Cmd: AtatCmd>(
        &mut self,
        cmd: &Cmd,
    ) -> impl Future<Output = Result<Cmd::Response, AtError>>;

    /// Next unsolicited result code.
    fn next_urc(&mut self) -> impl Future<Output = Result<Urc, AtError>>;
}

/// `atat` client plus its URC subscription.
pub struct AtLink<'a, C> {
    client: C,
    urcs: UrcSubscription<'a>,
}

impl<'a, C: AtatClient> AtLink<'a, C> {
    pub fn new(client: C, urcs: UrcSubscription<'a>) -> Self {
        Self { client, urcs }
    }
}

impl<C: AtatClient> AtChannel for AtLink<'_, C> {
    async fn send<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, AtError> {
        Ok(self.client.send(cmd).await?)
    }

    async fn next_urc(&mut self) -> Result<Urc, AtError> {
        with_timeout(URC_TIMEOUT, self.urcs.next_message_pure())
            .await
            .map_err(|_| AtError::NoResponse)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use alloc::collections::VecDeque;
    use alloc::vec;
    use alloc::vec::Vec;
    use atat::atat_derive::{AtatCmd, AtatResp};
    use atat::{AtatUrc, DigestResult, Digester};
    use embassy_futures::block_on;

    use crate::modem::simcom::{LinkEvent, NoResponse};

    /// Modem stand-in: replays a fixed modem output through `atat`'s digester
    /// and records every command written.
    ///
    /// A NUL byte in the script is a reply that never comes: the `send` that
    /// reaches it stays pending.
    pub struct ScriptedLink {
        input: Vec<u8>,
        pos: usize,
        digester: DefaultDigester<Urc>,
        urcs: VecDeque<Urc>,
        pub written: Vec<u8>,
    }

    impl ScriptedLink {
        pub fn new(script: &str) -> Self {
            Self {
                input: script.as_bytes().to_vec(),
                pos: 0,
                digester: DefaultDigester::<Urc>::default(),
                urcs: VecDeque::new(),
                written: Vec::new(),
            }
        }

        pub fn written_str(&self) -> &str {
            core::str::from_utf8(&self.written).unwrap()
        }

        /// End of the script data before the next silence marker.
        fn chunk_end(&self) -> usize {
            self.input[self.pos..]
                .iter()
                .position(|&b| b == 0)
                .map_or(self.input.len(), |i| self.pos + i)
        }

        fn queue_urc(&mut self, line: &[u8]) {
            if let Some(urc) = Urc::parse(line) {
                self.urcs.push_back(urc);
            }
        }
    }

    impl AtChannel for ScriptedLink {
        async fn send<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, AtError> {
            let mut buf = vec![0u8; Cmd::MAX_LEN];
            let len = cmd.write(&mut buf);
            self.written.extend_from_slice(&buf[..len]);

            loop {
                let end = self.chunk_end();
                if end == self.pos {
                    if end < self.input.len() {
                        self.pos += 1;
                        return core::future::pending().await;
                    }
                    return Err(AtError::NoResponse);
                }
                let (result, used) = self.digester.digest(&self.input[self.pos..end]);
                match result {
                    DigestResult::Urc(line) => {
                        let line = line.to_vec();
                        self.pos += used;
                        self.queue_urc(&line);
                    }
                    DigestResult::Response(resp) => {
                        let parsed = cmd.parse(resp);
                        self.pos += used;
                        return Ok(parsed?);
                    }
                    DigestResult::Prompt(_) => {
                        self.pos += used;
                        return Ok(cmd.parse(Ok(&[]))?);
                    }
                    DigestResult::None if used == 0 => return Err(AtError::NoResponse),
                    DigestResult::None => self.pos += used,
                }
            }
        }

        async fn next_urc(&mut self) -> Result<Urc, AtError> {
            loop {
                if let Some(urc) = self.urcs.pop_front() {
                    return Ok(urc);
                }
                let end = self.chunk_end();
                if end == self.pos {
                    return Err(AtError::NoResponse);
                }
                let (result, used) = self.digester.digest(&self.input[self.pos..end]);
                let line = match result {
                    DigestResult::Urc(line) => Some(line.to_vec()),
                    DigestResult::None if used == 0 => return Err(AtError::NoResponse),
                    _ => None,
                };
                self.pos += used;
                if let Some(line) = line {
                    self.queue_urc(&line);
                }
            }
        }
    }

    #[derive(Clone, Debug, AtatResp)]
    struct Operator {
        #[at_arg(position = 0)]
        mode: u8,
        #[at_arg(position = 1)]
        format: u8,
        #[at_arg(position = 2)]
        name: atat::heapless::String<32>,
    }

    #[derive(Clone, AtatCmd)]
    #[at_cmd("+COPS?", Operator)]
    struct GetOperator;

    #[derive(Clone, AtatCmd)]
    #[at_cmd("+CMEE", NoResponse)]
    struct SetErrorFormat {
        #[at_arg(position = 0)]
        mode: u8,
    }

    #[test]
    fn test_reply_keeps_utf8_text() {
        let mut link = ScriptedLink::new("\r\n+COPS: 0,0,\"Café\"\r\n\r\nOK\r\n");

        let operator = block_on(link.send(&GetOperator)).unwrap();

        assert_eq!(operator.mode, 0);
        assert_eq!(operator.format, 0);
        assert_eq!(operator.name.as_str(), "Café");
        assert_eq!(link.written_str(), "AT+COPS?\r\n");
    }

    #[test]
    fn test_command_arguments_are_serialized() {
        let mut link = ScriptedLink::new("ATE0\r\r\nOK\r\n");
        block_on(link.send(&SetErrorFormat { mode: 1 })).unwrap();
        assert_eq!(link.written_str(), "AT+CMEE=1\r\n");
    }

    #[test]
    fn test_final_result_codes_map_to_errors() {
        let mut link = ScriptedLink::new("\r\nERROR\r\n");
        assert_eq!(block_on(link.send(&GetOperator)).err(), Some(AtError::Rejected));

        let mut link = ScriptedLink::new("\r\n+CME ERROR: 10\r\n");
        assert_eq!(
            block_on(link.send(&GetOperator)).err(),
            Some(AtError::Cme(CmeError::SimNotInserted))
        );
    }

    #[test]
    fn test_silent_modem_is_no_response() {
        let mut link = ScriptedLink::new("");
        assert_eq!(block_on(link.send(&GetOperator)).err(), Some(AtError::NoResponse));
    }

    #[test]
    fn test_urcs_before_a_reply_are_kept() {
        let mut link = ScriptedLink::new(concat!(
            "\r\nSMS DONE\r\n",
            "\r\n+CIPCLOSE: 3,0\r\n",
            "\r\n+COPS: 1,0,\"Telia\"\r\n\r\nOK\r\n",
        ));

        let operator = block_on(link.send(&GetOperator)).unwrap();
        assert_eq!(operator.name.as_str(), "Telia");

        assert!(matches!(block_on(link.next_urc()), Ok(Urc::SmsDone)));
        match block_on(link.next_urc()) {
            Ok(Urc::LinkClosed(event)) => assert_eq!(event, LinkEvent { link: 3, code: 0 }),
            other => panic!("expected +CIPCLOSE, got {:?}", other),
        }
        assert_eq!(block_on(link.next_urc()).err(), Some(AtError::NoResponse));
    }

    #[test]
    fn test_atat_errors_are_mapped() {
        assert_eq!(AtError::from(atat::Error::Timeout), AtError::NoResponse);
        assert_eq!(AtError::from(atat::Error::Parse), AtError::Parse);
        assert_eq!(AtError::from(atat::Error::Write), AtError::Transport);
    }
}
