//! AT link over the modem UART
//!
//! The UART is split: the receive half feeds `atat`'s ingress from its own
//! task, the transmit half belongs to the `atat` client the modem driver
//! sends commands through.

use esp_hal::Async;
use esp_hal::uart::{Uart, UartRx, UartTx};
use static_cell::StaticCell;
use tsim_core::atat::asynch::Client;
use tsim_core::atat::{self, AtatIngress};
use tsim_core::modem::AtLink;
use tsim_core::modem::at::{self as at_link, INGRESS_BUF_SIZE, Ingress, ResponseSlot, UrcChannel};

pub type AtClient = Client<'static, UartTx<'static, Async>, INGRESS_BUF_SIZE>;
pub type ModemLink = AtLink<'static, AtClient>;

static RES_SLOT: ResponseSlot = ResponseSlot::new();
static URC_CHANNEL: UrcChannel = UrcChannel::new();

/// The URC subscriber slot is already taken.
#[derive(Debug)]
pub struct LinkTaken;

/// Split the modem UART into an ingress for [`ingress_task`] and the link the
/// modem driver talks through. Only the first call succeeds.
pub fn init_at_link(
    uart: Uart<'static, Async>,
) -> Result<(Ingress<'static>, UartRx<'static, Async>, ModemLink), LinkTaken> {
    static INGRESS_BUF: StaticCell<[u8; INGRESS_BUF_SIZE]> = StaticCell::new();
    static CLIENT_BUF: StaticCell<[u8; INGRESS_BUF_SIZE]> = StaticCell::new();

    let urcs = URC_CHANNEL.subscribe().map_err(|_| LinkTaken)?;
    let ingress_buf = INGRESS_BUF.try_init([0; INGRESS_BUF_SIZE]).ok_or(LinkTaken)?;
    let client_buf = CLIENT_BUF.try_init([0; INGRESS_BUF_SIZE]).ok_or(LinkTaken)?;

    let (rx, tx) = uart.split();
    let ingress = at_link::ingress(ingress_buf, &RES_SLOT, &URC_CHANNEL);
    let client = Client::new(tx, &RES_SLOT, client_buf, atat::Config::default());
    Ok((ingress, rx, AtLink::new(client, urcs)))
}

/// Digests everything the modem sends.
#[embassy_executor::task]
pub async fn ingress_task(mut ingress: Ingress<'static>, rx: UartRx<'static, Async>) -> ! {
    ingress.read_from(rx).await
}
