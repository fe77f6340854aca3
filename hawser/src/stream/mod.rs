//! Primitives to exchange binary packets over an [`AsyncBufRead`] + [`AsyncWrite`] stream.

use std::collections::VecDeque;

use futures::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use futures_time::{future::FutureExt, time::Duration};

use crate::{
    wire::{trans, Packet, ToPacket},
    Error, Result,
};

mod counter;
use counter::IoCounter;

mod transport;
pub use transport::{Transport, TransportPair};

mod keys;
pub use keys::Keys;

/// Re-key after 1GiB of exchanged data, as recommended per the RFC.
const REKEY_BYTES_THRESHOLD: usize = 0x40000000;

/// A wrapper around [`AsyncBufRead`] + [`AsyncWrite`]
/// to interface with the SSH binary packet protocol.
pub struct Stream<IO> {
    inner: IoCounter<IO>,
    timeout: Duration,

    /// The pair of transports computed from the latest key exchange.
    transport: TransportPair,

    /// The session identifier derived from the first key exchange.
    session: Option<Vec<u8>>,

    /// Whether user authentication has succeeded on this stream.
    authed: bool,

    /// Sequence number for the `tx` side.
    txseq: u32,

    /// Sequence number for the `rx` side.
    rxseq: u32,

    /// A packet buffer for the `peek` method.
    buffer: Option<Packet>,

    /// Non-transport packets received in the middle of a key exchange,
    /// replayed in order once the exchange completes.
    queue: VecDeque<Packet>,
}

impl<IO: AsyncBufRead + AsyncWrite + Unpin> Stream<IO> {
    pub(crate) fn new(stream: IO, timeout: std::time::Duration) -> Self {
        Self {
            inner: IoCounter::new(stream),
            timeout: timeout.into(),
            transport: Default::default(),
            session: None,
            authed: false,
            txseq: 0,
            rxseq: 0,
            buffer: None,
            queue: VecDeque::new(),
        }
    }

    /// Access the session identifier, set by the first key exchange.
    pub(crate) fn session_id(&self) -> Option<&[u8]> {
        self.session.as_deref()
    }

    /// Record the session identifier on the first key exchange, returning
    /// the identifier that is actually in force.
    pub(crate) fn with_session(&mut self, hash: &[u8]) -> Vec<u8> {
        self.session.get_or_insert_with(|| hash.to_vec()).clone()
    }

    /// Take the new sending transport into use, right after our `SSH_MSG_NEWKEYS`.
    pub(crate) fn with_tx(&mut self, mut tx: Transport) {
        tx.authed = self.authed;
        self.transport.tx = tx;
    }

    /// Take the new receiving transport into use, right after the peer's
    /// `SSH_MSG_NEWKEYS`, and restart the re-key counter.
    pub(crate) fn with_rx(&mut self, mut rx: Transport) {
        rx.authed = self.authed;
        self.transport.rx = rx;
        self.inner.reset();
    }

    /// Flag the stream as authenticated, activating delayed compression.
    pub(crate) fn set_authenticated(&mut self) {
        self.authed = true;
        self.transport.tx.authed = true;
        self.transport.rx.authed = true;
    }

    /// Whether the stream should be re-keyed before the next exchange.
    pub(crate) fn is_rekeyable(&self) -> bool {
        self.session.is_none() || self.inner.count() > REKEY_BYTES_THRESHOLD
    }

    async fn packet(&mut self) -> Result<Packet> {
        let packet = Packet::from_async_reader(&mut self.inner, &mut self.transport.rx, self.rxseq)
            .timeout(self.timeout)
            .await
            .map_err(|_| Error::Timeout)??;

        tracing::trace!(
            "<-({}) message `{:?}` of {} bytes",
            self.rxseq,
            packet.message_number(),
            packet.payload.len()
        );

        self.rxseq = self.rxseq.wrapping_add(1);

        Ok(packet)
    }

    /// Receive a _packet_ from the peer, replaying packets that were
    /// deferred during a key exchange first.
    pub(crate) async fn recv(&mut self) -> Result<Packet> {
        if let Some(packet) = self.queue.pop_front() {
            return Ok(packet);
        }

        match self.buffer.take() {
            Some(packet) => Ok(packet),
            None => self.packet().await,
        }
    }

    /// Peek at the next _packet_ from the peer, leaving it receivable.
    pub(crate) async fn peek(&mut self) -> Result<&Packet> {
        let packet = match self.buffer.take() {
            Some(packet) => packet,
            None => self.packet().await?,
        };

        Ok(self.buffer.insert(packet))
    }

    /// Receive a _packet_ taking part in a key exchange, deferring the
    /// packets of upper protocol layers until the exchange completes and
    /// handling the generic transport messages in place.
    pub(crate) async fn recv_kex(&mut self) -> Result<Packet> {
        loop {
            let packet = match self.buffer.take() {
                Some(packet) => packet,
                None => self.packet().await?,
            };

            if let Ok(trans::Disconnect { reason, .. }) = packet.to() {
                break Err(Error::Disconnected(reason));
            } else if packet.to::<trans::Ignore>().is_ok()
                || packet.to::<trans::Debug>().is_ok()
                || packet.to::<trans::Unimplemented>().is_ok()
            {
                continue;
            } else if matches!(packet.message_number(), Some(number) if !(20..=49).contains(&number))
            {
                // Not a key-exchange message: the peer sent it before it had
                // processed our `KEXINIT`, replay it after the exchange.
                self.queue.push_back(packet);

                continue;
            } else {
                break Ok(packet);
            }
        }
    }

    /// Send a _packet_ to the peer, serializing and sealing the `message`.
    pub(crate) async fn send(&mut self, message: &impl ToPacket) -> Result<()> {
        let packet = message.to_packet();

        packet
            .to_async_writer(&mut self.inner, &mut self.transport.tx, self.txseq)
            .timeout(self.timeout)
            .await
            .map_err(|_| Error::Timeout)??;
        self.inner.flush().await?;

        tracing::trace!(
            "({})-> message `{:?}` of {} bytes",
            self.txseq,
            packet.message_number(),
            packet.payload.len()
        );

        self.txseq = self.txseq.wrapping_add(1);

        Ok(())
    }

    /// Whether a _packet_ is immediately receivable.
    pub(crate) async fn is_readable(&mut self) -> Result<bool> {
        if self.buffer.is_some() || !self.queue.is_empty() {
            return Ok(true);
        }

        match self
            .inner
            .fill_buf()
            .timeout(Duration::from_micros(1))
            .await
        {
            Ok(buf) => Ok(!buf?.is_empty()),
            Err(_) => Ok(false),
        }
    }

    /// Wait until a _packet_ is receivable.
    pub(crate) async fn fill_buf(&mut self) -> Result<()> {
        if self.buffer.is_some() || !self.queue.is_empty() {
            return Ok(());
        }

        self.inner.fill_buf().await?;

        Ok(())
    }
}
