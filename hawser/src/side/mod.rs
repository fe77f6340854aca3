//! Session's [`Side`]s, either [`client::Client`] or [`server::Server`].

use futures::Future;
use rand::RngCore;

use crate::{
    stream::{Stream, TransportPair},
    wire::{
        trans::{KexInit, NewKeys},
        Id,
    },
    Pipe, Result,
};

pub mod client;
use client::Client;

pub mod server;
use server::Server;

mod private {
    pub trait Sealed {}

    impl Sealed for super::Client {}
    impl Sealed for super::Server {}
}

/// A side of the SSH protocol, either [`Client`] or [`Server`].
pub trait Side: private::Sealed + Send + Sync + 'static {
    /// Get the [`Id`] for this session.
    fn id(&self) -> &Id;

    /// Get the _timeout_ for this session's blocking operations.
    fn timeout(&self) -> std::time::Duration;

    /// Generate a [`KexInit`] message from the config.
    fn kexinit(&self) -> KexInit;

    /// Exchange the keys from the config.
    fn exchange(
        &self,
        stream: &mut Stream<impl Pipe>,
        kexinit: KexInit,
        peerkexinit: KexInit,
        peer_id: &Id,
    ) -> impl Future<Output = Result<TransportPair>> + Send;

    /// Perform the key-exchange from this side, initial or re-key.
    ///
    /// The new keys take effect asymmetrically: the sending direction
    /// right after our own `SSH_MSG_NEWKEYS` is sent, the receiving
    /// direction once the peer's arrives.
    fn kex(
        &self,
        stream: &mut Stream<impl Pipe>,
        peerkexinit: Option<KexInit>,
        peer_id: &Id,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            tracing::debug!("Starting key-exchange procedure");

            let kexinit = self.kexinit();
            stream.send(&kexinit).await?;

            let peerkexinit = match peerkexinit {
                Some(peerkexinit) => peerkexinit,
                None => stream.recv_kex().await?.to()?,
            };

            if peerkexinit.first_kex_packet_follows
                && peerkexinit.kex_algorithms.iter().next()
                    != kexinit.kex_algorithms.iter().next()
            {
                // The peer guessed the kex algorithm wrong: its guessed
                // packet is for another exchange and must be discarded.
                let _ = stream.recv_kex().await?;
            }

            let transport = self.exchange(stream, kexinit, peerkexinit, peer_id).await?;

            tracing::debug!(
                "Key exchange success, negociated algorithms:\nrx: {:?}\ntx: {:?}",
                transport.rx,
                transport.tx,
            );

            stream.send(&NewKeys::default()).await?;
            stream.with_tx(transport.tx);

            stream.recv_kex().await?.to::<NewKeys>()?;
            stream.with_rx(transport.rx);

            Ok(())
        }
    }
}

pub(crate) fn cookie() -> [u8; 16] {
    let mut cookie = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut cookie);

    cookie
}
