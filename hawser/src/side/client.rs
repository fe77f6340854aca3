//! Client-[`Side`] implementation of the _session_.

use std::{sync::Arc, time::Duration};

use ssh_key::PublicKey;

use super::Side;
use crate::{
    algorithm::{Cipher, Compress, Hmac, Kex, Key, KexMeta, Negociate},
    stream::{Stream, TransportPair},
    wire::{trans::KexInit, Id},
    Error, Pipe, Result,
};

/// The host-key acceptance policy of a _client_ session, consulted for the
/// key the server presented during each key exchange before it is trusted.
#[derive(Clone, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key without verification.
    ///
    /// This provides no protection against machine-in-the-middle
    /// substitution and should only be used for testing.
    #[default]
    AcceptAny,

    /// Accept only the listed keys, e.g. from a known-hosts store.
    Keys(Vec<PublicKey>),

    /// Route the decision through a callback, e.g. an interactive prompt.
    Callback(Arc<dyn Fn(&PublicKey) -> bool + Send + Sync>),
}

impl HostKeyPolicy {
    pub(crate) fn verify(&self, key: &PublicKey) -> bool {
        match self {
            Self::AcceptAny => true,
            Self::Keys(keys) => keys.iter().any(|known| known == key),
            Self::Callback(callback) => callback(key),
        }
    }
}

impl std::fmt::Debug for HostKeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptAny => f.write_str("AcceptAny"),
            Self::Keys(keys) => f.debug_tuple("Keys").field(&keys.len()).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// A _client_-side session configuration.
#[derive(Debug, Clone)]
pub struct Client {
    /// [`Id`] for this _client_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// The host-key acceptance policy for this _client_ session.
    pub host_keys: HostKeyPolicy,

    /// The algorithms enabled for this _client_ session.
    pub algorithms: Algorithms,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@client:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            host_keys: Default::default(),
            algorithms: Default::default(),
        }
    }
}

/// Algorithms for a _client_-side session.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _server key signature_.
    pub keys: Vec<Key>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        let super::server::Algorithms {
            kexs,
            ciphers,
            macs,
            compressions,
        } = Default::default();

        Self {
            kexs,
            keys: vec![
                Key::Ed25519,
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP384,
                },
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP256,
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha512),
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha256),
                },
                Key::Rsa { hash: None },
                Key::Dsa,
            ],
            ciphers,
            macs,
            compressions,
        }
    }
}

impl Side for Client {
    fn id(&self) -> &Id {
        &self.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn kexinit(&self) -> KexInit {
        KexInit {
            cookie: super::cookie(),
            kex_algorithms: self.algorithms.kexs.iter().collect(),
            server_host_key_algorithms: self.algorithms.keys.iter().collect(),
            encryption_algorithms_client_to_server: self.algorithms.ciphers.iter().collect(),
            encryption_algorithms_server_to_client: self.algorithms.ciphers.iter().collect(),
            mac_algorithms_client_to_server: self.algorithms.macs.iter().collect(),
            mac_algorithms_server_to_client: self.algorithms.macs.iter().collect(),
            compression_algorithms_client_to_server: self.algorithms.compressions.iter().collect(),
            compression_algorithms_server_to_client: self.algorithms.compressions.iter().collect(),
            ..Default::default()
        }
    }

    async fn exchange(
        &self,
        stream: &mut Stream<impl Pipe>,
        kexinit: KexInit,
        peerkexinit: KexInit,
        peer_id: &Id,
    ) -> Result<TransportPair> {
        let kex = Kex::negociate(&kexinit, &peerkexinit)?;

        let client = KexMeta::new::<Self>(self.id(), &kexinit, &peerkexinit)?;
        let server = KexMeta::new::<super::Server>(peer_id, &kexinit, &peerkexinit)?;

        let (pair, key) = kex.as_client(stream, client, server).await?;

        if !self.host_keys.verify(&key) {
            tracing::warn!(
                "Rejected the host key of type `{}` presented by the peer",
                key.algorithm()
            );

            return Err(Error::HostKeyUnverified);
        }

        Ok(pair)
    }
}
