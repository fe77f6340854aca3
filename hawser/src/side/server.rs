//! Server-[`Side`] implementation of the _session_.

use std::time::Duration;

use ssh_key::PrivateKey;

use super::Side;
use crate::{
    algorithm::{Cipher, Compress, Hmac, Kex, Key, KexMeta, Negociate},
    stream::{Stream, TransportPair},
    wire::{trans::KexInit, Id},
    Pipe, Result,
};

/// A _server_-side session configuration.
#[derive(Debug, Clone)]
pub struct Server {
    /// [`Id`] for this _server_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// Server keys for key-exchange signature.
    pub keys: Vec<PrivateKey>,

    /// The algorithms enabled for this _server_ session.
    pub algorithms: Algorithms,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@server:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            keys: Default::default(),
            algorithms: Default::default(),
        }
    }
}

/// Algorithms for a _server_-side session.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: vec![
                Kex::Curve25519Sha256,
                Kex::Curve25519Sha256Libssh,
                Kex::DiffieHellmanGroupExchangeSha256,
                Kex::DiffieHellmanGroup14Sha256,
                Kex::DiffieHellmanGroupExchangeSha1,
                Kex::DiffieHellmanGroup14Sha1,
                Kex::DiffieHellmanGroup1Sha1,
            ],
            ciphers: vec![
                Cipher::Aes256Ctr,
                Cipher::Aes192Ctr,
                Cipher::Aes128Ctr,
                Cipher::Aes256Cbc,
                Cipher::Aes192Cbc,
                Cipher::Aes128Cbc,
                Cipher::TDesCbc,
            ],
            macs: vec![
                Hmac::HmacSha512ETM,
                Hmac::HmacSha256ETM,
                Hmac::HmacSha512,
                Hmac::HmacSha256,
                Hmac::HmacSha1ETM,
                Hmac::HmacSha1,
                Hmac::HmacMd5ETM,
                Hmac::HmacMd5,
            ],
            compressions: vec![Compress::ZlibOpenssh, Compress::Zlib, Compress::None],
        }
    }
}

impl Side for Server {
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
            server_host_key_algorithms: self.keys.iter().map(PrivateKey::algorithm).collect(),
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
        let kex = Kex::negociate(&peerkexinit, &kexinit)?;
        let algorithm = Key::negociate(&peerkexinit, &kexinit)?;

        let key = self
            .keys
            .iter()
            .find(|key| key.algorithm() == algorithm)
            .expect("Did our KexInit lie to the client ?");

        let client = KexMeta::new::<super::Client>(peer_id, &peerkexinit, &kexinit)?;
        let server = KexMeta::new::<Self>(self.id(), &peerkexinit, &kexinit)?;

        kex.as_server(stream, client, server, key).await
    }
}
