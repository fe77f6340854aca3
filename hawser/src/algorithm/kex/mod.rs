use sha1::Sha1;
use sha2::Sha256;
use ssh_key::{PrivateKey, PublicKey};
use strum::{AsRefStr, EnumString};

use crate::{
    stream::{Stream, TransportPair},
    wire::{arch::NameList, trans::KexInit},
    Error, Pipe, Result,
};

use super::Negociate;

mod meta;
pub use meta::KexMeta;

mod curve25519;
mod dh;
mod gex;
mod group;

impl Negociate for Kex {
    const ERR: Error = Error::NoCommonKex;

    fn field(kex: &KexInit) -> &NameList {
        &kex.kex_algorithms
    }
}

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Kex {
    /// Curve25519 ECDH with sha-2-256 digest.
    Curve25519Sha256,

    /// Curve25519 ECDH with sha-2-256 digest (pre-RFC 8731).
    #[strum(serialize = "curve25519-sha256@libssh.org")]
    Curve25519Sha256Libssh,

    /// Group-exchange Diffie-Hellman with sha-2-256 digest.
    DiffieHellmanGroupExchangeSha256,

    /// Group-exchange Diffie-Hellman with sha-1 digest.
    DiffieHellmanGroupExchangeSha1,

    /// Oakley group 14 (2048 bits) Diffie-Hellman with sha-2-256 digest.
    DiffieHellmanGroup14Sha256,

    /// Oakley group 14 (2048 bits) Diffie-Hellman with sha-1 digest.
    DiffieHellmanGroup14Sha1,

    /// Oakley group 2 (1024 bits) Diffie-Hellman with sha-1 digest.
    DiffieHellmanGroup1Sha1,
}

impl Kex {
    /// Run the negotiated exchange from the client side, producing the
    /// transport pair and the server's host key for the acceptance policy.
    pub(crate) async fn as_client(
        &self,
        stream: &mut Stream<impl Pipe>,
        client: KexMeta<'_>,
        server: KexMeta<'_>,
    ) -> Result<(TransportPair, PublicKey)> {
        let (client, server, key) = match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                curve25519::as_client::<Sha256>(stream, client, server).await?
            }
            Self::DiffieHellmanGroupExchangeSha256 => {
                gex::as_client::<Sha256>(stream, client, server).await?
            }
            Self::DiffieHellmanGroupExchangeSha1 => {
                gex::as_client::<Sha1>(stream, client, server).await?
            }
            Self::DiffieHellmanGroup14Sha256 => {
                group::as_client::<Sha256>(stream, client, server, dh::Group::group14()).await?
            }
            Self::DiffieHellmanGroup14Sha1 => {
                group::as_client::<Sha1>(stream, client, server, dh::Group::group14()).await?
            }
            Self::DiffieHellmanGroup1Sha1 => {
                group::as_client::<Sha1>(stream, client, server, dh::Group::group1()).await?
            }
        };

        Ok((
            TransportPair {
                tx: client,
                rx: server,
            },
            key,
        ))
    }

    /// Run the negotiated exchange from the server side, signing the
    /// exchange hash with the provided host key.
    pub(crate) async fn as_server(
        &self,
        stream: &mut Stream<impl Pipe>,
        client: KexMeta<'_>,
        server: KexMeta<'_>,
        key: &PrivateKey,
    ) -> Result<TransportPair> {
        let (client, server) = match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                curve25519::as_server::<Sha256>(stream, client, server, key).await?
            }
            Self::DiffieHellmanGroupExchangeSha256 => {
                gex::as_server::<Sha256>(stream, client, server, key).await?
            }
            Self::DiffieHellmanGroupExchangeSha1 => {
                gex::as_server::<Sha1>(stream, client, server, key).await?
            }
            Self::DiffieHellmanGroup14Sha256 => {
                group::as_server::<Sha256>(stream, client, server, dh::Group::group14(), key)
                    .await?
            }
            Self::DiffieHellmanGroup14Sha1 => {
                group::as_server::<Sha1>(stream, client, server, dh::Group::group14(), key).await?
            }
            Self::DiffieHellmanGroup1Sha1 => {
                group::as_server::<Sha1>(stream, client, server, dh::Group::group1(), key).await?
            }
        };

        Ok(TransportPair {
            tx: server,
            rx: client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_assignments() {
        for (kex, name) in [
            (Kex::Curve25519Sha256, "curve25519-sha256"),
            (Kex::Curve25519Sha256Libssh, "curve25519-sha256@libssh.org"),
            (
                Kex::DiffieHellmanGroupExchangeSha256,
                "diffie-hellman-group-exchange-sha256",
            ),
            (
                Kex::DiffieHellmanGroupExchangeSha1,
                "diffie-hellman-group-exchange-sha1",
            ),
            (
                Kex::DiffieHellmanGroup14Sha256,
                "diffie-hellman-group14-sha256",
            ),
            (Kex::DiffieHellmanGroup14Sha1, "diffie-hellman-group14-sha1"),
            (Kex::DiffieHellmanGroup1Sha1, "diffie-hellman-group1-sha1"),
        ] {
            assert_eq!(kex.as_ref(), name);
            assert_eq!(name.parse::<Kex>().unwrap(), kex);
        }
    }
}
