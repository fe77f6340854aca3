//! Supported algorithms for **compression**, **encryption**, **integrity** and **key-exchange**.

// TODO: (feature) Gate insecure algorithms behind an `insecure` feature flag.

use std::str::FromStr;

use crate::{
    wire::{arch::NameList, trans::KexInit},
    Error, Result,
};

/// Resolution of one algorithm category from the two `KEXINIT` preference
/// lists, picking the first client-preferred name also offered by the server.
///
/// The `S` parameter selects the direction for the categories that negotiate
/// independently per direction (ciphers, MACs, compression).
pub(crate) trait Negociate<S = ()>: Sized + FromStr {
    const ERR: Error;

    fn field(kex: &KexInit) -> &NameList;

    fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<Self> {
        Self::field(clientkex)
            .preferred_in(Self::field(serverkex))
            .ok_or(Self::ERR)?
            .parse()
            .map_err(|_| Self::ERR)
    }
}

mod cipher;
pub use cipher::Cipher;
pub(crate) use cipher::CipherState;

mod compress;
pub use compress::Compress;

mod hmac;
pub use hmac::Hmac;

pub(crate) mod kex;
pub use kex::Kex;
pub(crate) use kex::KexMeta;

mod key;
pub use key::Key;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::{client::Client, server::Server};

    fn kexinit(ciphers: &[&str], macs: &[&str]) -> KexInit {
        KexInit {
            encryption_algorithms_client_to_server: ciphers.iter().collect(),
            encryption_algorithms_server_to_client: ciphers.iter().collect(),
            mac_algorithms_client_to_server: macs.iter().collect(),
            mac_algorithms_server_to_client: macs.iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn client_preference_wins_ties() {
        let client = kexinit(&["aes128-ctr", "aes256-ctr"], &["hmac-sha2-256"]);
        let server = kexinit(&["aes256-ctr", "aes128-ctr"], &["hmac-sha2-256"]);

        assert_eq!(
            <Cipher as Negociate<Client>>::negociate(&client, &server).unwrap(),
            Cipher::Aes128Ctr
        );
        assert_eq!(
            <Cipher as Negociate<Server>>::negociate(&client, &server).unwrap(),
            Cipher::Aes128Ctr
        );
    }

    #[test]
    fn empty_intersection_is_fatal() {
        let client = kexinit(&["aes128-ctr"], &["hmac-sha2-256"]);
        let server = kexinit(&["aes256-cbc"], &["hmac-sha2-256"]);

        assert!(matches!(
            <Cipher as Negociate<Client>>::negociate(&client, &server),
            Err(Error::NoCommonCipher)
        ));
    }
}
