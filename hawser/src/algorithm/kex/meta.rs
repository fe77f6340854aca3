use std::any::TypeId;

use crate::{
    algorithm::{Cipher, Compress, Hmac, Negociate},
    side::{client::Client, server::Server, Side},
    stream::{Keys, Transport},
    wire::{trans::KexInit, Id},
    Result,
};

/// The per-direction inputs of a key-exchange: one side's identification,
/// its raw `KEXINIT` and the algorithms negotiated for the direction it
/// sends on.
pub struct KexMeta<'k> {
    pub id: &'k Id,

    pub compress: Compress,
    pub cipher: Cipher,
    pub hmac: Hmac,

    pub kexinit: &'k KexInit,
}

impl<'k> KexMeta<'k> {
    pub fn new<S: Side>(
        id: &'k Id,
        clientkex: &'k KexInit,
        serverkex: &'k KexInit,
    ) -> Result<Self>
    where
        Compress: Negociate<S>,
        Cipher: Negociate<S>,
        Hmac: Negociate<S>,
    {
        Ok(Self {
            id,
            compress: <Compress as Negociate<S>>::negociate(clientkex, serverkex)?,
            cipher: <Cipher as Negociate<S>>::negociate(clientkex, serverkex)?,
            hmac: <Hmac as Negociate<S>>::negociate(clientkex, serverkex)?,
            kexinit: if TypeId::of::<S>() == TypeId::of::<Client>() {
                clientkex
            } else if TypeId::of::<S>() == TypeId::of::<Server>() {
                serverkex
            } else {
                unreachable!("There should not be any other struct implementing `Side`")
            },
        })
    }

    pub fn into_transport(self, keys: Keys) -> Transport {
        let Self {
            compress,
            cipher,
            hmac,
            ..
        } = self;

        Transport {
            chain: keys,
            state: None,
            cipher,
            hmac,
            compress,
            authed: false,
        }
    }
}
