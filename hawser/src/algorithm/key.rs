pub use ssh_key::Algorithm as Key;

use crate::{
    wire::{arch::NameList, trans::KexInit},
    Error,
};

use super::Negociate;

impl Negociate for Key {
    const ERR: Error = Error::NoCommonKey;

    fn field(kex: &KexInit) -> &NameList {
        &kex.server_host_key_algorithms
    }
}
