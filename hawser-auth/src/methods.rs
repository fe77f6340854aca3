use bitflags::bitflags;

use hawser::wire::{arch::NameList, userauth};

/// Set of enabled authentication methods on the handler.
#[derive(Debug, Clone, Copy)]
pub struct Methods(u8);

bitflags! {
   impl Methods: u8 {
        /// The SSH `none` authentication method.
        const NONE = 1 << 0;

        /// The SSH `publickey` authentication method.
        const PUBLICKEY = 1 << 1;

        /// The SSH `password` authentication method.
        const PASSWORD = 1 << 2;
    }
}

impl Methods {
    /// The `name-list` of the enabled methods, as sent in a failure message.
    pub(crate) fn to_name_list(self) -> NameList {
        [
            (Self::PUBLICKEY, userauth::Method::PUBLICKEY),
            (Self::PASSWORD, userauth::Method::PASSWORD),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl Default for Methods {
    fn default() -> Self {
        Self::NONE
    }
}
