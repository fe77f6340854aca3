use ssh_key::PrivateKey;

use super::Prompter;

/// The authentication methods this requester can attempt.
pub enum Method {
    /// The SSH `none` authentication method.
    None,

    /// The SSH `publickey` authentication method.
    Publickey { key: Box<PrivateKey> },

    /// The SSH `password` authentication method.
    Password { password: String },

    /// The SSH `keyboard-interactive` authentication method.
    KeyboardInteractive { prompter: Box<dyn Prompter> },

    /// The SSH `hostbased` authentication method.
    Hostbased {
        key: Box<PrivateKey>,
        host_name: String,
        host_username: String,
    },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => hawser::wire::userauth::Method::NONE,
            Self::Publickey { .. } => hawser::wire::userauth::Method::PUBLICKEY,
            Self::Password { .. } => hawser::wire::userauth::Method::PASSWORD,
            Self::KeyboardInteractive { .. } => {
                hawser::wire::userauth::Method::KEYBOARD_INTERACTIVE
            }
            Self::Hostbased { .. } => hawser::wire::userauth::Method::HOSTBASED,
        }
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Allow keys with different fingerprints to exist alongside.
            (Self::Publickey { key: this }, Self::Publickey { key: other }) => {
                this.fingerprint(ssh_key::HashAlg::Sha256)
                    == other.fingerprint(ssh_key::HashAlg::Sha256)
            }
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl Eq for Method {}

impl std::hash::Hash for Method {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);

        if let Self::Publickey { key } = self {
            key.fingerprint(ssh_key::HashAlg::Sha256)
                .as_bytes()
                .hash(state);
        }
    }
}
