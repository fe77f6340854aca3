use thiserror::Error;

use crate::wire::trans::DisconnectReason;

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Binary (de)-serialization error.
    #[error(transparent)]
    Binary(#[from] crate::wire::Error),

    /// I/O Error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// SSH Key error.
    #[error(transparent)]
    Key(#[from] ssh_key::Error),

    /// Packet integrity error.
    #[error(transparent)]
    Integrity(#[from] digest::MacError),

    /// Signature error during the key-exchange.
    #[error(transparent)]
    Signature(#[from] signature::Error),

    /// Error while encrypting or decrypting messages.
    #[error("The cipher ended up in an error")]
    Cipher,

    /// A packet did not satisfy the size or alignment rules of the framing.
    #[error("The packet length `{0}` is unaligned or out of bounds")]
    PacketSize(usize),

    /// No common kex algorithm found between both sides.
    #[error("Unable to negociate a common kex algorithm")]
    NoCommonKex,

    /// No common key algorithm found between both sides.
    #[error("Unable to negociate a common host key algorithm")]
    NoCommonKey,

    /// No common cipher algorithm found between both sides.
    #[error("Unable to negociate a common encryption algorithm")]
    NoCommonCipher,

    /// No common hmac algorithm found between both sides.
    #[error("Unable to negociate a common HMAC algorithm")]
    NoCommonHmac,

    /// No common compression algorithm found between both sides.
    #[error("Unable to negociate a common compression algorithm")]
    NoCommonCompression,

    /// Provided algorithm wasn't supported.
    #[error("Algorithm is unsupported")]
    UnsupportedAlgorithm,

    /// Protocol error in the key-exchange.
    #[error("Error in the key-exchange algorithm")]
    KexError,

    /// The host key presented by the peer was rejected by the configured policy.
    #[error("The peer's host key was rejected")]
    HostKeyUnverified,

    /// Every available authentication method was attempted without success.
    ///
    /// The transport itself remains intact, another authentication round
    /// may be attempted with different credentials.
    #[error("All available authentication methods were exhausted")]
    AllMethodsExhausted,

    /// The peer requires the password to be changed before authenticating.
    #[error("The peer requires a password change to proceed")]
    PasswordChangeRequired,

    /// Peer accepted or requested an unknown service.
    #[error("The requested service is unknown")]
    UnknownService,

    /// Peer sent a message that is unexpected in the current protocol state.
    #[error("Peer sent a message that was unexpected in this state")]
    UnexpectedMessage,

    /// An operation did not complete within the configured timeout.
    #[error("The operation timed out")]
    Timeout,

    /// The session has been disconnected.
    #[error("The session has been disconnected with `{0:?}`")]
    Disconnected(DisconnectReason),
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
