use thiserror::Error;

use hawser::wire::connect::ChannelOpenFailureReason;

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Transport error.
    #[error(transparent)]
    Transport(#[from] hawser::Error),

    /// Peer sent a message that is unexpected in the current state.
    #[error("Peer sent a message that was unexpected in this state")]
    UnexpectedMessage,

    /// The peer rejected our request to open a channel.
    ///
    /// Scoped to that channel: the session itself remains usable.
    #[error("The channel open request has been rejected with `{reason:?}`: {message}")]
    ChannelOpenFailure {
        /// Machine-readable reason for the rejection.
        reason: ChannelOpenFailureReason,

        /// Human-readable description of the reason.
        message: String,
    },

    /// The channel has been closed.
    #[error("The channel has been closed")]
    ChannelClosed,

    /// The peer sent more data than the advertised window allowed.
    #[error("Peer overran the advertised window, sent `{size}` with `{available}` available")]
    WindowExceeded {
        /// Size of the offending data message.
        size: u32,

        /// Window allowance remaining for the peer.
        available: u32,
    },
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
