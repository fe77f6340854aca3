//! Outcomes of the channel-open handshake, in both directions.

use hawser::wire::connect::ChannelOpenFailureReason;

use crate::channel::Channel;

/// The peer's response to our channel-open request.
#[derive(Debug)]
pub enum ChannelOpen {
    /// The channel has been opened.
    Accepted(Channel),

    /// The peer rejected the channel.
    Rejected {
        /// Machine-readable reason for the rejection.
        reason: ChannelOpenFailureReason,

        /// Human-readable description of the reason.
        message: String,
    },
}

/// Our response to the peer's channel-open request.
#[derive(Debug)]
pub enum Outcome {
    /// Accept the channel.
    Accept,

    /// Reject the channel.
    Reject {
        /// Machine-readable reason for the rejection.
        reason: ChannelOpenFailureReason,

        /// Human-readable description of the reason.
        message: String,
    },
}
