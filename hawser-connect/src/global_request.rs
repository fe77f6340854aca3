//! Outcomes of the global-request exchange, in both directions.

/// The peer's response to our global request.
#[derive(Debug, PartialEq, Eq)]
pub enum GlobalRequest {
    /// The request has been accepted.
    Accepted,

    /// The request has been accepted, with the port the peer has bound.
    AcceptedPort(u32),

    /// The request has been rejected.
    Rejected,
}

/// Our response to the peer's global request.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Accept the request.
    Accept,

    /// Accept a `tcpip-forward` request for port `0`, with the bound port.
    AcceptPort(u32),

    /// Reject the request.
    Reject,
}
