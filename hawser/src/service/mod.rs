//! Service handling facilities on a [`Session`].
//!
//! Protocol phases hand the session over to typed services: a
//! [`Request`] drives a service we ask of the peer (client role), while a
//! [`Handler`] serves a request the peer makes of us (server role).

use futures::Future;

use crate::{session::Session, side::Side, Pipe};

/// A service we _request_ from the connected peer.
pub trait Request {
    /// The erroneous outcome of the [`Request`].
    type Err: From<crate::Error>;

    /// The successful outcome of the [`Request`].
    type Ok<'s, IO: Pipe + 's, S: Side + 's>;

    /// The requested service _identifier_.
    const SERVICE_NAME: &'static str;

    /// The service callback, called when the peer accepted the service request.
    fn on_accept<'s, IO, S>(
        &mut self,
        session: &'s mut Session<IO, S>,
    ) -> impl Future<Output = Result<Self::Ok<'s, IO, S>, Self::Err>>
    where
        IO: Pipe,
        S: Side;
}

/// A service we _handle_ for the connected peer.
pub trait Handler {
    /// The erroneous outcome of the [`Handler`].
    type Err: From<crate::Error>;

    /// The successful outcome of the [`Handler`].
    type Ok<'s, IO: Pipe + 's, S: Side + 's>;

    /// The handled service _identifier_.
    const SERVICE_NAME: &'static str;

    /// The service callback, called when we accepted the peer's service request.
    fn on_request<'s, IO, S>(
        &mut self,
        session: &'s mut Session<IO, S>,
    ) -> impl Future<Output = Result<Self::Ok<'s, IO, S>, Self::Err>>
    where
        IO: Pipe,
        S: Side;
}
