//! Facilities to interact with SSH channels.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures::{AsyncRead, AsyncWrite};

use hawser::wire::connect;

use crate::{Error, Result};

mod io;

pub(crate) mod msg;
use msg::Msg;

mod window;
pub(crate) use window::{LocalWindow, RemoteWindow};

/// Data chunks of the channel streams, as routed to readers.
#[derive(Debug)]
pub(crate) enum Incoming {
    Data(Vec<u8>),
    ExtendedData(connect::ChannelExtendedDataType, Vec<u8>),
    Eof,
}

/// The multiplexer-side sending halves of a [`Channel`]'s queues.
pub(crate) struct Senders {
    pub incoming: flume::Sender<Incoming>,
    pub replies: flume::Sender<RequestResponse>,
    pub requests: flume::Sender<connect::ChannelRequest>,
}

/// A response to a channel request.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestResponse {
    /// The request succeeded.
    Success,

    /// The request failed.
    Failure,
}

/// A reference to an opened channel in the session.
///
/// Dropping the last reference to the channel sends the closing message to
/// the peer, while the multiplexer keeps draining the peer's leftovers
/// until both sides have closed.
pub struct Channel {
    local_id: u32,
    remote_id: u32,
    remote_maximum_packet_size: u32,

    local_window: Arc<LocalWindow>,
    remote_window: Arc<RemoteWindow>,

    incoming: flume::Receiver<Incoming>,
    replies: flume::Receiver<RequestResponse>,
    requests: flume::Receiver<connect::ChannelRequest>,

    outgoing: flume::Sender<Msg>,

    eof_sent: AtomicBool,
    closed: AtomicBool,
}

impl Channel {
    pub(crate) fn new(
        local_id: u32,
        remote_id: u32,
        remote_initial_window_size: u32,
        remote_maximum_packet_size: u32,
        outgoing: flume::Sender<Msg>,
    ) -> (Self, Senders, Arc<LocalWindow>, Arc<RemoteWindow>) {
        let local_window = Arc::new(LocalWindow::default());
        let remote_window = Arc::new(RemoteWindow::from(remote_initial_window_size));

        let (incoming_tx, incoming_rx) = flume::unbounded();
        let (replies_tx, replies_rx) = flume::unbounded();
        let (requests_tx, requests_rx) = flume::unbounded();

        (
            Self {
                local_id,
                remote_id,
                remote_maximum_packet_size,
                local_window: local_window.clone(),
                remote_window: remote_window.clone(),
                incoming: incoming_rx,
                replies: replies_rx,
                requests: requests_rx,
                outgoing,
                eof_sent: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            },
            Senders {
                incoming: incoming_tx,
                replies: replies_tx,
                requests: requests_tx,
            },
            local_window,
            remote_window,
        )
    }

    /// Make a reader for the current channel's _data_ stream.
    ///
    /// # Caveats
    ///
    /// Polling a reader discards the chunks of the other stream types, and
    /// polling concurrently for more than one reader of the same type may
    /// cause data integrity issues.
    pub fn as_reader(&self) -> impl AsyncRead + '_ {
        io::Read::new(self, None)
    }

    /// Make a reader for the current channel's _extended data_ stream.
    ///
    /// # Caveats
    ///
    /// Polling a reader discards the chunks of the other stream types, and
    /// polling concurrently for more than one reader of the same type may
    /// cause data integrity issues.
    pub fn as_reader_ext(&self, ext: connect::ChannelExtendedDataType) -> impl AsyncRead + '_ {
        io::Read::new(self, Some(ext))
    }

    /// Make a writer for the current channel's _data_ stream.
    ///
    /// The writer splits its buffers to the peer's maximum packet size and
    /// suspends while the peer's window is exhausted.
    pub fn as_writer(&self) -> impl AsyncWrite + '_ {
        io::Write::new(self, None)
    }

    /// Make a writer for the current channel's _extended data_ stream.
    pub fn as_writer_ext(&self, ext: connect::ChannelExtendedDataType) -> impl AsyncWrite + '_ {
        io::Write::new(self, Some(ext))
    }

    /// Send a request on the current channel and await the peer's response.
    pub async fn request(
        &self,
        context: connect::ChannelRequestContext,
    ) -> Result<RequestResponse> {
        self.outgoing
            .send_async(Msg::Request(connect::ChannelRequest {
                recipient_channel: self.remote_id,
                want_reply: true,
                context,
            }))
            .await
            .map_err(|_| Error::ChannelClosed)?;

        self.replies
            .recv_async()
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Send a request the peer must not reply to, e.g. `exit-status`.
    pub async fn notify(&self, context: connect::ChannelRequestContext) -> Result<()> {
        self.outgoing
            .send_async(Msg::Request(connect::ChannelRequest {
                recipient_channel: self.remote_id,
                want_reply: false,
                context,
            }))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Receive and handle a request on the current channel.
    pub async fn on_request(
        &self,
        mut handler: impl FnMut(connect::ChannelRequestContext) -> RequestResponse,
    ) -> Result<()> {
        let request = self
            .requests
            .recv_async()
            .await
            .map_err(|_| Error::ChannelClosed)?;

        let response = handler(request.context);

        if request.want_reply {
            let msg = match response {
                RequestResponse::Success => Msg::Success(connect::ChannelSuccess {
                    recipient_channel: self.remote_id,
                }),
                RequestResponse::Failure => Msg::Failure(connect::ChannelFailure {
                    recipient_channel: self.remote_id,
                }),
            };

            self.outgoing
                .send_async(msg)
                .await
                .map_err(|_| Error::ChannelClosed)?;
        }

        Ok(())
    }

    /// Signal that we will not send any more data on the channel.
    ///
    /// The channel stays open in the other direction until closed.
    pub async fn eof(&self) -> Result<()> {
        if self.eof_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.outgoing
            .send_async(Msg::Eof(connect::ChannelEof {
                recipient_channel: self.remote_id,
            }))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Close the channel altogether.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.outgoing
            .send_async(Msg::Close(connect::ChannelClose {
                recipient_channel: self.remote_id,
            }))
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.outgoing.send(Msg::Close(connect::ChannelClose {
                recipient_channel: self.remote_id,
            }));
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("local_id", &self.local_id)
            .field("remote_id", &self.remote_id)
            .field(
                "maximum_packet_size",
                &self.remote_maximum_packet_size,
            )
            .finish_non_exhaustive()
    }
}
