//! Facilities to interact with the SSH _connect_ protocol.

use std::{collections::HashMap, convert::Infallible};

use futures::future::Either;

use hawser::{
    side::Side,
    wire::{connect, Packet},
    Pipe, Session,
};

use std::sync::Arc;

use crate::{
    channel::{self, Incoming, LocalWindow, RemoteWindow, Senders},
    channel_open, global_request, Error, Result,
};

#[doc(no_inline)]
pub use hawser::wire::connect::{
    ChannelOpenContext, ChannelOpenFailureReason, ChannelRequestContext, GlobalRequestContext,
};

/// The multiplexer-side bookkeeping of one open channel.
struct ChannelDef {
    remote_id: u32,

    senders: Option<Senders>,
    local_window: Arc<LocalWindow>,
    remote_window: Arc<RemoteWindow>,

    local_closed: bool,
    remote_closed: bool,
}

/// The callback deciding on the peer's channel-open requests.
type OpenHook<'h> = dyn FnMut(ChannelOpenContext, channel::Channel) -> channel_open::Outcome + Send + 'h;

/// The callback deciding on the peer's global requests.
type GlobalHook = dyn FnMut(GlobalRequestContext) -> global_request::Outcome + Send;

/// A wrapper around a [`Session`] to multiplex channels over the connection,
/// with per-channel flow-control windows in both directions.
pub struct Connect<'s, IO: Pipe, S: Side> {
    session: &'s mut Session<IO, S>,
    channels: HashMap<u32, ChannelDef>,

    outgoing: (
        flume::Sender<channel::msg::Msg>,
        flume::Receiver<channel::msg::Msg>,
    ),

    /// Peer channel-open requests received while no handler was around,
    /// processed once [`Connect::run`] takes over.
    pending_opens: Vec<connect::ChannelOpen>,

    global_hook: Option<Box<GlobalHook>>,
}

impl<'s, IO: Pipe, S: Side> Connect<'s, IO, S> {
    pub(crate) fn new(session: &'s mut Session<IO, S>) -> Self {
        Self {
            session,
            channels: HashMap::new(),

            outgoing: flume::unbounded(),

            pending_opens: Vec::new(),
            global_hook: None,
        }
    }

    /// Register the hook deciding on the peer's global requests.
    ///
    /// Without one, every peer global request is rejected.
    pub fn on_global_request(
        mut self,
        hook: impl FnMut(GlobalRequestContext) -> global_request::Outcome + Send + 'static,
    ) -> Self {
        self.global_hook = Some(Box::new(hook));

        self
    }

    /// The lowest locally-unused channel number.
    ///
    /// Numbers are only reused once the channel is gone from the table,
    /// that is once both sides have closed it.
    fn local_id(&self) -> u32 {
        (0..)
            .find(|id| !self.channels.contains_key(id))
            .expect("Exhausted the channel number space")
    }

    fn make_channel(
        &mut self,
        local_id: u32,
        remote_id: u32,
        remote_initial_window_size: u32,
        remote_maximum_packet_size: u32,
    ) -> channel::Channel {
        let (channel, senders, local_window, remote_window) = channel::Channel::new(
            local_id,
            remote_id,
            remote_initial_window_size,
            remote_maximum_packet_size,
            self.outgoing.0.clone(),
        );

        self.channels.insert(
            local_id,
            ChannelDef {
                remote_id,
                senders: Some(senders),
                local_window,
                remote_window,
                local_closed: false,
                remote_closed: false,
            },
        );

        channel
    }

    /// Ask the peer to open a channel with the provided `context`.
    pub async fn channel_open(
        &mut self,
        context: ChannelOpenContext,
    ) -> Result<channel_open::ChannelOpen> {
        let local_id = self.local_id();

        self.session
            .send(&connect::ChannelOpen {
                sender_channel: local_id,
                initial_window_size: LocalWindow::INITIAL_WINDOW_SIZE,
                maximum_packet_size: LocalWindow::MAXIMUM_PACKET_SIZE,
                context,
            })
            .await?;

        loop {
            let packet = self.session.recv().await?;

            if let Ok(confirmation) = packet.to::<connect::ChannelOpenConfirmation>() {
                if confirmation.recipient_channel != local_id {
                    return Err(Error::UnexpectedMessage);
                }

                let channel = self.make_channel(
                    local_id,
                    confirmation.sender_channel,
                    confirmation.initial_window_size,
                    confirmation.maximum_packet_size,
                );

                break Ok(channel_open::ChannelOpen::Accepted(channel));
            } else if let Ok(failure) = packet.to::<connect::ChannelOpenFailure>() {
                if failure.recipient_channel != local_id {
                    return Err(Error::UnexpectedMessage);
                }

                break Ok(channel_open::ChannelOpen::Rejected {
                    reason: failure.reason,
                    message: failure.description.into_string(),
                });
            } else {
                self.dispatch(packet, None).await?;
            }
        }
    }

    /// Make a global request with the provided `context`.
    pub async fn global_request(
        &mut self,
        context: GlobalRequestContext,
    ) -> Result<global_request::GlobalRequest> {
        let with_port = matches!(
            context,
            GlobalRequestContext::TcpipForward { bind_port: 0, .. }
        );

        self.session
            .send(&connect::GlobalRequest {
                want_reply: true,
                context,
            })
            .await?;

        loop {
            let packet = self.session.recv().await?;

            if packet.to::<connect::RequestFailure>().is_ok() {
                break Ok(global_request::GlobalRequest::Rejected);
            } else if with_port {
                if let Ok(connect::ForwardingSuccess { bound_port }) = packet.to() {
                    break Ok(global_request::GlobalRequest::AcceptedPort(bound_port));
                }

                self.dispatch(packet, None).await?;
            } else if packet.to::<connect::RequestSuccess>().is_ok() {
                break Ok(global_request::GlobalRequest::Accepted);
            } else {
                self.dispatch(packet, None).await?;
            }
        }
    }

    /// Process the connection's messages endlessly, routing channel traffic
    /// and consulting the hook for the peer's channel-open requests.
    ///
    /// # Note
    ///
    /// Blocking in the hook blocks the whole multiplexer: spawn off any
    /// long-running work on the provided [`channel::Channel`] instead.
    pub async fn run(
        mut self,
        mut on_channel_open: impl FnMut(ChannelOpenContext, channel::Channel) -> channel_open::Outcome
            + Send,
    ) -> Result<Infallible> {
        for open in std::mem::take(&mut self.pending_opens) {
            self.peer_open(open, &mut on_channel_open).await?;
        }

        loop {
            // Race the outgoing queue against the socket, with the borrows
            // scoped so the winner can be processed with the whole `self`.
            let turn = {
                let readable = self.session.readable();
                let outgoing = self.outgoing.1.recv_async();
                futures::pin_mut!(readable, outgoing);

                match futures::future::select(readable, outgoing).await {
                    Either::Left((res, _)) => {
                        res?;

                        None
                    }
                    Either::Right((msg, _)) => {
                        #[allow(clippy::unwrap_used)]
                        // Will never be disconnected, since we always hold a sender.
                        Some(msg.unwrap())
                    }
                }
            };

            match turn {
                Some(msg) => self.tx(msg).await?,
                None => {
                    let packet = self.session.recv().await?;
                    self.dispatch(packet, Some(&mut on_channel_open)).await?;
                }
            }
        }
    }

    /// Forward one outgoing channel message to the peer, maintaining the
    /// close bookkeeping on the way.
    async fn tx(&mut self, msg: channel::msg::Msg) -> Result<()> {
        let recipient = msg.recipient_channel();

        let Some((&local_id, def)) = self
            .channels
            .iter_mut()
            .find(|(_, def)| def.remote_id == recipient)
        else {
            // The channel is already gone from the table, drop the leftover.
            return Ok(());
        };

        if matches!(msg, channel::msg::Msg::Close(_)) {
            def.local_closed = true;
        }

        self.session.send(&msg).await?;

        let def = &self.channels[&local_id];
        if def.local_closed && def.remote_closed {
            self.channels.remove(&local_id);

            tracing::debug!("Channel {local_id}:{recipient} closed by both sides, removed");
        }

        Ok(())
    }

    async fn peer_open(
        &mut self,
        open: connect::ChannelOpen,
        on_channel_open: &mut OpenHook<'_>,
    ) -> Result<()> {
        tracing::debug!(
            "Peer requested to open channel %{}: {:?}",
            open.sender_channel,
            open.context
        );

        let local_id = self.local_id();
        let channel = self.make_channel(
            local_id,
            open.sender_channel,
            open.initial_window_size,
            open.maximum_packet_size,
        );

        match on_channel_open(open.context, channel) {
            channel_open::Outcome::Accept => {
                self.session
                    .send(&connect::ChannelOpenConfirmation {
                        recipient_channel: open.sender_channel,
                        sender_channel: local_id,
                        initial_window_size: LocalWindow::INITIAL_WINDOW_SIZE,
                        maximum_packet_size: LocalWindow::MAXIMUM_PACKET_SIZE,
                    })
                    .await?;
            }
            channel_open::Outcome::Reject { reason, message } => {
                self.channels.remove(&local_id);

                self.session
                    .send(&connect::ChannelOpenFailure {
                        recipient_channel: open.sender_channel,
                        reason,
                        description: message.as_str().into(),
                        language: Default::default(),
                    })
                    .await?;
            }
        }

        Ok(())
    }

    /// Route one incoming packet of the connection protocol.
    async fn dispatch(
        &mut self,
        packet: Packet,
        on_channel_open: Option<&mut OpenHook<'_>>,
    ) -> Result<()> {
        if let Ok(open) = packet.to::<connect::ChannelOpen>() {
            match on_channel_open {
                Some(hook) => self.peer_open(open, hook).await?,
                None => self.pending_opens.push(open),
            }
        } else if let Ok(connect::ChannelWindowAdjust {
            recipient_channel,
            bytes_to_add,
        }) = packet.to()
        {
            if let Some(def) = self.channels.get(&recipient_channel) {
                def.remote_window.replenish(bytes_to_add);
            }
        } else if let Ok(connect::ChannelData {
            recipient_channel,
            data,
        }) = packet.to()
        {
            self.data(recipient_channel, Incoming::Data(data.into_vec()))?;
        } else if let Ok(connect::ChannelExtendedData {
            recipient_channel,
            data_type,
            data,
        }) = packet.to()
        {
            self.data(
                recipient_channel,
                Incoming::ExtendedData(data_type, data.into_vec()),
            )?;
        } else if let Ok(connect::ChannelEof { recipient_channel }) = packet.to() {
            if let Some(def) = self.channels.get(&recipient_channel) {
                if let Some(ref senders) = def.senders {
                    senders.incoming.send(Incoming::Eof).ok();
                }
            }
        } else if let Ok(connect::ChannelClose { recipient_channel }) = packet.to() {
            self.peer_close(recipient_channel).await?;
        } else if let Ok(request @ connect::ChannelRequest { .. }) = packet.to() {
            if let Some(def) = self.channels.get(&request.recipient_channel) {
                if let Some(ref senders) = def.senders {
                    senders.requests.send(request).ok();
                }
            }
        } else if let Ok(connect::ChannelSuccess { recipient_channel }) = packet.to() {
            if let Some(def) = self.channels.get(&recipient_channel) {
                if let Some(ref senders) = def.senders {
                    senders.replies.send(channel::RequestResponse::Success).ok();
                }
            }
        } else if let Ok(connect::ChannelFailure { recipient_channel }) = packet.to() {
            if let Some(def) = self.channels.get(&recipient_channel) {
                if let Some(ref senders) = def.senders {
                    senders.replies.send(channel::RequestResponse::Failure).ok();
                }
            }
        } else if let Ok(request @ connect::GlobalRequest { .. }) = packet.to() {
            self.peer_global_request(request).await?;
        } else if packet.to::<connect::RequestSuccess>().is_ok()
            || packet.to::<connect::RequestFailure>().is_ok()
        {
            tracing::debug!("Received a stray global-request reply, ignored");
        } else {
            tracing::warn!(
                "Received an unhandled message of number `{:?}`",
                packet.message_number()
            );
        }

        Ok(())
    }

    /// Route one incoming data chunk, enforcing the advertised window.
    fn data(&mut self, recipient_channel: u32, incoming: Incoming) -> Result<()> {
        let Some(def) = self.channels.get(&recipient_channel) else {
            // Data for a channel we already closed is drained, not an error.
            tracing::trace!("Discarded a data block for the closed channel %{recipient_channel}");

            return Ok(());
        };

        let size = match &incoming {
            Incoming::Data(data) | Incoming::ExtendedData(_, data) => data.len() as u32,
            Incoming::Eof => 0,
        };

        let available = def.local_window.size();
        if size > available {
            return Err(Error::WindowExceeded { size, available });
        }

        def.local_window.consume(size);

        if let Some(ref senders) = def.senders {
            senders.incoming.send(incoming).ok();
        }

        Ok(())
    }

    /// Handle the peer's close: reply with ours if not already sent, and
    /// remove the channel once both sides have closed.
    async fn peer_close(&mut self, recipient_channel: u32) -> Result<()> {
        let Some(def) = self.channels.get_mut(&recipient_channel) else {
            return Ok(());
        };

        def.remote_closed = true;

        // Wake up any reader still waiting on the channel.
        drop(def.senders.take());

        if !def.local_closed {
            def.local_closed = true;
            let remote_id = def.remote_id;

            self.session
                .send(&connect::ChannelClose {
                    recipient_channel: remote_id,
                })
                .await?;
        }

        self.channels.remove(&recipient_channel);

        tracing::debug!("Channel %{recipient_channel} closed by both sides, removed");

        Ok(())
    }

    async fn peer_global_request(&mut self, request: connect::GlobalRequest) -> Result<()> {
        let outcome = match self.global_hook {
            Some(ref mut hook) => hook(request.context),
            None => global_request::Outcome::Reject,
        };

        if request.want_reply {
            match outcome {
                global_request::Outcome::Accept => {
                    self.session
                        .send(&connect::RequestSuccess::default())
                        .await?;
                }
                global_request::Outcome::AcceptPort(bound_port) => {
                    self.session
                        .send(&connect::ForwardingSuccess { bound_port })
                        .await?;
                }
                global_request::Outcome::Reject => {
                    self.session
                        .send(&connect::RequestFailure::default())
                        .await?;
                }
            }
        }

        Ok(())
    }
}

impl<IO: Pipe, S: Side> std::fmt::Debug for Connect<'_, IO, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connect")
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}
