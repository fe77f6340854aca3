use std::{
    collections::VecDeque,
    io::{self, Read as _},
    pin::Pin,
    task,
};

use futures::StreamExt;

use hawser::wire::connect;

use super::super::{Channel, Incoming, Msg};

pub struct Read<'a> {
    channel: &'a Channel,
    stream_id: Option<connect::ChannelExtendedDataType>,

    stream: flume::r#async::RecvStream<'a, Incoming>,
    buffer: VecDeque<u8>,
    eof: bool,
}

impl<'a> Read<'a> {
    pub fn new(channel: &'a Channel, stream_id: Option<connect::ChannelExtendedDataType>) -> Self {
        Self {
            channel,
            stream_id,

            stream: channel.incoming.stream(),
            buffer: VecDeque::new(),
            eof: false,
        }
    }

    fn adjust_window(&self) {
        if let Some(bytes_to_add) = self.channel.local_window.adjustable() {
            let msg = Msg::WindowAdjust(connect::ChannelWindowAdjust {
                recipient_channel: self.channel.remote_id,
                bytes_to_add,
            });

            self.channel.outgoing.send(msg).ok();

            tracing::debug!(
                "Adjusted window size by `{}` for channel {}:{}",
                bytes_to_add,
                self.channel.local_id,
                self.channel.remote_id,
            );
        }
    }
}

impl futures::AsyncRead for Read<'_> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &mut [u8],
    ) -> task::Poll<io::Result<usize>> {
        while self.buffer.is_empty() && !self.eof {
            match futures::ready!(self.stream.poll_next_unpin(cx)) {
                Some(Incoming::Data(data)) if self.stream_id.is_none() => {
                    self.buffer.extend(&data);
                }
                Some(Incoming::ExtendedData(data_type, data))
                    if self.stream_id == Some(data_type) =>
                {
                    self.buffer.extend(&data);
                }
                Some(Incoming::Data(data)) | Some(Incoming::ExtendedData(_, data)) => {
                    // A chunk for another stream of the channel, discarded.
                    tracing::trace!(
                        "Discarded a data block of `{}` bytes for another stream on channel {}:{}",
                        data.len(),
                        self.channel.local_id,
                        self.channel.remote_id,
                    );
                }
                Some(Incoming::Eof) | None => {
                    self.eof = true;
                }
            }
        }

        let count = self.buffer.read(buf);

        self.adjust_window();

        task::Poll::Ready(count)
    }
}
