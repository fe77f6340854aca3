use std::{io, pin::Pin, task};

use hawser::wire::connect;

use super::super::{Channel, Msg};

pub struct Write<'a> {
    channel: &'a Channel,
    stream_id: Option<connect::ChannelExtendedDataType>,
}

impl<'a> Write<'a> {
    pub fn new(channel: &'a Channel, stream_id: Option<connect::ChannelExtendedDataType>) -> Self {
        Self { channel, stream_id }
    }
}

impl futures::AsyncWrite for Write<'_> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &[u8],
    ) -> task::Poll<io::Result<usize>> {
        // A single data message may not exceed the peer's maximum packet
        // size nor its remaining window: whatever does not fit is left for
        // the next call.
        let writable = self
            .channel
            .remote_maximum_packet_size
            .min(buf.len() as u32);

        let reserved = futures::ready!(self.channel.remote_window.poll_reserve(cx, writable));

        let data = buf[..reserved as usize].to_vec().into();
        let msg = match self.stream_id {
            None => Msg::Data(connect::ChannelData {
                recipient_channel: self.channel.remote_id,
                data,
            }),
            Some(data_type) => Msg::ExtendedData(connect::ChannelExtendedData {
                recipient_channel: self.channel.remote_id,
                data_type,
                data,
            }),
        };

        self.channel
            .outgoing
            .send(msg)
            .map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))?;

        task::Poll::Ready(Ok(reserved as usize))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        task::Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        if !self
            .channel
            .eof_sent
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            self.channel
                .outgoing
                .send(Msg::Eof(connect::ChannelEof {
                    recipient_channel: self.channel.remote_id,
                }))
                .map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))?;
        }

        task::Poll::Ready(Ok(()))
    }
}
