use hawser::wire::{connect, Packet, ToPacket};

/// The purpose of this macro is to automatically document variants
/// and link to the underlying item documentation.
macro_rules! message {
    ($( $name:ident($path:path) ),+ $(,)?) => {
        /// An outgoing channel-scoped message.
        #[derive(Debug, Clone)]
        pub enum Msg {
            $(
                #[doc = concat!("See [`", stringify!($path), "`] for more details.")]
                $name($path)
            ),+
        }

        impl Msg {
            /// The peer-side channel number the message is addressed to.
            pub fn recipient_channel(&self) -> u32 {
                match self {
                    $( Self::$name(msg) => msg.recipient_channel ),+
                }
            }
        }

        impl ToPacket for Msg {
            fn to_packet(&self) -> Packet {
                match self {
                    $( Self::$name(msg) => msg.to_packet() ),+
                }
            }
        }
    };
}

message! {
    WindowAdjust(connect::ChannelWindowAdjust),
    Data(connect::ChannelData),
    ExtendedData(connect::ChannelExtendedData),
    Eof(connect::ChannelEof),
    Close(connect::ChannelClose),
    Request(connect::ChannelRequest),
    Success(connect::ChannelSuccess),
    Failure(connect::ChannelFailure),
}
