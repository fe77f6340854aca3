//! Messages of the **[`SSH-CONNECT`]** protocol layer ([RFC 4254]).
//!
//! [RFC 4254]: https://datatracker.ietf.org/doc/html/rfc4254

use super::{
    arch::{encode_bytes, Ascii, Bytes, Utf8},
    message, Cursor, Decode, Encode, Error, Message,
};

/// The type-specific payload of a [`GlobalRequest`] message.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalRequestContext {
    /// The `tcpip-forward` request: listen on an address for us.
    TcpipForward {
        /// Address to bind on the peer.
        bind_address: Utf8,

        /// Port to bind on the peer, `0` to let the peer choose.
        bind_port: u32,
    },

    /// The `cancel-tcpip-forward` request.
    CancelTcpipForward {
        /// Address of the forwarding to cancel.
        bind_address: Utf8,

        /// Port of the forwarding to cancel.
        bind_port: u32,
    },

    /// A request of an unknown type, carried opaquely.
    Other {
        /// The request type name.
        kind: Ascii,

        /// The raw type-specific bytes.
        data: Vec<u8>,
    },
}

impl GlobalRequestContext {
    const TCPIP_FORWARD: &'static str = "tcpip-forward";
    const CANCEL_TCPIP_FORWARD: &'static str = "cancel-tcpip-forward";
}

/// The `SSH_MSG_GLOBAL_REQUEST` message.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalRequest {
    /// Whether the peer must reply to the request.
    pub want_reply: bool,

    /// The type-specific payload.
    pub context: GlobalRequestContext,
}

impl Message for GlobalRequest {
    const NUMBER: u8 = 80;

    fn encode_fields(&self, buf: &mut Vec<u8>) {
        match &self.context {
            GlobalRequestContext::TcpipForward {
                bind_address,
                bind_port,
            } => {
                encode_bytes(GlobalRequestContext::TCPIP_FORWARD.as_bytes(), buf);
                self.want_reply.encode(buf);
                bind_address.encode(buf);
                bind_port.encode(buf);
            }
            GlobalRequestContext::CancelTcpipForward {
                bind_address,
                bind_port,
            } => {
                encode_bytes(GlobalRequestContext::CANCEL_TCPIP_FORWARD.as_bytes(), buf);
                self.want_reply.encode(buf);
                bind_address.encode(buf);
                bind_port.encode(buf);
            }
            GlobalRequestContext::Other { kind, data } => {
                kind.encode(buf);
                self.want_reply.encode(buf);
                buf.extend_from_slice(data);
            }
        }
    }

    fn decode_fields(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let kind = Ascii::decode(cursor)?;
        let want_reply = bool::decode(cursor)?;

        let context = match &*kind {
            GlobalRequestContext::TCPIP_FORWARD => GlobalRequestContext::TcpipForward {
                bind_address: Utf8::decode(cursor)?,
                bind_port: u32::decode(cursor)?,
            },
            GlobalRequestContext::CANCEL_TCPIP_FORWARD => {
                GlobalRequestContext::CancelTcpipForward {
                    bind_address: Utf8::decode(cursor)?,
                    bind_port: u32::decode(cursor)?,
                }
            }
            _ => GlobalRequestContext::Other {
                kind,
                data: cursor.rest().to_vec(),
            },
        };

        Ok(Self {
            want_reply,
            context,
        })
    }
}

message! {
    /// The `SSH_MSG_REQUEST_SUCCESS` message.
    81 RequestSuccess {}
}

message! {
    /// The `SSH_MSG_REQUEST_SUCCESS` message replying to a `tcpip-forward`
    /// request with port `0`, carrying the port the peer has chosen.
    ///
    /// Shares number 81 with [`RequestSuccess`]: the decode target is picked
    /// from the request in flight.
    81 ForwardingSuccess {
        /// The port the peer bound.
        bound_port: u32,
    }
}

message! {
    /// The `SSH_MSG_REQUEST_FAILURE` message.
    82 RequestFailure {}
}

/// The type-specific payload of a [`ChannelOpen`] message.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOpenContext {
    /// The `session` channel type.
    Session,

    /// The `x11` channel type, a forwarded X11 connection.
    X11 {
        /// Originator address of the connection.
        originator_address: Utf8,

        /// Originator port of the connection.
        originator_port: u32,
    },

    /// The `direct-tcpip` channel type, a locally-forwarded connection.
    DirectTcpip {
        /// Address the peer should connect to.
        host_to_connect: Utf8,

        /// Port the peer should connect to.
        port_to_connect: u32,

        /// Originator address of the connection.
        originator_address: Utf8,

        /// Originator port of the connection.
        originator_port: u32,
    },

    /// The `forwarded-tcpip` channel type, a remotely-forwarded connection.
    ForwardedTcpip {
        /// Address that was connected on the peer.
        address_connected: Utf8,

        /// Port that was connected on the peer.
        port_connected: u32,

        /// Originator address of the connection.
        originator_address: Utf8,

        /// Originator port of the connection.
        originator_port: u32,
    },

    /// A channel type outside of this implementation, carried opaquely.
    Other {
        /// The channel type name.
        kind: Ascii,

        /// The raw type-specific bytes.
        data: Vec<u8>,
    },
}

impl ChannelOpenContext {
    const SESSION: &'static str = "session";
    const X11: &'static str = "x11";
    const DIRECT_TCPIP: &'static str = "direct-tcpip";
    const FORWARDED_TCPIP: &'static str = "forwarded-tcpip";

    /// The wire name of the channel type.
    pub fn kind(&self) -> &str {
        match self {
            Self::Session => Self::SESSION,
            Self::X11 { .. } => Self::X11,
            Self::DirectTcpip { .. } => Self::DIRECT_TCPIP,
            Self::ForwardedTcpip { .. } => Self::FORWARDED_TCPIP,
            Self::Other { kind, .. } => kind,
        }
    }
}

/// The `SSH_MSG_CHANNEL_OPEN` message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOpen {
    /// The sender's local channel number.
    pub sender_channel: u32,

    /// Initial size of the sender's receive window, in bytes.
    pub initial_window_size: u32,

    /// Maximum size of a single data message the sender accepts.
    pub maximum_packet_size: u32,

    /// The type-specific payload.
    pub context: ChannelOpenContext,
}

impl Message for ChannelOpen {
    const NUMBER: u8 = 90;

    fn encode_fields(&self, buf: &mut Vec<u8>) {
        encode_bytes(self.context.kind().as_bytes(), buf);
        self.sender_channel.encode(buf);
        self.initial_window_size.encode(buf);
        self.maximum_packet_size.encode(buf);

        match &self.context {
            ChannelOpenContext::Session => (),
            ChannelOpenContext::X11 {
                originator_address,
                originator_port,
            } => {
                originator_address.encode(buf);
                originator_port.encode(buf);
            }
            ChannelOpenContext::DirectTcpip {
                host_to_connect,
                port_to_connect,
                originator_address,
                originator_port,
            } => {
                host_to_connect.encode(buf);
                port_to_connect.encode(buf);
                originator_address.encode(buf);
                originator_port.encode(buf);
            }
            ChannelOpenContext::ForwardedTcpip {
                address_connected,
                port_connected,
                originator_address,
                originator_port,
            } => {
                address_connected.encode(buf);
                port_connected.encode(buf);
                originator_address.encode(buf);
                originator_port.encode(buf);
            }
            ChannelOpenContext::Other { data, .. } => buf.extend_from_slice(data),
        }
    }

    fn decode_fields(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let kind = Ascii::decode(cursor)?;
        let sender_channel = u32::decode(cursor)?;
        let initial_window_size = u32::decode(cursor)?;
        let maximum_packet_size = u32::decode(cursor)?;

        let context = match &*kind {
            ChannelOpenContext::SESSION => ChannelOpenContext::Session,
            ChannelOpenContext::X11 => ChannelOpenContext::X11 {
                originator_address: Utf8::decode(cursor)?,
                originator_port: u32::decode(cursor)?,
            },
            ChannelOpenContext::DIRECT_TCPIP => ChannelOpenContext::DirectTcpip {
                host_to_connect: Utf8::decode(cursor)?,
                port_to_connect: u32::decode(cursor)?,
                originator_address: Utf8::decode(cursor)?,
                originator_port: u32::decode(cursor)?,
            },
            ChannelOpenContext::FORWARDED_TCPIP => ChannelOpenContext::ForwardedTcpip {
                address_connected: Utf8::decode(cursor)?,
                port_connected: u32::decode(cursor)?,
                originator_address: Utf8::decode(cursor)?,
                originator_port: u32::decode(cursor)?,
            },
            _ => ChannelOpenContext::Other {
                kind,
                data: cursor.rest().to_vec(),
            },
        };

        Ok(Self {
            sender_channel,
            initial_window_size,
            maximum_packet_size,
            context,
        })
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_OPEN_CONFIRMATION` message.
    91 ChannelOpenConfirmation {
        /// The recipient's channel number for the opened channel.
        recipient_channel: u32,

        /// The sender's channel number for the opened channel.
        sender_channel: u32,

        /// Initial size of the sender's receive window, in bytes.
        initial_window_size: u32,

        /// Maximum size of a single data message the sender accepts.
        maximum_packet_size: u32,
    }
}

/// The machine-readable reason codes of a [`ChannelOpenFailure`] message.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelOpenFailureReason {
    /// `SSH_OPEN_ADMINISTRATIVELY_PROHIBITED`.
    #[default]
    AdministrativelyProhibited,

    /// `SSH_OPEN_CONNECT_FAILED`.
    ConnectFailed,

    /// `SSH_OPEN_UNKNOWN_CHANNEL_TYPE`.
    UnknownChannelType,

    /// `SSH_OPEN_RESOURCE_SHORTAGE`.
    ResourceShortage,

    /// A reason code outside of the IANA assignments.
    Unknown(u32),
}

impl From<ChannelOpenFailureReason> for u32 {
    fn from(reason: ChannelOpenFailureReason) -> Self {
        match reason {
            ChannelOpenFailureReason::AdministrativelyProhibited => 1,
            ChannelOpenFailureReason::ConnectFailed => 2,
            ChannelOpenFailureReason::UnknownChannelType => 3,
            ChannelOpenFailureReason::ResourceShortage => 4,
            ChannelOpenFailureReason::Unknown(code) => code,
        }
    }
}

impl From<u32> for ChannelOpenFailureReason {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::AdministrativelyProhibited,
            2 => Self::ConnectFailed,
            3 => Self::UnknownChannelType,
            4 => Self::ResourceShortage,
            code => Self::Unknown(code),
        }
    }
}

impl Encode for ChannelOpenFailureReason {
    fn encode(&self, buf: &mut Vec<u8>) {
        u32::from(*self).encode(buf);
    }
}

impl Decode for ChannelOpenFailureReason {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(u32::decode(cursor)?.into())
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_OPEN_FAILURE` message.
    92 ChannelOpenFailure {
        /// The recipient's channel number from the rejected open.
        recipient_channel: u32,

        /// Machine-readable reason for the rejection.
        reason: ChannelOpenFailureReason,

        /// Human-readable description of the reason.
        description: Utf8,

        /// Language tag of the description.
        language: Ascii,
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_WINDOW_ADJUST` message.
    93 ChannelWindowAdjust {
        /// The recipient's channel number.
        recipient_channel: u32,

        /// Amount of bytes to add to the recipient's send allowance.
        bytes_to_add: u32,
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_DATA` message.
    94 ChannelData {
        /// The recipient's channel number.
        recipient_channel: u32,

        /// The data block, bounded by the window and maximum packet size.
        data: Bytes,
    }
}

/// The stream designator of a [`ChannelExtendedData`] message.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelExtendedDataType {
    /// `SSH_EXTENDED_DATA_STDERR`.
    #[default]
    Stderr,

    /// A data type outside of the IANA assignments.
    Unknown(u32),
}

impl From<ChannelExtendedDataType> for u32 {
    fn from(kind: ChannelExtendedDataType) -> Self {
        match kind {
            ChannelExtendedDataType::Stderr => 1,
            ChannelExtendedDataType::Unknown(code) => code,
        }
    }
}

impl From<u32> for ChannelExtendedDataType {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::Stderr,
            code => Self::Unknown(code),
        }
    }
}

impl Encode for ChannelExtendedDataType {
    fn encode(&self, buf: &mut Vec<u8>) {
        u32::from(*self).encode(buf);
    }
}

impl Decode for ChannelExtendedDataType {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(u32::decode(cursor)?.into())
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_EXTENDED_DATA` message.
    95 ChannelExtendedData {
        /// The recipient's channel number.
        recipient_channel: u32,

        /// The designator of the carried stream.
        data_type: ChannelExtendedDataType,

        /// The data block, bounded by the window and maximum packet size.
        data: Bytes,
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_EOF` message.
    96 ChannelEof {
        /// The recipient's channel number.
        recipient_channel: u32,
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_CLOSE` message.
    97 ChannelClose {
        /// The recipient's channel number.
        recipient_channel: u32,
    }
}

/// The type-specific payload of a [`ChannelRequest`] message.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelRequestContext {
    /// The `pty-req` request.
    Pty {
        /// The `TERM` environment value.
        term: Utf8,

        /// Terminal width, in characters.
        width_chars: u32,

        /// Terminal height, in rows.
        height_rows: u32,

        /// Terminal width, in pixels.
        width_pixels: u32,

        /// Terminal height, in pixels.
        height_pixels: u32,

        /// Encoded terminal modes.
        modes: Bytes,
    },

    /// The `env` request.
    Env {
        /// Name of the variable.
        name: Utf8,

        /// Value of the variable.
        value: Utf8,
    },

    /// The `shell` request.
    Shell,

    /// The `exec` request.
    Exec {
        /// The command to execute.
        command: Utf8,
    },

    /// The `subsystem` request.
    Subsystem {
        /// Name of the subsystem, e.g. `sftp`.
        name: Ascii,
    },

    /// The `window-change` request.
    WindowChange {
        /// Terminal width, in characters.
        width_chars: u32,

        /// Terminal height, in rows.
        height_rows: u32,

        /// Terminal width, in pixels.
        width_pixels: u32,

        /// Terminal height, in pixels.
        height_pixels: u32,
    },

    /// The `signal` request.
    Signal {
        /// Signal name, without the `SIG` prefix.
        name: Ascii,
    },

    /// The `exit-status` request.
    ExitStatus {
        /// The command's exit status.
        code: u32,
    },

    /// The `exit-signal` request.
    ExitSignal {
        /// Signal name, without the `SIG` prefix.
        name: Ascii,

        /// Whether a core dump resulted.
        core_dumped: bool,

        /// Human-readable error message.
        error_message: Utf8,

        /// Language tag of the message.
        language: Ascii,
    },

    /// A request of an unknown type, carried opaquely.
    Other {
        /// The request type name.
        kind: Ascii,

        /// The raw type-specific bytes.
        data: Vec<u8>,
    },
}

impl ChannelRequestContext {
    const PTY: &'static str = "pty-req";
    const ENV: &'static str = "env";
    const SHELL: &'static str = "shell";
    const EXEC: &'static str = "exec";
    const SUBSYSTEM: &'static str = "subsystem";
    const WINDOW_CHANGE: &'static str = "window-change";
    const SIGNAL: &'static str = "signal";
    const EXIT_STATUS: &'static str = "exit-status";
    const EXIT_SIGNAL: &'static str = "exit-signal";

    /// The wire name of the request type.
    pub fn kind(&self) -> &str {
        match self {
            Self::Pty { .. } => Self::PTY,
            Self::Env { .. } => Self::ENV,
            Self::Shell => Self::SHELL,
            Self::Exec { .. } => Self::EXEC,
            Self::Subsystem { .. } => Self::SUBSYSTEM,
            Self::WindowChange { .. } => Self::WINDOW_CHANGE,
            Self::Signal { .. } => Self::SIGNAL,
            Self::ExitStatus { .. } => Self::EXIT_STATUS,
            Self::ExitSignal { .. } => Self::EXIT_SIGNAL,
            Self::Other { kind, .. } => kind,
        }
    }
}

/// The `SSH_MSG_CHANNEL_REQUEST` message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRequest {
    /// The recipient's channel number.
    pub recipient_channel: u32,

    /// Whether the peer must reply to the request.
    pub want_reply: bool,

    /// The type-specific payload.
    pub context: ChannelRequestContext,
}

impl Message for ChannelRequest {
    const NUMBER: u8 = 98;

    fn encode_fields(&self, buf: &mut Vec<u8>) {
        self.recipient_channel.encode(buf);
        encode_bytes(self.context.kind().as_bytes(), buf);
        self.want_reply.encode(buf);

        match &self.context {
            ChannelRequestContext::Pty {
                term,
                width_chars,
                height_rows,
                width_pixels,
                height_pixels,
                modes,
            } => {
                term.encode(buf);
                width_chars.encode(buf);
                height_rows.encode(buf);
                width_pixels.encode(buf);
                height_pixels.encode(buf);
                modes.encode(buf);
            }
            ChannelRequestContext::Env { name, value } => {
                name.encode(buf);
                value.encode(buf);
            }
            ChannelRequestContext::Shell => (),
            ChannelRequestContext::Exec { command } => command.encode(buf),
            ChannelRequestContext::Subsystem { name } => name.encode(buf),
            ChannelRequestContext::WindowChange {
                width_chars,
                height_rows,
                width_pixels,
                height_pixels,
            } => {
                width_chars.encode(buf);
                height_rows.encode(buf);
                width_pixels.encode(buf);
                height_pixels.encode(buf);
            }
            ChannelRequestContext::Signal { name } => name.encode(buf),
            ChannelRequestContext::ExitStatus { code } => code.encode(buf),
            ChannelRequestContext::ExitSignal {
                name,
                core_dumped,
                error_message,
                language,
            } => {
                name.encode(buf);
                core_dumped.encode(buf);
                error_message.encode(buf);
                language.encode(buf);
            }
            ChannelRequestContext::Other { data, .. } => buf.extend_from_slice(data),
        }
    }

    fn decode_fields(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let recipient_channel = u32::decode(cursor)?;
        let kind = Ascii::decode(cursor)?;
        let want_reply = bool::decode(cursor)?;

        let context = match &*kind {
            ChannelRequestContext::PTY => ChannelRequestContext::Pty {
                term: Utf8::decode(cursor)?,
                width_chars: u32::decode(cursor)?,
                height_rows: u32::decode(cursor)?,
                width_pixels: u32::decode(cursor)?,
                height_pixels: u32::decode(cursor)?,
                modes: Bytes::decode(cursor)?,
            },
            ChannelRequestContext::ENV => ChannelRequestContext::Env {
                name: Utf8::decode(cursor)?,
                value: Utf8::decode(cursor)?,
            },
            ChannelRequestContext::SHELL => ChannelRequestContext::Shell,
            ChannelRequestContext::EXEC => ChannelRequestContext::Exec {
                command: Utf8::decode(cursor)?,
            },
            ChannelRequestContext::SUBSYSTEM => ChannelRequestContext::Subsystem {
                name: Ascii::decode(cursor)?,
            },
            ChannelRequestContext::WINDOW_CHANGE => ChannelRequestContext::WindowChange {
                width_chars: u32::decode(cursor)?,
                height_rows: u32::decode(cursor)?,
                width_pixels: u32::decode(cursor)?,
                height_pixels: u32::decode(cursor)?,
            },
            ChannelRequestContext::SIGNAL => ChannelRequestContext::Signal {
                name: Ascii::decode(cursor)?,
            },
            ChannelRequestContext::EXIT_STATUS => ChannelRequestContext::ExitStatus {
                code: u32::decode(cursor)?,
            },
            ChannelRequestContext::EXIT_SIGNAL => ChannelRequestContext::ExitSignal {
                name: Ascii::decode(cursor)?,
                core_dumped: bool::decode(cursor)?,
                error_message: Utf8::decode(cursor)?,
                language: Ascii::decode(cursor)?,
            },
            _ => ChannelRequestContext::Other {
                kind,
                data: cursor.rest().to_vec(),
            },
        };

        Ok(Self {
            recipient_channel,
            want_reply,
            context,
        })
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_SUCCESS` message.
    99 ChannelSuccess {
        /// The recipient's channel number.
        recipient_channel: u32,
    }
}

message! {
    /// The `SSH_MSG_CHANNEL_FAILURE` message.
    100 ChannelFailure {
        /// The recipient's channel number.
        recipient_channel: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_open_contexts_roundtrip() {
        for context in [
            ChannelOpenContext::Session,
            ChannelOpenContext::DirectTcpip {
                host_to_connect: "localhost".into(),
                port_to_connect: 8080,
                originator_address: "127.0.0.1".into(),
                originator_port: 47000,
            },
            ChannelOpenContext::ForwardedTcpip {
                address_connected: "0.0.0.0".into(),
                port_connected: 2222,
                originator_address: "10.0.0.1".into(),
                originator_port: 51515,
            },
        ] {
            let open = ChannelOpen {
                sender_channel: 3,
                initial_window_size: 0x200000,
                maximum_packet_size: 0x8000,
                context,
            };

            assert_eq!(ChannelOpen::from_bytes(&open.to_bytes()).unwrap(), open);
        }
    }

    #[test]
    fn exec_request_roundtrips() {
        let request = ChannelRequest {
            recipient_channel: 0,
            want_reply: true,
            context: ChannelRequestContext::Exec {
                command: "echo 12345".into(),
            },
        };

        assert_eq!(
            ChannelRequest::from_bytes(&request.to_bytes()).unwrap(),
            request
        );
    }

    #[test]
    fn unknown_request_is_carried_opaquely() {
        let request = ChannelRequest {
            recipient_channel: 1,
            want_reply: false,
            context: ChannelRequestContext::Other {
                kind: "keepalive@openssh.com".into(),
                data: vec![0xde, 0xad],
            },
        };

        assert_eq!(
            ChannelRequest::from_bytes(&request.to_bytes()).unwrap(),
            request
        );
    }
}
