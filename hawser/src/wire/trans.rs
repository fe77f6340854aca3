//! Messages of the **[`SSH-TRANS`]** protocol layer ([RFC 4253]).
//!
//! The `SSH_MSG_KEXDH_*`, `SSH_MSG_KEX_ECDH_*` and `SSH_MSG_KEX_DH_GEX_*`
//! messages share numbers in the 30-49 range reserved for the kex method in
//! flight, so the decode target is picked by the negotiated key-exchange.
//!
//! [RFC 4253]: https://datatracker.ietf.org/doc/html/rfc4253

use super::{
    arch::{Ascii, Bytes, MpInt, NameList, Utf8},
    message, Cursor, Decode, Encode, Error,
};

/// The machine-readable reason codes of the `SSH_MSG_DISCONNECT` message.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT`.
    HostNotAllowedToConnect,

    /// `SSH_DISCONNECT_PROTOCOL_ERROR`.
    #[default]
    ProtocolError,

    /// `SSH_DISCONNECT_KEY_EXCHANGE_FAILED`.
    KeyExchangeFailed,

    /// `SSH_DISCONNECT_RESERVED`.
    Reserved,

    /// `SSH_DISCONNECT_MAC_ERROR`.
    MacError,

    /// `SSH_DISCONNECT_COMPRESSION_ERROR`.
    CompressionError,

    /// `SSH_DISCONNECT_SERVICE_NOT_AVAILABLE`.
    ServiceNotAvailable,

    /// `SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED`.
    ProtocolVersionNotSupported,

    /// `SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE`.
    HostKeyNotVerifiable,

    /// `SSH_DISCONNECT_CONNECTION_LOST`.
    ConnectionLost,

    /// `SSH_DISCONNECT_BY_APPLICATION`.
    ByApplication,

    /// `SSH_DISCONNECT_TOO_MANY_CONNECTIONS`.
    TooManyConnections,

    /// `SSH_DISCONNECT_AUTH_CANCELLED_BY_USER`.
    AuthCancelledByUser,

    /// `SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE`.
    NoMoreAuthMethodsAvailable,

    /// `SSH_DISCONNECT_ILLEGAL_USER_NAME`.
    IllegalUserName,

    /// A reason code outside of the IANA assignments.
    Unknown(u32),
}

impl From<DisconnectReason> for u32 {
    fn from(reason: DisconnectReason) -> Self {
        match reason {
            DisconnectReason::HostNotAllowedToConnect => 1,
            DisconnectReason::ProtocolError => 2,
            DisconnectReason::KeyExchangeFailed => 3,
            DisconnectReason::Reserved => 4,
            DisconnectReason::MacError => 5,
            DisconnectReason::CompressionError => 6,
            DisconnectReason::ServiceNotAvailable => 7,
            DisconnectReason::ProtocolVersionNotSupported => 8,
            DisconnectReason::HostKeyNotVerifiable => 9,
            DisconnectReason::ConnectionLost => 10,
            DisconnectReason::ByApplication => 11,
            DisconnectReason::TooManyConnections => 12,
            DisconnectReason::AuthCancelledByUser => 13,
            DisconnectReason::NoMoreAuthMethodsAvailable => 14,
            DisconnectReason::IllegalUserName => 15,
            DisconnectReason::Unknown(code) => code,
        }
    }
}

impl From<u32> for DisconnectReason {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::HostNotAllowedToConnect,
            2 => Self::ProtocolError,
            3 => Self::KeyExchangeFailed,
            4 => Self::Reserved,
            5 => Self::MacError,
            6 => Self::CompressionError,
            7 => Self::ServiceNotAvailable,
            8 => Self::ProtocolVersionNotSupported,
            9 => Self::HostKeyNotVerifiable,
            10 => Self::ConnectionLost,
            11 => Self::ByApplication,
            12 => Self::TooManyConnections,
            13 => Self::AuthCancelledByUser,
            14 => Self::NoMoreAuthMethodsAvailable,
            15 => Self::IllegalUserName,
            code => Self::Unknown(code),
        }
    }
}

impl Encode for DisconnectReason {
    fn encode(&self, buf: &mut Vec<u8>) {
        u32::from(*self).encode(buf);
    }
}

impl Decode for DisconnectReason {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(u32::decode(cursor)?.into())
    }
}

message! {
    /// The `SSH_MSG_DISCONNECT` message.
    1 Disconnect {
        /// Machine-readable reason for the disconnection.
        reason: DisconnectReason,

        /// Human-readable description of the reason.
        description: Utf8,

        /// Language tag of the description.
        language: Ascii,
    }
}

message! {
    /// The `SSH_MSG_IGNORE` message.
    2 Ignore {
        /// Arbitrary data to be discarded by the peer.
        data: Bytes,
    }
}

message! {
    /// The `SSH_MSG_UNIMPLEMENTED` message.
    3 Unimplemented {
        /// Sequence number of the rejected packet.
        seq: u32,
    }
}

message! {
    /// The `SSH_MSG_DEBUG` message.
    4 Debug {
        /// Whether the message should always be displayed.
        always_display: bool,

        /// The debug message itself.
        message: Utf8,

        /// Language tag of the message.
        language: Ascii,
    }
}

message! {
    /// The `SSH_MSG_SERVICE_REQUEST` message.
    5 ServiceRequest {
        /// Identifier of the requested service.
        service_name: Ascii,
    }
}

message! {
    /// The `SSH_MSG_SERVICE_ACCEPT` message.
    6 ServiceAccept {
        /// Identifier of the accepted service.
        service_name: Ascii,
    }
}

message! {
    /// The `SSH_MSG_KEXINIT` message, advertising algorithm preferences.
    20 KexInit {
        /// Random bytes defeating replay of the negotiation.
        cookie: [u8; 16],

        /// Key-exchange algorithms, most preferred first.
        kex_algorithms: NameList,

        /// Host key (signature) algorithms, most preferred first.
        server_host_key_algorithms: NameList,

        /// Encryption algorithms, client to server.
        encryption_algorithms_client_to_server: NameList,

        /// Encryption algorithms, server to client.
        encryption_algorithms_server_to_client: NameList,

        /// MAC algorithms, client to server.
        mac_algorithms_client_to_server: NameList,

        /// MAC algorithms, server to client.
        mac_algorithms_server_to_client: NameList,

        /// Compression algorithms, client to server.
        compression_algorithms_client_to_server: NameList,

        /// Compression algorithms, server to client.
        compression_algorithms_server_to_client: NameList,

        /// Language tags, client to server.
        languages_client_to_server: NameList,

        /// Language tags, server to client.
        languages_server_to_client: NameList,

        /// Whether a guessed kex packet follows this message.
        first_kex_packet_follows: bool,

        /// Reserved for future extension, always zero.
        reserved: u32,
    }
}

message! {
    /// The `SSH_MSG_NEWKEYS` message, taking the freshly-derived keys into use.
    21 NewKeys {}
}

message! {
    /// The `SSH_MSG_KEXDH_INIT` message of the fixed-group Diffie-Hellman exchange.
    30 KexDhInit {
        /// The client's public exchange value, `g^x mod p`.
        e: MpInt,
    }
}

message! {
    /// The `SSH_MSG_KEXDH_REPLY` message of the fixed-group Diffie-Hellman exchange.
    31 KexDhReply {
        /// The server's public host key blob.
        k_s: Bytes,

        /// The server's public exchange value, `g^y mod p`.
        f: MpInt,

        /// The signature over the exchange hash.
        signature: Bytes,
    }
}

message! {
    /// The `SSH_MSG_KEX_ECDH_INIT` message ([RFC 5656]).
    ///
    /// [RFC 5656]: https://datatracker.ietf.org/doc/html/rfc5656
    30 KexEcdhInit {
        /// The client's ephemeral public key octets.
        q_c: Bytes,
    }
}

message! {
    /// The `SSH_MSG_KEX_ECDH_REPLY` message ([RFC 5656]).
    ///
    /// [RFC 5656]: https://datatracker.ietf.org/doc/html/rfc5656
    31 KexEcdhReply {
        /// The server's public host key blob.
        k_s: Bytes,

        /// The server's ephemeral public key octets.
        q_s: Bytes,

        /// The signature over the exchange hash.
        signature: Bytes,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_REQUEST` message ([RFC 4419]).
    ///
    /// [RFC 4419]: https://datatracker.ietf.org/doc/html/rfc4419
    34 KexDhGexRequest {
        /// Minimal acceptable group size, in bits.
        min: u32,

        /// Preferred group size, in bits.
        n: u32,

        /// Maximal acceptable group size, in bits.
        max: u32,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_GROUP` message ([RFC 4419]).
    ///
    /// [RFC 4419]: https://datatracker.ietf.org/doc/html/rfc4419
    31 KexDhGexGroup {
        /// The server-chosen safe prime.
        p: MpInt,

        /// The generator for the chosen prime.
        g: MpInt,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_INIT` message ([RFC 4419]).
    ///
    /// [RFC 4419]: https://datatracker.ietf.org/doc/html/rfc4419
    32 KexDhGexInit {
        /// The client's public exchange value, `g^x mod p`.
        e: MpInt,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_REPLY` message ([RFC 4419]).
    ///
    /// [RFC 4419]: https://datatracker.ietf.org/doc/html/rfc4419
    33 KexDhGexReply {
        /// The server's public host key blob.
        k_s: Bytes,

        /// The server's public exchange value, `g^y mod p`.
        f: MpInt,

        /// The signature over the exchange hash.
        signature: Bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Message;

    #[test]
    fn kexinit_roundtrips_bytes_exactly() {
        let kexinit = KexInit {
            cookie: [0x5a; 16],
            kex_algorithms: ["curve25519-sha256", "diffie-hellman-group14-sha256"]
                .into_iter()
                .collect(),
            server_host_key_algorithms: ["ssh-ed25519"].into_iter().collect(),
            encryption_algorithms_client_to_server: ["aes128-ctr"].into_iter().collect(),
            encryption_algorithms_server_to_client: ["aes128-ctr"].into_iter().collect(),
            mac_algorithms_client_to_server: ["hmac-sha2-256"].into_iter().collect(),
            mac_algorithms_server_to_client: ["hmac-sha2-256"].into_iter().collect(),
            compression_algorithms_client_to_server: ["none"].into_iter().collect(),
            compression_algorithms_server_to_client: ["none"].into_iter().collect(),
            ..Default::default()
        };

        let bytes = kexinit.to_bytes();
        let decoded = KexInit::from_bytes(&bytes).unwrap();

        // The re-encoding has to be byte-identical, since the raw `KEXINIT`
        // payloads are hashed into the exchange hash.
        assert_eq!(decoded, kexinit);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn disconnect_reason_codes() {
        assert_eq!(u32::from(DisconnectReason::ByApplication), 11);
        assert_eq!(
            DisconnectReason::from(14),
            DisconnectReason::NoMoreAuthMethodsAvailable
        );
        assert_eq!(DisconnectReason::from(255), DisconnectReason::Unknown(255));
    }

    #[test]
    fn mismatched_number_is_rejected() {
        let bytes = NewKeys {}.to_bytes();

        assert!(matches!(
            Ignore::from_bytes(&bytes),
            Err(crate::wire::Error::Number {
                expected: 2,
                found: 21
            })
        ));
    }
}
