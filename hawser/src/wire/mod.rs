//! Binary representation of the SSH2 wire protocol ([RFC 4251], [RFC 4253]).
//!
//! Messages are grouped by protocol layer in the [`trans`], [`userauth`] and
//! [`connect`] modules, while [`arch`] holds the composite data types the
//! protocol is built from (`string`, `mpint`, `name-list`, ..).
//!
//! [RFC 4251]: https://datatracker.ietf.org/doc/html/rfc4251
//! [RFC 4253]: https://datatracker.ietf.org/doc/html/rfc4253

use thiserror::Error as ThisError;

pub mod arch;
pub mod connect;
pub mod exchange;
pub mod trans;
pub mod userauth;

mod id;
pub use id::Id;

mod packet;
pub use packet::{
    CipherCore, Mac, OpeningCipher, Packet, SealingCipher, ToPacket, PACKET_MAX_SIZE,
};

/// The error types that can occur when (de)-serializing wire data.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum Error {
    /// The buffer ended in the middle of a field.
    #[error("Unexpected end of the buffer")]
    Eof,

    /// The buffer contained bytes past the end of the message.
    #[error("Trailing bytes after the end of the message")]
    Trailing,

    /// The leading message number did not match the decoded type.
    #[error("Message number mismatch, expected `{expected}`, found `{found}`")]
    Number {
        /// The message number of the decode target.
        expected: u8,

        /// The message number found in the payload.
        found: u8,
    },

    /// A text field contained ill-formed UTF-8.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A `name-list` or US-ASCII field contained non-ASCII bytes.
    #[error("Field contained non US-ASCII bytes")]
    Ascii,

    /// A length field described more bytes than the buffer holds.
    #[error("Field of {0} bytes exceeds the buffer")]
    Overlong(usize),

    /// The payload was empty where a message was expected.
    #[error("Empty payload where a message was expected")]
    Empty,
}

/// A cursor over a borrowed buffer, consuming fields front to back.
#[derive(Debug)]
pub struct Cursor<'b> {
    buf: &'b [u8],
}

impl<'b> Cursor<'b> {
    /// Wrap the provided buffer in a [`Cursor`].
    pub fn new(buf: &'b [u8]) -> Self {
        Self { buf }
    }

    /// Whether all of the bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the next `n` bytes of the buffer.
    pub fn take(&mut self, n: usize) -> Result<&'b [u8], Error> {
        if n > self.buf.len() {
            return Err(Error::Overlong(n));
        }

        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;

        Ok(head)
    }

    /// Consume all of the remaining bytes.
    pub fn rest(&mut self) -> &'b [u8] {
        std::mem::take(&mut self.buf)
    }

    /// Error out with [`Error::Trailing`] if any bytes remain.
    pub fn finish(&self) -> Result<(), Error> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(Error::Trailing)
        }
    }
}

/// Serialization to the SSH wire representation.
pub trait Encode {
    /// Append the wire representation of `self` to the buffer.
    fn encode(&self, buf: &mut Vec<u8>);
}

/// Deserialization from the SSH wire representation.
pub trait Decode: Sized {
    /// Consume the wire representation of `Self` from the cursor.
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error>;
}

impl Encode for u8 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }
}

impl Decode for u8 {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(cursor.take(1).map_err(|_| Error::Eof)?[0])
    }
}

impl Encode for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }
}

impl Decode for bool {
    // Any non-zero byte reads as `true`, as mandated by RFC 4251 § 5.
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(u8::decode(cursor)? != 0)
    }
}

impl Encode for u32 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_be_bytes());
    }
}

impl Decode for u32 {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let bytes = cursor.take(4).map_err(|_| Error::Eof)?;

        #[allow(clippy::unwrap_used)]
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }
}

impl Encode for u64 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_be_bytes());
    }
}

impl Decode for u64 {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let bytes = cursor.take(8).map_err(|_| Error::Eof)?;

        #[allow(clippy::unwrap_used)]
        Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let bytes = cursor.take(N).map_err(|_| Error::Eof)?;

        #[allow(clippy::unwrap_used)]
        Ok(bytes.try_into().unwrap())
    }
}

/// A _message_ of the SSH2 protocol, a payload led by its IANA-assigned number.
pub trait Message: Sized + std::fmt::Debug {
    /// The IANA-assigned message number.
    const NUMBER: u8;

    /// Append the fields following the message number to the buffer.
    fn encode_fields(&self, buf: &mut Vec<u8>);

    /// Consume the fields following the message number from the cursor.
    fn decode_fields(cursor: &mut Cursor<'_>) -> Result<Self, Error>;

    /// Serialize the whole message, message number included.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![Self::NUMBER];
        self.encode_fields(&mut buf);

        buf
    }

    /// Deserialize the whole message, message number included.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(bytes);

        let number = u8::decode(&mut cursor).map_err(|_| Error::Empty)?;
        if number != Self::NUMBER {
            return Err(Error::Number {
                expected: Self::NUMBER,
                found: number,
            });
        }

        let message = Self::decode_fields(&mut cursor)?;
        cursor.finish()?;

        Ok(message)
    }
}

/// Define a message struct whose fields (de)-serialize in declaration order.
macro_rules! message {
    (
        $(#[$meta:meta])*
        $number:literal $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident: $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl $crate::wire::Message for $name {
            const NUMBER: u8 = $number;

            #[allow(unused_variables)]
            fn encode_fields(&self, buf: &mut Vec<u8>) {
                $( $crate::wire::Encode::encode(&self.$field, buf); )*
            }

            #[allow(unused_variables)]
            fn decode_fields(cursor: &mut $crate::wire::Cursor<'_>) -> Result<Self, $crate::wire::Error> {
                Ok(Self {
                    $( $field: $crate::wire::Decode::decode(cursor)?, )*
                })
            }
        }
    };
}
pub(crate) use message;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_roundtrip() {
        let mut buf = Vec::new();
        0xdeadbeefu32.encode(&mut buf);
        true.encode(&mut buf);
        0x42u8.encode(&mut buf);
        0x0123456789abcdefu64.encode(&mut buf);

        let mut cursor = Cursor::new(&buf);
        assert_eq!(u32::decode(&mut cursor).unwrap(), 0xdeadbeef);
        assert!(bool::decode(&mut cursor).unwrap());
        assert_eq!(u8::decode(&mut cursor).unwrap(), 0x42);
        assert_eq!(u64::decode(&mut cursor).unwrap(), 0x0123456789abcdef);
        assert!(cursor.is_empty());
    }

    #[test]
    fn cursor_rejects_short_reads() {
        let mut cursor = Cursor::new(&[0x00, 0x01]);

        assert!(matches!(u32::decode(&mut cursor), Err(Error::Eof)));
    }
}
