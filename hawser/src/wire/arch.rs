//! Composite data types of the protocol: `string`, `mpint` and `name-list`.

use std::fmt;

use super::{Cursor, Decode, Encode, Error};

/// An opaque `string`, a `uint32` length followed by that many raw bytes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    /// Unwrap the inner byte buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({} bytes)", self.0.len())
    }
}

impl std::ops::Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Bytes {
    fn from(value: [u8; N]) -> Self {
        Self(value.to_vec())
    }
}

impl Encode for Bytes {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_bytes(&self.0, buf);
    }
}

impl Decode for Bytes {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(Self(decode_bytes(cursor)?.to_vec()))
    }
}

/// Append the `string` wire form of an arbitrary byte slice to the buffer.
pub fn encode_bytes(bytes: &[u8], buf: &mut Vec<u8>) {
    (bytes.len() as u32).encode(buf);
    buf.extend_from_slice(bytes);
}

/// Consume one `string` from the cursor, yielding the raw bytes.
pub fn decode_bytes<'b>(cursor: &mut Cursor<'b>) -> Result<&'b [u8], Error> {
    let len = u32::decode(cursor)? as usize;

    cursor.take(len)
}

/// A `string` holding UTF-8 encoded text, as used for human-readable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utf8(String);

impl Utf8 {
    /// Unwrap the inner [`String`].
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Utf8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for Utf8 {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Utf8 {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Utf8 {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Encode for Utf8 {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_bytes(self.0.as_bytes(), buf);
    }
}

impl Decode for Utf8 {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(Self(String::from_utf8(decode_bytes(cursor)?.to_vec())?))
    }
}

/// A `string` restricted to US-ASCII, as used for protocol identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Ascii(String);

impl Ascii {
    /// Unwrap the inner [`String`].
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Ascii {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for Ascii {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Ascii {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Ascii {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for Ascii {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Ascii {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Encode for Ascii {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_bytes(self.0.as_bytes(), buf);
    }
}

impl Decode for Ascii {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let bytes = decode_bytes(cursor)?;
        if !bytes.is_ascii() {
            return Err(Error::Ascii);
        }

        #[allow(clippy::unwrap_used)]
        Ok(Self(String::from_utf8(bytes.to_vec()).unwrap()))
    }
}

/// A `name-list` of comma-separated US-ASCII names ([RFC 4251 § 5]).
///
/// [RFC 4251 § 5]: https://datatracker.ietf.org/doc/html/rfc4251#section-5
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameList(Vec<String>);

impl NameList {
    /// The first of our names that is also present in the `other` list,
    /// which is the tie-break rule of the algorithm negotiation
    /// ([RFC 4253 § 7.1]: client preference wins).
    ///
    /// [RFC 4253 § 7.1]: https://datatracker.ietf.org/doc/html/rfc4253#section-7.1
    pub fn preferred_in(&self, other: &Self) -> Option<&str> {
        self.0
            .iter()
            .find(|name| other.0.iter().any(|o| o == *name))
            .map(String::as_str)
    }

    /// Whether the provided name is part of the list.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    /// Iterate over the names of the list.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether the list holds no names.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: AsRef<str>> FromIterator<T> for NameList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(|i| i.as_ref().to_owned()).collect())
    }
}

impl Encode for NameList {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_bytes(self.0.join(",").as_bytes(), buf);
    }
}

impl Decode for NameList {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let bytes = decode_bytes(cursor)?;
        if !bytes.is_ascii() {
            return Err(Error::Ascii);
        }

        #[allow(clippy::unwrap_used)]
        let joined = String::from_utf8(bytes.to_vec()).unwrap();

        Ok(Self(if joined.is_empty() {
            Vec::new()
        } else {
            joined.split(',').map(str::to_owned).collect()
        }))
    }
}

/// A multiple-precision integer in two's complement, big-endian `string` form.
///
/// Stored in its minimal wire representation: no superfluous leading zeros,
/// with a single `0x00` prefix when the most significant bit would otherwise
/// read as a sign bit.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MpInt(Vec<u8>);

impl MpInt {
    /// Build an [`MpInt`] from the big-endian bytes of an unsigned integer.
    pub fn positive(bytes: &[u8]) -> Self {
        let mut bytes = bytes;
        while let [0, rest @ ..] = bytes {
            bytes = rest;
        }

        let mut inner = Vec::with_capacity(bytes.len() + 1);
        if bytes.first().is_some_and(|byte| byte & 0x80 != 0) {
            inner.push(0);
        }
        inner.extend_from_slice(bytes);

        Self(inner)
    }

    /// The big-endian bytes of the integer, without the sign prefix.
    pub fn as_positive_bytes(&self) -> &[u8] {
        match self.0.as_slice() {
            [0, rest @ ..] => rest,
            all => all,
        }
    }
}

impl fmt::Debug for MpInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MpInt({} bytes)", self.0.len())
    }
}

impl std::ops::Deref for MpInt {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for MpInt {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Encode for MpInt {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_bytes(&self.0, buf);
    }
}

impl Decode for MpInt {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(Self(decode_bytes(cursor)?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpint_prefixes_high_bit() {
        assert_eq!(&*MpInt::positive(&[0x80]), &[0x00, 0x80]);
        assert_eq!(&*MpInt::positive(&[0x7f]), &[0x7f]);
    }

    #[test]
    fn mpint_strips_leading_zeros() {
        assert_eq!(&*MpInt::positive(&[0x00, 0x00, 0x01]), &[0x01]);
        assert_eq!(MpInt::positive(&[0x00, 0x00]).as_positive_bytes(), &[]);
    }

    #[test]
    fn mpint_positive_bytes_roundtrip() {
        let mpint = MpInt::positive(&[0xff, 0x21, 0x52, 0x41, 0x11]);

        assert_eq!(&*mpint, &[0x00, 0xff, 0x21, 0x52, 0x41, 0x11]);
        assert_eq!(mpint.as_positive_bytes(), &[0xff, 0x21, 0x52, 0x41, 0x11]);
    }

    #[test]
    fn namelist_prefers_client_order() {
        let client: NameList = ["a", "b"].into_iter().collect();
        let server: NameList = ["b", "a"].into_iter().collect();

        assert_eq!(client.preferred_in(&server), Some("a"));
        assert_eq!(server.preferred_in(&client), Some("b"));
    }

    #[test]
    fn namelist_empty_intersection() {
        let client: NameList = ["a"].into_iter().collect();
        let server: NameList = ["b"].into_iter().collect();

        assert_eq!(client.preferred_in(&server), None);
    }

    #[test]
    fn namelist_roundtrip() {
        let list: NameList = ["aes128-ctr", "aes256-ctr"].into_iter().collect();

        let mut buf = Vec::new();
        list.encode(&mut buf);
        assert_eq!(&buf[4..], b"aes128-ctr,aes256-ctr");

        let mut cursor = Cursor::new(&buf);
        assert_eq!(NameList::decode(&mut cursor).unwrap(), list);
    }
}
