use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use rand::Rng;

use super::{Cursor, Decode, Message};
use crate::Result;

/// Maximum size of a whole frame, MAC included, as accepted by this
/// implementation (RFC 4253 § 6.1 requires tolerating at least 35000 bytes).
pub const PACKET_MAX_SIZE: usize = 0x40000;

/// Minimum amount of random padding in a frame.
const PADDING_MIN_SIZE: usize = 4;

/// Minimum cipher block size used for length alignment.
const BLOCK_MIN_SIZE: usize = 8;

/// Integrity properties of the negotiated MAC algorithm.
pub trait Mac {
    /// Size in bytes of the produced MAC.
    fn size(&self) -> usize;

    /// Whether the MAC is computed over the ciphertext (`*-etm@openssh.com`)
    /// rather than over the plaintext, leaving the length field cleartext.
    fn etm(&self) -> bool;
}

/// Properties shared by both directions of a transport.
pub trait CipherCore {
    /// The MAC algorithm type.
    type Mac: Mac;

    /// The negotiated MAC algorithm for this direction.
    fn mac(&self) -> &Self::Mac;

    /// Block size of the negotiated cipher.
    fn block_size(&self) -> usize;
}

/// The receiving half of a transport: decryption, integrity, decompression.
pub trait OpeningCipher: CipherCore {
    /// Decrypt the provided buffer in place.
    fn decrypt(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Verify the MAC over the sequence number and the provided buffer.
    fn open(&mut self, buf: &[u8], mac: &[u8], seq: u32) -> Result<()>;

    /// Decompress the provided payload.
    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>>;
}

/// The sending half of a transport: compression, encryption, integrity.
pub trait SealingCipher: CipherCore {
    /// Compress the provided payload.
    fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>>;

    /// Encrypt the provided buffer in place.
    fn encrypt(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Compute the MAC over the sequence number and the provided buffer.
    fn seal(&mut self, buf: &[u8], seq: u32) -> Result<Vec<u8>>;
}

/// A single frame of the binary packet protocol, decrypted and decompressed.
///
/// The payload starts with the message number; padding, length and MAC are
/// handled during (de)-framing and never appear here.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The decrypted, decompressed payload of the frame.
    pub payload: Vec<u8>,
}

impl Packet {
    /// The message number leading the payload, if any.
    pub fn message_number(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Try to interpret the payload as the message type `T`.
    pub fn to<T: Message>(&self) -> Result<T> {
        Ok(T::from_bytes(&self.payload)?)
    }

    /// Read one frame from the reader, decrypting and verifying it with the
    /// provided [`OpeningCipher`] and the receive sequence number.
    pub async fn from_async_reader<R, C>(reader: &mut R, cipher: &mut C, seq: u32) -> Result<Self>
    where
        R: AsyncRead + Unpin,
        C: OpeningCipher,
    {
        let blocksize = cipher.block_size().max(BLOCK_MIN_SIZE);
        let macsize = cipher.mac().size();

        let (buf, data_offset) = if cipher.mac().etm() {
            // The length field stays cleartext and the MAC covers it along
            // with the ciphertext.
            let mut len = [0u8; 4];
            reader.read_exact(&mut len).await?;

            let data_len = u32::from_be_bytes(len) as usize;
            if data_len < 1 + PADDING_MIN_SIZE
                || data_len % blocksize != 0
                || 4 + data_len + macsize > PACKET_MAX_SIZE
            {
                return Err(crate::Error::PacketSize(data_len));
            }

            let mut buf = vec![0u8; 4 + data_len];
            buf[..4].copy_from_slice(&len);
            reader.read_exact(&mut buf[4..]).await?;

            let mut mac = vec![0u8; macsize];
            reader.read_exact(&mut mac).await?;

            cipher.open(&buf, &mac, seq)?;
            cipher.decrypt(&mut buf[4..])?;

            (buf, 4)
        } else {
            // The length field is part of the first encrypted block, so the
            // frame size is only known after decrypting it.
            let mut buf = vec![0u8; blocksize];
            reader.read_exact(&mut buf).await?;
            cipher.decrypt(&mut buf)?;

            #[allow(clippy::unwrap_used)]
            let data_len = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
            if data_len < 1 + PADDING_MIN_SIZE
                || (4 + data_len) % blocksize != 0
                || 4 + data_len + macsize > PACKET_MAX_SIZE
            {
                return Err(crate::Error::PacketSize(data_len));
            }

            buf.resize(4 + data_len, 0);
            reader.read_exact(&mut buf[blocksize..]).await?;
            cipher.decrypt(&mut buf[blocksize..])?;

            let mut mac = vec![0u8; macsize];
            reader.read_exact(&mut mac).await?;

            cipher.open(&buf, &mac, seq)?;

            (buf, 4)
        };

        let mut cursor = Cursor::new(&buf[data_offset..]);
        let padding = u8::decode(&mut cursor)? as usize;
        let data = cursor.rest();

        let payload = data
            .len()
            .checked_sub(padding)
            .ok_or_else(|| crate::Error::PacketSize(padding))?;
        if padding < PADDING_MIN_SIZE {
            return Err(crate::Error::PacketSize(padding));
        }

        let payload = cipher.decompress(data[..payload].to_vec())?;

        Ok(Self { payload })
    }

    /// Write the frame to the writer, compressing, encrypting and sealing it
    /// with the provided [`SealingCipher`] and the send sequence number.
    pub async fn to_async_writer<W, C>(&self, writer: &mut W, cipher: &mut C, seq: u32) -> Result<()>
    where
        W: AsyncWrite + Unpin,
        C: SealingCipher,
    {
        let blocksize = cipher.block_size().max(BLOCK_MIN_SIZE);
        let payload = cipher.compress(&self.payload)?;

        // The length field is excluded from the alignment rule for `etm`
        // MACs, since it is not covered by the cipher there.
        let framed = if cipher.mac().etm() { 1 } else { 5 } + payload.len();
        let mut padding = blocksize - framed % blocksize;
        if padding < PADDING_MIN_SIZE {
            padding += blocksize;
        }

        let mut data = Vec::with_capacity(1 + payload.len() + padding);
        data.push(padding as u8);
        data.extend_from_slice(&payload);
        {
            // `ThreadRng` must not survive into the write below.
            let mut rng = rand::thread_rng();
            data.extend((0..padding).map(|_| rng.gen::<u8>()));
        }

        let mut buf = Vec::with_capacity(4 + data.len() + cipher.mac().size());

        if cipher.mac().etm() {
            cipher.encrypt(&mut data)?;

            buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
            buf.extend_from_slice(&data);

            let mac = cipher.seal(&buf, seq)?;
            buf.extend_from_slice(&mac);
        } else {
            let mut plaintext = Vec::with_capacity(4 + data.len());
            plaintext.extend_from_slice(&(data.len() as u32).to_be_bytes());
            plaintext.extend_from_slice(&data);

            let mac = cipher.seal(&plaintext, seq)?;

            cipher.encrypt(&mut plaintext)?;
            buf.extend_from_slice(&plaintext);
            buf.extend_from_slice(&mac);
        }

        writer.write_all(&buf).await?;

        Ok(())
    }
}

/// Conversion of a message (or an already-built [`Packet`]) into a [`Packet`].
pub trait ToPacket {
    /// Build the [`Packet`] carrying `self`.
    fn to_packet(&self) -> Packet;
}

impl<T: Message> ToPacket for T {
    fn to_packet(&self) -> Packet {
        Packet {
            payload: self.to_bytes(),
        }
    }
}

impl ToPacket for Packet {
    fn to_packet(&self) -> Packet {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A cleartext transport with a configurable block size and a MAC that
    /// binds the sequence number, for framing tests.
    struct TestTransport {
        blocksize: usize,
        etm: bool,
    }

    impl Mac for TestTransport {
        fn size(&self) -> usize {
            4
        }

        fn etm(&self) -> bool {
            self.etm
        }
    }

    impl CipherCore for TestTransport {
        type Mac = Self;

        fn mac(&self) -> &Self {
            self
        }

        fn block_size(&self) -> usize {
            self.blocksize
        }
    }

    impl OpeningCipher for TestTransport {
        fn decrypt(&mut self, _buf: &mut [u8]) -> Result<()> {
            Ok(())
        }

        fn open(&mut self, buf: &[u8], mac: &[u8], seq: u32) -> Result<()> {
            if mac == fake_mac(buf, seq) {
                Ok(())
            } else {
                Err(crate::Error::Integrity(digest::MacError))
            }
        }

        fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>> {
            Ok(buf)
        }
    }

    impl SealingCipher for TestTransport {
        fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>> {
            Ok(buf.to_vec())
        }

        fn encrypt(&mut self, _buf: &mut [u8]) -> Result<()> {
            Ok(())
        }

        fn seal(&mut self, buf: &[u8], seq: u32) -> Result<Vec<u8>> {
            Ok(fake_mac(buf, seq).to_vec())
        }
    }

    fn fake_mac(buf: &[u8], seq: u32) -> [u8; 4] {
        let sum = buf
            .iter()
            .fold(seq, |acc, byte| acc.wrapping_add(*byte as u32));

        sum.to_be_bytes()
    }

    async fn roundtrip(blocksize: usize, etm: bool) {
        let mut transport = TestTransport { blocksize, etm };
        let payload = b"\x15some message bytes".to_vec();

        let mut wire = Vec::new();
        Packet {
            payload: payload.clone(),
        }
        .to_async_writer(&mut wire, &mut transport, 42)
        .await
        .unwrap();

        // length | padding | payload | padding bytes, all block-aligned.
        let framed = if etm { wire.len() - 4 - 4 } else { wire.len() - 4 };
        assert_eq!(framed % blocksize.max(8), 0);

        let mut reader = futures::io::Cursor::new(wire);
        let packet = Packet::from_async_reader(&mut reader, &mut transport, 42)
            .await
            .unwrap();

        assert_eq!(packet.payload, payload);
    }

    #[async_std::test]
    async fn roundtrips_at_block_8() {
        roundtrip(8, false).await;
    }

    #[async_std::test]
    async fn roundtrips_at_block_16() {
        roundtrip(16, false).await;
    }

    #[async_std::test]
    async fn roundtrips_with_etm() {
        roundtrip(16, true).await;
    }

    #[async_std::test]
    async fn rejects_wrong_sequence_number() {
        let mut transport = TestTransport {
            blocksize: 8,
            etm: false,
        };

        let mut wire = Vec::new();
        Packet {
            payload: vec![0x15],
        }
        .to_async_writer(&mut wire, &mut transport, 3)
        .await
        .unwrap();

        let mut reader = futures::io::Cursor::new(wire);
        let result = Packet::from_async_reader(&mut reader, &mut transport, 4).await;

        assert!(matches!(result, Err(crate::Error::Integrity(_))));
    }

    #[async_std::test]
    async fn rejects_oversized_length() {
        let mut transport = TestTransport {
            blocksize: 8,
            etm: false,
        };

        let mut wire = vec![0xff; 32];
        wire[..4].copy_from_slice(&(PACKET_MAX_SIZE as u32).to_be_bytes());

        let mut reader = futures::io::Cursor::new(wire);
        let result = Packet::from_async_reader(&mut reader, &mut transport, 0).await;

        assert!(matches!(result, Err(crate::Error::PacketSize(_))));
    }
}
