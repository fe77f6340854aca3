use secrecy::ExposeSecret;

use crate::{
    algorithm::{self, Cipher, CipherState},
    wire::{CipherCore, Mac, OpeningCipher, SealingCipher},
    Result,
};

use super::Keys;

/// The live algorithm state of both directions of a [`super::Stream`].
///
/// Replaced wholesale when a key exchange completes, one direction at a
/// time, so no frame ever observes a half-updated algorithm suite.
#[derive(Debug, Default)]
pub struct TransportPair {
    /// The receiving direction.
    pub rx: Transport,

    /// The sending direction.
    pub tx: Transport,
}

/// The live algorithm state of one direction: the negotiated cipher, MAC
/// and compression algorithms along with their derived key chain.
#[derive(Default)]
pub struct Transport {
    pub(crate) chain: Keys,
    pub(crate) state: Option<CipherState>,
    pub(crate) cipher: Cipher,
    pub(crate) hmac: algorithm::Hmac,
    pub(crate) compress: algorithm::Compress,

    /// Whether user authentication succeeded, which is what activates the
    /// delayed compression algorithms.
    pub(crate) authed: bool,
}

impl Transport {
    fn compression_active(&self) -> bool {
        !self.compress.is_delayed() || self.authed
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("cipher", &self.cipher)
            .field("hmac", &self.hmac)
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}

impl Mac for algorithm::Hmac {
    fn size(&self) -> usize {
        self.size()
    }

    fn etm(&self) -> bool {
        self.etm()
    }
}

impl CipherCore for Transport {
    type Mac = algorithm::Hmac;

    fn mac(&self) -> &Self::Mac {
        &self.hmac
    }

    fn block_size(&self) -> usize {
        self.cipher.block_size()
    }
}

impl OpeningCipher for Transport {
    fn decrypt(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.cipher != Cipher::None {
            self.cipher.decrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf,
            )?;
        }

        Ok(())
    }

    fn open(&mut self, buf: &[u8], mac: &[u8], seq: u32) -> Result<()> {
        if Mac::size(&self.hmac) > 0 {
            self.hmac
                .verify(seq, buf, self.chain.hmac.expose_secret(), mac)?;
        }

        Ok(())
    }

    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>> {
        if self.compression_active() {
            self.compress.decompress(buf)
        } else {
            Ok(buf)
        }
    }
}

impl SealingCipher for Transport {
    fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>> {
        if self.compression_active() {
            self.compress.compress(buf)
        } else {
            Ok(buf.to_vec())
        }
    }

    fn encrypt(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.cipher != Cipher::None {
            self.cipher.encrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf,
            )?;
        }

        Ok(())
    }

    fn seal(&mut self, buf: &[u8], seq: u32) -> Result<Vec<u8>> {
        Ok(self
            .hmac
            .sign(seq, buf, self.chain.hmac.expose_secret()))
    }
}

#[cfg(test)]
mod tests {
    use sha2::Sha256;

    use super::*;
    use crate::{
        algorithm::Hmac,
        wire::{arch::MpInt, Packet},
    };

    fn transport_pair(cipher: Cipher, hmac: Hmac) -> (Transport, Transport) {
        let secret = MpInt::positive(&[0x51; 32]);
        let hash = [0x62; 32];
        let session_id = [0x73; 32];

        let chain = Keys::as_client::<Sha256>(&secret, &hash, &session_id, &cipher, &hmac);
        let tx = Transport {
            chain,
            state: None,
            cipher: cipher.clone(),
            hmac: hmac.clone(),
            compress: Default::default(),
            authed: false,
        };

        let chain = Keys::as_client::<Sha256>(&secret, &hash, &session_id, &cipher, &hmac);
        let rx = Transport {
            chain,
            state: None,
            cipher,
            hmac,
            compress: Default::default(),
            authed: false,
        };

        (tx, rx)
    }

    async fn roundtrip(cipher: Cipher, hmac: Hmac) {
        let (mut tx, mut rx) = transport_pair(cipher, hmac);

        let packet = Packet {
            payload: b"\x5droundtripping through a real cipher suite".to_vec(),
        };

        let mut wire = Vec::new();
        for seq in 0..4u32 {
            packet.to_async_writer(&mut wire, &mut tx, seq).await.unwrap();
        }

        let mut reader = futures::io::Cursor::new(wire);
        for seq in 0..4u32 {
            let decoded = Packet::from_async_reader(&mut reader, &mut rx, seq)
                .await
                .unwrap();

            assert_eq!(decoded, packet);
        }
    }

    #[async_std::test]
    async fn aes_ctr_with_sha2() {
        roundtrip(Cipher::Aes128Ctr, Hmac::HmacSha256).await;
    }

    #[async_std::test]
    async fn aes_cbc_with_sha1() {
        roundtrip(Cipher::Aes256Cbc, Hmac::HmacSha1).await;
    }

    #[async_std::test]
    async fn tdes_with_md5() {
        roundtrip(Cipher::TDesCbc, Hmac::HmacMd5).await;
    }

    #[async_std::test]
    async fn etm_suites() {
        roundtrip(Cipher::Aes192Ctr, Hmac::HmacSha512ETM).await;
    }

    #[async_std::test]
    async fn mismatched_keys_fail_integrity() {
        let (mut tx, _) = transport_pair(Cipher::Aes128Ctr, Hmac::HmacSha256);

        let secret = MpInt::positive(&[0x99; 32]);
        let chain = Keys::as_client::<Sha256>(
            &secret,
            &[0x62; 32],
            &[0x73; 32],
            &Cipher::Aes128Ctr,
            &Hmac::HmacSha256,
        );
        let mut rx = Transport {
            chain,
            state: None,
            cipher: Cipher::Aes128Ctr,
            hmac: Hmac::HmacSha256,
            compress: Default::default(),
            authed: false,
        };

        let mut wire = Vec::new();
        Packet {
            payload: vec![0x15],
        }
        .to_async_writer(&mut wire, &mut tx, 0)
        .await
        .unwrap();

        let mut reader = futures::io::Cursor::new(wire);
        let result = Packet::from_async_reader(&mut reader, &mut rx, 0).await;

        assert!(result.is_err());
    }
}
