use strum::{AsRefStr, EnumString};

use crate::{
    side::{client::Client, server::Server},
    wire::{arch::NameList, trans::KexInit},
    Error, Result,
};

use super::Negociate;

// TODO: (optimization) Get rid of this Box<dyn> altogether.
pub type CipherState = Box<dyn std::any::Any + Send + Sync>;

impl Negociate<Client> for Cipher {
    const ERR: Error = Error::NoCommonCipher;

    fn field(kex: &KexInit) -> &NameList {
        &kex.encryption_algorithms_client_to_server
    }
}

impl Negociate<Server> for Cipher {
    const ERR: Error = Error::NoCommonCipher;

    fn field(kex: &KexInit) -> &NameList {
        &kex.encryption_algorithms_server_to_client
    }
}

// TODO: (feature) Implement the AEAD ciphers (`chacha20-poly1305@openssh.com`, `aes256-gcm@openssh.com`).

/// SSH cipher algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Cipher {
    /// AES-256 in counter (CTR) mode.
    Aes256Ctr,

    /// AES-192 in counter (CTR) mode.
    Aes192Ctr,

    /// AES-128 in counter (CTR) mode.
    Aes128Ctr,

    /// AES-256 in cipher block chaining (CBC) mode.
    Aes256Cbc,

    /// AES-192 in cipher block chaining (CBC) mode.
    Aes192Cbc,

    /// AES-128 in cipher block chaining (CBC) mode.
    Aes128Cbc,

    /// TripleDES in cipher block chaining (CBC) mode.
    #[strum(serialize = "3des-cbc")]
    TDesCbc,

    /// No cipher algorithm.
    #[default]
    None,
}

impl Cipher {
    /// This method is a hack to solve deduplication of the enum
    /// variants and to store the cipher states inside a dynamically
    /// typed `Box<dyn std::any::Any>`.
    fn state<'s, T: cipher::KeyIvInit + Send + Sync + 'static>(
        state: &'s mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
    ) -> &'s mut T {
        state
            .get_or_insert_with(|| {
                Box::new(T::new_from_slices(key, iv).expect("Key derivation failed horribly"))
            })
            .downcast_mut()
            .expect("State changed in the meanwhile")
    }

    fn ctr<C: ctr::cipher::StreamCipher>(cipher: &mut C, buffer: &mut [u8]) -> Result<()> {
        cipher
            .try_apply_keystream(buffer)
            .map_err(|_| Error::Cipher)
    }

    pub(crate) fn encrypt(
        &self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        fn cbc<C: cbc::cipher::BlockEncryptMut>(cipher: &mut C, buffer: &mut [u8]) -> Result<()> {
            use cbc::cipher::inout;

            let data = inout::InOutBufReserved::from_mut_slice(buffer, buffer.len())
                .map_err(|_| Error::Cipher)?;

            let mut buf = data
                .into_padded_blocks::<cbc::cipher::block_padding::NoPadding, C::BlockSize>()
                .map_err(|_| Error::Cipher)?;

            cipher.encrypt_blocks_inout_mut(buf.get_blocks());
            if let Some(block) = buf.get_tail_block() {
                cipher.encrypt_block_inout_mut(block);
            }

            Ok(())
        }

        match self {
            Self::Aes256Ctr => Self::ctr(
                Self::state::<ctr::Ctr128BE<aes::Aes256>>(state, key, iv),
                buffer,
            ),
            Self::Aes192Ctr => Self::ctr(
                Self::state::<ctr::Ctr128BE<aes::Aes192>>(state, key, iv),
                buffer,
            ),
            Self::Aes128Ctr => Self::ctr(
                Self::state::<ctr::Ctr128BE<aes::Aes128>>(state, key, iv),
                buffer,
            ),
            Self::Aes256Cbc => cbc(
                Self::state::<cbc::Encryptor<aes::Aes256>>(state, key, iv),
                buffer,
            ),
            Self::Aes192Cbc => cbc(
                Self::state::<cbc::Encryptor<aes::Aes192>>(state, key, iv),
                buffer,
            ),
            Self::Aes128Cbc => cbc(
                Self::state::<cbc::Encryptor<aes::Aes128>>(state, key, iv),
                buffer,
            ),
            Self::TDesCbc => cbc(
                Self::state::<cbc::Encryptor<des::TdesEde3>>(state, key, iv),
                buffer,
            ),
            Self::None => Ok(()),
        }
    }

    pub(crate) fn decrypt(
        &self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        fn cbc<C: cbc::cipher::BlockDecryptMut>(cipher: &mut C, buffer: &mut [u8]) -> Result<()> {
            use cbc::cipher::inout;

            let data = inout::InOutBufReserved::from_mut_slice(buffer, buffer.len())
                .map_err(|_| Error::Cipher)?;

            let mut buf = data
                .into_padded_blocks::<cbc::cipher::block_padding::NoPadding, C::BlockSize>()
                .map_err(|_| Error::Cipher)?;

            cipher.decrypt_blocks_inout_mut(buf.get_blocks());
            if let Some(block) = buf.get_tail_block() {
                cipher.decrypt_block_inout_mut(block);
            }

            Ok(())
        }

        match self {
            // In CTR mode, encryption and decryption are the same
            Self::Aes256Ctr | Self::Aes192Ctr | Self::Aes128Ctr => {
                self.encrypt(state, key, iv, buffer)
            }
            Self::Aes256Cbc => cbc(
                Self::state::<cbc::Decryptor<aes::Aes256>>(state, key, iv),
                buffer,
            ),
            Self::Aes192Cbc => cbc(
                Self::state::<cbc::Decryptor<aes::Aes192>>(state, key, iv),
                buffer,
            ),
            Self::Aes128Cbc => cbc(
                Self::state::<cbc::Decryptor<aes::Aes128>>(state, key, iv),
                buffer,
            ),
            Self::TDesCbc => cbc(
                Self::state::<cbc::Decryptor<des::TdesEde3>>(state, key, iv),
                buffer,
            ),
            Self::None => Ok(()),
        }
    }

    pub(crate) fn block_size(&self) -> usize {
        match self {
            Self::None | Self::TDesCbc => 8,
            Self::Aes128Cbc
            | Self::Aes192Cbc
            | Self::Aes256Cbc
            | Self::Aes128Ctr
            | Self::Aes192Ctr
            | Self::Aes256Ctr => 16,
        }
    }

    pub(crate) fn key_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes128Cbc | Self::Aes128Ctr => 16,
            Self::TDesCbc | Self::Aes192Cbc | Self::Aes192Ctr => 24,
            Self::Aes256Cbc | Self::Aes256Ctr => 32,
        }
    }

    pub(crate) fn iv_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::TDesCbc => 8,
            Self::Aes128Cbc
            | Self::Aes192Cbc
            | Self::Aes256Cbc
            | Self::Aes128Ctr
            | Self::Aes192Ctr
            | Self::Aes256Ctr => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for name in [
            "aes256-ctr",
            "aes192-ctr",
            "aes128-ctr",
            "aes256-cbc",
            "3des-cbc",
            "none",
        ] {
            let cipher: Cipher = name.parse().unwrap();
            assert_eq!(cipher.as_ref(), name);
        }
    }

    #[test]
    fn ctr_mode_is_symmetric() {
        let cipher = Cipher::Aes128Ctr;
        let key = vec![0x0b; cipher.key_size()];
        let iv = vec![0x1c; cipher.iv_size()];

        let mut buffer = b"sixteen byte msg".to_vec();

        let mut state = None;
        cipher.encrypt(&mut state, &key, &iv, &mut buffer).unwrap();
        assert_ne!(buffer, b"sixteen byte msg");

        let mut state = None;
        cipher.decrypt(&mut state, &key, &iv, &mut buffer).unwrap();
        assert_eq!(buffer, b"sixteen byte msg");
    }
}
