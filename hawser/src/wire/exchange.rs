//! Exchange-hash computation and signature blobs.
//!
//! The exchange hash `H` binds both identification strings, both raw
//! `KEXINIT` payloads, the host key and the exchanged values; it doubles as
//! the session identifier when produced by the very first key exchange.

use digest::Digest;
use signature::{Signer, Verifier};
use ssh_key::{PrivateKey, PublicKey, Signature};

use super::{
    arch::{encode_bytes, MpInt},
    Cursor, Decode, Encode, Message,
};
use crate::Result;

/// Hash input of the ECDH key-exchange ([RFC 5656 § 4]).
///
/// [RFC 5656 § 4]: https://datatracker.ietf.org/doc/html/rfc5656#section-4
#[derive(Debug)]
pub struct EcdhExchange<'x> {
    /// The client's identification string.
    pub v_c: &'x [u8],

    /// The server's identification string.
    pub v_s: &'x [u8],

    /// The client's raw `KEXINIT` payload.
    pub i_c: &'x [u8],

    /// The server's raw `KEXINIT` payload.
    pub i_s: &'x [u8],

    /// The server's public host key blob.
    pub k_s: &'x [u8],

    /// The client's ephemeral public key octets.
    pub q_c: &'x [u8],

    /// The server's ephemeral public key octets.
    pub q_s: &'x [u8],

    /// The shared secret.
    pub k: &'x MpInt,
}

impl EcdhExchange<'_> {
    /// Compute the exchange hash with the digest `D`.
    pub fn hash<D: Digest>(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        encode_bytes(self.v_c, &mut buf);
        encode_bytes(self.v_s, &mut buf);
        encode_bytes(self.i_c, &mut buf);
        encode_bytes(self.i_s, &mut buf);
        encode_bytes(self.k_s, &mut buf);
        encode_bytes(self.q_c, &mut buf);
        encode_bytes(self.q_s, &mut buf);
        self.k.encode(&mut buf);

        D::digest(&buf).to_vec()
    }
}

/// Hash input of the fixed-group Diffie-Hellman key-exchange ([RFC 4253 § 8]).
///
/// [RFC 4253 § 8]: https://datatracker.ietf.org/doc/html/rfc4253#section-8
#[derive(Debug)]
pub struct DhExchange<'x> {
    /// The client's identification string.
    pub v_c: &'x [u8],

    /// The server's identification string.
    pub v_s: &'x [u8],

    /// The client's raw `KEXINIT` payload.
    pub i_c: &'x [u8],

    /// The server's raw `KEXINIT` payload.
    pub i_s: &'x [u8],

    /// The server's public host key blob.
    pub k_s: &'x [u8],

    /// The client's public exchange value.
    pub e: &'x MpInt,

    /// The server's public exchange value.
    pub f: &'x MpInt,

    /// The shared secret.
    pub k: &'x MpInt,
}

impl DhExchange<'_> {
    /// Compute the exchange hash with the digest `D`.
    pub fn hash<D: Digest>(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        encode_bytes(self.v_c, &mut buf);
        encode_bytes(self.v_s, &mut buf);
        encode_bytes(self.i_c, &mut buf);
        encode_bytes(self.i_s, &mut buf);
        encode_bytes(self.k_s, &mut buf);
        self.e.encode(&mut buf);
        self.f.encode(&mut buf);
        self.k.encode(&mut buf);

        D::digest(&buf).to_vec()
    }
}

/// Hash input of the group-exchange Diffie-Hellman key-exchange
/// ([RFC 4419 § 3]).
///
/// [RFC 4419 § 3]: https://datatracker.ietf.org/doc/html/rfc4419#section-3
#[derive(Debug)]
pub struct GexExchange<'x> {
    /// The client's identification string.
    pub v_c: &'x [u8],

    /// The server's identification string.
    pub v_s: &'x [u8],

    /// The client's raw `KEXINIT` payload.
    pub i_c: &'x [u8],

    /// The server's raw `KEXINIT` payload.
    pub i_s: &'x [u8],

    /// The server's public host key blob.
    pub k_s: &'x [u8],

    /// Minimal acceptable group size, in bits.
    pub min: u32,

    /// Preferred group size, in bits.
    pub n: u32,

    /// Maximal acceptable group size, in bits.
    pub max: u32,

    /// The server-chosen safe prime.
    pub p: &'x MpInt,

    /// The generator for the chosen prime.
    pub g: &'x MpInt,

    /// The client's public exchange value.
    pub e: &'x MpInt,

    /// The server's public exchange value.
    pub f: &'x MpInt,

    /// The shared secret.
    pub k: &'x MpInt,
}

impl GexExchange<'_> {
    /// Compute the exchange hash with the digest `D`.
    pub fn hash<D: Digest>(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        encode_bytes(self.v_c, &mut buf);
        encode_bytes(self.v_s, &mut buf);
        encode_bytes(self.i_c, &mut buf);
        encode_bytes(self.i_s, &mut buf);
        encode_bytes(self.k_s, &mut buf);
        self.min.encode(&mut buf);
        self.n.encode(&mut buf);
        self.max.encode(&mut buf);
        self.p.encode(&mut buf);
        self.g.encode(&mut buf);
        self.e.encode(&mut buf);
        self.f.encode(&mut buf);
        self.k.encode(&mut buf);

        D::digest(&buf).to_vec()
    }
}

/// The signed blob of the `publickey` authentication method
/// ([RFC 4252 § 7]): the session identifier followed by the
/// `SSH_MSG_USERAUTH_REQUEST` without its signature field.
///
/// [RFC 4252 § 7]: https://datatracker.ietf.org/doc/html/rfc4252#section-7
#[derive(Debug)]
pub struct PublickeySignature<'x> {
    /// The session identifier from the first key exchange.
    pub session_id: &'x [u8],

    /// The user name being authenticated.
    pub username: &'x str,

    /// The service being requested.
    pub service_name: &'x str,

    /// The public key algorithm name.
    pub algorithm: &'x str,

    /// The public key blob.
    pub blob: &'x [u8],
}

impl PublickeySignature<'_> {
    fn to_sign(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        encode_bytes(self.session_id, &mut buf);
        buf.push(crate::wire::userauth::Request::NUMBER);
        encode_bytes(self.username.as_bytes(), &mut buf);
        encode_bytes(self.service_name.as_bytes(), &mut buf);
        encode_bytes(b"publickey", &mut buf);
        true.encode(&mut buf);
        encode_bytes(self.algorithm.as_bytes(), &mut buf);
        encode_bytes(self.blob, &mut buf);

        buf
    }

    /// Produce the signature over the blob with the provided private key.
    pub fn sign(&self, key: &PrivateKey) -> Result<Signature> {
        Ok(Signer::try_sign(key, &self.to_sign())?)
    }

    /// Verify a signature over the blob against the provided public key.
    pub fn verify(&self, key: &PublicKey, signature: &Signature) -> Result<()> {
        Ok(Verifier::verify(key, &self.to_sign(), signature)?)
    }
}

/// The signed blob of the `hostbased` authentication method
/// ([RFC 4252 § 9]), extending [`PublickeySignature`] with the client host
/// identity.
///
/// [RFC 4252 § 9]: https://datatracker.ietf.org/doc/html/rfc4252#section-9
#[derive(Debug)]
pub struct HostbasedSignature<'x> {
    /// The session identifier from the first key exchange.
    pub session_id: &'x [u8],

    /// The user name being authenticated.
    pub username: &'x str,

    /// The service being requested.
    pub service_name: &'x str,

    /// The host key algorithm name.
    pub algorithm: &'x str,

    /// The client host public key blob.
    pub host_key: &'x [u8],

    /// The client host name, FQDN.
    pub host_name: &'x str,

    /// The user name on the client host.
    pub host_username: &'x str,
}

impl HostbasedSignature<'_> {
    fn to_sign(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        encode_bytes(self.session_id, &mut buf);
        buf.push(crate::wire::userauth::Request::NUMBER);
        encode_bytes(self.username.as_bytes(), &mut buf);
        encode_bytes(self.service_name.as_bytes(), &mut buf);
        encode_bytes(b"hostbased", &mut buf);
        encode_bytes(self.algorithm.as_bytes(), &mut buf);
        encode_bytes(self.host_key, &mut buf);
        encode_bytes(self.host_name.as_bytes(), &mut buf);
        encode_bytes(self.host_username.as_bytes(), &mut buf);

        buf
    }

    /// Produce the signature over the blob with the provided private key.
    pub fn sign(&self, key: &PrivateKey) -> Result<Signature> {
        Ok(Signer::try_sign(key, &self.to_sign())?)
    }

    /// Verify a signature over the blob against the provided public key.
    pub fn verify(&self, key: &PublicKey, signature: &Signature) -> Result<()> {
        Ok(Verifier::verify(key, &self.to_sign(), signature)?)
    }
}

/// Serialize a signature to its wire blob, `string algorithm, string data`.
pub fn encode_signature(signature: &Signature) -> Vec<u8> {
    let mut buf = Vec::new();

    encode_bytes(signature.algorithm().as_str().as_bytes(), &mut buf);
    encode_bytes(signature.as_bytes(), &mut buf);

    buf
}

/// Deserialize a signature from its wire blob.
pub fn decode_signature(blob: &[u8]) -> Result<Signature> {
    let mut cursor = Cursor::new(blob);

    let algorithm = super::arch::Ascii::decode(&mut cursor)?;
    let data = super::arch::decode_bytes(&mut cursor)?;
    cursor.finish()?;

    Ok(Signature::new(
        ssh_key::Algorithm::new(&algorithm)?,
        data.to_vec(),
    )?)
}

#[cfg(test)]
mod tests {
    use sha2::Sha256;

    use super::*;

    #[test]
    fn exchange_hash_is_deterministic() {
        let k = MpInt::positive(&[0x42; 32]);
        let exchange = EcdhExchange {
            v_c: b"SSH-2.0-client",
            v_s: b"SSH-2.0-server",
            i_c: &[20; 64],
            i_s: &[20; 48],
            k_s: b"hostkey",
            q_c: &[1; 32],
            q_s: &[2; 32],
            k: &k,
        };

        assert_eq!(exchange.hash::<Sha256>(), exchange.hash::<Sha256>());
        assert_eq!(exchange.hash::<Sha256>().len(), 32);
    }

    #[test]
    fn signature_blob_roundtrips() {
        let key = PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519)
            .expect("key generation");

        let signed = PublickeySignature {
            session_id: &[3; 32],
            username: "user",
            service_name: "ssh-connection",
            algorithm: "ssh-ed25519",
            blob: b"blob",
        };

        let signature = signed.sign(&key).expect("signing");
        let blob = encode_signature(&signature);
        let decoded = decode_signature(&blob).expect("decoding");

        signed
            .verify(key.public_key(), &decoded)
            .expect("verification");
    }
}
