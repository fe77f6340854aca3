use digest::{Digest, FixedOutputReset};
use signature::Verifier;
use ssh_key::{PrivateKey, PublicKey};

use crate::{
    stream::{Keys, Stream, Transport},
    wire::{
        arch::MpInt,
        exchange::{decode_signature, encode_signature, EcdhExchange},
        trans::{KexEcdhInit, KexEcdhReply},
        Message,
    },
    Error, Pipe, Result,
};

use super::KexMeta;

pub(super) async fn as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    client: KexMeta<'_>,
    server: KexMeta<'_>,
) -> Result<(Transport, Transport, PublicKey)> {
    let e_c = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
    let q_c = x25519_dalek::PublicKey::from(&e_c);

    stream
        .send(&KexEcdhInit {
            q_c: q_c.as_ref().into(),
        })
        .await?;

    let ecdh: KexEcdhReply = stream.recv_kex().await?.to()?;
    let q_s = x25519_dalek::PublicKey::from(
        <[u8; 32]>::try_from(&*ecdh.q_s).map_err(|_| Error::KexError)?,
    );

    let secret = MpInt::positive(e_c.diffie_hellman(&q_s).as_bytes());

    let k_s = PublicKey::from_bytes(&ecdh.k_s)?;
    let hash = EcdhExchange {
        v_c: client.id.to_string().as_bytes(),
        v_s: server.id.to_string().as_bytes(),
        i_c: &client.kexinit.to_bytes(),
        i_s: &server.kexinit.to_bytes(),
        k_s: &ecdh.k_s,
        q_c: q_c.as_ref(),
        q_s: q_s.as_ref(),
        k: &secret,
    }
    .hash::<H>();

    Verifier::verify(&k_s, &hash, &decode_signature(&ecdh.signature)?)?;

    let session_id = stream.with_session(&hash);

    let client_keys = Keys::as_client::<H>(&secret, &hash, &session_id, &client.cipher, &client.hmac);
    let server_keys = Keys::as_server::<H>(&secret, &hash, &session_id, &server.cipher, &server.hmac);

    Ok((
        client.into_transport(client_keys),
        server.into_transport(server_keys),
        k_s,
    ))
}

pub(super) async fn as_server<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    client: KexMeta<'_>,
    server: KexMeta<'_>,
    key: &PrivateKey,
) -> Result<(Transport, Transport)> {
    let ecdh: KexEcdhInit = stream.recv_kex().await?.to()?;

    let e_s = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
    let q_s = x25519_dalek::PublicKey::from(&e_s);

    let q_c = x25519_dalek::PublicKey::from(
        <[u8; 32]>::try_from(&*ecdh.q_c).map_err(|_| Error::KexError)?,
    );

    let secret = MpInt::positive(e_s.diffie_hellman(&q_c).as_bytes());

    let k_s = key.public_key().to_bytes()?;

    let hash = EcdhExchange {
        v_c: client.id.to_string().as_bytes(),
        v_s: server.id.to_string().as_bytes(),
        i_c: &client.kexinit.to_bytes(),
        i_s: &server.kexinit.to_bytes(),
        k_s: &k_s,
        q_c: q_c.as_ref(),
        q_s: q_s.as_ref(),
        k: &secret,
    }
    .hash::<H>();

    let signature = signature::Signer::try_sign(key, &hash)?;

    stream
        .send(&KexEcdhReply {
            k_s: k_s.into(),
            q_s: q_s.as_ref().into(),
            signature: encode_signature(&signature).into(),
        })
        .await?;

    let session_id = stream.with_session(&hash);

    let client_keys = Keys::as_client::<H>(&secret, &hash, &session_id, &client.cipher, &client.hmac);
    let server_keys = Keys::as_server::<H>(&secret, &hash, &session_id, &server.cipher, &server.hmac);

    Ok((
        client.into_transport(client_keys),
        server.into_transport(server_keys),
    ))
}
