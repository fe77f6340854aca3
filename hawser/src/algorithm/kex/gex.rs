//! The group-exchange Diffie-Hellman exchanges (RFC 4419).

use digest::{Digest, FixedOutputReset};
use signature::Verifier;
use ssh_key::{PrivateKey, PublicKey};

use crate::{
    stream::{Keys, Stream, Transport},
    wire::{
        exchange::{decode_signature, encode_signature, GexExchange},
        trans::{KexDhGexGroup, KexDhGexInit, KexDhGexReply, KexDhGexRequest},
        Message,
    },
    Error, Pipe, Result,
};

use super::{dh, KexMeta};

/// Smallest group size we accept, in bits.
const MIN_GROUP_BITS: u32 = 1024;

/// Group size we prefer, in bits.
const PREFERRED_GROUP_BITS: u32 = 2048;

/// Largest group size we accept, in bits.
const MAX_GROUP_BITS: u32 = 8192;

pub(super) async fn as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    client: KexMeta<'_>,
    server: KexMeta<'_>,
) -> Result<(Transport, Transport, PublicKey)> {
    let request = KexDhGexRequest {
        min: MIN_GROUP_BITS,
        n: PREFERRED_GROUP_BITS,
        max: MAX_GROUP_BITS,
    };
    stream.send(&request).await?;

    let choice: KexDhGexGroup = stream.recv_kex().await?.to()?;

    let group = dh::Group {
        p: dh::from_mpint(&choice.p),
        g: dh::from_mpint(&choice.g),
    };
    if group.bits() < MIN_GROUP_BITS as u64 || group.bits() > MAX_GROUP_BITS as u64 {
        return Err(Error::KexError);
    }

    let x = group.generate_secret();
    let e = dh::to_mpint(&group.exchange_value(&x));

    stream.send(&KexDhGexInit { e: e.clone() }).await?;

    let reply: KexDhGexReply = stream.recv_kex().await?.to()?;

    let f = dh::from_mpint(&reply.f);
    group.validate(&f)?;

    let secret = dh::to_mpint(&group.shared_secret(&f, &x));

    let k_s = PublicKey::from_bytes(&reply.k_s)?;
    let hash = GexExchange {
        v_c: client.id.to_string().as_bytes(),
        v_s: server.id.to_string().as_bytes(),
        i_c: &client.kexinit.to_bytes(),
        i_s: &server.kexinit.to_bytes(),
        k_s: &reply.k_s,
        min: request.min,
        n: request.n,
        max: request.max,
        p: &choice.p,
        g: &choice.g,
        e: &e,
        f: &reply.f,
        k: &secret,
    }
    .hash::<H>();

    Verifier::verify(&k_s, &hash, &decode_signature(&reply.signature)?)?;

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
    let request: KexDhGexRequest = stream.recv_kex().await?.to()?;

    // A single built-in safe prime is served for any acceptable range.
    let group = dh::Group::group14();
    if (group.bits() as u32) < request.min || (group.bits() as u32) > request.max {
        return Err(Error::KexError);
    }

    let choice = KexDhGexGroup {
        p: dh::to_mpint(&group.p),
        g: dh::to_mpint(&group.g),
    };
    stream.send(&choice).await?;

    let init: KexDhGexInit = stream.recv_kex().await?.to()?;

    let e = dh::from_mpint(&init.e);
    group.validate(&e)?;

    let y = group.generate_secret();
    let f = dh::to_mpint(&group.exchange_value(&y));

    let secret = dh::to_mpint(&group.shared_secret(&e, &y));

    let k_s = key.public_key().to_bytes()?;
    let hash = GexExchange {
        v_c: client.id.to_string().as_bytes(),
        v_s: server.id.to_string().as_bytes(),
        i_c: &client.kexinit.to_bytes(),
        i_s: &server.kexinit.to_bytes(),
        k_s: &k_s,
        min: request.min,
        n: request.n,
        max: request.max,
        p: &choice.p,
        g: &choice.g,
        e: &init.e,
        f: &f,
        k: &secret,
    }
    .hash::<H>();

    let signature = signature::Signer::try_sign(key, &hash)?;

    stream
        .send(&KexDhGexReply {
            k_s: k_s.into(),
            f,
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
