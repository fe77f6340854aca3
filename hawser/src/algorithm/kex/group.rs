//! The fixed-group Diffie-Hellman exchanges (RFC 4253 § 8).

use digest::{Digest, FixedOutputReset};
use signature::Verifier;
use ssh_key::{PrivateKey, PublicKey};

use crate::{
    stream::{Keys, Stream, Transport},
    wire::{
        exchange::{decode_signature, encode_signature, DhExchange},
        trans::{KexDhInit, KexDhReply},
        Message,
    },
    Pipe, Result,
};

use super::{dh, KexMeta};

pub(super) async fn as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    client: KexMeta<'_>,
    server: KexMeta<'_>,
    group: dh::Group,
) -> Result<(Transport, Transport, PublicKey)> {
    let x = group.generate_secret();
    let e = dh::to_mpint(&group.exchange_value(&x));

    stream.send(&KexDhInit { e: e.clone() }).await?;

    let reply: KexDhReply = stream.recv_kex().await?.to()?;

    let f = dh::from_mpint(&reply.f);
    group.validate(&f)?;

    let secret = dh::to_mpint(&group.shared_secret(&f, &x));

    let k_s = PublicKey::from_bytes(&reply.k_s)?;
    let hash = DhExchange {
        v_c: client.id.to_string().as_bytes(),
        v_s: server.id.to_string().as_bytes(),
        i_c: &client.kexinit.to_bytes(),
        i_s: &server.kexinit.to_bytes(),
        k_s: &reply.k_s,
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
    group: dh::Group,
    key: &PrivateKey,
) -> Result<(Transport, Transport)> {
    let init: KexDhInit = stream.recv_kex().await?.to()?;

    let e = dh::from_mpint(&init.e);
    group.validate(&e)?;

    let y = group.generate_secret();
    let f = dh::to_mpint(&group.exchange_value(&y));

    let secret = dh::to_mpint(&group.shared_secret(&e, &y));

    let k_s = key.public_key().to_bytes()?;
    let hash = DhExchange {
        v_c: client.id.to_string().as_bytes(),
        v_s: server.id.to_string().as_bytes(),
        i_c: &client.kexinit.to_bytes(),
        i_s: &server.kexinit.to_bytes(),
        k_s: &k_s,
        e: &init.e,
        f: &f,
        k: &secret,
    }
    .hash::<H>();

    let signature = signature::Signer::try_sign(key, &hash)?;

    stream
        .send(&KexDhReply {
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
