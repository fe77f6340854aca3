#![allow(clippy::unwrap_used)]

use async_std::net::TcpStream;
use futures::io::BufReader;
use rstest::rstest;

use hawser::{
    side::client::{Algorithms, Client},
    wire::{
        connect::{ChannelOpen, ChannelOpenConfirmation, ChannelOpenContext},
        trans::{Disconnect, DisconnectReason, ServiceAccept, ServiceRequest},
        userauth,
    },
    Error, Result, Session,
};

mod common;

#[rstest]
#[case("3des-cbc", "hmac-md5", "curve25519-sha256")]
#[case("aes128-cbc", "hmac-sha1", "curve25519-sha256")]
#[case("aes192-cbc", "hmac-sha2-256", "curve25519-sha256")]
#[case("aes256-cbc", "hmac-sha2-512", "curve25519-sha256")]
#[case("3des-cbc", "hmac-md5-etm@openssh.com", "curve25519-sha256")]
#[case("aes128-cbc", "hmac-sha1-etm@openssh.com", "curve25519-sha256")]
#[case("aes192-cbc", "hmac-sha2-256-etm@openssh.com", "curve25519-sha256")]
#[case("aes256-cbc", "hmac-sha2-512-etm@openssh.com", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-sha1", "curve25519-sha256")]
#[case("aes192-ctr", "hmac-sha2-256", "curve25519-sha256")]
#[case("aes256-ctr", "hmac-sha2-512", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-sha1-etm@openssh.com", "curve25519-sha256")]
#[case("aes192-ctr", "hmac-sha2-256-etm@openssh.com", "curve25519-sha256")]
#[case("aes256-ctr", "hmac-sha2-512-etm@openssh.com", "curve25519-sha256")]
#[case("aes128-ctr", "hmac-sha2-256", "curve25519-sha256@libssh.org")]
#[case("aes128-ctr", "hmac-sha2-256", "diffie-hellman-group14-sha256")]
#[case("aes128-ctr", "hmac-sha2-256", "diffie-hellman-group14-sha1")]
#[case("aes128-ctr", "hmac-sha1", "diffie-hellman-group1-sha1")]
#[case("aes128-ctr", "hmac-sha2-256", "diffie-hellman-group-exchange-sha256")]
#[case("aes128-ctr", "hmac-sha2-256", "diffie-hellman-group-exchange-sha1")]
#[async_std::test]
async fn end_to_end(
    #[case] cipher: &str,
    #[case] mac: &str,
    #[case] kex: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let (addr, handle) = common::server().await?;

    tracing::info!("cipher::{cipher}, mac::{mac}, kex::{kex}, bound to {addr}");

    let stream = BufReader::new(TcpStream::connect(addr).await?);
    let mut client = Session::new(
        stream,
        Client {
            algorithms: Algorithms {
                kexs: vec![kex.parse()?],
                ciphers: vec![cipher.parse()?],
                macs: vec![mac.parse()?],
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await?;

    client
        .send(&ServiceRequest {
            service_name: "ssh-userauth".into(),
        })
        .await?;
    client
        .recv()
        .await?
        .to::<ServiceAccept>()
        .expect("Service refused by peer");

    client
        .send(&userauth::Request {
            username: "user".into(),
            service_name: "ssh-connection".into(),
            method: userauth::Method::None,
        })
        .await?;
    client
        .recv()
        .await?
        .to::<userauth::Success>()
        .expect("Auth refused by peer");

    client
        .send(&ChannelOpen {
            sender_channel: 0,
            initial_window_size: 128,
            maximum_packet_size: 128,
            context: ChannelOpenContext::Session,
        })
        .await?;
    client
        .recv()
        .await?
        .to::<ChannelOpenConfirmation>()
        .expect("Channel open refused by peer");

    client
        .send(&Disconnect {
            reason: DisconnectReason::ByApplication,
            description: "bbbb".into(),
            language: Default::default(),
        })
        .await?;

    let message = handle.await;

    tracing::info!("message: {message:?}");

    assert!(matches!(message, Err(Error::Disconnected(_))));

    Ok(())
}

#[async_std::test]
async fn no_common_algorithm_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let (addr, _handle) = common::server().await?;

    let stream = BufReader::new(TcpStream::connect(addr).await?);
    let client = Session::new(
        stream,
        Client {
            algorithms: Algorithms {
                macs: vec!["none".parse().unwrap()],
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .await;

    // The `Session` sets up lazily, the negotiation failure surfaces on the
    // first exchange a packet is involved in.
    let result = match client {
        Ok(mut client) => client.recv().await.map(|_| ()),
        Err(err) => Err(err),
    };

    assert!(matches!(result, Err(Error::NoCommonHmac)));

    Ok(())
}
