#![allow(clippy::unwrap_used)]

use async_compat::CompatExt;
use rand::{Rng, SeedableRng};
use sha1::Digest;
use ssh_key::{Algorithm, PrivateKey};
use tokio::io::BufStream;

use futures::{AsyncReadExt, AsyncWriteExt};

use hawser::{
    side::{client::Client, server::Server},
    wire::connect as wire,
    Session,
};
use hawser_connect::{
    channel::{Channel, RequestResponse},
    channel_open,
    connect::{ChannelOpenContext, ChannelRequestContext, GlobalRequestContext},
    global_request, Service,
};

const DUPLEX_SIZE: usize = 0x40000 * 16;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn server_config() -> Server {
    Server {
        keys: vec![PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519).unwrap()],
        ..Default::default()
    }
}

/// Run `clientside` and `serverside` against each other over an in-memory
/// duplex, with a running multiplexer on both sides.
async fn io<SFut, CFut>(
    serverside: impl Fn(Channel) -> SFut + Send + Sync + 'static,
    clientside: impl FnOnce(Channel) -> CFut,
) -> Result<(), eyre::Error>
where
    SFut: futures::Future<Output = ()> + Send + 'static,
    CFut: futures::Future<Output = ()>,
{
    let duplex = tokio::io::duplex(DUPLEX_SIZE);

    let server = tokio::spawn(async move {
        let mut session =
            Session::new(BufStream::new(duplex.0).compat(), server_config()).await?;

        let connect = session.handle(Service).await?;

        let _ = connect
            .run(|_, channel: Channel| {
                tokio::spawn(serverside(channel));

                channel_open::Outcome::Accept
            })
            .await;

        Ok::<_, eyre::Error>(())
    });

    let mut session = Session::new(BufStream::new(duplex.1).compat(), Client::default()).await?;

    let mut connect = session.request(Service).await?;
    let channel_open::ChannelOpen::Accepted(channel) =
        connect.channel_open(ChannelOpenContext::Session).await?
    else {
        panic!("Channel opening rejected server-side")
    };

    tokio::select! {
        res = connect.run(|_, _| channel_open::Outcome::Reject {
            reason: Default::default(),
            message: "not accepting channels".into(),
        }) => panic!("The multiplexer ended unexpectedly: {res:?}"),
        () = clientside(channel) => {}
    }

    server.abort();

    Ok(())
}

#[tokio::test]
async fn short() -> Result<(), eyre::Error> {
    init_tracing();

    io(
        |channel| async move {
            futures::io::copy(&mut channel.as_reader(), &mut channel.as_writer())
                .await
                .unwrap();

            channel.eof().await.unwrap();
        },
        |channel| async move {
            let mut rng = rand::rngs::StdRng::from_entropy();
            let (mut local, mut recvd) = (sha1::Sha1::new(), sha1::Sha1::new());

            tokio::join!(
                async {
                    let buffer = rng.gen::<[u8; 256]>();
                    local.update(buffer);

                    futures::io::copy(&mut &buffer[..], &mut channel.as_writer())
                        .await
                        .unwrap();

                    channel.as_writer().close().await.unwrap();
                },
                async {
                    futures::io::copy(
                        &mut channel.as_reader(),
                        &mut futures::io::AllowStdIo::new(&mut recvd),
                    )
                    .await
                    .unwrap();
                }
            );

            assert_eq!(local.finalize(), recvd.finalize())
        },
    )
    .await
}

#[tokio::test]
async fn bulk() -> Result<(), eyre::Error> {
    init_tracing();

    io(
        |channel| async move {
            futures::io::copy(&mut channel.as_reader(), &mut channel.as_writer())
                .await
                .unwrap();

            channel.eof().await.unwrap();
        },
        |channel| async move {
            let mut rng = rand::rngs::StdRng::from_entropy();

            // Larger than both the maximum packet size and the window, so
            // the transfer has to split and wait on window adjusts.
            let mut buffer = vec![0u8; 3 * 1024 * 1024];
            rng.fill(&mut buffer[..]);

            let (_, received) = tokio::join!(
                async {
                    futures::io::copy(&mut &buffer[..], &mut channel.as_writer())
                        .await
                        .unwrap();

                    channel.as_writer().close().await.unwrap();
                },
                async {
                    let mut received = Vec::new();
                    channel
                        .as_reader()
                        .read_to_end(&mut received)
                        .await
                        .unwrap();

                    received
                }
            );

            assert_eq!(buffer, received);
        },
    )
    .await
}

/// The full client journey: password authentication, a `session` channel,
/// `exec "echo 12345"`, its output and exit status.
#[tokio::test]
async fn exec_roundtrip() -> Result<(), eyre::Error> {
    init_tracing();

    let duplex = tokio::io::duplex(DUPLEX_SIZE);

    let server = tokio::spawn(async move {
        let mut session =
            Session::new(BufStream::new(duplex.0).compat(), server_config()).await?;

        let connect = session
            .handle(
                hawser_auth::handler::Auth::new(Service).password(
                    |user: String, password: String| {
                        if user == "user" && password == "secret" {
                            hawser_auth::handler::Response::Accept
                        } else {
                            hawser_auth::handler::Response::Reject
                        }
                    },
                ),
            )
            .await?;

        let _ = connect
            .run(|context, channel: Channel| {
                assert!(matches!(context, ChannelOpenContext::Session));

                tokio::spawn(async move {
                    channel
                        .on_request(|context| {
                            assert!(matches!(
                                context,
                                ChannelRequestContext::Exec { ref command } if &**command == "echo 12345"
                            ));

                            RequestResponse::Success
                        })
                        .await
                        .unwrap();

                    channel.as_writer().write_all(b"12345\n").await.unwrap();
                    channel.eof().await.unwrap();

                    channel
                        .notify(ChannelRequestContext::ExitStatus { code: 0 })
                        .await
                        .unwrap();

                    channel.close().await.unwrap();
                });

                channel_open::Outcome::Accept
            })
            .await;

        Ok::<_, eyre::Error>(())
    });

    let client = Client {
        algorithms: hawser::side::client::Algorithms {
            kexs: vec!["diffie-hellman-group14-sha1".parse().unwrap()],
            ciphers: vec!["aes128-ctr".parse().unwrap()],
            macs: vec!["hmac-sha2-256".parse().unwrap()],
            ..Default::default()
        },
        ..Default::default()
    };

    let mut session = Session::new(BufStream::new(duplex.1).compat(), client).await?;

    let mut connect = session
        .request(hawser_auth::request::Auth::new("user", Service).password("secret"))
        .await?;

    let channel_open::ChannelOpen::Accepted(channel) =
        connect.channel_open(ChannelOpenContext::Session).await?
    else {
        panic!("Channel opening rejected server-side")
    };

    tokio::select! {
        res = connect.run(|_, _| channel_open::Outcome::Reject {
            reason: Default::default(),
            message: "not accepting channels".into(),
        }) => panic!("The multiplexer ended unexpectedly: {res:?}"),
        () = async {
            let response = channel
                .request(ChannelRequestContext::Exec {
                    command: "echo 12345".into(),
                })
                .await
                .unwrap();
            assert_eq!(response, RequestResponse::Success);

            let mut output = String::new();
            channel
                .as_reader()
                .read_to_string(&mut output)
                .await
                .unwrap();
            assert_eq!(output, "12345\n");

            channel
                .on_request(|context| {
                    assert!(matches!(
                        context,
                        ChannelRequestContext::ExitStatus { code: 0 }
                    ));

                    RequestResponse::Success
                })
                .await
                .unwrap();
        } => {}
    }

    server.abort();

    Ok(())
}

/// A channel initiated by the peer, as `forwarded-tcpip` channels are.
#[tokio::test]
async fn peer_initiated_channel() -> Result<(), eyre::Error> {
    init_tracing();

    let duplex = tokio::io::duplex(DUPLEX_SIZE);

    let server = tokio::spawn(async move {
        let mut session =
            Session::new(BufStream::new(duplex.0).compat(), server_config()).await?;

        let mut connect = session.handle(Service).await?;

        let channel_open::ChannelOpen::Accepted(channel) = connect
            .channel_open(ChannelOpenContext::ForwardedTcpip {
                address_connected: "0.0.0.0".into(),
                port_connected: 2222,
                originator_address: "10.0.0.1".into(),
                originator_port: 51515,
            })
            .await?
        else {
            panic!("Channel opening rejected client-side")
        };

        tokio::spawn(async move {
            channel
                .as_writer()
                .write_all(b"forwarded bytes")
                .await
                .unwrap();
            channel.eof().await.unwrap();
        });

        // Keep the multiplexer spinning until the test tears us down.
        let _ = connect
            .run(|_, _| channel_open::Outcome::Reject {
                reason: Default::default(),
                message: "not accepting channels".into(),
            })
            .await;

        Ok::<_, eyre::Error>(())
    });

    let mut session = Session::new(BufStream::new(duplex.1).compat(), Client::default()).await?;

    let connect = session.request(Service).await?;

    let (sender, receiver) = flume::bounded(1);
    tokio::select! {
        res = connect.run(move |context, channel: Channel| {
            assert!(matches!(context, ChannelOpenContext::ForwardedTcpip { .. }));

            sender.send(channel).unwrap();

            channel_open::Outcome::Accept
        }) => panic!("The multiplexer ended unexpectedly: {res:?}"),
        () = async {
            let channel = receiver.recv_async().await.unwrap();

            let mut received = String::new();
            channel.as_reader().read_to_string(&mut received).await.unwrap();

            assert_eq!(received, "forwarded bytes");
        } => {}
    }

    server.abort();

    Ok(())
}

#[tokio::test]
async fn global_requests() -> Result<(), eyre::Error> {
    init_tracing();

    let duplex = tokio::io::duplex(DUPLEX_SIZE);

    let server = tokio::spawn(async move {
        let mut session =
            Session::new(BufStream::new(duplex.0).compat(), server_config()).await?;

        let connect = session
            .handle(Service)
            .await?
            .on_global_request(|context| match context {
                GlobalRequestContext::TcpipForward { bind_port: 0, .. } => {
                    global_request::Outcome::AcceptPort(42424)
                }
                GlobalRequestContext::TcpipForward { .. } => global_request::Outcome::Accept,
                _ => global_request::Outcome::Reject,
            });

        let _ = connect
            .run(|_, _| channel_open::Outcome::Reject {
                reason: Default::default(),
                message: "not accepting channels".into(),
            })
            .await;

        Ok::<_, eyre::Error>(())
    });

    let mut session = Session::new(BufStream::new(duplex.1).compat(), Client::default()).await?;

    let mut connect = session.request(Service).await?;

    assert_eq!(
        connect
            .global_request(GlobalRequestContext::TcpipForward {
                bind_address: "localhost".into(),
                bind_port: 0,
            })
            .await?,
        global_request::GlobalRequest::AcceptedPort(42424),
    );

    assert_eq!(
        connect
            .global_request(GlobalRequestContext::TcpipForward {
                bind_address: "localhost".into(),
                bind_port: 8080,
            })
            .await?,
        global_request::GlobalRequest::Accepted,
    );

    assert_eq!(
        connect
            .global_request(GlobalRequestContext::CancelTcpipForward {
                bind_address: "localhost".into(),
                bind_port: 8080,
            })
            .await?,
        global_request::GlobalRequest::Rejected,
    );

    server.abort();

    Ok(())
}

/// Writers have to respect the advertised window and resume on adjusts.
#[tokio::test]
async fn window_is_respected() -> Result<(), eyre::Error> {
    init_tracing();

    let duplex = tokio::io::duplex(DUPLEX_SIZE);

    // A scripted peer advertising a tiny window of 8 bytes with a maximum
    // packet size of 4, adjusting by 2 once the window is exhausted.
    let server = tokio::spawn(async move {
        let mut session =
            Session::new(BufStream::new(duplex.0).compat(), server_config()).await?;

        let request = session
            .recv()
            .await?
            .to::<hawser::wire::trans::ServiceRequest>()?;
        session
            .send(&hawser::wire::trans::ServiceAccept {
                service_name: request.service_name,
            })
            .await?;

        let open = session.recv().await?.to::<wire::ChannelOpen>()?;
        session
            .send(&wire::ChannelOpenConfirmation {
                recipient_channel: open.sender_channel,
                sender_channel: 0,
                initial_window_size: 8,
                maximum_packet_size: 4,
            })
            .await?;

        // The whole window, split to the maximum packet size.
        let data = session.recv().await?.to::<wire::ChannelData>()?;
        assert_eq!(&*data.data, b"aaaa");
        let data = session.recv().await?.to::<wire::ChannelData>()?;
        assert_eq!(&*data.data, b"bbcc");

        // Refresh the keys mid-channel: the data flow has to continue
        // uninterrupted on the new transport.
        session.rekey().await?;

        // The writer is now stalled on the exhausted window.
        session
            .send(&wire::ChannelWindowAdjust {
                recipient_channel: open.sender_channel,
                bytes_to_add: 2,
            })
            .await?;

        let data = session.recv().await?.to::<wire::ChannelData>()?;
        assert_eq!(&*data.data, b"dd");

        // Let the writer see the delivery through before tearing down.
        session
            .send(&wire::ChannelEof {
                recipient_channel: open.sender_channel,
            })
            .await?;

        Ok::<_, eyre::Error>(())
    });

    let mut session = Session::new(BufStream::new(duplex.1).compat(), Client::default()).await?;

    let mut connect = session.request(Service).await?;
    let channel_open::ChannelOpen::Accepted(channel) =
        connect.channel_open(ChannelOpenContext::Session).await?
    else {
        panic!("Channel opening rejected server-side")
    };

    tokio::select! {
        res = connect.run(|_, _| channel_open::Outcome::Reject {
            reason: Default::default(),
            message: "not accepting channels".into(),
        }) => panic!("The multiplexer ended unexpectedly: {res:?}"),
        () = async {
            let mut writer = channel.as_writer();
            writer.write_all(b"aaaabbccdd").await.unwrap();

            // The peer acknowledges the transfer with its end-of-file.
            let mut rest = Vec::new();
            channel.as_reader().read_to_end(&mut rest).await.unwrap();
            assert!(rest.is_empty());
        } => {}
    }

    server.await??;

    Ok(())
}
