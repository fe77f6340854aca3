#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;

use async_std::net::{TcpListener, TcpStream};
use async_std::stream::StreamExt;
use futures::io::BufReader;

use hawser::{
    service,
    side::{client::Client, server::Server, Side},
    wire::userauth,
    Error, Pipe, Result, Session,
};
use hawser_auth::{handler, request};

/// A terminal service standing in for `ssh-connection` in these tests.
struct Done;

impl service::Request for Done {
    type Err = Error;
    type Ok<'s, IO: Pipe + 's, S: Side + 's> = ();

    const SERVICE_NAME: &'static str = "ssh-connection";

    async fn on_accept<'s, IO, S>(
        &mut self,
        _session: &'s mut Session<IO, S>,
    ) -> Result<Self::Ok<'s, IO, S>, Self::Err>
    where
        IO: Pipe,
        S: Side,
    {
        Ok(())
    }
}

impl service::Handler for Done {
    type Err = Error;
    type Ok<'s, IO: Pipe + 's, S: Side + 's> = ();

    const SERVICE_NAME: &'static str = "ssh-connection";

    async fn on_request<'s, IO, S>(
        &mut self,
        _session: &'s mut Session<IO, S>,
    ) -> Result<Self::Ok<'s, IO, S>, Self::Err>
    where
        IO: Pipe,
        S: Side,
    {
        Ok(())
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn server_key() -> ssh_key::PrivateKey {
    ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519).unwrap()
}

async fn bind() -> Result<(SocketAddr, TcpListener)> {
    let socket = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = socket.local_addr()?;

    Ok((addr, socket))
}

async fn connect(addr: SocketAddr) -> Result<Session<BufReader<TcpStream>, Client>> {
    let stream = BufReader::new(TcpStream::connect(addr).await?);

    Session::new(stream, Client::default()).await
}

async fn serve(socket: TcpListener) -> Result<Session<BufReader<TcpStream>, Server>> {
    let stream = BufReader::new(socket.incoming().next().await.unwrap()?);

    let config = Server {
        keys: vec![server_key()],
        ..Default::default()
    };

    Session::new(stream, config).await
}

#[async_std::test]
async fn password_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (addr, socket) = bind().await?;

    let server = async_std::task::spawn_local(async move {
        let mut session = serve(socket).await?;

        session
            .handle(
                handler::Auth::new(Done)
                    .banner("welcome aboard\r\n")
                    .password(|user: String, password: String| {
                        if user == "user" && password == "secret" {
                            handler::Response::Accept
                        } else {
                            handler::Response::Reject
                        }
                    }),
            )
            .await
    });

    let mut session = connect(addr).await?;
    session
        .request(request::Auth::new("user", Done).password("secret"))
        .await?;

    server.await?;

    Ok(())
}

#[async_std::test]
async fn wrong_password_exhausts_methods() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (addr, socket) = bind().await?;

    let _server = async_std::task::spawn_local(async move {
        let mut session = serve(socket).await?;

        session
            .handle(
                handler::Auth::new(Done).password(|_, _| handler::Response::Reject),
            )
            .await
    });

    let mut session = connect(addr).await?;
    let result = session
        .request(request::Auth::new("user", Done).password("wrong"))
        .await;

    assert!(matches!(result, Err(Error::AllMethodsExhausted)));

    Ok(())
}

#[async_std::test]
async fn publickey_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (addr, socket) = bind().await?;

    let key = ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519)?;
    let public = key.public_key().clone();

    let server = async_std::task::spawn_local(async move {
        let mut session = serve(socket).await?;

        session
            .handle(handler::Auth::new(Done).publickey(
                move |user: String, presented: &ssh_key::PublicKey| {
                    if user == "user" && *presented == public {
                        handler::Response::Accept
                    } else {
                        handler::Response::Reject
                    }
                },
            ))
            .await
    });

    let mut session = connect(addr).await?;
    session
        .request(request::Auth::new("user", Done).publickey(key))
        .await?;

    server.await?;

    Ok(())
}

#[async_std::test]
async fn partial_success_chains_methods() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (addr, socket) = bind().await?;

    let key = ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519)?;

    let server = async_std::task::spawn_local(async move {
        let mut session = serve(socket).await?;

        let request = session
            .recv()
            .await?
            .to::<hawser::wire::trans::ServiceRequest>()?;
        session
            .send(&hawser::wire::trans::ServiceAccept {
                service_name: request.service_name,
            })
            .await?;

        // `none` probe from the requester.
        let request = session.recv().await?.to::<userauth::Request>()?;
        assert!(matches!(request.method, userauth::Method::None));
        session
            .send(&userauth::Failure {
                continue_with: ["password"].into_iter().collect(),
                partial_success: false,
            })
            .await?;

        // The password is right, but another factor is still required.
        let request = session.recv().await?.to::<userauth::Request>()?;
        assert!(matches!(
            request.method,
            userauth::Method::Password { .. }
        ));
        session
            .send(&userauth::Failure {
                continue_with: ["publickey"].into_iter().collect(),
                partial_success: true,
            })
            .await?;

        // The publickey probe, then the signed request.
        let request = session.recv().await?.to::<userauth::Request>()?;
        let userauth::Method::Publickey {
            algorithm,
            blob,
            signature: None,
        } = request.method
        else {
            panic!("Expected a publickey probe")
        };
        session.send(&userauth::PkOk { algorithm, blob }).await?;

        let request = session.recv().await?.to::<userauth::Request>()?;
        assert!(matches!(
            request.method,
            userauth::Method::Publickey {
                signature: Some(_),
                ..
            }
        ));
        session.send(&userauth::Success::default()).await?;

        Ok::<_, Error>(())
    });

    let mut session = connect(addr).await?;
    session
        .request(
            request::Auth::new("user", Done)
                .password("hunter2")
                .publickey(key),
        )
        .await?;

    server.await?;

    Ok(())
}

#[async_std::test]
async fn keyboard_interactive_rounds() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (addr, socket) = bind().await?;

    let server = async_std::task::spawn_local(async move {
        let mut session = serve(socket).await?;

        let request = session
            .recv()
            .await?
            .to::<hawser::wire::trans::ServiceRequest>()?;
        session
            .send(&hawser::wire::trans::ServiceAccept {
                service_name: request.service_name,
            })
            .await?;

        let request = session.recv().await?.to::<userauth::Request>()?;
        assert!(matches!(request.method, userauth::Method::None));
        session
            .send(&userauth::Failure {
                continue_with: ["keyboard-interactive"].into_iter().collect(),
                partial_success: false,
            })
            .await?;

        let request = session.recv().await?.to::<userauth::Request>()?;
        assert!(matches!(
            request.method,
            userauth::Method::KeyboardInteractive { .. }
        ));

        // Two rounds of prompts, then success.
        session
            .send(&userauth::InfoRequest {
                name: "first".into(),
                instruction: "".into(),
                language: Default::default(),
                prompts: vec![
                    userauth::Prompt {
                        prompt: "Password: ".into(),
                        echo: false,
                    },
                    userauth::Prompt {
                        prompt: "Token: ".into(),
                        echo: true,
                    },
                ],
            })
            .await?;

        let response = session.recv().await?.to::<userauth::InfoResponse>()?;
        assert_eq!(
            response
                .responses
                .iter()
                .map(|response| response.to_string())
                .collect::<Vec<_>>(),
            ["hunter2", "123456"]
        );

        session
            .send(&userauth::InfoRequest {
                name: "second".into(),
                instruction: "no questions this round".into(),
                language: Default::default(),
                prompts: Vec::new(),
            })
            .await?;

        let response = session.recv().await?.to::<userauth::InfoResponse>()?;
        assert!(response.responses.is_empty());

        session.send(&userauth::Success::default()).await?;

        Ok::<_, Error>(())
    });

    let mut session = connect(addr).await?;
    session
        .request(request::Auth::new("user", Done).keyboard_interactive(
            |_: &str, _: &str, prompts: &[userauth::Prompt]| {
                prompts
                    .iter()
                    .map(|prompt| {
                        if prompt.echo {
                            "123456".to_owned()
                        } else {
                            "hunter2".to_owned()
                        }
                    })
                    .collect()
            },
        ))
        .await?;

    server.await?;

    Ok(())
}
