//! Authentication _handling_ mechanics, the server side of the service.

use hawser::{
    service::Handler,
    side::Side,
    wire::{
        exchange::{decode_signature, PublickeySignature},
        trans::DisconnectReason,
        userauth,
    },
    Error, Pipe, Result, Session,
};
use ssh_key::PublicKey;

use crate::methods::Methods;

pub mod none;
pub mod password;
pub mod publickey;

/// Authentication attempts tolerated on one session before disconnecting.
const MAX_ATTEMPTS: usize = 20;

/// A response to an authentication request.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    /// _Accept_ the authentication request.
    Accept,

    /// _Reject_ the authentication request.
    Reject,
}

/// The authentication service [`Handler`] for sessions.
#[derive(Debug)]
pub struct Auth<H, N = (), P = (), PK = ()> {
    banner: Option<String>,
    methods: Methods,

    handler: H,

    none: N,
    password: P,
    publickey: PK,
}

impl<H> Auth<H>
where
    H: Handler,
{
    /// Create an [`Auth`] handler, rejecting all authentication by default.
    pub fn new(service: H) -> Self {
        Self {
            banner: None,
            methods: Default::default(),

            handler: service,

            none: (),
            password: (),
            publickey: (),
        }
    }
}

impl<H, N, P, PK> Auth<H, N, P, PK>
where
    H: Handler,
    N: none::None,
    P: password::Password,
    PK: publickey::Publickey,
{
    /// Set the authentication banner text displayed upon authentication.
    pub fn banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());

        self
    }

    /// Set the authentication handler for the `none` method.
    pub fn none(self, none: impl none::None) -> Auth<H, impl none::None, P, PK> {
        let Self {
            banner,
            methods,
            handler,
            none: _,
            password,
            publickey,
        } = self;

        Auth {
            banner,
            methods: methods | Methods::NONE,
            handler,
            none,
            password,
            publickey,
        }
    }

    /// Set the authentication handler for the `password` method.
    pub fn password(
        self,
        password: impl password::Password,
    ) -> Auth<H, N, impl password::Password, PK> {
        let Self {
            banner,
            methods,
            handler,
            none,
            password: _,
            publickey,
        } = self;

        Auth {
            banner,
            methods: methods | Methods::PASSWORD,
            handler,
            none,
            password,
            publickey,
        }
    }

    /// Set the authentication handler for the `publickey` method.
    pub fn publickey(
        self,
        publickey: impl publickey::Publickey,
    ) -> Auth<H, N, P, impl publickey::Publickey> {
        let Self {
            banner,
            methods,
            handler,
            none,
            password,
            publickey: _,
        } = self;

        Auth {
            banner,
            methods: methods | Methods::PUBLICKEY,
            handler,
            none,
            password,
            publickey,
        }
    }

    async fn failure<IO: Pipe, S: Side>(&mut self, session: &mut Session<IO, S>) -> Result<()> {
        session
            .send(&userauth::Failure {
                continue_with: self.methods.to_name_list(),
                partial_success: false,
            })
            .await
    }
}

impl<H, N, P, PK> Handler for Auth<H, N, P, PK>
where
    H: Handler,
    N: none::None,
    P: password::Password,
    PK: publickey::Publickey,
{
    type Err = H::Err;
    type Ok<'s, IO: Pipe + 's, S: Side + 's> = H::Ok<'s, IO, S>;

    const SERVICE_NAME: &'static str = crate::SERVICE_NAME;

    async fn on_request<'s, IO, S>(
        &mut self,
        session: &'s mut Session<IO, S>,
    ) -> Result<Self::Ok<'s, IO, S>, Self::Err>
    where
        IO: Pipe,
        S: Side,
    {
        if let Some(banner) = self.banner.take() {
            session
                .send(&userauth::Banner {
                    message: banner.as_str().into(),
                    language: Default::default(),
                })
                .await?;
        }

        for _ in 0..MAX_ATTEMPTS {
            let packet = session.recv().await?;

            let Ok(userauth::Request {
                username,
                service_name,
                method,
            }) = packet.to()
            else {
                session
                    .disconnect(
                        DisconnectReason::ProtocolError,
                        "Unexpected message in the context of the `ssh-userauth` service",
                    )
                    .await?;

                return Err(Error::UnexpectedMessage.into());
            };
            let username = username.into_string();

            let accepted = match method {
                userauth::Method::None => self.none.process(username) == Response::Accept,
                userauth::Method::Password { password, .. } => {
                    self.password.process(username, password.into_string()) == Response::Accept
                }
                userauth::Method::Publickey {
                    algorithm,
                    blob,
                    signature,
                } => {
                    let key = PublicKey::from_bytes(&blob).map_err(Error::from)?;

                    match signature {
                        None => {
                            // A probe: tell whether the key would be
                            // acceptable, no authentication happens yet.
                            if self.publickey.process(username, &key) == Response::Accept {
                                session
                                    .send(&userauth::PkOk { algorithm, blob })
                                    .await?;

                                continue;
                            }

                            false
                        }
                        Some(signature) => {
                            let verified = decode_signature(&signature)
                                .and_then(|signature| {
                                    PublickeySignature {
                                        session_id: &session.session_id().unwrap_or_default(),
                                        username: &username,
                                        service_name: &service_name,
                                        algorithm: &algorithm,
                                        blob: &blob,
                                    }
                                    .verify(&key, &signature)
                                })
                                .is_ok();

                            verified && self.publickey.process(username, &key) == Response::Accept
                        }
                    }
                }
                _ => false,
            };

            if accepted {
                session.send(&userauth::Success::default()).await?;

                // Activates the delayed compression algorithms.
                session.set_authenticated();

                return self.handler.on_request(session).await;
            }

            self.failure(session).await?;
        }

        session
            .disconnect(
                DisconnectReason::NoMoreAuthMethodsAvailable,
                "Too many failed authentication attempts",
            )
            .await?;

        Err(Error::AllMethodsExhausted.into())
    }
}
