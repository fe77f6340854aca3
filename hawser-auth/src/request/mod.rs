//! Authentication _request_ mechanics, the client side of the service.

use hashbrown::HashSet;

use hawser::{
    service::Request,
    side::Side,
    wire::{
        arch::NameList,
        exchange::{encode_signature, HostbasedSignature, PublickeySignature},
        trans::DisconnectReason,
        userauth, Packet,
    },
    Error, Pipe, Result, Session,
};

mod method;
use method::Method;

#[doc(no_inline)]
pub use ssh_key::PrivateKey;

/// The responder to the prompt rounds of the `keyboard-interactive` method.
///
/// A round's reply must hold exactly one response per prompt: shorter
/// replies are padded with empty strings, longer ones are truncated.
pub trait Prompter: Send {
    /// Produce the responses to one round of prompts, in prompt order.
    fn respond(
        &mut self,
        name: &str,
        instruction: &str,
        prompts: &[userauth::Prompt],
    ) -> Vec<String>;
}

impl<T> Prompter for T
where
    T: FnMut(&str, &str, &[userauth::Prompt]) -> Vec<String> + Send,
{
    fn respond(
        &mut self,
        name: &str,
        instruction: &str,
        prompts: &[userauth::Prompt],
    ) -> Vec<String> {
        (self)(name, instruction, prompts)
    }
}

/// The authentication service [`Request`] for sessions.
///
/// # Note
/// 1. The requester always starts with the `none` authentication method
///    to discover the methods available on the server.
/// 2. While the `publickey` method allows for multiple keys, the other
///    methods only keep the last configuration provided to their builder.
/// 3. A method is attempted at most once: on a partial success the server
///    reported for it, another configured method has to take over.
#[derive(Debug)]
pub struct Auth<R> {
    username: String,
    service: R,

    methods: HashSet<Method>,
}

impl<R: Request> Auth<R> {
    /// Create an [`Auth`] requester for the provided _username_, to access
    /// the provided _service_.
    pub fn new(username: impl Into<String>, service: R) -> Self {
        Self {
            username: username.into(),
            service,

            methods: Default::default(),
        }
    }

    /// Attempt to authenticate with the `password` method.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.methods.replace(Method::Password {
            password: password.into(),
        });

        self
    }

    /// Attempt to authenticate with the `publickey` method.
    pub fn publickey(mut self, key: impl Into<PrivateKey>) -> Self {
        self.methods.replace(Method::Publickey {
            key: Box::new(key.into()),
        });

        self
    }

    /// Attempt to authenticate with the `keyboard-interactive` method.
    pub fn keyboard_interactive(mut self, prompter: impl Prompter + 'static) -> Self {
        self.methods.replace(Method::KeyboardInteractive {
            prompter: Box::new(prompter),
        });

        self
    }

    /// Attempt to authenticate with the `hostbased` method.
    pub fn hostbased(
        mut self,
        key: impl Into<PrivateKey>,
        host_name: impl Into<String>,
        host_username: impl Into<String>,
    ) -> Self {
        self.methods.replace(Method::Hostbased {
            key: Box::new(key.into()),
            host_name: host_name.into(),
            host_username: host_username.into(),
        });

        self
    }

    fn next_method(&mut self, continue_with: &NameList) -> Option<Method> {
        self.methods
            .extract_if(|method| continue_with.contains(method.name()))
            .next()
    }

    /// Receive the response to an authentication request, surfacing the
    /// banners a server may send mid-flight.
    async fn response<IO: Pipe, S: Side>(
        &mut self,
        session: &mut Session<IO, S>,
    ) -> Result<Packet> {
        loop {
            let packet = session.recv().await?;

            if let Ok(userauth::Banner { message, .. }) = packet.to() {
                tracing::info!("Authentication banner from the peer: {}", &*message);
            } else {
                break Ok(packet);
            }
        }
    }

    async fn attempt_method<IO: Pipe, S: Side>(
        &mut self,
        session: &mut Session<IO, S>,
        method: &mut Method,
    ) -> Result<Packet> {
        let username = self.username.clone();
        let build = |method| userauth::Request {
            username: username.as_str().into(),
            service_name: R::SERVICE_NAME.into(),
            method,
        };

        match method {
            Method::None => {
                session.send(&build(userauth::Method::None)).await?;

                self.response(session).await
            }
            Method::Publickey { key } => {
                let algorithm = key.algorithm();
                let blob = key.public_key().to_bytes()?;

                // Probe the server to know if the key is acceptable at all
                // before engaging in the expensive signature.
                session
                    .send(&build(userauth::Method::Publickey {
                        algorithm: algorithm.as_str().into(),
                        blob: blob.as_slice().into(),
                        signature: None,
                    }))
                    .await?;

                let response = self.response(session).await?;
                if let Ok(userauth::PkOk { algorithm, blob }) = response.to() {
                    let signature = PublickeySignature {
                        session_id: &session.session_id().unwrap_or_default(),
                        username: &username,
                        service_name: R::SERVICE_NAME,
                        algorithm: &algorithm,
                        blob: &blob,
                    }
                    .sign(key)?;

                    session
                        .send(&build(userauth::Method::Publickey {
                            algorithm,
                            blob,
                            signature: Some(encode_signature(&signature).into()),
                        }))
                        .await?;

                    self.response(session).await
                } else {
                    Ok(response)
                }
            }
            Method::Password { password } => {
                session
                    .send(&build(userauth::Method::Password {
                        password: password.as_str().into(),
                        new: None,
                    }))
                    .await?;

                let response = self.response(session).await?;
                if response.to::<userauth::PasswdChangereq>().is_ok() {
                    Err(Error::PasswordChangeRequired)
                } else {
                    Ok(response)
                }
            }
            Method::KeyboardInteractive { prompter } => {
                session
                    .send(&build(userauth::Method::KeyboardInteractive {
                        language: Default::default(),
                        submethods: Default::default(),
                    }))
                    .await?;

                loop {
                    let response = self.response(session).await?;

                    let Ok(userauth::InfoRequest {
                        name,
                        instruction,
                        prompts,
                        ..
                    }) = response.to()
                    else {
                        break Ok(response);
                    };

                    let mut responses = prompter.respond(&name, &instruction, &prompts);
                    if responses.len() != prompts.len() {
                        tracing::warn!(
                            "Prompter produced {} responses to {} prompts",
                            responses.len(),
                            prompts.len()
                        );

                        responses.resize(prompts.len(), String::new());
                    }

                    session
                        .send(&userauth::InfoResponse {
                            responses: responses.into_iter().map(Into::into).collect(),
                        })
                        .await?;
                }
            }
            Method::Hostbased {
                key,
                host_name,
                host_username,
            } => {
                let algorithm = key.algorithm();
                let blob = key.public_key().to_bytes()?;

                let signature = HostbasedSignature {
                    session_id: &session.session_id().unwrap_or_default(),
                    username: &username,
                    service_name: R::SERVICE_NAME,
                    algorithm: algorithm.as_str(),
                    host_key: &blob,
                    host_name,
                    host_username,
                }
                .sign(key)?;

                session
                    .send(&build(userauth::Method::Hostbased {
                        algorithm: algorithm.as_str().into(),
                        host_key: blob.as_slice().into(),
                        host_name: host_name.as_str().into(),
                        host_username: host_username.as_str().into(),
                        signature: encode_signature(&signature).into(),
                    }))
                    .await?;

                self.response(session).await
            }
        }
    }
}

impl<R: Request> Request for Auth<R> {
    type Err = R::Err;
    type Ok<'s, IO: Pipe + 's, S: Side + 's> = R::Ok<'s, IO, S>;

    const SERVICE_NAME: &'static str = crate::SERVICE_NAME;

    async fn on_accept<'s, IO, S>(
        &mut self,
        session: &'s mut Session<IO, S>,
    ) -> Result<Self::Ok<'s, IO, S>, Self::Err>
    where
        IO: Pipe,
        S: Side,
    {
        let mut method = Method::None;

        loop {
            let response = self.attempt_method(session, &mut method).await?;

            if response.to::<userauth::Success>().is_ok() {
                tracing::debug!("Authentication success with the `{method:?}` method");

                // Activates the delayed compression algorithms.
                session.set_authenticated();

                break self.service.on_accept(session).await;
            } else if let Ok(userauth::Failure {
                continue_with,
                partial_success,
            }) = response.to()
            {
                if partial_success {
                    tracing::debug!(
                        "Partial success with the `{method:?}` method, continuing with another"
                    );
                }

                if let Some(next) = self.next_method(&continue_with) {
                    method = next;
                } else {
                    // The transport remains intact: the caller may retry
                    // the authentication with other credentials.
                    break Err(Error::AllMethodsExhausted.into());
                }
            } else {
                session
                    .disconnect(
                        DisconnectReason::ProtocolError,
                        format!(
                            "Unexpected message in the context of the `{}` service request",
                            Self::SERVICE_NAME
                        ),
                    )
                    .await?;

                break Err(Error::UnexpectedMessage.into());
            }
        }
    }
}
