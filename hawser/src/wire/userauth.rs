//! Messages of the **[`SSH-USERAUTH`]** protocol layer ([RFC 4252]).
//!
//! Message number 60 is assigned to `SSH_MSG_USERAUTH_PK_OK`,
//! `SSH_MSG_USERAUTH_PASSWD_CHANGEREQ` **and**
//! `SSH_MSG_USERAUTH_INFO_REQUEST` at once: the assignments are scoped to the
//! authentication method in flight, so the decode target is picked by the
//! caller from the method it last attempted.
//!
//! [RFC 4252]: https://datatracker.ietf.org/doc/html/rfc4252

use super::{
    arch::{encode_bytes, Ascii, Bytes, NameList, Utf8},
    message, Cursor, Decode, Encode, Error, Message,
};

/// The authentication methods carried by an [`Request`] message.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    /// The `none` authentication method.
    None,

    /// The `publickey` authentication method, with an optional signature:
    /// absent to merely probe whether the key would be acceptable.
    Publickey {
        /// Public key algorithm name.
        algorithm: Ascii,

        /// Public key blob.
        blob: Bytes,

        /// The signature over the session identifier and request.
        signature: Option<Bytes>,
    },

    /// The `password` authentication method, with an optional new password
    /// in response to a password-change request.
    Password {
        /// The current password.
        password: Utf8,

        /// The new password, when responding to a change request.
        new: Option<Utf8>,
    },

    /// The `hostbased` authentication method.
    Hostbased {
        /// Host key algorithm name.
        algorithm: Ascii,

        /// Host public key blob.
        host_key: Bytes,

        /// Client host name, FQDN.
        host_name: Ascii,

        /// User name on the client host.
        host_username: Utf8,

        /// The signature over the session identifier and request.
        signature: Bytes,
    },

    /// The `keyboard-interactive` authentication method ([RFC 4256]).
    ///
    /// [RFC 4256]: https://datatracker.ietf.org/doc/html/rfc4256
    KeyboardInteractive {
        /// Language tag.
        language: Ascii,

        /// Comma-separated submethod hints for the server.
        submethods: Utf8,
    },
}

impl Method {
    /// The `none` method name.
    pub const NONE: &'static str = "none";
    /// The `publickey` method name.
    pub const PUBLICKEY: &'static str = "publickey";
    /// The `password` method name.
    pub const PASSWORD: &'static str = "password";
    /// The `hostbased` method name.
    pub const HOSTBASED: &'static str = "hostbased";
    /// The `keyboard-interactive` method name.
    pub const KEYBOARD_INTERACTIVE: &'static str = "keyboard-interactive";

    /// The wire name of the method.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => Self::NONE,
            Self::Publickey { .. } => Self::PUBLICKEY,
            Self::Password { .. } => Self::PASSWORD,
            Self::Hostbased { .. } => Self::HOSTBASED,
            Self::KeyboardInteractive { .. } => Self::KEYBOARD_INTERACTIVE,
        }
    }
}

impl Encode for Method {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_bytes(self.name().as_bytes(), buf);

        match self {
            Self::None => (),
            Self::Publickey {
                algorithm,
                blob,
                signature,
            } => {
                signature.is_some().encode(buf);
                algorithm.encode(buf);
                blob.encode(buf);
                if let Some(signature) = signature {
                    signature.encode(buf);
                }
            }
            Self::Password { password, new } => {
                new.is_some().encode(buf);
                password.encode(buf);
                if let Some(new) = new {
                    new.encode(buf);
                }
            }
            Self::Hostbased {
                algorithm,
                host_key,
                host_name,
                host_username,
                signature,
            } => {
                algorithm.encode(buf);
                host_key.encode(buf);
                host_name.encode(buf);
                host_username.encode(buf);
                signature.encode(buf);
            }
            Self::KeyboardInteractive {
                language,
                submethods,
            } => {
                language.encode(buf);
                submethods.encode(buf);
            }
        }
    }
}

impl Decode for Method {
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let name = Ascii::decode(cursor)?;

        Ok(match &*name {
            Self::NONE => Self::None,
            Self::PUBLICKEY => {
                let signed = bool::decode(cursor)?;
                let algorithm = Ascii::decode(cursor)?;
                let blob = Bytes::decode(cursor)?;

                Self::Publickey {
                    algorithm,
                    blob,
                    signature: signed.then(|| Bytes::decode(cursor)).transpose()?,
                }
            }
            Self::PASSWORD => {
                let change = bool::decode(cursor)?;
                let password = Utf8::decode(cursor)?;

                Self::Password {
                    password,
                    new: change.then(|| Utf8::decode(cursor)).transpose()?,
                }
            }
            Self::HOSTBASED => Self::Hostbased {
                algorithm: Ascii::decode(cursor)?,
                host_key: Bytes::decode(cursor)?,
                host_name: Ascii::decode(cursor)?,
                host_username: Utf8::decode(cursor)?,
                signature: Bytes::decode(cursor)?,
            },
            Self::KEYBOARD_INTERACTIVE => Self::KeyboardInteractive {
                language: Ascii::decode(cursor)?,
                submethods: Utf8::decode(cursor)?,
            },
            _ => return Err(Error::Ascii),
        })
    }
}

/// The `SSH_MSG_USERAUTH_REQUEST` message.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The user name to authenticate as.
    pub username: Utf8,

    /// The service to start after authentication.
    pub service_name: Ascii,

    /// The authentication method and its payload.
    pub method: Method,
}

impl Message for Request {
    const NUMBER: u8 = 50;

    fn encode_fields(&self, buf: &mut Vec<u8>) {
        self.username.encode(buf);
        self.service_name.encode(buf);
        self.method.encode(buf);
    }

    fn decode_fields(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        Ok(Self {
            username: Utf8::decode(cursor)?,
            service_name: Ascii::decode(cursor)?,
            method: Method::decode(cursor)?,
        })
    }
}

message! {
    /// The `SSH_MSG_USERAUTH_FAILURE` message.
    51 Failure {
        /// Methods that may productively continue the authentication.
        continue_with: NameList,

        /// Whether the attempted method actually succeeded, with further
        /// methods still required.
        partial_success: bool,
    }
}

message! {
    /// The `SSH_MSG_USERAUTH_SUCCESS` message.
    52 Success {}
}

message! {
    /// The `SSH_MSG_USERAUTH_BANNER` message.
    53 Banner {
        /// The banner text to display before authentication.
        message: Utf8,

        /// Language tag of the banner.
        language: Ascii,
    }
}

message! {
    /// The `SSH_MSG_USERAUTH_PK_OK` message, accepting a `publickey` probe.
    60 PkOk {
        /// Public key algorithm name from the probe.
        algorithm: Ascii,

        /// Public key blob from the probe.
        blob: Bytes,
    }
}

message! {
    /// The `SSH_MSG_USERAUTH_PASSWD_CHANGEREQ` message.
    60 PasswdChangereq {
        /// The prompt to display to the user.
        prompt: Utf8,

        /// Language tag of the prompt.
        language: Ascii,
    }
}

/// A single prompt of an [`InfoRequest`] round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    /// The prompt text.
    pub prompt: Utf8,

    /// Whether the response may be echoed while typed.
    pub echo: bool,
}

/// The `SSH_MSG_USERAUTH_INFO_REQUEST` message of the
/// `keyboard-interactive` method ([RFC 4256]).
///
/// [RFC 4256]: https://datatracker.ietf.org/doc/html/rfc4256
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoRequest {
    /// Name of the authentication round.
    pub name: Utf8,

    /// Instructions to display to the user.
    pub instruction: Utf8,

    /// Language tag.
    pub language: Ascii,

    /// The prompts of this round, possibly none.
    pub prompts: Vec<Prompt>,
}

impl Message for InfoRequest {
    const NUMBER: u8 = 60;

    fn encode_fields(&self, buf: &mut Vec<u8>) {
        self.name.encode(buf);
        self.instruction.encode(buf);
        self.language.encode(buf);

        (self.prompts.len() as u32).encode(buf);
        for prompt in &self.prompts {
            prompt.prompt.encode(buf);
            prompt.echo.encode(buf);
        }
    }

    fn decode_fields(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let name = Utf8::decode(cursor)?;
        let instruction = Utf8::decode(cursor)?;
        let language = Ascii::decode(cursor)?;

        let count = u32::decode(cursor)?;
        let prompts = (0..count)
            .map(|_| {
                Ok(Prompt {
                    prompt: Utf8::decode(cursor)?,
                    echo: bool::decode(cursor)?,
                })
            })
            .collect::<Result<_, Error>>()?;

        Ok(Self {
            name,
            instruction,
            language,
            prompts,
        })
    }
}

/// The `SSH_MSG_USERAUTH_INFO_RESPONSE` message of the
/// `keyboard-interactive` method ([RFC 4256]).
///
/// The response count must equal the prompt count of the request it answers.
///
/// [RFC 4256]: https://datatracker.ietf.org/doc/html/rfc4256
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoResponse {
    /// The responses, in prompt order.
    pub responses: Vec<Utf8>,
}

impl Message for InfoResponse {
    const NUMBER: u8 = 61;

    fn encode_fields(&self, buf: &mut Vec<u8>) {
        (self.responses.len() as u32).encode(buf);
        for response in &self.responses {
            response.encode(buf);
        }
    }

    fn decode_fields(cursor: &mut Cursor<'_>) -> Result<Self, Error> {
        let count = u32::decode(cursor)?;
        let responses = (0..count)
            .map(|_| Utf8::decode(cursor))
            .collect::<Result<_, Error>>()?;

        Ok(Self { responses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publickey_probe_roundtrips() {
        let request = Request {
            username: "user".into(),
            service_name: "ssh-connection".into(),
            method: Method::Publickey {
                algorithm: "ssh-ed25519".into(),
                blob: b"blob".as_slice().into(),
                signature: None,
            },
        };

        let decoded = Request::from_bytes(&request.to_bytes()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn signed_publickey_roundtrips() {
        let request = Request {
            username: "user".into(),
            service_name: "ssh-connection".into(),
            method: Method::Publickey {
                algorithm: "ssh-ed25519".into(),
                blob: b"blob".as_slice().into(),
                signature: Some(b"signature".as_slice().into()),
            },
        };

        let decoded = Request::from_bytes(&request.to_bytes()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn info_request_roundtrips() {
        let request = InfoRequest {
            name: "round".into(),
            instruction: "answer the prompts".into(),
            prompts: vec![
                Prompt {
                    prompt: "Password: ".into(),
                    echo: false,
                },
                Prompt {
                    prompt: "Token: ".into(),
                    echo: true,
                },
            ],
            ..Default::default()
        };

        let decoded = InfoRequest::from_bytes(&request.to_bytes()).unwrap();
        assert_eq!(decoded, request);
    }
}
