use std::fmt;

use futures::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum length of an identification line, terminators included ([RFC 4253 § 4.2]).
///
/// [RFC 4253 § 4.2]: https://datatracker.ietf.org/doc/html/rfc4253#section-4.2
const MAX_LINE_LENGTH: usize = 255;

/// Maximum count of preamble lines tolerated before the identification line.
const MAX_PREAMBLE_LINES: usize = 64;

/// The identification string exchanged by both sides before any packet,
/// of the form `SSH-protoversion-softwareversion SP comments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id {
    /// The protocol version, always `2.0` for this implementation.
    pub protoversion: String,

    /// The software version identifier.
    pub softwareversion: String,

    /// Optional comments following the version.
    pub comments: Option<String>,
}

impl Id {
    /// Create an [`Id`] for protocol version 2.0.
    pub fn v2(softwareversion: impl Into<String>, comments: Option<impl Into<String>>) -> Self {
        Self {
            protoversion: "2.0".into(),
            softwareversion: softwareversion.into(),
            comments: comments.map(Into::into),
        }
    }

    /// Read the peer's identification string, skipping any preamble lines
    /// a server may emit before it.
    pub async fn from_async_reader(
        reader: &mut (impl AsyncBufRead + Unpin),
    ) -> Result<Self, std::io::Error> {
        let mut line = Vec::with_capacity(MAX_LINE_LENGTH);

        for _ in 0..MAX_PREAMBLE_LINES {
            line.clear();

            (&mut *reader)
                .take(MAX_LINE_LENGTH as u64)
                .read_until(b'\n', &mut line)
                .await?;

            if line.last() != Some(&b'\n') {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "identification line was too long or the stream ended",
                ));
            }

            if line.starts_with(b"SSH-") {
                let text = String::from_utf8(line).map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "identification line contained ill-formed UTF-8",
                    )
                })?;

                return text.parse().map_err(|err: &str| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, err)
                });
            }

            // Not an identification line: part of the server's preamble.
            tracing::trace!("Skipped a preamble line of {} bytes", line.len());
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "no identification line within the tolerated preamble",
        ))
    }

    /// Write our identification string, CRLF-terminated.
    pub async fn to_async_writer(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
    ) -> Result<(), std::io::Error> {
        writer
            .write_all(format!("{self}\r\n").as_bytes())
            .await
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SSH-{}-{}", self.protoversion, self.softwareversion)?;

        if let Some(ref comments) = self.comments {
            write!(f, " {comments}")?;
        }

        Ok(())
    }
}

impl std::str::FromStr for Id {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);

        let rest = line
            .strip_prefix("SSH-")
            .ok_or("identification line did not start with `SSH-`")?;

        let (protoversion, rest) = rest
            .split_once('-')
            .ok_or("identification line was missing the protocol version")?;

        let (softwareversion, comments) = match rest.split_once(' ') {
            Some((software, comments)) => (software, Some(comments.to_owned())),
            None => (rest, None),
        };

        if softwareversion.is_empty() {
            return Err("identification line was missing the software version");
        }

        Ok(Self {
            protoversion: protoversion.to_owned(),
            softwareversion: softwareversion.to_owned(),
            comments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_id() {
        let id: Id = "SSH-2.0-OpenSSH_9.6\r\n".parse().unwrap();

        assert_eq!(id.protoversion, "2.0");
        assert_eq!(id.softwareversion, "OpenSSH_9.6");
        assert_eq!(id.comments, None);
    }

    #[test]
    fn parses_id_with_comments() {
        let id: Id = "SSH-2.0-billsSSH_3.6.3q3 comments and such".parse().unwrap();

        assert_eq!(id.softwareversion, "billsSSH_3.6.3q3");
        assert_eq!(id.comments.as_deref(), Some("comments and such"));
    }

    #[test]
    fn displays_crlf_free() {
        let id = Id::v2("hawser:0.1.0", None::<&str>);

        assert_eq!(id.to_string(), "SSH-2.0-hawser:0.1.0");
    }

    #[async_std::test]
    async fn skips_preamble_lines() {
        let mut stream =
            futures::io::Cursor::new(b"welcome to the server\r\nSSH-2.0-remote\r\n".to_vec());

        let id = Id::from_async_reader(&mut stream).await.unwrap();
        assert_eq!(id.softwareversion, "remote");
    }
}
