//! Type-state IMAP client for the archival flow.
//!
//! Only two states exist: `NotAuthenticated` (greeting read) and
//! `Authenticated` (after LOGIN). The authenticated state exposes
//! exactly what archival needs: APPEND and LOGOUT.

use std::marker::PhantomData;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::error::{Error, Result};
use crate::tag::TagGenerator;

/// Type-state marker: greeting read, not yet logged in.
#[derive(Debug)]
pub struct NotAuthenticated;

/// Type-state marker: LOGIN accepted.
#[derive(Debug)]
pub struct Authenticated;

/// Message flag set at APPEND time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message is flagged for attention.
    Flagged,
    /// Message is a draft.
    Draft,
    /// Message has been answered.
    Answered,
}

impl Flag {
    /// Returns the wire form of the flag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Flagged => "\\Flagged",
            Self::Draft => "\\Draft",
            Self::Answered => "\\Answered",
        }
    }
}

/// IMAP client over any async stream.
pub struct Client<S, State> {
    stream: BufReader<S>,
    tags: TagGenerator,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the server greets with BYE or anything other
    /// than an untagged OK/PREAUTH.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut stream = BufReader::new(stream);
        let greeting = read_line(&mut stream).await?;

        if let Some(text) = greeting.strip_prefix("* BYE") {
            return Err(Error::Bye(text.trim().to_string()));
        }
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(Error::Protocol(format!("unexpected greeting: {greeting}")));
        }

        Ok(Self {
            stream,
            tags: TagGenerator::new(),
            _state: PhantomData,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// Consumes self and returns an authenticated client on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the credentials.
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        let tag = self.tags.next();
        let cmd = format!(
            "{tag} LOGIN {} {}\r\n",
            quote(username),
            quote(password)
        );

        write_all(&mut self.stream, cmd.as_bytes()).await?;
        let responses = read_until_tagged(&mut self.stream, &tag).await?;
        check_tagged_ok(&responses, &tag)?;

        Ok(Client {
            stream: self.stream,
            tags: self.tags,
            _state: PhantomData,
        })
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Appends a complete RFC 5322 message to a mailbox.
    ///
    /// APPEND carries the message as a literal, which requires waiting
    /// for the server's `+` continuation before sending the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the append at any step.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: &[Flag],
        internal_date: &str,
        message: &[u8],
    ) -> Result<()> {
        let tag = self.tags.next();

        let mut cmd = format!("{tag} APPEND {}", quote(mailbox));
        if !flags.is_empty() {
            cmd.push_str(" (");
            for (i, flag) in flags.iter().enumerate() {
                if i > 0 {
                    cmd.push(' ');
                }
                cmd.push_str(flag.as_str());
            }
            cmd.push(')');
        }
        cmd.push_str(&format!(" {} {{{}}}\r\n", quote(internal_date), message.len()));

        write_all(&mut self.stream, cmd.as_bytes()).await?;

        // The literal may only follow the server's continuation request.
        let response = read_line(&mut self.stream).await?;
        if !response.starts_with('+') {
            if let Some((status, text)) = parse_tagged(&response, &tag) {
                return Err(status_error(status, text));
            }
            return Err(Error::Protocol(format!(
                "expected continuation for APPEND, got: {response}"
            )));
        }

        write_all(&mut self.stream, message).await?;
        write_all(&mut self.stream, b"\r\n").await?;

        let responses = read_until_tagged(&mut self.stream, &tag).await?;
        check_tagged_ok(&responses, &tag)?;
        debug!(mailbox, bytes = message.len(), "APPEND complete");
        Ok(())
    }

    /// Gracefully disconnects from the server.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing the LOGOUT command fails; a
    /// missing or odd response is ignored.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next();
        let cmd = format!("{tag} LOGOUT\r\n");
        write_all(&mut self.stream, cmd.as_bytes()).await?;

        let _ = read_until_tagged(&mut self.stream, &tag).await;
        Ok(())
    }
}

/// Quotes a string for the wire, escaping backslashes and quotes.
fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

async fn write_all<S>(stream: &mut BufReader<S>, data: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.get_mut().write_all(data).await?;
    stream.get_mut().flush().await?;
    Ok(())
}

async fn read_line<S>(stream: &mut BufReader<S>) -> Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Err(Error::Protocol("connection closed".into()));
    }
    Ok(line.trim_end().to_string())
}

async fn read_until_tagged<S>(stream: &mut BufReader<S>, tag: &str) -> Result<Vec<String>>
where
    S: AsyncRead + Unpin,
{
    let mut responses = Vec::new();
    loop {
        let line = read_line(stream).await?;
        let tagged = line.starts_with(tag)
            && line.as_bytes().get(tag.len()) == Some(&b' ');
        responses.push(line);
        if tagged {
            return Ok(responses);
        }
    }
}

/// Splits a tagged response into status word and trailing text.
fn parse_tagged<'a>(line: &'a str, tag: &str) -> Option<(&'a str, &'a str)> {
    let rest = line.strip_prefix(tag)?.strip_prefix(' ')?;
    match rest.split_once(' ') {
        Some((status, text)) => Some((status, text)),
        None => Some((rest, "")),
    }
}

fn status_error(status: &str, text: &str) -> Error {
    match status {
        "NO" => Error::No(text.to_string()),
        "BAD" => Error::Bad(text.to_string()),
        "BYE" => Error::Bye(text.to_string()),
        other => Error::Protocol(format!("unexpected status {other}: {text}")),
    }
}

fn check_tagged_ok(responses: &[String], tag: &str) -> Result<()> {
    for line in responses.iter().rev() {
        if let Some((status, text)) = parse_tagged(line, tag) {
            return match status {
                "OK" => Ok(()),
                _ => Err(status_error(status, text)),
            };
        }
    }
    Err(Error::Protocol("missing tagged response".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn quoting() {
        assert_eq!(quote("Sent"), "\"Sent\"");
        assert_eq!(quote("pass word"), "\"pass word\"");
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn tagged_parsing() {
        assert_eq!(
            parse_tagged("P0001 OK LOGIN completed", "P0001"),
            Some(("OK", "LOGIN completed"))
        );
        assert_eq!(parse_tagged("P0001 OK", "P0001"), Some(("OK", "")));
        assert_eq!(parse_tagged("* OK greeting", "P0001"), None);
        // A longer tag must not prefix-match a shorter one.
        assert_eq!(parse_tagged("P00010 OK", "P0001"), None);
    }

    #[tokio::test]
    async fn bye_greeting_is_rejected() {
        let mock = Builder::new().read(b"* BYE overloaded\r\n").build();
        let result = Client::from_stream(mock).await;
        assert!(matches!(result, Err(Error::Bye(text)) if text == "overloaded"));
    }

    #[tokio::test]
    async fn login_failure_is_no() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"P0001 LOGIN \"user\" \"bad\"\r\n")
            .read(b"P0001 NO [AUTHENTICATIONFAILED] invalid credentials\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let result = client.login("user", "bad").await;
        assert!(matches!(result, Err(Error::No(_))));
    }

    #[tokio::test]
    async fn append_session() {
        let message = b"Subject: Hi\r\n\r\nBody";
        let mock = Builder::new()
            .read(b"* OK dovecot ready\r\n")
            .write(b"P0001 LOGIN \"user\" \"pass\"\r\n")
            .read(b"P0001 OK LOGIN completed\r\n")
            .write(b"P0002 APPEND \"Sent\" (\\Seen) \"30-Aug-2026 14:05:09 +0000\" {19}\r\n")
            .read(b"+ OK\r\n")
            .write(message)
            .write(b"\r\n")
            .read(b"P0002 OK [APPENDUID 1 77] Append completed\r\n")
            .write(b"P0003 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"P0003 OK LOGOUT completed\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("user", "pass").await.unwrap();
        client
            .append("Sent", &[Flag::Seen], "30-Aug-2026 14:05:09 +0000", message)
            .await
            .unwrap();
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn append_refused_without_continuation() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"P0001 LOGIN \"user\" \"pass\"\r\n")
            .read(b"P0001 OK LOGIN completed\r\n")
            .write(b"P0002 APPEND \"Sent\" (\\Seen) \"30-Aug-2026 14:05:09 +0000\" {4}\r\n")
            .read(b"P0002 NO [OVERQUOTA] quota exceeded\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("user", "pass").await.unwrap();
        let result = client
            .append("Sent", &[Flag::Seen], "30-Aug-2026 14:05:09 +0000", b"body")
            .await;
        assert!(matches!(result, Err(Error::No(_))));
    }
}
