//! Type-state SMTP submission client.
//!
//! State transitions mirror the protocol: `Connected` (greeting read) →
//! `Authenticated` → `MailTransaction` → `RecipientAdded` → `Data`. Each
//! state only exposes the commands that are valid in it.

use std::collections::HashSet;
use std::marker::PhantomData;

use base64::Engine;
use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::reply::{Reply, ReplyCode, is_final_line, parse_reply};
use crate::stream::SmtpStream;

/// Type-state marker: greeting read, not yet authenticated.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: AUTH accepted.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: MAIL FROM accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker: at least one RCPT TO accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker: DATA accepted, message content may be sent.
#[derive(Debug)]
pub struct Data;

/// Server identity and capabilities discovered via the greeting and EHLO.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Hostname the server announced in its greeting.
    pub hostname: String,
    /// EHLO keywords, uppercased (e.g. `STARTTLS`, `AUTH`).
    pub extensions: HashSet<String>,
}

impl ServerInfo {
    /// Returns true if the server advertised the given EHLO keyword.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.extensions.contains(&keyword.to_ascii_uppercase())
    }

    /// Returns true if the server advertised STARTTLS.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports("STARTTLS")
    }
}

/// SMTP client over any async stream.
pub struct Client<S, State> {
    stream: BufReader<S>,
    server: ServerInfo,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State> {
    /// Returns what the server has told us about itself.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            server: self.server,
            _state: PhantomData,
        }
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the server does not greet
    /// with 220.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut stream = BufReader::new(stream);
        let greeting = read_reply(&mut stream).await?;

        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::smtp(greeting.code.as_u16(), greeting.text()));
        }

        let hostname = greeting
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the greeting.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = send_command(
            &mut self.stream,
            &Command::Ehlo {
                hostname: client_hostname.to_string(),
            },
        )
        .await?;

        if !reply.is_success() {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        self.server.extensions = parse_extensions(&reply);
        debug!(host = %self.server.hostname, extensions = ?self.server.extensions, "EHLO complete");
        Ok(self)
    }

    /// Authenticates with AUTH PLAIN.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        let reply = send_command(
            &mut self.stream,
            &Command::AuthPlain {
                initial_response: encoded,
            },
        )
        .await?;

        if !reply.is_success() {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        Ok(self.transition())
    }
}

impl Client<SmtpStream, Connected> {
    /// Upgrades the session to TLS with STARTTLS, then repeats EHLO.
    ///
    /// The second EHLO is required: the server's advertised capabilities
    /// before and after the upgrade are allowed to differ.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS was not advertised, the server
    /// rejects it, or the TLS handshake fails.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if !self.server.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = send_command(&mut self.stream, &Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        // No pipelining before the handshake, so the read buffer is empty
        // at this point and into_inner loses nothing.
        let upgraded = self.stream.into_inner().upgrade_to_tls(host).await?;
        self.stream = BufReader::new(upgraded);

        self.ehlo(host).await
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the envelope sender.
    pub async fn mail_from(mut self, address: &str) -> Result<Client<S, MailTransaction>> {
        let reply = send_command(
            &mut self.stream,
            &Command::MailFrom {
                address: address.to_string(),
            },
        )
        .await?;

        if !reply.is_success() {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        Ok(self.transition())
    }
}

impl<S> Client<S, MailTransaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds the first envelope recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt_to(mut self, address: &str) -> Result<Client<S, RecipientAdded>> {
        let reply = send_command(
            &mut self.stream,
            &Command::RcptTo {
                address: address.to_string(),
            },
        )
        .await?;

        if !reply.is_success() {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        Ok(self.transition())
    }
}

impl<S> Client<S, RecipientAdded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds another envelope recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt_to(mut self, address: &str) -> Result<Self> {
        let reply = send_command(
            &mut self.stream,
            &Command::RcptTo {
                address: address.to_string(),
            },
        )
        .await?;

        if !reply.is_success() {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        Ok(self)
    }

    /// Begins sending message content.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<S, Data>> {
        let reply = send_command(&mut self.stream, &Command::Data).await?;

        if reply.code != ReplyCode::START_DATA {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        Ok(self.transition())
    }
}

impl<S> Client<S, Data>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Transmits the message and completes the transaction.
    ///
    /// The message should be RFC 5322 formatted. Line endings are
    /// normalized to CRLF, leading dots are byte-stuffed, and the
    /// terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if transmission fails or the server rejects the
    /// message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<S, Authenticated>> {
        let wire = stuff_message(message);
        self.stream.get_mut().write_all(&wire).await?;
        self.stream.get_mut().flush().await?;

        let reply = read_reply(&mut self.stream).await?;
        if !reply.is_success() {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        Ok(self.transition())
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects QUIT with something other
    /// than 221.
    pub async fn quit(mut self) -> Result<()> {
        let reply = send_command(&mut self.stream, &Command::Quit).await?;

        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::smtp(reply.code.as_u16(), reply.text()));
        }

        Ok(())
    }
}

async fn send_command<S>(stream: &mut BufReader<S>, cmd: &Command) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = cmd.serialize();
    stream.get_mut().write_all(line.as_bytes()).await?;
    stream.get_mut().flush().await?;
    read_reply(stream).await
}

async fn read_reply<S>(stream: &mut BufReader<S>) -> Result<Reply>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let n = stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(Error::Protocol("connection closed mid-reply".into()));
        }

        let line = line.trim_end().to_string();
        if line.is_empty() {
            return Err(Error::Protocol("blank reply line".into()));
        }

        let last = is_final_line(&line);
        lines.push(line);
        if last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Extracts EHLO keywords, skipping the first line (server greeting text).
fn parse_extensions(reply: &Reply) -> HashSet<String> {
    reply
        .lines
        .iter()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_ascii_uppercase)
        .collect()
}

/// Normalizes line endings to CRLF, byte-stuffs leading dots, and appends
/// the terminating `.` line.
fn stuff_message(message: &[u8]) -> BytesMut {
    let mut wire = BytesMut::with_capacity(message.len() + 8);

    for line in message.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() == Some(&b'.') {
            wire.extend_from_slice(b".");
        }
        wire.extend_from_slice(line);
        wire.extend_from_slice(b"\r\n");
    }

    wire.extend_from_slice(b".\r\n");
    wire
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn stuffing_escapes_leading_dots() {
        let wire = stuff_message(b"line one\n.hidden\nlast");
        assert_eq!(&wire[..], b"line one\r\n..hidden\r\nlast\r\n.\r\n");
    }

    #[test]
    fn stuffing_normalizes_crlf() {
        let wire = stuff_message(b"a\r\nb\nc");
        assert_eq!(&wire[..], b"a\r\nb\r\nc\r\n.\r\n");
    }

    #[test]
    fn extensions_skip_greeting_line() {
        let reply = parse_reply(&[
            "250-mail.example.com greets you".to_string(),
            "250-STARTTLS".to_string(),
            "250 AUTH PLAIN LOGIN".to_string(),
        ])
        .unwrap();

        let extensions = parse_extensions(&reply);
        assert!(extensions.contains("STARTTLS"));
        assert!(extensions.contains("AUTH"));
        assert!(!extensions.contains("MAIL.EXAMPLE.COM"));
    }

    #[tokio::test]
    async fn blank_reply_line_is_protocol_error() {
        let mock = Builder::new().read(b"\r\n").build();

        let result = Client::from_stream(mock).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn greeting_failure_is_smtp_error() {
        let mock = Builder::new()
            .read(b"554 no service for you\r\n")
            .build();

        let result = Client::from_stream(mock).await;
        assert!(matches!(result, Err(Error::Smtp { code: 554, .. })));
    }

    #[tokio::test]
    async fn full_submission_session() {
        let mock = Builder::new()
            .read(b"220 mail.example.com ESMTP ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-mail.example.com\r\n250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .write(b"MAIL FROM:<user@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<a@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<b@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
            .write(b"Subject: Hi\r\n\r\nBody\r\n.\r\n")
            .read(b"250 OK: queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        assert_eq!(client.server_info().hostname, "mail.example.com");

        let client = client.auth_plain("user", "pass").await.unwrap();
        let client = client.mail_from("user@example.com").await.unwrap();
        let client = client.rcpt_to("a@example.org").await.unwrap();
        let client = client.rcpt_to("b@example.org").await.unwrap();
        let client = client.data().await.unwrap();
        let client = client
            .send_message(b"Subject: Hi\r\n\r\nBody")
            .await
            .unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn auth_rejection_surfaces_code() {
        let mock = Builder::new()
            .read(b"220 mail.example.com ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"535 5.7.8 Bad credentials\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        let err = client.auth_plain("user", "pass").await.unwrap_err();
        assert!(err.is_auth_rejection());
    }

    #[tokio::test]
    async fn data_requires_354() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<u@e.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<r@e.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"451 try again later\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        let client = client.auth_plain("user", "pass").await.unwrap();
        let client = client.mail_from("u@e.com").await.unwrap();
        let client = client.rcpt_to("r@e.com").await.unwrap();
        assert!(matches!(
            client.data().await,
            Err(Error::Smtp { code: 451, .. })
        ));
    }
}
