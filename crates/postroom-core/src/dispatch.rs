//! Mail dispatch orchestration.
//!
//! A send runs in two phases. Submission hands the message to the SMTP
//! server and any failure aborts the whole call. Archival then appends
//! the same bytes to the configured folder over IMAP; by the time it
//! runs the message is already on its way, so archival failures are
//! logged and swallowed, never surfaced to the caller.

use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use postroom_imap::{Flag, datetime};

use crate::address;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::message::OutboundMessage;

/// Bound on each TCP connect, for both phases.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Hostname we announce in EHLO.
const CLIENT_HOSTNAME: &str = "localhost";

/// What happened to the archival copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivalStatus {
    /// Archival is disabled in the configuration.
    Disabled,
    /// The copy landed in the configured folder.
    Archived,
    /// Archival failed; the message was still submitted.
    Failed,
}

/// Outcome of a completed send.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Primary recipients the message went to, as validated.
    pub to: Vec<String>,
    /// Carbon-copy recipients, possibly empty.
    pub cc: Vec<String>,
    /// Archival outcome.
    pub archival: ArchivalStatus,
}

/// Validates, submits and archives one message.
///
/// `to` and `cc` are comma-separated address lists; `cc` may be empty.
///
/// # Errors
///
/// Returns a validation error before any I/O, or a connection,
/// authentication or submission error from the submission phase.
/// Archival failures are not errors.
pub async fn send(
    config: &Config,
    to: &str,
    cc: &str,
    subject: &str,
    body: &str,
) -> Result<DispatchReport> {
    let (to_list, cc_list) = validate_request(to, cc, subject)?;

    let message = OutboundMessage::new(config.username.clone(), to_list, cc_list, subject, body);
    let wire = message.to_rfc5322();
    let recipients: Vec<String> = message.envelope_recipients().map(str::to_string).collect();

    submit(config, &recipients, wire.as_bytes()).await?;
    info!(recipients = recipients.len(), "message submitted");

    let archival = if config.save_to_sent {
        note_archival(archive(config, wire.as_bytes()).await, &config.sent_folder)
    } else {
        ArchivalStatus::Disabled
    };

    Ok(DispatchReport {
        to: message.to,
        cc: message.cc,
        archival,
    })
}

/// Runs every pre-flight check, returning the parsed recipient lists.
/// Address syntax is checked before the subject, so a request that is
/// wrong on both counts reports the bad address.
fn validate_request(to: &str, cc: &str, subject: &str) -> Result<(Vec<String>, Vec<String>)> {
    let to_list = address::parse_list(to);
    if to_list.is_empty() {
        return Err(Error::NoRecipients);
    }

    let cc_list = address::parse_list(cc);
    address::validate_all(&to_list)?;
    address::validate_all(&cc_list)?;

    if subject.trim().is_empty() {
        return Err(Error::EmptySubject);
    }

    Ok((to_list, cc_list))
}

/// Submission phase: connect, authenticate, run the mail transaction.
async fn submit(config: &Config, recipients: &[String], wire: &[u8]) -> Result<()> {
    // smtp_use_tls selects STARTTLS (plaintext connect, then upgrade);
    // otherwise TLS is active from the first byte.
    let stream = if config.smtp_use_tls {
        postroom_smtp::stream::connect(&config.smtp_host, config.smtp_port, CONNECT_TIMEOUT).await
    } else {
        postroom_smtp::stream::connect_tls(&config.smtp_host, config.smtp_port, CONNECT_TIMEOUT)
            .await
    }
    .map_err(Error::ConnectionFailed)?;

    let client = postroom_smtp::Client::from_stream(stream)
        .await
        .map_err(Error::ConnectionFailed)?;
    let client = client
        .ehlo(CLIENT_HOSTNAME)
        .await
        .map_err(Error::SubmissionFailed)?;

    let client = if config.smtp_use_tls {
        client
            .starttls(&config.smtp_host)
            .await
            .map_err(Error::SubmissionFailed)?
    } else {
        client
    };

    let client = client
        .auth_plain(&config.username, &config.password)
        .await
        .map_err(|err| {
            if err.is_auth_rejection() {
                Error::AuthenticationFailed(err)
            } else {
                Error::SubmissionFailed(err)
            }
        })?;

    submit_session(client, &config.username, recipients, wire).await
}

/// The mail transaction on an already-authenticated session.
async fn submit_session<S>(
    client: postroom_smtp::Client<S, postroom_smtp::Authenticated>,
    from: &str,
    recipients: &[String],
    wire: &[u8],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (first, rest) = recipients.split_first().ok_or(Error::NoRecipients)?;

    let client = client.mail_from(from).await.map_err(Error::SubmissionFailed)?;
    let mut client = client.rcpt_to(first).await.map_err(Error::SubmissionFailed)?;
    for recipient in rest {
        client = client
            .rcpt_to(recipient)
            .await
            .map_err(Error::SubmissionFailed)?;
    }

    let client = client.data().await.map_err(Error::SubmissionFailed)?;
    let client = client
        .send_message(wire)
        .await
        .map_err(Error::SubmissionFailed)?;

    // The message is accepted at this point; a sour QUIT changes nothing.
    if let Err(err) = client.quit().await {
        debug!(error = %err, "QUIT after submission failed");
    }
    Ok(())
}

/// Archival phase: append the submitted bytes to the sent folder.
async fn archive(config: &Config, wire: &[u8]) -> postroom_imap::Result<()> {
    let tls =
        postroom_imap::stream::connect_tls(config.imap_host(), config.imap_port, CONNECT_TIMEOUT)
            .await?;
    let client = postroom_imap::Client::from_stream(tls).await?;
    let client = client.login(&config.username, &config.password).await?;
    let date = datetime::internal_date(Utc::now());
    archive_session(client, &config.sent_folder, &date, wire).await
}

/// The APPEND and LOGOUT on an already-authenticated session.
async fn archive_session<S>(
    mut client: postroom_imap::Client<S, postroom_imap::Authenticated>,
    folder: &str,
    date: &str,
    wire: &[u8],
) -> postroom_imap::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client.append(folder, &[Flag::Seen], date, wire).await?;
    client.logout().await
}

/// Converts the archival outcome into a status, logging either way.
fn note_archival(outcome: postroom_imap::Result<()>, folder: &str) -> ArchivalStatus {
    match outcome {
        Ok(()) => {
            info!(folder, "sent message archived");
            ArchivalStatus::Archived
        }
        Err(err) => {
            warn!(folder, error = %err, "could not archive sent message; message was still sent");
            ArchivalStatus::Failed
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn rejects_empty_recipient_list() {
        assert!(matches!(
            validate_request("", "", "Subject"),
            Err(Error::NoRecipients)
        ));
        assert!(matches!(
            validate_request(" , ,", "", "Subject"),
            Err(Error::NoRecipients)
        ));
    }

    #[test]
    fn rejects_blank_subject() {
        assert!(matches!(
            validate_request("a@b.com", "", "   "),
            Err(Error::EmptySubject)
        ));
    }

    #[test]
    fn invalid_address_wins_over_blank_subject() {
        let err = validate_request("not-an-address", "", "").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { address } if address == "not-an-address"));
    }

    #[test]
    fn rejects_invalid_cc_address() {
        let err = validate_request("a@b.com", "good@b.com, bad", "Hi").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { address } if address == "bad"));
    }

    #[test]
    fn accepts_empty_cc() {
        let (to, cc) = validate_request("a@b.com, c@d.org", "", "Hi").unwrap();
        assert_eq!(to, vec!["a@b.com", "c@d.org"]);
        assert!(cc.is_empty());
    }

    async fn authenticated_smtp<S>(
        stream: S,
    ) -> postroom_smtp::Client<S, postroom_smtp::Authenticated>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let client = postroom_smtp::Client::from_stream(stream).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        client.auth_plain("user", "pass").await.unwrap()
    }

    #[tokio::test]
    async fn submission_covers_every_recipient() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<user@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<a@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<c@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: Hi\r\n\r\nBody\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();

        let client = authenticated_smtp(mock).await;
        let recipients = vec!["a@example.org".to_string(), "c@example.org".to_string()];
        submit_session(
            client,
            "user@example.com",
            &recipients,
            b"Subject: Hi\r\n\r\nBody",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn recipient_rejection_aborts_submission() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<user@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<nobody@example.org>\r\n")
            .read(b"550 no such user\r\n")
            .build();

        let client = authenticated_smtp(mock).await;
        let recipients = vec!["nobody@example.org".to_string()];
        let err = submit_session(client, "user@example.com", &recipients, b"x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SubmissionFailed(postroom_smtp::Error::Smtp { code: 550, .. })
        ));
    }

    #[tokio::test]
    async fn quit_failure_does_not_fail_submission() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<user@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<a@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: Hi\r\n\r\nBody\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"500 confused\r\n")
            .build();

        let client = authenticated_smtp(mock).await;
        let recipients = vec!["a@example.org".to_string()];
        submit_session(
            client,
            "user@example.com",
            &recipients,
            b"Subject: Hi\r\n\r\nBody",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn archive_session_appends_submitted_bytes() {
        let wire = b"Subject: Hi\r\n\r\nBody";
        let date = "30-Aug-2026 14:05:09 +0000";

        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"P0001 LOGIN \"user\" \"pass\"\r\n")
            .read(b"P0001 OK done\r\n")
            .write(b"P0002 APPEND \"Sent\" (\\Seen) \"30-Aug-2026 14:05:09 +0000\" {19}\r\n")
            .read(b"+ OK\r\n")
            .write(wire)
            .write(b"\r\n")
            .read(b"P0002 OK Append completed\r\n")
            .write(b"P0003 LOGOUT\r\n")
            .read(b"P0003 OK bye\r\n")
            .build();

        let client = postroom_imap::Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "pass").await.unwrap();
        archive_session(client, "Sent", date, wire).await.unwrap();
    }

    #[test]
    fn archival_failure_is_contained() {
        let status = note_archival(
            Err(postroom_imap::Error::No("quota exceeded".to_string())),
            "Sent",
        );
        assert_eq!(status, ArchivalStatus::Failed);

        let status = note_archival(Ok(()), "Sent");
        assert_eq!(status, ArchivalStatus::Archived);
    }
}
