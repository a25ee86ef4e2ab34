//! Outbound message construction and wire serialization.
//!
//! The message is serialized exactly once per send; the submission and
//! archival phases both consume the same bytes, so the archived copy is
//! byte-identical to what the submission server accepted.

use chrono::{DateTime, Local};

/// A plain-text outbound message, ready for serialization.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Sender address, placed in the `From` header and the envelope.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients; the header is omitted when empty.
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body, UTF-8.
    pub body: String,
    /// Composition timestamp for the `Date` header.
    pub date: DateTime<Local>,
}

impl OutboundMessage {
    /// Builds a message stamped with the current local time.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: Vec<String>,
        cc: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to,
            cc,
            subject: subject.into(),
            body: body.into(),
            date: Local::now(),
        }
    }

    /// Every envelope recipient: `to` followed by `cc`, in order.
    pub fn envelope_recipients(&self) -> impl Iterator<Item = &str> {
        self.to.iter().chain(self.cc.iter()).map(String::as_str)
    }

    /// Serializes to an RFC 5322 message with CRLF line endings.
    ///
    /// Headers appear in a fixed order; `Cc` is omitted entirely when
    /// there are no carbon-copy recipients. The body is declared as
    /// 8bit UTF-8 plain text and appended verbatim.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut out = String::with_capacity(256 + self.body.len());

        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str(&format!("To: {}\r\n", self.to.join(", ")));
        if !self.cc.is_empty() {
            out.push_str(&format!("Cc: {}\r\n", self.cc.join(", ")));
        }
        out.push_str(&format!("Subject: {}\r\n", self.subject));
        out.push_str(&format!("Date: {}\r\n", self.date.to_rfc2822()));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n");
        out.push_str("\r\n");
        out.push_str(&self.body);

        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(cc: Vec<String>) -> OutboundMessage {
        OutboundMessage {
            from: "sender@example.com".to_string(),
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            cc,
            subject: "Greetings".to_string(),
            body: "Hello there".to_string(),
            date: Local.with_ymd_and_hms(2026, 8, 30, 14, 5, 9).unwrap(),
        }
    }

    #[test]
    fn serializes_headers_in_order() {
        let wire = message(vec!["c@example.com".to_string()]).to_rfc5322();
        let lines: Vec<&str> = wire.split("\r\n").collect();

        assert_eq!(lines[0], "From: sender@example.com");
        assert_eq!(lines[1], "To: a@example.com, b@example.com");
        assert_eq!(lines[2], "Cc: c@example.com");
        assert_eq!(lines[3], "Subject: Greetings");
        assert!(lines[4].starts_with("Date: "));
        assert_eq!(lines[5], "MIME-Version: 1.0");
        assert_eq!(lines[6], "Content-Type: text/plain; charset=utf-8");
        assert_eq!(lines[7], "Content-Transfer-Encoding: 8bit");
        assert_eq!(lines[8], "");
        assert_eq!(lines[9], "Hello there");
    }

    #[test]
    fn omits_cc_header_when_empty() {
        let wire = message(Vec::new()).to_rfc5322();
        assert!(!wire.contains("Cc:"));
        assert!(wire.contains("To: a@example.com, b@example.com\r\n"));
    }

    #[test]
    fn envelope_covers_to_then_cc() {
        let msg = message(vec!["c@example.com".to_string()]);
        let recipients: Vec<&str> = msg.envelope_recipients().collect();
        assert_eq!(
            recipients,
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn date_header_is_rfc2822() {
        let msg = message(Vec::new());
        let wire = msg.to_rfc5322();
        let expected = format!("Date: {}\r\n", msg.date.to_rfc2822());
        assert!(wire.contains(&expected));
    }

    #[test]
    fn body_is_appended_verbatim() {
        let mut msg = message(Vec::new());
        msg.body = "line one\r\nline two\n.leading dot".to_string();
        let wire = msg.to_rfc5322();
        assert!(wire.ends_with("\r\n\r\nline one\r\nline two\n.leading dot"));
    }
}
