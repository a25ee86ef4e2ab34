//! SMTP command serialization.

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - extended greeting.
    Ehlo {
        /// Client hostname.
        hostname: String,
    },
    /// STARTTLS - upgrade the connection to TLS.
    StartTls,
    /// AUTH PLAIN with a base64 initial response (SASL-IR).
    AuthPlain {
        /// Base64-encoded `\0user\0pass`.
        initial_response: String,
    },
    /// MAIL FROM - start a mail transaction.
    MailFrom {
        /// Envelope sender address.
        address: String,
    },
    /// RCPT TO - add an envelope recipient.
    RcptTo {
        /// Envelope recipient address.
        address: String,
    },
    /// DATA - begin message content.
    Data,
    /// QUIT - close the connection.
    Quit,
}

impl Command {
    /// Serializes the command to a CRLF-terminated wire line.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::AuthPlain { initial_response } => format!("AUTH PLAIN {initial_response}"),
            Self::MailFrom { address } => format!("MAIL FROM:<{address}>"),
            Self::RcptTo { address } => format!("RCPT TO:<{address}>"),
            Self::Data => "DATA".to_string(),
            Self::Quit => "QUIT".to_string(),
        };
        line.push_str("\r\n");
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ehlo() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), "EHLO client.example.com\r\n");
    }

    #[test]
    fn starttls() {
        assert_eq!(Command::StartTls.serialize(), "STARTTLS\r\n");
    }

    #[test]
    fn auth_plain() {
        let cmd = Command::AuthPlain {
            initial_response: "AHVzZXIAcGFzcw==".to_string(),
        };
        assert_eq!(cmd.serialize(), "AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn mail_from() {
        let cmd = Command::MailFrom {
            address: "sender@example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), "MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn rcpt_to() {
        let cmd = Command::RcptTo {
            address: "recipient@example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), "RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn data_and_quit() {
        assert_eq!(Command::Data.serialize(), "DATA\r\n");
        assert_eq!(Command::Quit.serialize(), "QUIT\r\n");
    }
}
