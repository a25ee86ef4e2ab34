//! # postroom-smtp
//!
//! Async SMTP submission client implementing the RFC 5321 subset needed
//! to submit mail through an authenticated relay.
//!
//! ## Features
//!
//! - **Type-state connection management**: compile-time enforcement of
//!   valid command ordering
//! - **TLS**: implicit TLS (port 465) and STARTTLS upgrade (port 587),
//!   both with default certificate verification
//! - **Authentication**: AUTH PLAIN with SASL initial response
//! - **DATA handling**: CRLF normalization and dot byte-stuffing
//!
//! ## Quick start
//!
//! ```ignore
//! use std::time::Duration;
//! use postroom_smtp::{Client, stream};
//!
//! # async fn run() -> postroom_smtp::Result<()> {
//! let stream = stream::connect_tls("mail.example.com", 465, Duration::from_secs(30)).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.ehlo("localhost").await?;
//! let client = client.auth_plain("user@example.com", "secret").await?;
//!
//! let client = client.mail_from("user@example.com").await?;
//! let client = client.rcpt_to("friend@example.org").await?;
//! let client = client.data().await?;
//! let client = client.send_message(b"Subject: Hello\r\n\r\nHi!\r\n").await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod command;
mod error;
pub mod reply;
pub mod stream;

pub use client::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
};
pub use error::{Error, Result};
pub use reply::{Reply, ReplyCode};
pub use stream::SmtpStream;
