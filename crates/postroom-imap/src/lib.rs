//! # postroom-imap
//!
//! Minimal async IMAP client implementing the RFC 9051 subset needed to
//! archive a copy of sent mail: implicit-TLS connect, LOGIN, APPEND with
//! literal continuation, LOGOUT.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::time::Duration;
//! use chrono::Utc;
//! use postroom_imap::{Client, Flag, datetime, stream};
//!
//! # async fn run(message: &[u8]) -> postroom_imap::Result<()> {
//! let tls = stream::connect_tls("imap.example.com", 993, Duration::from_secs(30)).await?;
//! let client = Client::from_stream(tls).await?;
//! let mut client = client.login("user@example.com", "secret").await?;
//!
//! let date = datetime::internal_date(Utc::now());
//! client.append("Sent", &[Flag::Seen], &date, message).await?;
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod datetime;
mod error;
pub mod stream;
pub mod tag;

pub use client::{Authenticated, Client, Flag, NotAuthenticated};
pub use error::{Error, Result};
