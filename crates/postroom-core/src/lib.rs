//! # postroom-core
//!
//! Configuration resolution, address validation and mail dispatch
//! orchestration. The protocol work lives in `postroom-smtp` and
//! `postroom-imap`; this crate wires a validated request through a
//! submission session and a best-effort archival session.
//!
//! ## Quick start
//!
//! ```ignore
//! use postroom_core::{Config, dispatch};
//!
//! # async fn run() -> postroom_core::Result<()> {
//! let config = Config::load()?;
//! let report = dispatch::send(
//!     &config,
//!     "friend@example.org",
//!     "",
//!     "Hello",
//!     "A short note.",
//! )
//! .await?;
//! println!("sent to {}", report.to.join(", "));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod address;
pub mod config;
pub mod dispatch;
mod error;
pub mod message;

pub use config::{Config, ConfigSource, EnvSource, FileSource};
pub use dispatch::{ArchivalStatus, DispatchReport};
pub use error::{Error, Result};
pub use message::OutboundMessage;
