//! Error taxonomy for the send operation.
//!
//! Validation and configuration errors are produced before any network
//! I/O. Submission errors abort the whole call. Archival errors never
//! appear here: the dispatch layer contains them entirely.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by configuration, validation and submission.
#[derive(Debug, Error)]
pub enum Error {
    /// No environment configuration and no config file present.
    #[error(
        "Configuration not found at {path}. Either set the SMTP_HOST, \
         SMTP_USERNAME and SMTP_PASSWORD environment variables, or create \
         the config file"
    )]
    ConfigNotFound {
        /// Path where the config file was expected.
        path: PathBuf,
    },

    /// Config file present but not readable.
    #[error("Could not read {path}: {source}")]
    ConfigUnreadable {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Config file present but not parseable as JSON.
    #[error("Invalid JSON in {path}: {source}")]
    ConfigMalformed {
        /// Path of the unparseable file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// Required field missing from the config file.
    #[error("Missing required config field: {field}")]
    ConfigIncomplete {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A config value that exists but cannot be interpreted.
    #[error("Invalid value for config field: {field}")]
    ConfigInvalid {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The `to` field parsed to an empty address list.
    #[error("No valid recipients in 'to' field")]
    NoRecipients,

    /// The subject is empty or blank.
    #[error("Subject cannot be empty")]
    EmptySubject,

    /// An address failed syntactic validation.
    #[error("Invalid email address: {address}")]
    InvalidAddress {
        /// The first offending address, in input order.
        address: String,
    },

    /// The submission server rejected the credentials.
    #[error("SMTP authentication failed: {0}. Check the configured username and password")]
    AuthenticationFailed(#[source] postroom_smtp::Error),

    /// The submission session could not be opened.
    #[error("Could not connect to SMTP server: {0}")]
    ConnectionFailed(#[source] postroom_smtp::Error),

    /// Any other submission-phase failure.
    #[error("SMTP error: {0}")]
    SubmissionFailed(#[source] postroom_smtp::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
