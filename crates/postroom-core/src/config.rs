//! Connection configuration and its resolution chain.
//!
//! A [`Config`] is resolved once per send from an ordered list of
//! sources: process environment first, then a JSON config file. The
//! first source that reports a hit wins, which keeps the precedence
//! rule explicit and testable without touching real process state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

/// Default submission port (implicit TLS).
pub const DEFAULT_SMTP_PORT: u16 = 465;
/// Default mail-store port (implicit TLS).
pub const DEFAULT_IMAP_PORT: u16 = 993;
/// Default archival folder name.
pub const DEFAULT_SENT_FOLDER: &str = "Sent";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_VAR: &str = "POSTROOM_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Immutable per-invocation connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Submission server hostname.
    pub smtp_host: String,
    /// Submission server port.
    pub smtp_port: u16,
    /// True for STARTTLS (upgrade-to-TLS), false for implicit TLS.
    pub smtp_use_tls: bool,
    /// Account username; also the sender address.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Mail-store hostname override; falls back to `smtp_host`.
    pub imap_host: Option<String>,
    /// Mail-store port.
    pub imap_port: u16,
    /// Whether to archive a copy of sent mail.
    pub save_to_sent: bool,
    /// Archival folder name.
    pub sent_folder: String,
}

impl Config {
    /// The mail-store host, defaulting to the submission host when no
    /// override is configured. The two servers are not assumed to be
    /// the same; this is only a defaulting rule.
    #[must_use]
    pub fn imap_host(&self) -> &str {
        self.imap_host.as_deref().unwrap_or(&self.smtp_host)
    }

    /// Resolves configuration from the process environment and the
    /// default config file location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] when no source has
    /// configuration, or the first source's own failure otherwise.
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let path = env
            .get(CONFIG_PATH_VAR)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        Self::resolve(&[&EnvSource::new(env.clone()), &FileSource::new(&path)], &path)
    }

    /// Runs the source chain, taking the first hit.
    ///
    /// # Errors
    ///
    /// Propagates the first source failure, or returns
    /// [`Error::ConfigNotFound`] naming `expected_path` when every
    /// source comes up empty.
    pub fn resolve(sources: &[&dyn ConfigSource], expected_path: &Path) -> Result<Self> {
        for source in sources {
            if let Some(config) = source.resolve()? {
                return Ok(config);
            }
        }
        Err(Error::ConfigNotFound {
            path: expected_path.to_path_buf(),
        })
    }
}

/// One step of the configuration resolution chain.
pub trait ConfigSource {
    /// Returns `Ok(Some(_))` on a hit, `Ok(None)` when this source has
    /// nothing, and an error when the source exists but is unusable.
    fn resolve(&self) -> Result<Option<Config>>;
}

/// Environment-variable configuration source.
///
/// Applies only when both `SMTP_HOST` and `SMTP_USERNAME` are set.
#[derive(Debug, Clone)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Creates a source over an environment snapshot.
    #[must_use]
    pub const fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl ConfigSource for EnvSource {
    fn resolve(&self) -> Result<Option<Config>> {
        let (Some(smtp_host), Some(username)) = (self.get("SMTP_HOST"), self.get("SMTP_USERNAME"))
        else {
            return Ok(None);
        };

        info!("loading configuration from environment variables");

        let smtp_port = match self.get("SMTP_PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| Error::ConfigInvalid { field: "SMTP_PORT" })?,
            None => DEFAULT_SMTP_PORT,
        };
        let imap_port = match self.get("IMAP_PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| Error::ConfigInvalid { field: "IMAP_PORT" })?,
            None => DEFAULT_IMAP_PORT,
        };

        Ok(Some(Config {
            smtp_host: smtp_host.to_string(),
            smtp_port,
            smtp_use_tls: flag(self.get("SMTP_USE_TLS"), false),
            username: username.to_string(),
            password: self.get("SMTP_PASSWORD").unwrap_or_default().to_string(),
            imap_host: self.get("IMAP_HOST").map(str::to_string),
            imap_port,
            save_to_sent: flag(self.get("SAVE_TO_SENT"), true),
            sent_folder: self
                .get("SENT_FOLDER")
                .unwrap_or(DEFAULT_SENT_FOLDER)
                .to_string(),
        }))
    }
}

fn flag(value: Option<&str>, default: bool) -> bool {
    value.map_or(default, |v| v.eq_ignore_ascii_case("true"))
}

/// JSON config file source.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Creates a source for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Raw file form; required fields are checked after parsing so a
/// missing field is reported by name rather than as a parse failure.
#[derive(Debug, Deserialize)]
struct FileConfig {
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_use_tls: Option<bool>,
    username: Option<String>,
    password: Option<String>,
    imap_host: Option<String>,
    imap_port: Option<u16>,
    save_to_sent: Option<bool>,
    sent_folder: Option<String>,
}

impl ConfigSource for FileSource {
    fn resolve(&self) -> Result<Option<Config>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::ConfigUnreadable {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        info!(path = %self.path.display(), "loading configuration from file");

        let file: FileConfig =
            serde_json::from_str(&raw).map_err(|source| Error::ConfigMalformed {
                path: self.path.clone(),
                source,
            })?;

        let smtp_host = file
            .smtp_host
            .ok_or(Error::ConfigIncomplete { field: "smtp_host" })?;
        let smtp_port = file
            .smtp_port
            .ok_or(Error::ConfigIncomplete { field: "smtp_port" })?;
        let smtp_use_tls = file.smtp_use_tls.ok_or(Error::ConfigIncomplete {
            field: "smtp_use_tls",
        })?;
        let username = file
            .username
            .ok_or(Error::ConfigIncomplete { field: "username" })?;
        let password = file
            .password
            .ok_or(Error::ConfigIncomplete { field: "password" })?;

        Ok(Some(Config {
            smtp_host,
            smtp_port,
            smtp_use_tls,
            username,
            password,
            imap_host: file.imap_host,
            imap_port: file.imap_port.unwrap_or(DEFAULT_IMAP_PORT),
            save_to_sent: file.save_to_sent.unwrap_or(true),
            sent_folder: file.sent_folder.unwrap_or_else(|| DEFAULT_SENT_FOLDER.into()),
        }))
    }
}
