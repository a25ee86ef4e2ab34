//! TLS connection setup for IMAP sessions.
//!
//! Archival sessions are always implicit TLS (port 993); there is no
//! plaintext or STARTTLS path here.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::error::{Error, Result};

/// Connects to an IMAP server with TLS active from the first byte.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails, or the
/// TCP connect does not complete within `timeout`.
pub async fn connect_tls(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TlsStream<TcpStream>> {
    let addr = format!("{host}:{port}");
    let tcp = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(result) => result?,
        Err(_) => return Err(Error::ConnectTimeout(timeout)),
    };

    let connector = tls_connector();
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = connector.connect(server_name, tcp).await?;

    Ok(tls)
}

/// Creates a TLS connector backed by the webpki root store.
fn tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
