//! `postroom` - MCP stdio server for sending email.
//!
//! Speaks JSON-RPC 2.0 over stdin/stdout, one message per line, and
//! advertises a single `send_email` tool. Logs go to stderr; stdout is
//! reserved for the protocol.

#![forbid(unsafe_code)]

mod rpc;
mod tool;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, stdin, stdout};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postroom=info,postroom_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("starting postroom MCP server");

    let mut lines = BufReader::new(stdin()).lines();
    let mut out = stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = rpc::handle_line(line).await {
            out.write_all(response.as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await?;
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}
