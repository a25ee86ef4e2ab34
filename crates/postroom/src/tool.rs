//! The `send_email` tool: schema, handler and error-to-text mapping.
//!
//! The tool never propagates a failure past the boundary. Every error,
//! from a missing config file to a rejected recipient, becomes a text
//! result prefixed with `Error: `.

use serde_json::{Value, json};
use tracing::warn;

use postroom_core::{Config, dispatch};

/// Advertised tool name.
pub const NAME: &str = "send_email";

/// The tool entry for `tools/list`.
pub fn descriptor() -> Value {
    json!({
        "name": NAME,
        "description": "Send an email via SMTP. Supports multiple recipients (comma-separated).",
        "inputSchema": {
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Recipient email address(es), comma-separated for multiple recipients",
                },
                "subject": {
                    "type": "string",
                    "description": "Email subject line",
                },
                "body": {
                    "type": "string",
                    "description": "Plain text email body",
                },
                "cc": {
                    "type": "string",
                    "description": "CC recipient(s), comma-separated for multiple (optional)",
                },
            },
            "required": ["to", "subject", "body"],
        },
    })
}

/// Runs one send and renders the outcome as the tool's text result.
pub async fn send_email(arguments: &Value) -> String {
    let to = argument(arguments, "to");
    let cc = argument(arguments, "cc");
    let subject = argument(arguments, "subject");
    let body = argument(arguments, "body");

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "configuration unavailable");
            return format!("Error: {err}");
        }
    };

    match dispatch::send(&config, to, cc, subject, body).await {
        Ok(report) => success_text(&report.to, &report.cc),
        Err(err) => {
            warn!(error = %err, "send_email failed");
            format!("Error: {err}")
        }
    }
}

/// Missing or non-string arguments are treated as empty, which routes
/// them into the normal validation errors.
fn argument<'a>(arguments: &'a Value, key: &str) -> &'a str {
    arguments.get(key).and_then(Value::as_str).unwrap_or("")
}

fn success_text(to: &[String], cc: &[String]) -> String {
    let mut text = format!("Email sent successfully to {}", to.join(", "));
    if !cc.is_empty() {
        text.push_str(&format!(" (CC: {})", cc.join(", ")));
    }
    text
}
