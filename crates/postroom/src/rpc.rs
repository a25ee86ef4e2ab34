//! JSON-RPC 2.0 message handling for the MCP stdio transport.
//!
//! One request per line in, at most one response per line out.
//! Notifications (no `id`) never produce a response, including unknown
//! ones. Malformed JSON gets a parse-error response with a null id.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::tool;

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Handles one incoming line; returns the serialized response, if any.
pub async fn handle_line(line: &str) -> Option<String> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "discarding unparseable request");
            return Some(error_response(
                Value::Null,
                PARSE_ERROR,
                &format!("parse error: {err}"),
            ));
        }
    };

    debug!(method = %request.method, "handling request");

    match request.method.as_str() {
        "initialize" => Some(result_response(request.id?, initialize_result())),
        "ping" => Some(result_response(request.id?, json!({}))),
        "tools/list" => Some(result_response(
            request.id?,
            json!({ "tools": [tool::descriptor()] }),
        )),
        "tools/call" => Some(handle_call(request.id?, request.params).await),
        method if method.starts_with("notifications/") => None,
        method => {
            warn!(method, "unknown method");
            let id = request.id?;
            Some(error_response(
                id,
                METHOD_NOT_FOUND,
                &format!("method not found: {method}"),
            ))
        }
    }
}

async fn handle_call(id: Value, params: Value) -> String {
    let params: CallParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(err) => {
            return error_response(id, INVALID_PARAMS, &format!("invalid params: {err}"));
        }
    };

    if params.name != tool::NAME {
        return error_response(
            id,
            INVALID_PARAMS,
            &format!("unknown tool: {}", params.name),
        );
    }

    let text = tool::send_email(&params.arguments).await;
    result_response(
        id,
        json!({ "content": [{ "type": "text", "text": text }] }),
    )
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn result_response(id: Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

fn error_response(id: Value, code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
    .to_string()
}
