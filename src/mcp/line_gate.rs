use rmcp::model::ErrorCode;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

const JSONRPC_VERSION: &str = "2.0";
const SESSION_METHODS: [&str; 3] = ["ping", "tools/list", "tools/call"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingInitialize,
    AwaitingInitialized,
    Ready,
}

/// What to do with one line read from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Screened {
    /// Hand the trimmed message to the MCP service.
    Forward(String),
    /// Answer the client directly; the service never sees the line.
    Reply(Value),
    Drop,
}

/// Screens raw stdin lines before they reach the MCP service, which ends
/// the session on a message it cannot decode. Tracks the initialize
/// handshake so requests only arrive once the service can take them.
#[derive(Debug)]
pub struct LineGate {
    phase: Phase,
}

impl Default for LineGate {
    fn default() -> Self {
        Self {
            phase: Phase::AwaitingInitialize,
        }
    }
}

impl LineGate {
    pub fn screen(&mut self, raw: &[u8]) -> Screened {
        let Ok(text) = std::str::from_utf8(raw) else {
            warn!(bytes = raw.len(), "discarding line that is not valid UTF-8");
            return Screened::Reply(error_reply(
                Value::Null,
                ErrorCode::PARSE_ERROR,
                "message is not valid UTF-8",
            ));
        };
        let text = text.trim();
        if text.is_empty() {
            return Screened::Drop;
        }

        let message: Value = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "discarding unparseable message");
                return Screened::Reply(error_reply(
                    Value::Null,
                    ErrorCode::PARSE_ERROR,
                    format!("parse error: {error}"),
                ));
            }
        };
        let Some(object) = message.as_object() else {
            return Screened::Reply(error_reply(
                Value::Null,
                ErrorCode::INVALID_REQUEST,
                "expected a JSON-RPC object",
            ));
        };

        let id = match object.get("id") {
            None => None,
            Some(id) if id.is_string() || id.is_i64() || id.is_u64() => Some(id.clone()),
            Some(_) => {
                return Screened::Reply(error_reply(
                    Value::Null,
                    ErrorCode::INVALID_REQUEST,
                    "id must be a string or an integer",
                ));
            }
        };

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return reject(id, ErrorCode::INVALID_REQUEST, "jsonrpc must be \"2.0\"");
        }

        let Some(method) = object.get("method").and_then(Value::as_str) else {
            if object.contains_key("result") || object.contains_key("error") {
                debug!("ignoring response from client");
                return Screened::Drop;
            }
            return reject(id, ErrorCode::INVALID_REQUEST, "method is required");
        };

        debug!(method, id = ?id, "received message");
        let forward = || Screened::Forward(text.to_string());
        match (self.phase, method) {
            (Phase::AwaitingInitialize, "initialize") => {
                if id.is_none() {
                    return Screened::Drop;
                }
                if let Err(reason) = check_initialize(object.get("params")) {
                    return reject(id, ErrorCode::INVALID_PARAMS, reason);
                }
                self.phase = Phase::AwaitingInitialized;
                forward()
            }
            (_, "initialize") => reject(id, ErrorCode::INVALID_REQUEST, "session is already initialized"),
            (Phase::AwaitingInitialize, _) => {
                reject(id, ErrorCode::INVALID_REQUEST, "initialize must be the first request")
            }
            (Phase::AwaitingInitialized, "notifications/initialized") => {
                self.phase = Phase::Ready;
                forward()
            }
            (Phase::AwaitingInitialized, _) => reject(
                id,
                ErrorCode::INVALID_REQUEST,
                "waiting for notifications/initialized",
            ),
            (Phase::Ready, method) if id.is_none() => {
                debug!(method, "ignoring notification");
                Screened::Drop
            }
            (Phase::Ready, method) if SESSION_METHODS.contains(&method) => {
                match check_session_params(method, object.get("params")) {
                    Ok(()) => forward(),
                    Err(reason) => reject(id, ErrorCode::INVALID_PARAMS, reason),
                }
            }
            (Phase::Ready, method) => reject(
                id,
                ErrorCode::METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            ),
        }
    }
}

/// Notifications never get a reply, even when they are wrong.
fn reject(id: Option<Value>, code: ErrorCode, message: impl Into<String>) -> Screened {
    match id {
        Some(id) => Screened::Reply(error_reply(id, code, message)),
        None => Screened::Drop,
    }
}

pub fn error_reply(id: Value, code: ErrorCode, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": code.0, "message": message.into() }
    })
}

fn params_object(params: Option<&Value>) -> Result<Option<&Map<String, Value>>, String> {
    match params {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(_) => Err("params must be an object".to_string()),
    }
}

fn check_initialize(params: Option<&Value>) -> Result<(), String> {
    let params = params_object(params)?.ok_or("initialize requires params")?;
    if !params.get("protocolVersion").is_some_and(Value::is_string) {
        return Err("protocolVersion is required".to_string());
    }
    if !params.get("capabilities").is_some_and(Value::is_object) {
        return Err("capabilities is required".to_string());
    }
    let client_info = params
        .get("clientInfo")
        .and_then(Value::as_object)
        .ok_or("clientInfo is required")?;
    if !["name", "version"]
        .iter()
        .all(|key| client_info.get(*key).is_some_and(Value::is_string))
    {
        return Err("clientInfo needs name and version".to_string());
    }
    Ok(())
}

fn check_session_params(method: &str, params: Option<&Value>) -> Result<(), String> {
    let params = params_object(params)?;
    if method != "tools/call" {
        return Ok(());
    }
    let params = params.ok_or("tools/call requires params")?;
    if !params.get("name").is_some_and(Value::is_string) {
        return Err("tools/call requires a tool name".to_string());
    }
    match params.get("arguments") {
        None | Some(Value::Null) | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err("arguments must be an object".to_string()),
    }
}
