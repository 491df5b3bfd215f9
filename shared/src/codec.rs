use serde_json::Value;
use thiserror::Error;

use crate::Message;

const KNOWN_KINDS: [&str; 4] = ["command", "state", "text", "landscape"];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload has no string `type` field")]
    MissingType,
    #[error("malformed `{kind}` message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes one text frame.
///
/// Returns `Ok(None)` for a well-formed envelope whose `type` this protocol
/// does not know; receivers ignore those without logging. Everything else
/// that fails to decode is an error the caller logs and drops.
pub fn decode_message(payload: &str) -> Result<Option<Message>, ProtocolError> {
    let value: Value = serde_json::from_str(payload)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !KNOWN_KINDS.contains(&kind) {
        return Ok(None);
    }
    let kind = kind.to_string();
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| ProtocolError::Malformed { kind, source })
}

pub fn encode_message(message: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}
