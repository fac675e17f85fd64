//! Envelope codec.
//!
//! Builds the four envelope shapes as text and decodes incoming text into a
//! JSON document. Field order on the wire is `jsonrpc`, then the payload
//! member, then `id`.

use super::error::{ErrorObject, RpcError};
use crate::config::ProtocolConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

/// Request parameters: positional or keyword, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<Value>),
    Keyword(Map<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    /// Pick the first non-empty of the two, positional first.
    pub fn first_non_empty(
        positional: Option<Vec<Value>>,
        keyword: Option<Map<String, Value>>,
    ) -> Option<Self> {
        match (positional, keyword) {
            (Some(values), _) if !values.is_empty() => Some(Params::Positional(values)),
            (_, Some(map)) if !map.is_empty() => Some(Params::Keyword(map)),
            _ => None,
        }
    }

    /// Interpret a `params` member. Scalars are not valid params.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(values) => Some(Params::Positional(values)),
            Value::Object(map) => Some(Params::Keyword(map)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(values) => values.is_empty(),
            Params::Keyword(map) => map.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Keyword(map) => map.len(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Keyword(map)
    }
}

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

#[derive(Serialize)]
struct ResultEnvelope<'a> {
    jsonrpc: &'static str,
    result: &'a Value,
    id: i64,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    jsonrpc: &'static str,
    error: ErrorObject,
    id: Option<i64>,
}

/// Last-resort envelope when serialization itself fails.
const FALLBACK_ERROR: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"},"id":null}"#;

fn to_text<T: Serialize>(envelope: &T) -> String {
    match serde_json::to_string(envelope) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize envelope: {}", e);
            FALLBACK_ERROR.to_string()
        }
    }
}

/// Encode a request, or a notification when `id` is `None`.
///
/// Empty params are omitted from the envelope.
pub fn encode_request(method: &str, params: Option<&Params>, id: Option<i64>) -> String {
    to_text(&RequestEnvelope {
        jsonrpc: ProtocolConfig::VERSION,
        method,
        params: params.filter(|p| !p.is_empty()),
        id,
    })
}

/// Encode a successful response.
pub fn encode_result(id: i64, result: &Value) -> String {
    to_text(&ResultEnvelope {
        jsonrpc: ProtocolConfig::VERSION,
        result,
        id,
    })
}

/// Encode an error response. `None` is written as a JSON `null` id.
pub fn encode_error(error: &RpcError, id: Option<i64>) -> String {
    to_text(&ErrorEnvelope {
        jsonrpc: ProtocolConfig::VERSION,
        error: error.to_error_object(),
        id,
    })
}

/// Decode envelope text into a JSON document.
pub fn decode(text: &str) -> Result<Value, RpcError> {
    serde_json::from_str(text).map_err(|e| RpcError::parse(e.to_string()))
}
