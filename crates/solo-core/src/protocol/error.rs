//! The closed JSON-RPC error taxonomy.
//!
//! Every failure a remote caller can observe is one of these kinds. The code
//! and message of each kind are fixed; `details` carries the context of the
//! particular failure and `explanation` a fixed description of the kind.

use crate::config::ProtocolConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Kind of a protocol-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    InvalidRequest,
    NotFound,
    InvalidParams,
    Internal,
    Unimplemented,
    /// A code this implementation does not list, as received from a peer.
    Protocol { code: i64 },
}

impl ErrorKind {
    pub fn code(self) -> i64 {
        match self {
            ErrorKind::Parse => ProtocolConfig::PARSE_ERROR,
            ErrorKind::InvalidRequest => ProtocolConfig::INVALID_REQUEST,
            ErrorKind::NotFound => ProtocolConfig::METHOD_NOT_FOUND,
            ErrorKind::InvalidParams => ProtocolConfig::INVALID_PARAMS,
            ErrorKind::Internal => ProtocolConfig::INTERNAL_ERROR,
            ErrorKind::Unimplemented => ProtocolConfig::UNIMPLEMENTED,
            ErrorKind::Protocol { code } => code,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::Parse => "Parse Error",
            ErrorKind::InvalidRequest => "Invalid Request",
            ErrorKind::NotFound => "Method not found",
            ErrorKind::InvalidParams => "Invalid params",
            ErrorKind::Internal => "Internal error",
            ErrorKind::Unimplemented => "Not implemented",
            ErrorKind::Protocol { .. } => "Server error",
        }
    }

    /// Fixed description of the kind, sent as `data.explanation`.
    pub fn explanation(self) -> &'static str {
        match self {
            ErrorKind::Parse => {
                "Invalid JSON was received by the server. An error occurred on the \
                 server while parsing the JSON text."
            }
            ErrorKind::InvalidRequest => "The JSON sent is not a valid Request object.",
            ErrorKind::NotFound => "The method does not exist / is not available.",
            ErrorKind::InvalidParams => "Invalid method parameter(s).",
            ErrorKind::Internal => "Internal JSON-RPC error.",
            ErrorKind::Unimplemented => "The requested feature is not implemented.",
            ErrorKind::Protocol { .. } => "Generic JSON-RPC error.",
        }
    }

    /// Map a wire code back onto a kind. Unlisted codes stay generic.
    pub fn from_code(code: i64) -> Self {
        match code {
            ProtocolConfig::PARSE_ERROR => ErrorKind::Parse,
            ProtocolConfig::INVALID_REQUEST => ErrorKind::InvalidRequest,
            ProtocolConfig::METHOD_NOT_FOUND => ErrorKind::NotFound,
            ProtocolConfig::INVALID_PARAMS => ErrorKind::InvalidParams,
            ProtocolConfig::INTERNAL_ERROR => ErrorKind::Internal,
            ProtocolConfig::UNIMPLEMENTED => ErrorKind::Unimplemented,
            other => ErrorKind::Protocol { code: other },
        }
    }
}

/// A protocol-visible failure: a kind plus the details of this occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} ({}): {details}", .kind.message(), .kind.code())]
pub struct RpcError {
    pub kind: ErrorKind,
    pub details: String,
}

/// JSON-RPC 2.0 error object as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

/// The structured `data` member of an error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub details: String,
}

impl RpcError {
    pub fn new(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }

    pub fn parse(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, details)
    }

    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, details)
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, details)
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, details)
    }

    pub fn unimplemented(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unimplemented, details)
    }

    pub fn code(&self) -> i64 {
        self.kind.code()
    }

    /// Build the wire error object for this failure.
    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject {
            code: self.kind.code(),
            message: self.kind.message().to_string(),
            data: Some(ErrorData {
                explanation: self.kind.explanation().to_string(),
                details: self.details.clone(),
            }),
        }
    }

    /// Reconstruct a failure from a wire error object.
    ///
    /// Only `code` and `data.details` are trusted; message and explanation
    /// are fixed per kind and are regenerated rather than copied.
    pub fn from_error_object(object: &ErrorObject) -> Self {
        let details = object
            .data
            .as_ref()
            .map(|data| data.details.clone())
            .unwrap_or_default();
        Self::new(ErrorKind::from_code(object.code), details)
    }

    /// Lenient variant of [`RpcError::from_error_object`] for arbitrary JSON.
    ///
    /// A missing or non-integer code yields the generic protocol kind.
    pub fn from_error_value(value: &Value) -> Self {
        let code = value
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or(ProtocolConfig::GENERIC_ERROR);
        let details = value
            .get("data")
            .and_then(|data| data.get("details"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Self::new(ErrorKind::from_code(code), details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codes_and_messages() {
        let table = [
            (ErrorKind::Parse, -32700, "Parse Error"),
            (ErrorKind::InvalidRequest, -32600, "Invalid Request"),
            (ErrorKind::NotFound, -32601, "Method not found"),
            (ErrorKind::InvalidParams, -32602, "Invalid params"),
            (ErrorKind::Internal, -32603, "Internal error"),
            (ErrorKind::Unimplemented, ProtocolConfig::UNIMPLEMENTED, "Not implemented"),
        ];
        for (kind, code, message) in table {
            assert_eq!(kind.code(), code);
            assert_eq!(kind.message(), message);
            assert_eq!(ErrorKind::from_code(code), kind);
        }
    }

    #[test]
    fn test_error_object_shape() {
        let err = RpcError::parse("invalid json: 'blah!$'");
        let value = serde_json::to_value(err.to_error_object()).unwrap();
        assert_eq!(
            value,
            json!({
                "code": -32700,
                "message": "Parse Error",
                "data": {
                    "explanation": ErrorKind::Parse.explanation(),
                    "details": "invalid json: 'blah!$'"
                }
            })
        );
    }

    #[test]
    fn test_unlisted_code_is_generic() {
        let object = ErrorObject {
            code: -32050,
            message: "Whatever the peer said".into(),
            data: Some(ErrorData {
                explanation: "ignored".into(),
                details: "disk on fire".into(),
            }),
        };
        let err = RpcError::from_error_object(&object);
        assert_eq!(err.kind, ErrorKind::Protocol { code: -32050 });
        assert_eq!(err.details, "disk on fire");
        assert_eq!(err.kind.message(), "Server error");
    }

    #[test]
    fn test_error_value_without_data() {
        let err = RpcError::from_error_value(&json!({"code": -32601, "message": "Method not found"}));
        assert_eq!(err, RpcError::not_found(""));

        let err = RpcError::from_error_value(&json!({"message": "no code at all"}));
        assert_eq!(err.kind.code(), ProtocolConfig::GENERIC_ERROR);
    }

    #[test]
    fn test_display() {
        let err = RpcError::internal("division by zero");
        assert_eq!(err.to_string(), "Internal error (-32603): division by zero");
    }
}
