//! Classification, validation and dispatch of incoming envelopes.
//!
//! The engine performs no I/O. It turns one piece of incoming text into at
//! most one piece of outgoing text, calling the [`Hooks`] it is given for
//! each well-formed request, notification, response or error response.

use super::codec::{decode, encode_error, encode_request, encode_result, Params};
use super::error::RpcError;
use crate::config::ProtocolConfig;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// A validated request or notification (`id` is `None` for notifications).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Option<Params>,
    pub id: Option<i64>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A successful response received in the client role.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub result: Value,
    pub id: Value,
}

/// An error response received in the client role.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: RpcError,
    pub id: Option<i64>,
}

/// Handlers for each classification of incoming envelope.
///
/// Defaults reject with [`RpcError::unimplemented`] so that a pure server
/// only overrides the request side and a pure client only the response side.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Serve a request. The returned value becomes the `result` member.
    async fn on_request(&self, request: Request) -> Result<Value, RpcError> {
        Err(RpcError::unimplemented(format!(
            "requests are not served here (method '{}')",
            request.method
        )))
    }

    /// Serve a notification. Nothing is ever sent back.
    async fn on_notification(&self, _notification: Request) {}

    async fn on_response(&self, _response: Response) -> Result<(), RpcError> {
        Err(RpcError::unimplemented("responses are not accepted here"))
    }

    async fn on_error(&self, _response: ErrorResponse) -> Result<(), RpcError> {
        Err(RpcError::unimplemented("error responses are not accepted here"))
    }
}

/// How a request id is chosen when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Take the next value of the engine's counter.
    Auto,
    Explicit(i64),
    /// No id at all: the request is a notification.
    Notification,
}

/// Outcome of processing one piece of incoming text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Processed {
    /// Text to send back, if any.
    pub response: Option<String>,
    /// The failure behind the response, if there was one.
    pub error: Option<RpcError>,
}

impl Processed {
    fn nothing() -> Self {
        Self::default()
    }

    fn reply(text: String) -> Self {
        Self {
            response: Some(text),
            error: None,
        }
    }

    fn failure(error: RpcError, id: Option<i64>) -> Self {
        Self {
            response: Some(encode_error(&error, id)),
            error: Some(error),
        }
    }

    fn silent_failure(error: RpcError) -> Self {
        Self {
            response: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 protocol engine.
///
/// Holds the request id counter, which is shared by every request this
/// instance encodes and is never reset.
#[derive(Debug, Default)]
pub struct JsonRpc {
    next_id: AtomicI64,
    batch_support: bool,
}

impl JsonRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process non-empty batches instead of rejecting them as unimplemented.
    pub fn with_batch_support(mut self, enabled: bool) -> Self {
        self.batch_support = enabled;
        self
    }

    pub fn batch_support(&self) -> bool {
        self.batch_support
    }

    /// Encode a request and return it with the id it was given.
    pub fn encode_request(
        &self,
        method: &str,
        id: IdPolicy,
        params: Option<&Params>,
    ) -> (String, Option<i64>) {
        let id = match id {
            IdPolicy::Auto => Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
            IdPolicy::Explicit(id) => Some(id),
            IdPolicy::Notification => None,
        };
        (encode_request(method, params, id), id)
    }

    /// Convenience wrapper taking both parameter forms; positional wins.
    pub fn request(
        &self,
        method: &str,
        id: IdPolicy,
        positional: Option<Vec<Value>>,
        keyword: Option<Map<String, Value>>,
    ) -> (String, Option<i64>) {
        let params = Params::first_non_empty(positional, keyword);
        self.encode_request(method, id, params.as_ref())
    }

    /// Classify, validate and dispatch one piece of incoming text.
    pub async fn process_incoming<H>(&self, text: &str, hooks: &H) -> Processed
    where
        H: Hooks + ?Sized,
    {
        let document = match decode(text) {
            Ok(document) => document,
            Err(e) => return Processed::failure(e, None),
        };

        match document {
            Value::Array(items) => self.process_batch(items, hooks).await,
            document => self.process_envelope(document, hooks).await,
        }
    }

    async fn process_batch<H>(&self, items: Vec<Value>, hooks: &H) -> Processed
    where
        H: Hooks + ?Sized,
    {
        if items.is_empty() {
            return Processed::failure(RpcError::invalid_request("Sent an empty batch"), None);
        }
        if !self.batch_support {
            return Processed::failure(
                RpcError::unimplemented("Batch requests are not supported"),
                None,
            );
        }

        let mut replies = Vec::with_capacity(items.len());
        let mut first_error = None;
        for item in items {
            let processed = self.process_envelope(item, hooks).await;
            if first_error.is_none() {
                first_error = processed.error;
            }
            replies.extend(processed.response);
        }

        Processed {
            response: (!replies.is_empty()).then(|| format!("[{}]", replies.join(","))),
            error: first_error,
        }
    }

    async fn process_envelope<H>(&self, document: Value, hooks: &H) -> Processed
    where
        H: Hooks + ?Sized,
    {
        let Value::Object(mut envelope) = document else {
            return Processed::failure(
                RpcError::invalid_request("Missing or invalid rpc spec information"),
                None,
            );
        };

        if envelope.get("jsonrpc").and_then(Value::as_str) != Some(ProtocolConfig::VERSION) {
            return Processed::failure(
                RpcError::invalid_request("Missing or invalid rpc spec information"),
                None,
            );
        }

        if envelope.contains_key("method") {
            self.process_call(envelope, hooks).await
        } else if envelope.contains_key("result") {
            let Some(id) = envelope.remove("id") else {
                return Processed::failure(RpcError::invalid_request("Missing ID in result"), None);
            };
            if envelope.contains_key("error") {
                return Processed::failure(
                    RpcError::invalid_request("Result contains a result and an error field"),
                    None,
                );
            }
            let result = envelope.remove("result").unwrap_or(Value::Null);
            match hooks.on_response(Response { result, id }).await {
                Ok(()) => Processed::nothing(),
                Err(e) => Processed::silent_failure(e),
            }
        } else if let Some(error) = envelope.get("error") {
            let response = ErrorResponse {
                error: RpcError::from_error_value(error),
                id: envelope.get("id").and_then(Value::as_i64),
            };
            match hooks.on_error(response).await {
                Ok(()) => Processed::nothing(),
                Err(e) => Processed::silent_failure(e),
            }
        } else {
            Processed::failure(
                RpcError::invalid_request("Envelope has no method, result or error"),
                None,
            )
        }
    }

    async fn process_call<H>(&self, mut envelope: Map<String, Value>, hooks: &H) -> Processed
    where
        H: Hooks + ?Sized,
    {
        let method = envelope.remove("method").unwrap_or(Value::Null);
        let params = envelope.remove("params");

        let Some(id) = envelope.get("id") else {
            self.process_notification(method, params, hooks).await;
            return Processed::nothing();
        };

        let id = match id.as_i64() {
            Some(id) => id,
            // Ids are signed 64-bit; larger unsigned ones get their own message.
            None if id.is_u64() => {
                return Processed::failure(
                    RpcError::invalid_request("id in request is out of range"),
                    None,
                )
            }
            None => {
                return Processed::failure(
                    RpcError::invalid_request("id in request must be an integer"),
                    None,
                )
            }
        };

        let method = match method {
            Value::Number(_) => {
                return Processed::failure(
                    RpcError::invalid_request("method cannot be a number"),
                    Some(id),
                )
            }
            Value::String(method) => method,
            _ => {
                return Processed::failure(
                    RpcError::invalid_request("method name has to be a string"),
                    Some(id),
                )
            }
        };
        if method.is_empty() {
            return Processed::failure(RpcError::invalid_request("method cannot be empty"), Some(id));
        }
        if method.starts_with(char::is_numeric) {
            return Processed::failure(
                RpcError::invalid_request("method cannot start with a number"),
                Some(id),
            );
        }

        let params = match params.map(Params::from_value) {
            None => None,
            Some(Some(params)) => Some(params),
            Some(None) => {
                return Processed::failure(
                    RpcError::invalid_request("params must be an array or an object"),
                    Some(id),
                )
            }
        };

        let request = Request {
            method,
            params,
            id: Some(id),
        };
        match hooks.on_request(request).await {
            Ok(result) => Processed::reply(encode_result(id, &result)),
            Err(e) => Processed::failure(e, Some(id)),
        }
    }

    async fn process_notification<H>(&self, method: Value, params: Option<Value>, hooks: &H)
    where
        H: Hooks + ?Sized,
    {
        let Value::String(method) = method else {
            debug!("Dropping notification with a non-string method");
            return;
        };
        let params = match params.map(Params::from_value) {
            None => None,
            Some(Some(params)) => Some(params),
            Some(None) => {
                debug!("Dropping notification '{}' with scalar params", method);
                return;
            }
        };
        hooks
            .on_notification(Request {
                method,
                params,
                id: None,
            })
            .await;
    }
}
