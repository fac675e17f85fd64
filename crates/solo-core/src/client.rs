//! Client-role hooks.
//!
//! [`PendingCalls`] correlates incoming responses and error responses with
//! the requests a client sent, handing each outcome to whoever awaits it.

use crate::protocol::{ErrorResponse, Hooks, Response, RpcError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

/// Result of one call as seen by the client.
pub type CallOutcome = std::result::Result<Value, RpcError>;

/// Outstanding calls keyed by request id.
#[derive(Debug, Default)]
pub struct PendingCalls {
    waiting: Mutex<HashMap<i64, oneshot::Sender<CallOutcome>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the outcome of request `id`.
    pub async fn expect(&self, id: i64) -> oneshot::Receiver<CallOutcome> {
        let (sender, receiver) = oneshot::channel();
        self.waiting.lock().await.insert(id, sender);
        receiver
    }

    pub async fn outstanding(&self) -> usize {
        self.waiting.lock().await.len()
    }

    async fn settle(&self, id: i64, outcome: CallOutcome) -> Result<(), RpcError> {
        let Some(sender) = self.waiting.lock().await.remove(&id) else {
            return Err(RpcError::invalid_request(format!(
                "no outstanding call with id {}",
                id
            )));
        };
        if sender.send(outcome).is_err() {
            debug!("Caller for id {} stopped waiting", id);
        }
        Ok(())
    }
}

#[async_trait]
impl Hooks for PendingCalls {
    async fn on_response(&self, response: Response) -> Result<(), RpcError> {
        let id = response
            .id
            .as_i64()
            .ok_or_else(|| RpcError::invalid_request("id in result must be an integer"))?;
        self.settle(id, Ok(response.result)).await
    }

    async fn on_error(&self, response: ErrorResponse) -> Result<(), RpcError> {
        match response.id {
            Some(id) => self.settle(id, Err(response.error)).await,
            // Not tied to any call (e.g. a parse error): surface it as is.
            None => Err(response.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_error, encode_result, ErrorKind, IdPolicy, JsonRpc};
    use serde_json::json;

    #[tokio::test]
    async fn test_response_settles_call() {
        let engine = JsonRpc::new();
        let calls = PendingCalls::new();

        let (_request, id) = engine.encode_request("add", IdPolicy::Auto, None);
        let id = id.unwrap();
        let outcome = calls.expect(id).await;

        let processed = engine
            .process_incoming(&encode_result(id, &json!(4)), &calls)
            .await;
        assert!(processed.response.is_none());
        assert_eq!(outcome.await.unwrap(), Ok(json!(4)));
        assert_eq!(calls.outstanding().await, 0);
    }

    #[tokio::test]
    async fn test_error_settles_call() {
        let engine = JsonRpc::new();
        let calls = PendingCalls::new();
        let outcome = calls.expect(8).await;

        let text = encode_error(&RpcError::not_found("unknown method 'nope'"), Some(8));
        engine.process_incoming(&text, &calls).await;

        let err = outcome.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.details, "unknown method 'nope'");
    }

    #[tokio::test]
    async fn test_unsolicited_messages_are_reported() {
        let engine = JsonRpc::new();
        let calls = PendingCalls::new();

        let processed = engine
            .process_incoming(&encode_result(99, &json!(true)), &calls)
            .await;
        assert!(processed.response.is_none());
        assert_eq!(processed.error.map(|e| e.kind), Some(ErrorKind::InvalidRequest));

        let processed = engine
            .process_incoming(&encode_error(&RpcError::parse("bad"), None), &calls)
            .await;
        assert_eq!(processed.error, Some(RpcError::parse("bad")));
    }
}
