//! Server-role hooks: hand requests and notifications to an invoker.

use super::engine::{Hooks, Request};
use super::error::RpcError;
use crate::invoke::Invoke;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Serves requests and notifications from an [`Invoke`] implementation.
///
/// Invocation failures become `NotFoundError`, `InvalidParamsError` or
/// `InternalError`. Notification failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct InvokeHooks<I> {
    invoker: I,
}

impl<I: Invoke> InvokeHooks<I> {
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }
}

#[async_trait]
impl<I: Invoke> Hooks for InvokeHooks<I> {
    async fn on_request(&self, request: Request) -> Result<Value, RpcError> {
        debug!("RPC call: {}({:?})", request.method, request.params);
        self.invoker
            .invoke(&request.method, request.params.unwrap_or_default())
            .await
            .map_err(RpcError::from)
    }

    async fn on_notification(&self, notification: Request) {
        debug!("RPC notification: {}", notification.method);
        if let Err(e) = self
            .invoker
            .invoke(&notification.method, notification.params.unwrap_or_default())
            .await
        {
            debug!("Notification '{}' failed: {}", notification.method, e);
        }
    }
}
