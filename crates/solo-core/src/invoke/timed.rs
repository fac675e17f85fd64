//! Per-call time budget.

use super::{Invoke, InvokeError};
use crate::protocol::Params;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Races every call of the wrapped invoker against a timer.
///
/// When the timer wins, the call's future is dropped and the caller gets
/// [`InvokeError::Timeout`]. Whatever the operation was doing outside its
/// future (spawned work, blocking threads) is not undone.
#[derive(Debug, Clone)]
pub struct TimedInvoker<I> {
    inner: I,
    timeout: Duration,
}

impl<I> TimedInvoker<I> {
    pub fn new(inner: I, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

#[async_trait]
impl<I: Invoke> Invoke for TimedInvoker<I> {
    async fn invoke(&self, method: &str, params: Params) -> Result<Value, InvokeError> {
        tokio::select! {
            result = self.inner.invoke(method, params) => result,
            _ = tokio::time::sleep(self.timeout) => {
                warn!("Call to '{}' exceeded {:?}", method, self.timeout);
                Err(InvokeError::Timeout {
                    method: method.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}
