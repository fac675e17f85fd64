//! Invocation layer: executes named operations on the served object.
//!
//! The engine never reflects on the served object. Hosts register each
//! operation once at startup in a [`MethodTable`], and the table binds
//! incoming params against the operation's declared signature before running
//! it. [`TimedInvoker`] bounds every call with a timeout.

mod table;
mod timed;

pub use table::{Args, MethodFuture, MethodSignature, MethodTable};
pub use timed::TimedInvoker;

use crate::protocol::{Params, RpcError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("unknown method '{0}'")]
    NotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("{0}")]
    Failed(String),

    #[error("call to '{method}' timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
}

impl From<InvokeError> for RpcError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::NotFound(_) => RpcError::not_found(err.to_string()),
            InvokeError::InvalidParams(message) => RpcError::invalid_params(message),
            InvokeError::Failed(message) => RpcError::internal(message),
            InvokeError::Timeout { .. } => RpcError::internal(err.to_string()),
        }
    }
}

/// Executes a named operation with the given params.
#[async_trait]
pub trait Invoke: Send + Sync + 'static {
    async fn invoke(&self, method: &str, params: Params) -> Result<Value, InvokeError>;
}

#[async_trait]
impl<T: Invoke + ?Sized> Invoke for std::sync::Arc<T> {
    async fn invoke(&self, method: &str, params: Params) -> Result<Value, InvokeError> {
        (**self).invoke(method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorKind;

    #[test]
    fn test_invoke_errors_map_onto_taxonomy() {
        let err: RpcError = InvokeError::NotFound("frobnicate".into()).into();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.details, "unknown method 'frobnicate'");

        let err: RpcError = InvokeError::InvalidParams("too many positional arguments".into()).into();
        assert_eq!(err, RpcError::invalid_params("too many positional arguments"));

        let err: RpcError = InvokeError::Failed("division by zero".into()).into();
        assert_eq!(err, RpcError::internal("division by zero"));

        let err: RpcError = InvokeError::Timeout {
            method: "sleep".into(),
            timeout: Duration::from_secs(5),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.details.contains("timed out"));
    }
}
