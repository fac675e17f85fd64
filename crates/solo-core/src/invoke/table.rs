//! Method table: name → declared signature + bound handler.

use super::{Invoke, InvokeError};
use crate::protocol::Params;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::warn;

/// Future returned by a registered handler.
pub type MethodFuture = BoxFuture<'static, Result<Value, InvokeError>>;

type Handler = Arc<dyn Fn(Args) -> MethodFuture + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParamSpec {
    name: String,
    required: bool,
}

/// Ordered, named parameters of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSignature {
    params: Vec<ParamSpec>,
}

impl MethodSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            required: false,
        });
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Bind positional or keyword params onto this signature's slots.
    pub fn bind(&self, params: Params) -> Result<Args, InvokeError> {
        let mut values: Vec<Option<Value>> = vec![None; self.params.len()];

        match params {
            Params::Positional(given) => {
                if given.len() > self.params.len() {
                    return Err(InvokeError::InvalidParams(
                        "too many positional arguments".to_string(),
                    ));
                }
                for (slot, value) in values.iter_mut().zip(given) {
                    *slot = Some(value);
                }
            }
            Params::Keyword(given) => {
                for (name, value) in given {
                    let index = self
                        .params
                        .iter()
                        .position(|p| p.name == name)
                        .ok_or_else(|| {
                            InvokeError::InvalidParams(format!(
                                "got an unexpected keyword argument '{}'",
                                name
                            ))
                        })?;
                    values[index] = Some(value);
                }
            }
        }

        if let Some(missing) = self
            .params
            .iter()
            .zip(&values)
            .find(|(spec, value)| spec.required && value.is_none())
            .map(|(spec, _)| spec)
        {
            return Err(InvokeError::InvalidParams(format!(
                "missing a required argument: '{}'",
                missing.name
            )));
        }

        Ok(Args {
            names: self.params.iter().map(|p| p.name.clone()).collect(),
            values,
        })
    }
}

/// Arguments bound to a signature, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    names: Vec<String>,
    values: Vec<Option<Value>>,
}

impl Args {
    fn name(&self, index: usize) -> &str {
        self.names.get(index).map(String::as_str).unwrap_or("?")
    }

    /// Decode a required argument.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, InvokeError> {
        let value = self.value(index).ok_or_else(|| {
            InvokeError::InvalidParams(format!(
                "missing a required argument: '{}'",
                self.name(index)
            ))
        })?;
        self.decode(index, value)
    }

    /// Decode an optional argument. Absent and `null` both give `None`.
    pub fn opt<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, InvokeError> {
        match self.value(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.decode(index, value).map(Some),
        }
    }

    /// Raw argument value, if supplied.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn decode<T: DeserializeOwned>(&self, index: usize, value: &Value) -> Result<T, InvokeError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            InvokeError::InvalidParams(format!(
                "argument '{}' has the wrong type: {}",
                self.name(index),
                e
            ))
        })
    }
}

#[derive(Clone)]
struct Method {
    signature: MethodSignature,
    handler: Handler,
}

/// Capability table built once at startup.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.names())
            .finish()
    }
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation. A later registration under the same name wins.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        signature: MethodSignature,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, InvokeError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args| handler(args).boxed());
        self.methods
            .insert(name.into(), Method { signature, handler });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn signature(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.get(name).map(|m| &m.signature)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "method panicked".to_string()
    }
}

#[async_trait]
impl Invoke for MethodTable {
    async fn invoke(&self, method: &str, params: Params) -> Result<Value, InvokeError> {
        let entry = self
            .methods
            .get(method)
            .ok_or_else(|| InvokeError::NotFound(method.to_string()))?;
        let args = entry.signature.bind(params)?;
        let call = (entry.handler)(args);

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload);
                warn!("Method '{}' panicked: {}", method, message);
                Err(InvokeError::Failed(message))
            }
        }
    }
}
