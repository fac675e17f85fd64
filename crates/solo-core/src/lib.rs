//! Solo Core - JSON-RPC 2.0 engine and exclusive-access arbitration.
//!
//! This crate holds everything needed to serve one object to one remote
//! client at a time, without any HTTP layer:
//!
//! - [`protocol`]: envelope codec, the closed error taxonomy and the
//!   classification/validation engine with pluggable hooks.
//! - [`invoke`]: the method table the engine dispatches requests into, with a
//!   per-call timeout.
//! - [`access`]: the lease-based arbiter that owns the single lock and the
//!   watchdog that expires idle leases.
//! - [`client`]: hooks for the client role, correlating responses to calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use solo_core::invoke::{MethodSignature, MethodTable, TimedInvoker};
//! use solo_core::protocol::{InvokeHooks, JsonRpc};
//!
//! let mut methods = MethodTable::new();
//! methods.register("add", MethodSignature::new().required("a").required("b"), |args| async move {
//!     let (a, b): (i64, i64) = (args.get(0)?, args.get(1)?);
//!     Ok(serde_json::json!(a + b))
//! });
//!
//! let hooks = InvokeHooks::new(TimedInvoker::new(methods, std::time::Duration::from_secs(5)));
//! let engine = JsonRpc::new();
//! let processed = engine
//!     .process_incoming(r#"{"jsonrpc":"2.0","method":"add","params":[2,2],"id":9}"#, &hooks)
//!     .await;
//! assert_eq!(processed.response.as_deref(), Some(r#"{"jsonrpc":"2.0","result":4,"id":9}"#));
//! ```

pub mod access;
pub mod client;
pub mod config;
pub mod error;
pub mod invoke;
pub mod protocol;

// Re-export commonly used types
pub use access::{Arbiter, HolderToken, LeaseSnapshot, LeaseState, Standing, Watchdog};
pub use client::PendingCalls;
pub use config::{LeaseConfig, ProtocolConfig, ServerConfig, TransportConfig};
pub use error::{Result, SoloError};
pub use invoke::{Args, Invoke, InvokeError, MethodSignature, MethodTable, TimedInvoker};
pub use protocol::{ErrorKind, Hooks, IdPolicy, InvokeHooks, JsonRpc, Params, Processed, RpcError};
