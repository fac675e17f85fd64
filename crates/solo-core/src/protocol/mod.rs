//! JSON-RPC 2.0 protocol: codec, error taxonomy, engine and server hooks.
//!
//! Wire format: JSON-RPC 2.0 (<https://www.jsonrpc.org/specification>).

pub mod codec;
pub mod dispatch;
pub mod engine;
pub mod error;

pub use codec::{decode, encode_error, encode_request, encode_result, Params};
pub use dispatch::InvokeHooks;
pub use engine::{ErrorResponse, Hooks, IdPolicy, JsonRpc, Processed, Request, Response};
pub use error::{ErrorData, ErrorKind, ErrorObject, RpcError};
