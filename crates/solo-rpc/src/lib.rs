//! Solo RPC - serve one object to one WebSocket client at a time.
//!
//! A client asks for the resource over HTTP (`/get_access`), then opens the
//! duplex channel (`/ws`, or `/wss` in TLS mode) and sends JSON-RPC 2.0
//! envelopes over it for as long as its lease stays alive.

pub mod auth;
pub mod channel;
pub mod demo;
pub mod handler;
pub mod server;
pub mod session;
pub mod tls;

pub use auth::Credentials;
pub use server::{start_server, AppState, ServerHandle, ServerOptions, TlsFiles};
pub use session::{SessionRecord, SessionStore};
