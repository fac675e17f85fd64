//! HTTP server implementation using Axum.

use crate::auth::Credentials;
use crate::handler::{handle_channel, handle_get_access, handle_health, handle_login, handle_root};
use crate::session::SessionStore;
use crate::tls;
use anyhow::Context;
use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use solo_core::{
    Arbiter, Hooks, InvokeHooks, JsonRpc, MethodTable, ServerConfig, TimedInvoker,
    TransportConfig, Watchdog,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers and channels.
pub struct AppState {
    /// Sole owner of the resource lock
    pub arbiter: Arbiter,
    pub sessions: SessionStore,
    /// Protocol engine shared by every channel
    pub engine: Arc<JsonRpc>,
    /// Serves requests arriving on the channel
    pub hooks: Arc<dyn Hooks>,
    pub credentials: Credentials,
    /// How long a reply may wait on a client that is not reading
    pub reply_timeout: Duration,
}

/// PEM files for TLS mode. `key` may point at the certificate file.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Everything the server needs at startup.
#[derive(Debug)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub config: ServerConfig,
    pub methods: MethodTable,
    pub credentials: Credentials,
    pub tls: Option<TlsFiles>,
    /// Sessions untouched for this long are forgotten
    pub session_ttl: Duration,
}

impl ServerOptions {
    pub fn new(host: impl Into<String>, port: u16, methods: MethodTable) -> Self {
        Self {
            host: host.into(),
            port,
            config: ServerConfig::default(),
            methods,
            credentials: Credentials::default(),
            tls: None,
            session_ttl: TransportConfig::SESSION_IDLE_TTL,
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_tls(mut self, tls: TlsFiles) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

/// A running server. Dropping it stops serving and stops the watchdog.
pub struct ServerHandle {
    pub addr: SocketAddr,
    /// `/ws` in plain mode, `/wss` in TLS mode
    pub channel_path: &'static str,
    pub arbiter: Arbiter,
    state: Arc<AppState>,
    watchdog: Watchdog,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// State shared by the running handlers.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn is_secure(&self) -> bool {
        self.channel_path == TransportConfig::TLS_CHANNEL_PATH
    }

    pub fn shutdown(&self) {
        self.watchdog.stop();
        self.task.abort();
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("addr", &self.addr)
            .field("channel_path", &self.channel_path)
            .field("arbiter", &self.arbiter)
            .finish_non_exhaustive()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build the router for `state`, serving the channel on `channel_path`.
pub fn router(state: Arc<AppState>, channel_path: &str) -> Router {
    // Configure CORS for browser clients on other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/get_access", get(handle_get_access))
        .route("/login", get(handle_login))
        .route("/health", get(handle_health))
        .route(channel_path, get(handle_channel))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the server.
///
/// Returns once the listener is bound; the handle carries the actual address
/// (useful when port=0).
pub async fn start_server(options: ServerOptions) -> anyhow::Result<ServerHandle> {
    options.config.validate()?;
    if options.session_ttl.is_zero() {
        anyhow::bail!("session TTL must be greater than zero");
    }

    let secure = options.tls.is_some();
    let channel_path = if secure {
        TransportConfig::TLS_CHANNEL_PATH
    } else {
        TransportConfig::PLAIN_CHANNEL_PATH
    };

    let arbiter = Arbiter::spawn(&options.config);
    let watchdog = Watchdog::spawn(arbiter.clone(), options.config.watchdog_interval);
    let invoker = TimedInvoker::new(options.methods, options.config.call_timeout);

    let state = Arc::new(AppState {
        arbiter: arbiter.clone(),
        sessions: SessionStore::new(secure, options.session_ttl),
        engine: Arc::new(JsonRpc::new().with_batch_support(options.config.batch_support)),
        hooks: Arc::new(InvokeHooks::new(invoker)),
        credentials: options.credentials,
        reply_timeout: options.config.lease_duration,
    });
    let app = router(state.clone(), channel_path);

    let addr: SocketAddr = format!("{}:{}", options.host, options.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", options.host, options.port))?;

    let (actual_addr, task) = match options.tls {
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            let actual_addr = listener.local_addr()?;
            let task = tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    error!("Server error: {}", e);
                }
            });
            (actual_addr, task)
        }
        Some(files) => {
            let config = tls::load_server_config(&files.cert, &files.key)?;
            let config = RustlsConfig::from_config(Arc::new(config));
            let handle = axum_server::Handle::new();
            let server = axum_server::bind_rustls(addr, config).handle(handle.clone());
            let task = tokio::spawn(async move {
                if let Err(e) = server.serve(app.into_make_service()).await {
                    error!("TLS server error: {}", e);
                }
            });
            let actual_addr = handle
                .listening()
                .await
                .with_context(|| format!("TLS server failed to bind {}", addr))?;
            (actual_addr, task)
        }
    };

    info!(
        "Server listening on {} (channel at {})",
        actual_addr, channel_path
    );

    Ok(ServerHandle {
        addr: actual_addr,
        channel_path,
        arbiter,
        state,
        watchdog,
        task,
    })
}
