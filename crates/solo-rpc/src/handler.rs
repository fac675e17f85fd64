//! HTTP route handlers.

use crate::channel;
use crate::server::AppState;
use crate::session::SessionStore;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Basic, Authorization},
    TypedHeader,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const GRANTED_MESSAGE: &str = "Resource granted";
pub const BUSY_MESSAGE: &str = "Sorry resource is busy, try again in a while...";
pub const FIRST_VISIT_MESSAGE: &str = "Welcome, I don't think you've visited here before.";
pub const LOGGED_IN_MESSAGE: &str = "logged in";
pub const LOGIN_ERROR_MESSAGE: &str = "login error";

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Greeting; remembers when the session last came by.
pub async fn handle_root(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, id) = state.sessions.resolve(jar);
    let message = match state.sessions.visit(id).await {
        None => FIRST_VISIT_MESSAGE.to_string(),
        Some(last_visit) => {
            let elapsed = (Utc::now() - last_visit).num_milliseconds() as f64 / 1000.0;
            format!("Welcome back, last visited: {:.1} secs ago", elapsed)
        }
    };
    (jar, message).into_response()
}

/// Try to take the resource for this session.
pub async fn handle_get_access(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, id) = state.sessions.resolve(jar);
    match state.arbiter.try_grant().await {
        Ok(token) => {
            state.sessions.set_granted(id, token).await;
            (jar, GRANTED_MESSAGE).into_response()
        }
        Err(e) if e.is_retryable() => {
            debug!("Session {} asked for a busy resource", id);
            (jar, BUSY_MESSAGE).into_response()
        }
        Err(e) => {
            error!("Grant failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, jar, e.to_string()).into_response()
        }
    }
}

/// Basic-auth login against the credential table.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    auth: Option<TypedHeader<Authorization<Basic>>>,
) -> Response {
    let (jar, id) = state.sessions.resolve(jar);
    let Some(TypedHeader(Authorization(basic))) = auth else {
        debug!("Login without credentials");
        return (jar, LOGIN_ERROR_MESSAGE).into_response();
    };

    if state.credentials.verify(basic.username(), basic.password()) {
        info!("Authenticated user: {}", basic.username());
        state.sessions.set_authenticated(id, basic.username()).await;
        (jar, LOGGED_IN_MESSAGE).into_response()
    } else {
        debug!("Rejected login for {}", basic.username());
        (jar, LOGIN_ERROR_MESSAGE).into_response()
    }
}

/// Upgrade to the duplex channel; the gate runs once the socket is open.
pub async fn handle_channel(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ws: WebSocketUpgrade,
) -> Response {
    let granted = match SessionStore::session_id(&jar) {
        Some(id) => state.sessions.granted(id).await,
        None => None,
    };
    ws.on_upgrade(move |socket| channel::serve(socket, granted, state))
}
