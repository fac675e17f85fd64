//! The duplex channel bound to the lease holder.
//!
//! One task per WebSocket connection. Every text frame goes through the
//! arbiter before it reaches the protocol engine, and frames are answered one
//! at a time in arrival order.

use crate::server::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use solo_core::{HolderToken, Standing, TransportConfig};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Serve one upgraded connection for the session's granted `token`.
pub async fn serve(mut socket: WebSocket, token: Option<HolderToken>, state: Arc<AppState>) {
    let token = match token {
        Some(token) if state.arbiter.is_current(token).await.unwrap_or(false) => token,
        _ => {
            debug!("Refusing channel: session does not hold the resource");
            close(
                &mut socket,
                TransportConfig::CLOSE_NOT_GRANTED,
                TransportConfig::NOT_GRANTED_REASON,
            )
            .await;
            return;
        }
    };

    info!("Channel opened by {}", token);

    loop {
        let frame = match socket.recv().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                // The lease runs out on its own; the watchdog releases it.
                warn!("Channel of {} failed: {}", token, e);
                return;
            }
            None => {
                debug!("Channel of {} ended without a close frame", token);
                return;
            }
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                match state.arbiter.release(token).await {
                    Ok(true) => info!("Channel closed by {}, resource released", token),
                    Ok(false) => debug!("Channel closed by {}, which no longer held the resource", token),
                    Err(e) => error!("Failed to release the resource for {}: {}", token, e),
                }
                return;
            }
        };

        match state.arbiter.check_in(token).await {
            Ok(Standing::Current) => {}
            Ok(Standing::Reacquired) => {
                info!("{} reacquired the resource after its lease lapsed", token);
            }
            Ok(Standing::Superseded) => {
                info!("{} was superseded, closing its channel", token);
                close(
                    &mut socket,
                    TransportConfig::CLOSE_SUPERSEDED,
                    TransportConfig::SUPERSEDED_REASON,
                )
                .await;
                return;
            }
            Ok(Standing::Expired) => {
                info!("{} used up its lease reacquisitions, closing its channel", token);
                close(
                    &mut socket,
                    TransportConfig::CLOSE_LEASE_EXPIRED,
                    TransportConfig::LEASE_EXPIRED_REASON,
                )
                .await;
                return;
            }
            Err(e) => {
                error!("Arbiter unavailable: {}", e);
                return;
            }
        }

        // Server-side latency must not count as client inactivity.
        if let Err(e) = state.arbiter.suspend(token).await {
            error!("Arbiter unavailable: {}", e);
            return;
        }

        let processed = state.engine.process_incoming(&text, &*state.hooks).await;
        if let Some(e) = &processed.error {
            debug!("Message from {} failed: {}", token, e);
        }

        // The clock restarts once the call is done; writing the reply is the
        // client's time again.
        if let Err(e) = state.arbiter.renew(token).await {
            error!("Arbiter unavailable: {}", e);
            return;
        }

        let Some(response) = processed.response else {
            continue;
        };
        match tokio::time::timeout(state.reply_timeout, socket.send(Message::Text(response))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failed to answer {}: {}", token, e);
                return;
            }
            Err(_) => {
                warn!(
                    "{} stopped reading replies, dropping its channel after {:?}",
                    token, state.reply_timeout
                );
                return;
            }
        }
    }
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!("Close frame not delivered: {}", e);
    }
}
