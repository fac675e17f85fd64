//! Coordinator task owning the lease.
//!
//! The [`LeaseState`] lives inside one spawned task and is never shared.
//! [`Arbiter`] is a cheap, cloneable handle that sends commands to that task
//! and awaits the replies, so every grant, renewal and expiry is applied in
//! one serial order.

use super::lease::{LeaseSnapshot, LeaseState, Standing};
use super::token::HolderToken;
use crate::config::{LeaseConfig, ServerConfig};
use crate::{Result, SoloError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

enum Command {
    Grant {
        reply: oneshot::Sender<Option<HolderToken>>,
    },
    Renew {
        token: HolderToken,
        reply: oneshot::Sender<bool>,
    },
    Suspend {
        token: HolderToken,
        reply: oneshot::Sender<bool>,
    },
    IsCurrent {
        token: HolderToken,
        reply: oneshot::Sender<bool>,
    },
    CheckIn {
        token: HolderToken,
        reply: oneshot::Sender<Standing>,
    },
    Release {
        token: HolderToken,
        reply: oneshot::Sender<bool>,
    },
    ExpireIfDue {
        now: Instant,
        reply: oneshot::Sender<Option<HolderToken>>,
    },
    Snapshot {
        reply: oneshot::Sender<LeaseSnapshot>,
    },
}

/// Handle to the lease coordinator.
///
/// The coordinator stops once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct Arbiter {
    commands: mpsc::Sender<Command>,
}

impl Arbiter {
    /// Spawn the coordinator task on the current runtime.
    pub fn spawn(config: &ServerConfig) -> Self {
        let lease = LeaseState::new(config.lease_duration, config.reacquire_limit);
        let (commands, receiver) = mpsc::channel(LeaseConfig::COMMAND_QUEUE_DEPTH);
        tokio::spawn(Self::run(lease, receiver));
        Self { commands }
    }

    async fn run(mut lease: LeaseState, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            // A dropped reply receiver means the caller gave up; ignore it.
            match command {
                Command::Grant { reply } => {
                    let granted = lease.try_grant(Instant::now()).ok();
                    match granted {
                        Some(token) => info!("Resource granted to {}", token),
                        None => debug!("Resource is already locked"),
                    }
                    let _ = reply.send(granted);
                }
                Command::Renew { token, reply } => {
                    let _ = reply.send(lease.renew(token, Instant::now()));
                }
                Command::Suspend { token, reply } => {
                    let _ = reply.send(lease.suspend(token));
                }
                Command::IsCurrent { token, reply } => {
                    let _ = reply.send(lease.is_current(token));
                }
                Command::CheckIn { token, reply } => {
                    let _ = reply.send(lease.check_in(token, Instant::now()));
                }
                Command::Release { token, reply } => {
                    let released = lease.release(token);
                    if released {
                        info!("Resource released by {}", token);
                    }
                    let _ = reply.send(released);
                }
                Command::ExpireIfDue { now, reply } => {
                    let expired = lease.expire_if_due(now);
                    if let Some(token) = expired {
                        info!("Lease of {} expired, releasing the resource", token);
                    }
                    let _ = reply.send(expired);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(lease.snapshot());
                }
            }
        }
        debug!("Arbiter stopped");
    }

    async fn ask<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SoloError::ArbiterUnavailable)?;
        response.await.map_err(|_| SoloError::ArbiterUnavailable)
    }

    /// Grant the resource if it is free, or fail with [`SoloError::ResourceBusy`].
    pub async fn try_grant(&self) -> Result<HolderToken> {
        self.ask(|reply| Command::Grant { reply })
            .await?
            .ok_or(SoloError::ResourceBusy)
    }

    /// Push the lease deadline forward. Returns `false` for a stale token.
    pub async fn renew(&self, token: HolderToken) -> Result<bool> {
        self.ask(|reply| Command::Renew { token, reply }).await
    }

    /// Clear the deadline while a call is outstanding.
    pub async fn suspend(&self, token: HolderToken) -> Result<bool> {
        self.ask(|reply| Command::Suspend { token, reply }).await
    }

    pub async fn is_current(&self, token: HolderToken) -> Result<bool> {
        self.ask(|reply| Command::IsCurrent { token, reply }).await
    }

    /// Renew or reinstate `token` for an inbound message; see [`Standing`].
    pub async fn check_in(&self, token: HolderToken) -> Result<Standing> {
        self.ask(|reply| Command::CheckIn { token, reply }).await
    }

    /// Give the resource up. Returns `false` unless `token` held it.
    pub async fn release(&self, token: HolderToken) -> Result<bool> {
        self.ask(|reply| Command::Release { token, reply }).await
    }

    /// Expire the lease if `now` is past its deadline.
    pub async fn expire_if_due(&self, now: Instant) -> Result<Option<HolderToken>> {
        self.ask(|reply| Command::ExpireIfDue { now, reply }).await
    }

    pub async fn snapshot(&self) -> Result<LeaseSnapshot> {
        self.ask(|reply| Command::Snapshot { reply }).await
    }
}
