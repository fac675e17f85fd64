//! The lease state machine.
//!
//! At most one holder token is alive at any instant. A holder keeps the
//! resource while it keeps renewing; once `now >= deadline` the lease can be
//! expired. The expired holder is remembered so that, if nobody else was
//! granted in between, it can take the resource back on its next message.

use super::token::HolderToken;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// The resource is already held by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied;

impl fmt::Display for Denied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("resource is busy")
    }
}

/// Where a token stands when its connection sends a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// The token holds the resource; its lease was renewed.
    Current,
    /// The token's lease had lapsed, nobody else took over, and it holds the
    /// resource again.
    Reacquired,
    /// Another token was granted after this one.
    Superseded,
    /// The token's lease lapsed more often than the reacquire limit allows.
    Expired,
}

/// Read-only view of the lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseSnapshot {
    pub held: bool,
    pub holder: Option<HolderToken>,
    /// `None` while held means the lease is suspended during a call.
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    token: HolderToken,
    deadline: Option<Instant>,
    lapses: u32,
}

#[derive(Debug, Clone, Copy)]
struct Lapse {
    token: HolderToken,
    count: u32,
}

/// Single-holder lease over the served resource.
#[derive(Debug, Clone)]
pub struct LeaseState {
    holding: Option<Holding>,
    lapsed: Option<Lapse>,
    lease_duration: Duration,
    reacquire_limit: Option<u32>,
}

impl LeaseState {
    pub fn new(lease_duration: Duration, reacquire_limit: Option<u32>) -> Self {
        Self {
            holding: None,
            lapsed: None,
            lease_duration,
            reacquire_limit,
        }
    }

    pub fn is_held(&self) -> bool {
        self.holding.is_some()
    }

    pub fn holder(&self) -> Option<HolderToken> {
        self.holding.map(|h| h.token)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.holding.and_then(|h| h.deadline)
    }

    pub fn snapshot(&self) -> LeaseSnapshot {
        LeaseSnapshot {
            held: self.is_held(),
            holder: self.holder(),
            deadline: self.deadline(),
        }
    }

    /// Grant the resource if it is free. First asker while free wins.
    pub fn try_grant(&mut self, now: Instant) -> Result<HolderToken, Denied> {
        if self.holding.is_some() {
            return Err(Denied);
        }
        let token = HolderToken::mint();
        self.holding = Some(Holding {
            token,
            deadline: Some(now + self.lease_duration),
            lapses: 0,
        });
        self.lapsed = None;
        Ok(token)
    }

    /// Push the deadline to `now + lease_duration`. No-op for stale tokens.
    pub fn renew(&mut self, token: HolderToken, now: Instant) -> bool {
        match self.holding.as_mut() {
            Some(holding) if holding.token == token => {
                holding.deadline = Some(now + self.lease_duration);
                true
            }
            _ => false,
        }
    }

    /// Clear the deadline while the holder waits on a call, so that server
    /// latency never counts as client inactivity.
    pub fn suspend(&mut self, token: HolderToken) -> bool {
        match self.holding.as_mut() {
            Some(holding) if holding.token == token => {
                holding.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_current(&self, token: HolderToken) -> bool {
        self.holder() == Some(token)
    }

    /// Account for a message from `token`'s connection.
    ///
    /// Renews a current holder and reinstates a lapsed one when allowed.
    pub fn check_in(&mut self, token: HolderToken, now: Instant) -> Standing {
        match self.holding {
            Some(holding) if holding.token == token => {
                self.renew(token, now);
                Standing::Current
            }
            Some(_) => Standing::Superseded,
            None => match self.lapsed {
                Some(lapse) if lapse.token == token => {
                    let forgiven = self
                        .reacquire_limit
                        .map_or(true, |limit| lapse.count <= limit);
                    if !forgiven {
                        return Standing::Expired;
                    }
                    self.holding = Some(Holding {
                        token,
                        deadline: Some(now + self.lease_duration),
                        lapses: lapse.count,
                    });
                    self.lapsed = None;
                    Standing::Reacquired
                }
                _ => Standing::Superseded,
            },
        }
    }

    /// Give the resource up on behalf of `token`. Returns whether it held it.
    pub fn release(&mut self, token: HolderToken) -> bool {
        if self.lapsed.is_some_and(|lapse| lapse.token == token) {
            self.lapsed = None;
        }
        match self.holding {
            Some(holding) if holding.token == token => {
                self.holding = None;
                true
            }
            _ => false,
        }
    }

    /// Expire the lease if its deadline has passed. Idempotent.
    ///
    /// Returns the token that lost the resource.
    pub fn expire_if_due(&mut self, now: Instant) -> Option<HolderToken> {
        let holding = self.holding?;
        let deadline = holding.deadline?;
        if now < deadline {
            return None;
        }
        self.holding = None;
        self.lapsed = Some(Lapse {
            token: holding.token,
            count: holding.lapses.saturating_add(1),
        });
        Some(holding.token)
    }
}
