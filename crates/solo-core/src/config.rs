//! Centralized configuration for Solo.
//!
//! Protocol constants, lease defaults and transport constants live in unit
//! structs; the runtime knobs a host injects at startup live in [`ServerConfig`].

use std::time::Duration;

/// JSON-RPC protocol constants.
pub struct ProtocolConfig;

impl ProtocolConfig {
    pub const VERSION: &'static str = "2.0";

    // Reserved pre-defined error codes
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Implementation-defined server error range (-32000 to -32099)
    pub const GENERIC_ERROR: i64 = -32000;
    pub const UNIMPLEMENTED: i64 = -32001;
}

/// Lease and watchdog defaults.
pub struct LeaseConfig;

impl LeaseConfig {
    pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(5);
    pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

    /// Depth of the arbiter's command queue.
    pub const COMMAND_QUEUE_DEPTH: usize = 64;
}

/// Transport-facing constants shared by the server and its clients.
pub struct TransportConfig;

impl TransportConfig {
    pub const SESSION_COOKIE: &'static str = "solo_session";
    /// Sessions untouched for this long are dropped from the store.
    pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(3600);
    pub const PLAIN_CHANNEL_PATH: &'static str = "/ws";
    pub const TLS_CHANNEL_PATH: &'static str = "/wss";

    // Private-use WebSocket close codes (4000-4999)
    pub const CLOSE_SUPERSEDED: u16 = 4000;
    pub const CLOSE_LEASE_EXPIRED: u16 = 4001;
    pub const CLOSE_NOT_GRANTED: u16 = 4003;

    pub const SUPERSEDED_REASON: &'static str =
        "somebody else is now using resource due to timeout";
    pub const LEASE_EXPIRED_REASON: &'static str = "lease expired";
    pub const NOT_GRANTED_REASON: &'static str = "resource not granted to this session";
}

/// Runtime settings injected by the host at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Upper bound on a single method invocation.
    pub call_timeout: Duration,
    /// Inactivity window after which the holder loses the resource.
    pub lease_duration: Duration,
    /// Period of the watchdog's expiry check.
    pub watchdog_interval: Duration,
    /// How many lease lapses a still-connected holder may recover from.
    /// `None` forgives every lapse as long as nobody else took the resource.
    pub reacquire_limit: Option<u32>,
    /// Process non-empty batches instead of rejecting them.
    pub batch_support: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            call_timeout: LeaseConfig::DEFAULT_CALL_TIMEOUT,
            lease_duration: LeaseConfig::DEFAULT_LEASE_DURATION,
            watchdog_interval: LeaseConfig::DEFAULT_WATCHDOG_INTERVAL,
            reacquire_limit: None,
            batch_support: false,
        }
    }
}

impl ServerConfig {
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_lease_duration(mut self, duration: Duration) -> Self {
        self.lease_duration = duration;
        self
    }

    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    pub fn with_reacquire_limit(mut self, limit: Option<u32>) -> Self {
        self.reacquire_limit = limit;
        self
    }

    pub fn with_batch_support(mut self, enabled: bool) -> Self {
        self.batch_support = enabled;
        self
    }

    /// Reject settings that would make the lease or the watchdog meaningless.
    pub fn validate(&self) -> crate::Result<()> {
        if self.lease_duration.is_zero() {
            return Err(crate::SoloError::Config {
                message: "lease duration must be greater than zero".to_string(),
            });
        }
        if self.watchdog_interval.is_zero() {
            return Err(crate::SoloError::Config {
                message: "watchdog interval must be greater than zero".to_string(),
            });
        }
        if self.call_timeout.is_zero() {
            return Err(crate::SoloError::Config {
                message: "call timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
