//! Exclusive access to the served resource.
//!
//! # Architecture
//!
//! - **Lease**: [`LeaseState`] is the pure state machine (holder, deadline,
//!   lapse bookkeeping). Every transition takes `now` explicitly.
//! - **Arbiter**: [`Arbiter`] confines one `LeaseState` to a coordinator task;
//!   all grant/renew/expire operations are messages to that task.
//! - **Watchdog**: [`Watchdog`] periodically asks the arbiter to expire a
//!   lapsed lease.

mod arbiter;
mod lease;
mod token;
mod watchdog;

pub use arbiter::Arbiter;
pub use lease::{Denied, LeaseSnapshot, LeaseState, Standing};
pub use token::HolderToken;
pub use watchdog::Watchdog;
