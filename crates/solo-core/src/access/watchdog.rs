//! Periodic lease expiry.

use super::arbiter::Arbiter;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Background task asking the arbiter to expire a lapsed lease every tick.
///
/// Late ticks only delay expiry; they never cause it early. The task stops
/// when the handle is dropped or the arbiter goes away.
#[derive(Debug)]
pub struct Watchdog {
    task: JoinHandle<()>,
}

impl Watchdog {
    pub fn spawn(arbiter: Arbiter, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if arbiter.expire_if_due(Instant::now()).await.is_err() {
                    debug!("Arbiter is gone, stopping watchdog");
                    break;
                }
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}
