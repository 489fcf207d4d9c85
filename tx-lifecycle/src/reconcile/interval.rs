use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Rate limits an action per chain
#[derive(Debug, Default)]
pub(crate) struct IntervalGate {
    last_run: Mutex<HashMap<u64, Instant>>,
}

impl IntervalGate {
    /// Returns true, and records the run, if `interval` has passed since the
    /// last run for `chain_id`
    pub fn try_acquire(&self, chain_id: u64, interval: Duration) -> bool {
        let now = Instant::now();
        let mut last_run = self.last_run.lock();
        match last_run.get(&chain_id) {
            Some(last) if now.saturating_duration_since(*last) < interval => false,
            _ => {
                last_run.insert(chain_id, now);
                true
            }
        }
    }
}
