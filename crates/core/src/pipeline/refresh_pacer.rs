use std::time::{Duration, Instant};

use crate::shared::cancellation::CancellationToken;

pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// Bounds loop iterations to a display refresh rate.
///
/// Each `wait` sleeps until one period after the previous wake-up. When an
/// iteration overruns, the next one starts immediately and the schedule is
/// re-anchored instead of bursting to catch up.
pub struct RefreshPacer {
    period: Duration,
    last: Option<Instant>,
}

impl RefreshPacer {
    pub fn new(hz: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / hz.max(1) as f64),
            last: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns `false` if cancelled while waiting.
    pub fn wait(&mut self, cancel: &CancellationToken) -> bool {
        let now = Instant::now();
        let target = match self.last {
            Some(last) => last + self.period,
            None => now + self.period,
        };
        if target > now && !cancel.sleep(target - now) {
            return false;
        }
        self.last = Some(Instant::now().max(target));
        !cancel.is_cancelled()
    }
}

impl Default for RefreshPacer {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_HZ)
    }
}
