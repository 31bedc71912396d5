use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

use crate::timemath::WallClock;

/// Wall clock driven by tokio's (pausable) instant source. Under
/// `start_paused` runtimes, advancing tokio time with `sleep` advances this
/// clock by the same amount, which keeps wall-clock comparisons and timer
/// ticks in lockstep.
pub struct TestClock {
    base: DateTime<Utc>,
    origin: Instant,
}

impl TestClock {
    pub fn start() -> Self {
        Self {
            base: Utc::now(),
            origin: Instant::now(),
        }
    }
}

impl WallClock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.origin.elapsed();
        self.base + TimeDelta::from_std(elapsed).expect("elapsed fits in TimeDelta")
    }
}
