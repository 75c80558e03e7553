//! Motion clock for running without a motion host.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use wadxl_core::MotionClock;

/// Wall-clock stand-in for the host motion timeline.
///
/// Time is seconds since construction; there is never motion in flight.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Start the clock at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionClock for SystemClock {
    fn last_move_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    async fn wait_moves(&self) {}

    async fn dwell(&self, seconds: f64) {
        if seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        }
    }
}
