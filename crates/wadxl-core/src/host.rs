//! Contracts between the driver and its host.
//!
//! The host owns motion timing and the periodic batch scheduling. The driver
//! only sees these seams.

use crate::data::SampleBatch;
use crate::error::WadxlResult;
use async_trait::async_trait;

/// Source of the host's logical motion time.
#[async_trait]
pub trait MotionClock: Send + Sync {
    /// Time of the last queued move, in host seconds.
    fn last_move_time(&self) -> f64;

    /// Wait until all queued motion has completed.
    async fn wait_moves(&self);

    /// Advance the motion timeline by `seconds` without moving.
    async fn dwell(&self, seconds: f64);
}

/// Receiver of fanned-out sample batches.
pub trait BatchClient: Send + Sync {
    /// Deliver one batch. Returning `false` unregisters the client.
    fn handle_batch(&self, batch: &SampleBatch) -> bool;
}

/// Producer side of the periodic batch facility.
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Bring the sensor into streaming mode. Called when the first client
    /// registers.
    async fn start_measurements(&self) -> WadxlResult<()>;

    /// Leave streaming mode. Called once the last client has gone.
    async fn finish_measurements(&self) -> WadxlResult<()>;

    /// Drain and convert whatever arrived since the previous call.
    ///
    /// `None` means nothing was buffered and nothing is fanned out.
    fn process_batch(&self) -> Option<SampleBatch>;
}
