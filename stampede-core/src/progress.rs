use std::time::Duration;

use crate::schedule::StageSnapshot;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    pub total_duration: Duration,
    pub stage: Option<StageSnapshot>,
    /// Population the controller is aiming for this quantum.
    pub target: u64,
    /// Workers currently running, including ones finishing a last iteration.
    pub live_vus: u64,
    pub iterations_total: u64,
    pub requests_total: u64,
}

impl ProgressUpdate {
    /// Fraction of the schedule elapsed, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total_duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.total_duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
