use std::time::Duration;

use crate::error::{Error, Result};
use crate::thresholds::ThresholdSet;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = stampede_http::DEFAULT_REQUEST_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Everything a run needs besides the scenario itself. Fixed for the whole run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub base_url: String,
    pub stages: Vec<Stage>,
    pub thresholds: Vec<ThresholdSet>,
    /// Pause between iterations of one VU.
    pub think_time: Duration,
    /// How often the controller re-reads the schedule.
    pub poll_interval: Duration,
    /// How long in-flight iterations may run after the deadline.
    pub drain_timeout: Duration,
    pub request_timeout: Duration,
}

impl RunPlan {
    pub fn new(base_url: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            base_url: base_url.into(),
            stages,
            thresholds: Vec::new(),
            think_time: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration))
    }

    pub fn peak_target(&self) -> u64 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Checks stages, base url and timing knobs. Thresholds are compiled
    /// separately because they need the set of registered metrics.
    pub fn validate(&self) -> Result<()> {
        validate_stages(&self.stages)?;
        validate_base_url(&self.base_url)?;
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidPollInterval);
        }
        Ok(())
    }
}

pub fn validate_stages(stages: &[Stage]) -> Result<()> {
    if stages.is_empty() {
        return Err(Error::EmptyStages);
    }
    if let Some(index) = stages.iter().position(|s| s.duration.is_zero()) {
        return Err(Error::ZeroDurationStage { index: index + 1 });
    }
    Ok(())
}

pub fn validate_base_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|_| Error::InvalidBaseUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(Error::InvalidBaseUrl(raw.to_string()));
    }
    Ok(())
}
