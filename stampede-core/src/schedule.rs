use std::time::Duration;

use crate::config::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePoint {
    pub target: u64,
    pub finished: bool,
}

/// Piecewise-linear VU target over time, starting from 0 VUs.
#[derive(Debug, Clone)]
pub struct RampingSchedule {
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl RampingSchedule {
    pub fn new(stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            stages,
            cumulative_ends,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    /// What the pool should aim for right now. Once finished the target is 0
    /// no matter what the last stage says.
    pub fn poll(&self, elapsed: Duration) -> SchedulePoint {
        let finished = self.is_finished(elapsed);
        SchedulePoint {
            target: if finished { 0 } else { self.target_at(elapsed) },
            finished,
        }
    }

    /// Locates the stage window `(start, end]` holding `elapsed`. Returns the
    /// index and whether `elapsed` sits exactly on the window's end.
    fn locate(&self, elapsed: Duration) -> Option<(usize, bool)> {
        match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            Ok(i) => Some((i, true)),
            Err(i) if i < self.stages.len() => Some((i, false)),
            Err(_) => None,
        }
    }

    fn stage_start(&self, idx: usize) -> Duration {
        idx.checked_sub(1)
            .and_then(|prev| self.cumulative_ends.get(prev).copied())
            .unwrap_or(Duration::ZERO)
    }

    fn start_target(&self, idx: usize) -> u64 {
        idx.checked_sub(1)
            .and_then(|prev| self.stages.get(prev))
            .map_or(0, |s| s.target)
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if elapsed.is_zero() {
            return 0;
        }

        let Some((idx, on_boundary)) = self.locate(elapsed) else {
            return 0;
        };
        let Some(stage) = self.stages.get(idx) else {
            return 0;
        };

        // Boundaries are exact: no interpolation drift at stage ends.
        if on_boundary {
            return stage.target;
        }

        let stage_start = self.stage_start(idx);
        let stage_elapsed = elapsed.saturating_sub(stage_start);
        if stage.duration.is_zero() {
            return stage.target;
        }

        let frac = (stage_elapsed.as_secs_f64() / stage.duration.as_secs_f64()).clamp(0.0, 1.0);
        let prev = self.start_target(idx) as f64;
        let cur = stage.target as f64;

        let value = (prev + frac * (cur - prev)).round();
        if value <= 0.0 { 0 } else { value as u64 }
    }

    /// First cumulative stage end strictly after `elapsed`.
    pub fn next_boundary(&self, elapsed: Duration) -> Option<Duration> {
        let idx = self.cumulative_ends.partition_point(|end| *end <= elapsed);
        self.cumulative_ends.get(idx).copied()
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        if self.stages.is_empty() {
            return None;
        }

        let total = self.total_duration();
        let clamped = elapsed.min(total);

        let idx = if clamped.is_zero() {
            0
        } else {
            self.locate(clamped)
                .map_or(self.stages.len().saturating_sub(1), |(i, _)| i)
        };

        let stage = self.stages.get(idx)?;
        let stage_elapsed = clamped.saturating_sub(self.stage_start(idx));

        Some(StageSnapshot {
            stage: idx + 1,
            stages: self.stages.len(),
            stage_elapsed,
            stage_remaining: stage.duration.saturating_sub(stage_elapsed),
            start_target: self.start_target(idx),
            end_target: stage.target,
            current_target: self.target_at(clamped),
        })
    }
}
