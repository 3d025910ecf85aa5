use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::trend::TrendCell;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MetricKind {
    /// Monotonic sum of non-negative increments.
    Counter,
    /// Fraction of boolean observations that were `true`.
    Rate,
    /// Distribution of numeric samples.
    Trend,
}

#[derive(Debug, Default)]
pub(crate) struct RateCell {
    pub(crate) passes: AtomicU64,
    pub(crate) fails: AtomicU64,
}

#[derive(Debug)]
pub(crate) enum MetricStorage {
    Counter(Arc<AtomicU64>),
    Rate(Arc<RateCell>),
    Trend(Arc<TrendCell>),
}

impl MetricStorage {
    pub(crate) fn new(kind: MetricKind, trend_shards: usize) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(Arc::new(AtomicU64::new(0))),
            MetricKind::Rate => Self::Rate(Arc::new(RateCell::default())),
            MetricKind::Trend => Self::Trend(Arc::new(TrendCell::new(trend_shards))),
        }
    }

    pub(crate) fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Rate(_) => MetricKind::Rate,
            Self::Trend(_) => MetricKind::Trend,
        }
    }
}

/// Write handle for one counter series.
#[derive(Debug, Clone)]
pub struct Counter {
    cell: Arc<AtomicU64>,
}

impl Counter {
    pub(crate) fn new(cell: Arc<AtomicU64>) -> Self {
        Self { cell }
    }

    #[inline]
    pub fn add(&self, value: u64) {
        self.cell.fetch_add(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn value(&self) -> u64 {
        self.cell.load(Ordering::Relaxed)
    }
}

/// Write handle for one rate series.
#[derive(Debug, Clone)]
pub struct Rate {
    cell: Arc<RateCell>,
}

impl Rate {
    pub(crate) fn new(cell: Arc<RateCell>) -> Self {
        Self { cell }
    }

    #[inline]
    pub fn add(&self, value: bool) {
        if value {
            self.cell.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cell.fails.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `(passes, fails)` observed so far.
    pub fn counts(&self) -> (u64, u64) {
        (
            self.cell.passes.load(Ordering::Relaxed),
            self.cell.fails.load(Ordering::Relaxed),
        )
    }
}

/// Write handle for one trend series, pinned to a single shard.
#[derive(Debug, Clone)]
pub struct Trend {
    cell: Arc<TrendCell>,
    shard: usize,
}

impl Trend {
    pub(crate) fn new(cell: Arc<TrendCell>) -> Self {
        let shard = cell.assign_shard();
        Self { cell, shard }
    }

    /// Records one sample. NaN and infinities are dropped.
    #[inline]
    pub fn add(&self, value: f64) {
        if value.is_finite() {
            self.cell.push(self.shard, value);
        }
    }

    pub fn len(&self) -> usize {
        self.cell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
