use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_TREND_SHARDS: usize = 16;

/// Append-only sample storage for one trend series.
///
/// Writers are spread over independent shards so concurrent VUs don't queue
/// behind a single lock. Each handle sticks to the shard it was assigned.
#[derive(Debug)]
pub(crate) struct TrendCell {
    shards: Box<[Mutex<Vec<f64>>]>,
    next_shard: AtomicUsize,
}

impl TrendCell {
    pub(crate) fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(Vec::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            next_shard: AtomicUsize::new(0),
        }
    }

    pub(crate) fn assign_shard(&self) -> usize {
        self.next_shard.fetch_add(1, Ordering::Relaxed) % self.shards.len()
    }

    #[inline]
    pub(crate) fn push(&self, shard: usize, value: f64) {
        if let Some(buf) = self.shards.get(shard % self.shards.len()) {
            buf.lock().push(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub(crate) fn collect_into(&self, out: &mut Vec<f64>) {
        for shard in self.shards.iter() {
            out.extend_from_slice(&shard.lock());
        }
    }
}

/// Frozen trend samples, sorted ascending.
///
/// Every statistic is a function of the sample multiset only, so the order in
/// which workers appended values never changes a result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    sorted: Vec<f64>,
}

impl Samples {
    pub fn from_unsorted(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        Self { sorted: values }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.sorted
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    pub fn avg(&self) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        let sum: f64 = self.sorted.iter().sum();
        Some(sum / self.sorted.len() as f64)
    }

    pub fn med(&self) -> Option<f64> {
        self.percentile(50.0)
    }

    /// Linear interpolation between the closest order statistics:
    /// `rank = p/100 * (n-1)`, `v[lo] + (rank - lo) * (v[hi] - v[lo])`.
    ///
    /// `p` is clamped to `0..=100`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let n = self.sorted.len();
        if n == 0 || p.is_nan() {
            return None;
        }

        let p = p.clamp(0.0, 100.0);
        let rank = p / 100.0 * (n - 1) as f64;
        let lo = rank.floor();
        let hi = rank.ceil();

        let lo_v = *self.sorted.get(lo as usize)?;
        let hi_v = *self.sorted.get(hi as usize)?;
        Some(lo_v + (rank - lo) * (hi_v - lo_v))
    }

    pub(crate) fn merge<'a>(parts: impl IntoIterator<Item = &'a Samples>) -> Self {
        let mut all = Vec::new();
        for part in parts {
            all.extend_from_slice(&part.sorted);
        }
        Self::from_unsorted(all)
    }
}
