use std::collections::BTreeMap;

use crate::metrics::MetricKind;
use crate::tags::TagSet;
use crate::trend::Samples;

/// Frozen value of a series (or of a whole metric, folded across series).
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSnapshot {
    Counter(u64),
    Rate { passes: u64, fails: u64 },
    Trend(Samples),
}

impl ValueSnapshot {
    pub fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(0),
            MetricKind::Rate => Self::Rate {
                passes: 0,
                fails: 0,
            },
            MetricKind::Trend => Self::Trend(Samples::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Rate { .. } => MetricKind::Rate,
            Self::Trend(_) => MetricKind::Trend,
        }
    }

    /// Counter sum, rate observations, or trend sample count.
    pub fn count(&self) -> u64 {
        match self {
            Self::Counter(v) => *v,
            Self::Rate { passes, fails } => passes + fails,
            Self::Trend(s) => s.len() as u64,
        }
    }

    /// `passes / (passes + fails)`, or `0.0` before any observation.
    /// `None` for non-rate values.
    pub fn rate(&self) -> Option<f64> {
        match self {
            Self::Rate { passes, fails } => {
                let total = passes + fails;
                Some(if total == 0 {
                    0.0
                } else {
                    *passes as f64 / total as f64
                })
            }
            _ => None,
        }
    }

    pub fn samples(&self) -> Option<&Samples> {
        match self {
            Self::Trend(s) => Some(s),
            _ => None,
        }
    }

    /// Folds values of `kind`; parts of another kind are skipped.
    pub(crate) fn fold<'a>(kind: MetricKind, parts: impl IntoIterator<Item = &'a Self>) -> Self {
        let parts: Vec<&Self> = parts.into_iter().collect();
        match kind {
            MetricKind::Counter => Self::Counter(
                parts
                    .iter()
                    .filter_map(|p| match p {
                        Self::Counter(v) => Some(*v),
                        _ => None,
                    })
                    .sum(),
            ),
            MetricKind::Rate => {
                let (mut passes, mut fails) = (0, 0);
                for p in &parts {
                    if let Self::Rate {
                        passes: ps,
                        fails: fs,
                    } = p
                    {
                        passes += ps;
                        fails += fs;
                    }
                }
                Self::Rate { passes, fails }
            }
            MetricKind::Trend => Self::Trend(Samples::merge(parts.iter().filter_map(|p| p.samples()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub tags: TagSet,
    pub value: ValueSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub name: String,
    pub kind: MetricKind,
    /// All series folded together.
    pub total: ValueSnapshot,
    /// Sorted by tag set.
    pub series: Vec<SeriesSnapshot>,
}

impl MetricSnapshot {
    pub(crate) fn new(name: String, kind: MetricKind, mut series: Vec<SeriesSnapshot>) -> Self {
        series.sort_by(|a, b| a.tags.cmp(&b.tags));
        let total = ValueSnapshot::fold(kind, series.iter().map(|s| &s.value));
        Self {
            name,
            kind,
            total,
            series,
        }
    }

    /// Folds only the series tagged `key=value`.
    pub fn filtered(&self, key: &str, value: &str) -> ValueSnapshot {
        ValueSnapshot::fold(
            self.kind,
            self.series
                .iter()
                .filter(|s| s.tags.contains(key, value))
                .map(|s| &s.value),
        )
    }

    /// Distinct values of tag `key` across series, sorted.
    pub fn tag_values(&self, key: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .series
            .iter()
            .filter_map(|s| s.tags.get(key).map(str::to_string))
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

/// Point-in-time copy of every registered metric, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    metrics: BTreeMap<String, MetricSnapshot>,
}

impl MetricsSnapshot {
    pub(crate) fn insert(&mut self, metric: MetricSnapshot) {
        self.metrics.insert(metric.name.clone(), metric);
    }

    pub fn get(&self, name: &str) -> Option<&MetricSnapshot> {
        self.metrics.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSnapshot> + '_ {
        self.metrics.values()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(passes: u64, fails: u64) -> ValueSnapshot {
        ValueSnapshot::Rate { passes, fails }
    }

    #[test]
    fn rate_is_passes_over_total_and_zero_when_empty() {
        assert_eq!(rate(3, 1).rate(), Some(0.75));
        assert_eq!(rate(0, 0).rate(), Some(0.0));
        assert_eq!(ValueSnapshot::Counter(4).rate(), None);
    }

    #[test]
    fn metric_total_folds_series() {
        let m = MetricSnapshot::new(
            "checks".to_string(),
            MetricKind::Rate,
            vec![
                SeriesSnapshot {
                    tags: TagSet::new([("check", "b")]),
                    value: rate(1, 1),
                },
                SeriesSnapshot {
                    tags: TagSet::new([("check", "a")]),
                    value: rate(4, 0),
                },
            ],
        );

        assert_eq!(m.total, rate(5, 1));
        assert_eq!(m.filtered("check", "b"), rate(1, 1));
        assert_eq!(m.filtered("check", "zzz"), rate(0, 0));
        assert_eq!(m.tag_values("check"), vec!["a", "b"]);
        assert_eq!(m.series.first().map(|s| s.tags.get("check")), Some(Some("a")));
    }

    #[test]
    fn trend_fold_merges_samples() {
        let a = ValueSnapshot::Trend(Samples::from_unsorted(vec![3.0, 1.0]));
        let b = ValueSnapshot::Trend(Samples::from_unsorted(vec![2.0]));
        let folded = ValueSnapshot::fold(MetricKind::Trend, [&a, &b]);
        assert_eq!(folded.count(), 3);
        assert_eq!(folded.samples().and_then(|s| s.med()), Some(2.0));
    }
}
