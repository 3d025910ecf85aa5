use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metrics::{Counter, MetricKind, MetricStorage, Rate, Trend};
use crate::snapshot::{MetricSnapshot, MetricsSnapshot, SeriesSnapshot, ValueSnapshot};
use crate::tags::TagSet;
use crate::trend::{DEFAULT_TREND_SHARDS, Samples};

const MAX_NAME_LEN: usize = 128;

#[derive(Debug)]
struct MetricDef {
    kind: MetricKind,
    series: DashMap<TagSet, MetricStorage>,
}

/// Process-wide store of named metrics.
///
/// Handles are cheap to clone and safe to use from any task; all writes are
/// commutative so the final snapshot does not depend on scheduling.
#[derive(Debug)]
pub struct Registry {
    metrics: DashMap<Arc<str>, Arc<MetricDef>>,
    trend_shards: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_trend_shards(DEFAULT_TREND_SHARDS)
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if ok {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trend_shards(trend_shards: usize) -> Self {
        Self {
            metrics: DashMap::new(),
            trend_shards: trend_shards.max(1),
        }
    }

    /// Registers `name` as `kind`. Registering the same name with the same
    /// kind again is a no-op.
    pub fn register(&self, name: &str, kind: MetricKind) -> Result<()> {
        validate_name(name)?;

        let def = self
            .metrics
            .entry(Arc::from(name))
            .or_insert_with(|| {
                Arc::new(MetricDef {
                    kind,
                    series: DashMap::new(),
                })
            })
            .clone();

        if def.kind != kind {
            return Err(Error::KindMismatch {
                name: name.to_string(),
                existing: def.kind,
                requested: kind,
            });
        }
        Ok(())
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).map(|d| d.kind)
    }

    /// Registered names with their kinds, sorted by name.
    pub fn definitions(&self) -> Vec<(String, MetricKind)> {
        let mut out: Vec<_> = self
            .metrics
            .iter()
            .map(|e| (e.key().to_string(), e.value().kind))
            .collect();
        out.sort();
        out
    }

    fn def(&self, name: &str, kind: MetricKind) -> Result<Arc<MetricDef>> {
        let def = self
            .metrics
            .get(name)
            .map(|d| d.value().clone())
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;

        if def.kind != kind {
            return Err(Error::KindMismatch {
                name: name.to_string(),
                existing: def.kind,
                requested: kind,
            });
        }
        Ok(def)
    }

    fn with_series<T>(
        &self,
        name: &str,
        kind: MetricKind,
        tags: &TagSet,
        f: impl FnOnce(&MetricStorage) -> Option<T>,
    ) -> Result<T> {
        let def = self.def(name, kind)?;
        let storage = def
            .series
            .entry(tags.clone())
            .or_insert_with(|| MetricStorage::new(kind, self.trend_shards));

        f(storage.value()).ok_or_else(|| Error::KindMismatch {
            name: name.to_string(),
            existing: storage.kind(),
            requested: kind,
        })
    }

    pub fn counter(&self, name: &str, tags: &TagSet) -> Result<Counter> {
        self.with_series(name, MetricKind::Counter, tags, |s| match s {
            MetricStorage::Counter(c) => Some(Counter::new(c.clone())),
            _ => None,
        })
    }

    pub fn rate(&self, name: &str, tags: &TagSet) -> Result<Rate> {
        self.with_series(name, MetricKind::Rate, tags, |s| match s {
            MetricStorage::Rate(r) => Some(Rate::new(r.clone())),
            _ => None,
        })
    }

    pub fn trend(&self, name: &str, tags: &TagSet) -> Result<Trend> {
        self.with_series(name, MetricKind::Trend, tags, |s| match s {
            MetricStorage::Trend(t) => Some(Trend::new(t.clone())),
            _ => None,
        })
    }

    /// Copies every metric and series. Registered metrics without series
    /// appear with an empty total.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut out = MetricsSnapshot::default();

        for entry in self.metrics.iter() {
            let def = entry.value();
            let series = def
                .series
                .iter()
                .map(|s| SeriesSnapshot {
                    tags: s.key().clone(),
                    value: freeze(s.value()),
                })
                .collect();

            out.insert(MetricSnapshot::new(entry.key().to_string(), def.kind, series));
        }

        out
    }
}

fn freeze(storage: &MetricStorage) -> ValueSnapshot {
    use std::sync::atomic::Ordering;

    match storage {
        MetricStorage::Counter(c) => ValueSnapshot::Counter(c.load(Ordering::Relaxed)),
        MetricStorage::Rate(r) => ValueSnapshot::Rate {
            passes: r.passes.load(Ordering::Relaxed),
            fails: r.fails.load(Ordering::Relaxed),
        },
        MetricStorage::Trend(t) => {
            let mut values = Vec::new();
            t.collect_into(&mut values);
            ValueSnapshot::Trend(Samples::from_unsorted(values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_for_same_kind() {
        let r = Registry::new();
        assert!(r.register("http_reqs", MetricKind::Counter).is_ok());
        assert!(r.register("http_reqs", MetricKind::Counter).is_ok());
        assert_eq!(r.definitions().len(), 1);
    }

    #[test]
    fn register_rejects_kind_conflict() {
        let r = Registry::new();
        assert!(r.register("errors", MetricKind::Rate).is_ok());
        let err = r.register("errors", MetricKind::Counter);
        assert!(matches!(
            err,
            Err(Error::KindMismatch {
                existing: MetricKind::Rate,
                requested: MetricKind::Counter,
                ..
            })
        ));
    }

    #[test]
    fn register_rejects_invalid_names() {
        let r = Registry::new();
        let too_long = "x".repeat(129);
        for bad in ["", "1abc", "has space", "dash-ed", too_long.as_str()] {
            assert!(
                matches!(r.register(bad, MetricKind::Counter), Err(Error::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(r.register("group.metric_2", MetricKind::Counter).is_ok());
    }

    #[test]
    fn handles_require_registration_and_matching_kind() {
        let r = Registry::new();
        assert!(matches!(
            r.counter("missing", &TagSet::empty()),
            Err(Error::UnknownMetric(_))
        ));

        assert!(r.register("latency", MetricKind::Trend).is_ok());
        assert!(matches!(
            r.counter("latency", &TagSet::empty()),
            Err(Error::KindMismatch { .. })
        ));
        assert!(r.trend("latency", &TagSet::empty()).is_ok());
    }

    #[test]
    fn concurrent_counter_adds_are_summed() {
        let r = Arc::new(Registry::new());
        assert!(r.register("hits", MetricKind::Counter).is_ok());

        let threads: Vec<_> = [3_u64, 2]
            .into_iter()
            .map(|n| {
                let r = r.clone();
                std::thread::spawn(move || {
                    let c = r
                        .counter("hits", &TagSet::empty())
                        .unwrap_or_else(|e| panic!("counter: {e}"));
                    c.add(n);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap_or_else(|_| panic!("thread panicked"));
        }

        let snap = r.snapshot();
        let hits = snap.get("hits").map(|m| m.total.count());
        assert_eq!(hits, Some(5));
    }

    #[test]
    fn snapshot_folds_series_and_keeps_tags() {
        let r = Registry::new();
        assert!(r.register("checks", MetricKind::Rate).is_ok());

        let ok = r
            .rate("checks", &TagSet::new([("check", "status is 200")]))
            .unwrap_or_else(|e| panic!("{e}"));
        let body = r
            .rate("checks", &TagSet::new([("check", "has body")]))
            .unwrap_or_else(|e| panic!("{e}"));
        ok.add(true);
        ok.add(true);
        body.add(false);

        let snap = r.snapshot();
        let checks = snap.get("checks").unwrap_or_else(|| panic!("missing"));
        assert_eq!(checks.series.len(), 2);
        assert_eq!(
            checks.total,
            ValueSnapshot::Rate {
                passes: 2,
                fails: 1
            }
        );
        assert_eq!(checks.filtered("check", "has body").rate(), Some(0.0));
    }

    #[test]
    fn trend_snapshot_collects_all_handles() {
        let r = Registry::with_trend_shards(2);
        assert!(r.register("d", MetricKind::Trend).is_ok());

        let a = r.trend("d", &TagSet::empty()).unwrap_or_else(|e| panic!("{e}"));
        let b = r.trend("d", &TagSet::empty()).unwrap_or_else(|e| panic!("{e}"));
        a.add(1.0);
        b.add(5.0);
        a.add(3.0);

        let snap = r.snapshot();
        let d = snap.get("d").and_then(|m| m.total.samples().cloned());
        assert_eq!(d.as_ref().map(|s| s.as_slice().to_vec()), Some(vec![1.0, 3.0, 5.0]));
    }

    #[test]
    fn registered_metric_without_samples_is_in_snapshot() {
        let r = Registry::new();
        assert!(r.register("iterations", MetricKind::Counter).is_ok());
        let snap = r.snapshot();
        assert_eq!(snap.get("iterations").map(|m| m.total.count()), Some(0));
    }
}
