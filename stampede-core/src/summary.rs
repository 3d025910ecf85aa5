use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use stampede_metrics::{MetricKind, MetricSnapshot, MetricsSnapshot, ValueSnapshot};

use crate::builtin::{CHECK_TAG, CHECKS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, HTTP_REQS};
use crate::config::Stage;
use crate::pool::PoolReport;
use crate::thresholds::ThresholdResult;

/// Precomputed values of one metric, folded across its series.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValues {
    Counter {
        count: u64,
        /// Per second over the run duration.
        rate: f64,
    },
    Rate {
        rate: f64,
        passes: u64,
        fails: u64,
    },
    /// All `None` when the trend has no samples.
    Trend {
        count: u64,
        avg: Option<f64>,
        min: Option<f64>,
        med: Option<f64>,
        max: Option<f64>,
        p90: Option<f64>,
        p95: Option<f64>,
        p99: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub name: String,
    pub kind: MetricKind,
    pub values: MetricValues,
}

impl MetricSummary {
    pub fn from_snapshot(metric: &MetricSnapshot, run_duration: Duration) -> Self {
        Self {
            name: metric.name.clone(),
            kind: metric.kind,
            values: summarize_value(&metric.total, run_duration),
        }
    }
}

fn per_second(count: u64, run_duration: Duration) -> f64 {
    let secs = run_duration.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

fn summarize_value(value: &ValueSnapshot, run_duration: Duration) -> MetricValues {
    match value {
        ValueSnapshot::Counter(n) => MetricValues::Counter {
            count: *n,
            rate: per_second(*n, run_duration),
        },
        ValueSnapshot::Rate { passes, fails } => MetricValues::Rate {
            rate: value.rate().unwrap_or(0.0),
            passes: *passes,
            fails: *fails,
        },
        ValueSnapshot::Trend(s) => MetricValues::Trend {
            count: s.len() as u64,
            avg: s.avg(),
            min: s.min(),
            med: s.med(),
            max: s.max(),
            p90: s.percentile(90.0),
            p95: s.percentile(95.0),
            p99: s.percentile(99.0),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Everything the renderers need, computed once after drain.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub base_url: String,
    pub stages: Vec<Stage>,
    pub finished_at: SystemTime,
    pub run_duration: Duration,
    pub total_iterations: u64,
    pub failed_iterations: u64,
    pub max_observed_vus: u64,
    pub aborted_vus: u64,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub checks: Vec<CheckSummary>,
    pub thresholds: Vec<ThresholdResult>,
    pub overall_passed: bool,
}

impl RunResult {
    pub fn new(
        base_url: String,
        stages: Vec<Stage>,
        pool: &PoolReport,
        snapshot: &MetricsSnapshot,
        thresholds: Vec<ThresholdResult>,
    ) -> Self {
        let run_duration = pool.elapsed;
        let metrics = snapshot
            .iter()
            .map(|m| (m.name.clone(), MetricSummary::from_snapshot(m, run_duration)))
            .collect();
        let overall_passed = thresholds.iter().all(|t| t.passed);

        Self {
            base_url,
            stages,
            finished_at: SystemTime::now(),
            run_duration,
            total_iterations: pool.total_iterations,
            failed_iterations: pool.failed_iterations,
            max_observed_vus: pool.max_observed_vus,
            aborted_vus: pool.aborted_vus,
            metrics,
            checks: check_summaries(snapshot),
            thresholds,
            overall_passed,
        }
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    pub fn http_req_duration(&self) -> Option<&MetricValues> {
        self.metric(HTTP_REQ_DURATION).map(|m| &m.values)
    }

    /// `(count, per second)` of `http_reqs`.
    pub fn requests(&self) -> (u64, f64) {
        match self.metric(HTTP_REQS).map(|m| &m.values) {
            Some(MetricValues::Counter { count, rate }) => (*count, *rate),
            _ => (0, 0.0),
        }
    }

    /// `http_req_failed` as a fraction.
    pub fn error_rate(&self) -> f64 {
        match self.metric(HTTP_REQ_FAILED).map(|m| &m.values) {
            Some(MetricValues::Rate { rate, .. }) => *rate,
            _ => 0.0,
        }
    }

    pub fn checks_passed(&self) -> u64 {
        self.checks.iter().map(|c| c.passes).sum()
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks.iter().map(|c| c.fails).sum()
    }
}

fn check_summaries(snapshot: &MetricsSnapshot) -> Vec<CheckSummary> {
    let Some(checks) = snapshot.get(CHECKS) else {
        return Vec::new();
    };
    checks
        .tag_values(CHECK_TAG)
        .into_iter()
        .map(|name| {
            let (passes, fails) = match checks.filtered(CHECK_TAG, &name) {
                ValueSnapshot::Rate { passes, fails } => (passes, fails),
                _ => (0, 0),
            };
            CheckSummary {
                name,
                passes,
                fails,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{builtin_metrics, register_all};
    use stampede_metrics::{Registry, TagSet};

    fn sample_result(thresholds: Vec<ThresholdResult>) -> RunResult {
        let r = Registry::new();
        register_all(&r, &builtin_metrics()).unwrap_or_else(|e| panic!("{e}"));
        let tags = TagSet::empty();
        let reqs = r.counter(HTTP_REQS, &tags).unwrap_or_else(|e| panic!("{e}"));
        reqs.add(20);
        let dur = r.trend(HTTP_REQ_DURATION, &tags).unwrap_or_else(|e| panic!("{e}"));
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            dur.add(v);
        }
        for (name, outcomes) in [("status is 200", [true, true, false]), ("fast", [true; 3])] {
            let rate = r
                .rate(CHECKS, &TagSet::new([(CHECK_TAG, name)]))
                .unwrap_or_else(|e| panic!("{e}"));
            for ok in outcomes {
                rate.add(ok);
            }
        }

        let pool = PoolReport {
            total_iterations: 20,
            failed_iterations: 1,
            max_observed_vus: 4,
            aborted_vus: 0,
            elapsed: Duration::from_secs(10),
        };
        RunResult::new(
            "http://localhost:3000".to_string(),
            vec![Stage::new(Duration::from_secs(10), 4)],
            &pool,
            &r.snapshot(),
            thresholds,
        )
    }

    #[test]
    fn summaries_are_precomputed_per_kind() {
        let res = sample_result(Vec::new());
        assert_eq!(res.requests(), (20, 2.0));
        assert_eq!(res.error_rate(), 0.0);

        match res.http_req_duration() {
            Some(MetricValues::Trend {
                count, avg, med, p95, ..
            }) => {
                assert_eq!(*count, 5);
                assert_eq!(*avg, Some(30.0));
                assert_eq!(*med, Some(30.0));
                assert!(p95.is_some_and(|v| (v - 48.0).abs() < 1e-9));
            }
            other => panic!("unexpected {other:?}"),
        }

        match res.metric(crate::builtin::ITERATION_DURATION).map(|m| &m.values) {
            Some(MetricValues::Trend { count: 0, avg: None, p99: None, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn checks_are_broken_down_by_name() {
        let res = sample_result(Vec::new());
        assert_eq!(
            res.checks,
            vec![
                CheckSummary {
                    name: "fast".to_string(),
                    passes: 3,
                    fails: 0
                },
                CheckSummary {
                    name: "status is 200".to_string(),
                    passes: 2,
                    fails: 1
                },
            ]
        );
        assert_eq!(res.checks_passed(), 5);
        assert_eq!(res.checks_failed(), 1);
    }

    #[test]
    fn overall_verdict_is_the_and_of_thresholds() {
        assert!(sample_result(Vec::new()).overall_passed);

        let verdict = |passed: bool| ThresholdResult {
            metric: HTTP_REQ_DURATION.to_string(),
            expression: "p(95)<500".to_string(),
            observed: Some(48.0),
            passed,
        };
        assert!(sample_result(vec![verdict(true), verdict(true)]).overall_passed);
        assert!(!sample_result(vec![verdict(true), verdict(false)]).overall_passed);
    }
}
