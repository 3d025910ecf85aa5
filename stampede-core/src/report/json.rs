use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::summary::{MetricValues, RunResult};
use crate::thresholds::ThresholdResult;

#[derive(Debug, Serialize)]
pub struct JsonSummary<'a> {
    pub base_url: &'a str,
    pub finished_at: String,
    pub run_duration_ms: f64,
    pub stages: Vec<JsonStage>,
    pub totals: JsonTotals,
    pub metrics: BTreeMap<&'a str, JsonMetric>,
    pub checks: Vec<JsonCheck<'a>>,
    pub thresholds: &'a [ThresholdResult],
    pub overall_passed: bool,
}

#[derive(Debug, Serialize)]
pub struct JsonStage {
    pub duration: String,
    pub target: u64,
}

#[derive(Debug, Serialize)]
pub struct JsonTotals {
    pub iterations: u64,
    pub failed_iterations: u64,
    pub max_observed_vus: u64,
    pub aborted_vus: u64,
    pub requests: u64,
    pub requests_per_sec: f64,
    pub error_rate: f64,
    pub checks_passed: u64,
    pub checks_failed: u64,
}

#[derive(Debug, Serialize)]
pub struct JsonMetric {
    #[serde(rename = "type")]
    pub kind: String,
    pub values: BTreeMap<&'static str, Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonCheck<'a> {
    pub name: &'a str,
    pub passes: u64,
    pub fails: u64,
}

fn metric_values(values: &MetricValues) -> BTreeMap<&'static str, Value> {
    match values {
        MetricValues::Counter { count, rate } => {
            BTreeMap::from([("count", json!(count)), ("rate", json!(rate))])
        }
        MetricValues::Rate {
            rate,
            passes,
            fails,
        } => BTreeMap::from([
            ("rate", json!(rate)),
            ("passes", json!(passes)),
            ("fails", json!(fails)),
        ]),
        MetricValues::Trend {
            count,
            avg,
            min,
            med,
            max,
            p90,
            p95,
            p99,
        } => BTreeMap::from([
            ("count", json!(count)),
            ("avg", json!(avg)),
            ("min", json!(min)),
            ("med", json!(med)),
            ("max", json!(max)),
            ("p(90)", json!(p90)),
            ("p(95)", json!(p95)),
            ("p(99)", json!(p99)),
        ]),
    }
}

impl<'a> JsonSummary<'a> {
    pub fn new(result: &'a RunResult) -> Self {
        let (requests, requests_per_sec) = result.requests();

        Self {
            base_url: &result.base_url,
            finished_at: humantime::format_rfc3339_seconds(result.finished_at).to_string(),
            run_duration_ms: result.run_duration.as_secs_f64() * 1000.0,
            stages: result
                .stages
                .iter()
                .map(|s| JsonStage {
                    duration: humantime::format_duration(s.duration).to_string(),
                    target: s.target,
                })
                .collect(),
            totals: JsonTotals {
                iterations: result.total_iterations,
                failed_iterations: result.failed_iterations,
                max_observed_vus: result.max_observed_vus,
                aborted_vus: result.aborted_vus,
                requests,
                requests_per_sec,
                error_rate: result.error_rate(),
                checks_passed: result.checks_passed(),
                checks_failed: result.checks_failed(),
            },
            metrics: result
                .metrics
                .iter()
                .map(|(name, m)| {
                    (
                        name.as_str(),
                        JsonMetric {
                            kind: m.kind.to_string(),
                            values: metric_values(&m.values),
                        },
                    )
                })
                .collect(),
            checks: result
                .checks
                .iter()
                .map(|c| JsonCheck {
                    name: &c.name,
                    passes: c.passes,
                    fails: c.fails,
                })
                .collect(),
            thresholds: &result.thresholds,
            overall_passed: result.overall_passed,
        }
    }
}

pub(super) fn render(result: &RunResult) -> Result<String> {
    let mut out = serde_json::to_string_pretty(&JsonSummary::new(result))?;
    out.push('\n');
    Ok(out)
}
