use std::path::PathBuf;

use crate::error::Result;
use crate::summary::RunResult;

mod html;
mod json;
mod text;

pub use json::JsonSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportFormat {
    Json,
    Text,
    Html,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "txt",
            Self::Html => "html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    pub target: OutputTarget,
    pub content: String,
}

/// Turns a finished run into one or more documents.
pub trait ReportRenderer {
    fn name(&self) -> &'static str;
    fn render(&self, result: &RunResult) -> Result<Vec<RenderedOutput>>;
}

/// Renders `result` in `format`.
pub fn render(result: &RunResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => json::render(result),
        ReportFormat::Text => text::render(result),
        ReportFormat::Html => Ok(html::render(result)),
    }
}

/// One format written to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRenderer {
    pub format: ReportFormat,
    pub target: OutputTarget,
}

impl FormatRenderer {
    pub fn new(format: ReportFormat, target: OutputTarget) -> Self {
        Self { format, target }
    }

    pub fn stdout(format: ReportFormat) -> Self {
        Self::new(format, OutputTarget::Stdout)
    }

    pub fn file(format: ReportFormat, path: impl Into<PathBuf>) -> Self {
        Self::new(format, OutputTarget::File(path.into()))
    }
}

impl ReportRenderer for FormatRenderer {
    fn name(&self) -> &'static str {
        match self.format {
            ReportFormat::Json => "json",
            ReportFormat::Text => "text",
            ReportFormat::Html => "html",
        }
    }

    fn render(&self, result: &RunResult) -> Result<Vec<RenderedOutput>> {
        Ok(vec![RenderedOutput {
            target: self.target.clone(),
            content: render(result, self.format)?,
        }])
    }
}

/// Invokes every renderer once, in order.
pub fn render_all(
    result: &RunResult,
    renderers: &[&dyn ReportRenderer],
) -> Result<Vec<RenderedOutput>> {
    let mut out = Vec::new();
    for renderer in renderers {
        tracing::debug!(renderer = renderer.name(), "rendering report");
        out.extend(renderer.render(result)?);
    }
    Ok(out)
}

/// `12.34ms`, or `n/a` when the statistic has no value.
pub(crate) fn fmt_ms(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}ms"))
}

pub(crate) fn fmt_pct(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;
    use std::time::{Duration, UNIX_EPOCH};

    use stampede_metrics::MetricKind;

    use crate::builtin::{HTTP_REQ_DURATION, HTTP_REQ_FAILED, HTTP_REQS, ITERATIONS};
    use crate::config::Stage;
    use crate::summary::{CheckSummary, MetricSummary, MetricValues, RunResult};
    use crate::thresholds::ThresholdResult;

    pub(crate) fn result() -> RunResult {
        let mut metrics = BTreeMap::new();
        let mut put = |name: &str, kind, values| {
            metrics.insert(
                name.to_string(),
                MetricSummary {
                    name: name.to_string(),
                    kind,
                    values,
                },
            );
        };
        put(
            HTTP_REQS,
            MetricKind::Counter,
            MetricValues::Counter {
                count: 1200,
                rate: 40.0,
            },
        );
        put(
            HTTP_REQ_FAILED,
            MetricKind::Rate,
            MetricValues::Rate {
                rate: 0.0125,
                passes: 15,
                fails: 1185,
            },
        );
        put(
            HTTP_REQ_DURATION,
            MetricKind::Trend,
            MetricValues::Trend {
                count: 1185,
                avg: Some(12.5),
                min: Some(1.25),
                med: Some(10.0),
                max: Some(250.0),
                p90: Some(30.0),
                p95: Some(45.5),
                p99: Some(120.0),
            },
        );
        put(
            ITERATIONS,
            MetricKind::Counter,
            MetricValues::Counter {
                count: 1200,
                rate: 40.0,
            },
        );

        RunResult {
            base_url: "http://localhost:3000".to_string(),
            stages: vec![
                Stage::new(Duration::from_secs(10), 10),
                Stage::new(Duration::from_secs(20), 0),
            ],
            finished_at: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            run_duration: Duration::from_secs(30),
            total_iterations: 1200,
            failed_iterations: 15,
            max_observed_vus: 10,
            aborted_vus: 0,
            metrics,
            checks: vec![CheckSummary {
                name: "status is <200>".to_string(),
                passes: 1185,
                fails: 15,
            }],
            thresholds: vec![
                ThresholdResult {
                    metric: HTTP_REQ_DURATION.to_string(),
                    expression: "p(95)<500".to_string(),
                    observed: Some(45.5),
                    passed: true,
                },
                ThresholdResult {
                    metric: HTTP_REQ_FAILED.to_string(),
                    expression: "rate<0.01".to_string(),
                    observed: Some(0.0125),
                    passed: false,
                },
            ],
            overall_passed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("HTML".parse::<ReportFormat>().ok(), Some(ReportFormat::Html));
        assert_eq!(ReportFormat::Json.to_string(), "json");
        assert!("xml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn render_all_calls_each_renderer_once() {
        let result = fixtures::result();
        let json = FormatRenderer::file(ReportFormat::Json, "out/summary.json");
        let text = FormatRenderer::stdout(ReportFormat::Text);
        let out = render_all(&result, &[&json, &text]).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0].target,
            OutputTarget::File(PathBuf::from("out/summary.json"))
        );
        assert!(out[0].content.starts_with('{'));
        assert_eq!(out[1].target, OutputTarget::Stdout);
        assert!(out[1].content.contains("Thresholds"));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(fmt_ms(Some(1.0)), "1.00ms");
        assert_eq!(fmt_ms(None), "n/a");
        assert_eq!(fmt_pct(0.0125), "1.25%");
    }
}
