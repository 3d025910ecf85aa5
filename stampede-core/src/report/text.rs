use std::fmt::Write as _;

use crate::error::Result;
use crate::summary::{MetricValues, RunResult};

use super::{fmt_ms, fmt_pct};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn mark(passed: bool) -> char {
    if passed { '✓' } else { '✗' }
}

pub(super) fn render(result: &RunResult) -> Result<String> {
    let mut out = String::new();
    write_summary(&mut out, result)?;
    Ok(out)
}

fn write_summary(out: &mut String, r: &RunResult) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{} Load Test Results", mark(r.overall_passed))?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Target: {}", r.base_url)?;
    writeln!(
        out,
        "Duration: {} ({} stages)",
        humantime::format_duration(std::time::Duration::from_millis(
            r.run_duration.as_millis() as u64
        )),
        r.stages.len()
    )?;

    writeln!(out, "HTTP Req Duration:")?;
    match r.http_req_duration() {
        Some(MetricValues::Trend {
            avg,
            min,
            med,
            max,
            p90,
            p95,
            p99,
            ..
        }) => {
            for (label, v) in [
                ("avg", avg),
                ("min", min),
                ("med", med),
                ("max", max),
                ("p90", p90),
                ("p95", p95),
                ("p99", p99),
            ] {
                writeln!(out, "  {label}: {}", fmt_ms(*v))?;
            }
        }
        _ => writeln!(out, "  no samples")?,
    }

    let (requests, rps) = r.requests();
    writeln!(out, "Throughput:")?;
    writeln!(out, "  total requests: {requests}")?;
    writeln!(out, "  requests/sec: {rps:.2}")?;

    writeln!(out, "Error Rate: {}", fmt_pct(r.error_rate()))?;
    writeln!(
        out,
        "Iterations: {} ({} failed)",
        r.total_iterations, r.failed_iterations
    )?;
    writeln!(out, "VUs: {} max", r.max_observed_vus)?;
    if r.aborted_vus > 0 {
        writeln!(out, "Aborted at drain: {}", r.aborted_vus)?;
    }

    if !r.checks.is_empty() {
        writeln!(
            out,
            "Checks: {} passed, {} failed",
            r.checks_passed(),
            r.checks_failed()
        )?;
        for c in &r.checks {
            let total = c.passes + c.fails;
            let ratio = if total == 0 {
                0.0
            } else {
                c.passes as f64 / total as f64
            };
            writeln!(
                out,
                "  {} {} ({}, {} / {})",
                mark(c.fails == 0),
                c.name,
                fmt_pct(ratio),
                c.passes,
                total
            )?;
        }
    }

    if !r.thresholds.is_empty() {
        writeln!(out, "Thresholds:")?;
        for t in &r.thresholds {
            let observed = t
                .observed
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
            writeln!(
                out,
                "  {} {}: {} (observed {observed})",
                mark(t.passed),
                t.metric,
                t.expression
            )?;
        }
    }

    writeln!(
        out,
        "Result: {}",
        if r.overall_passed { "PASSED" } else { "FAILED" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;

    #[test]
    fn text_summary_lists_duration_stats_and_verdicts() {
        let text = render(&fixtures::result()).unwrap_or_else(|e| panic!("{e}"));

        assert!(text.contains("✗ Load Test Results"));
        assert!(text.contains("  p95: 45.50ms"));
        assert!(text.contains("  total requests: 1200"));
        assert!(text.contains("  requests/sec: 40.00"));
        assert!(text.contains("Error Rate: 1.25%"));
        assert!(text.contains("VUs: 10 max"));
        assert!(text.contains("✓ http_req_duration: p(95)<500"));
        assert!(text.contains("✗ http_req_failed: rate<0.01"));
        assert!(text.ends_with("Result: FAILED\n"));
    }

    #[test]
    fn missing_statistics_render_as_na() {
        let mut r = fixtures::result();
        r.metrics.remove(crate::builtin::HTTP_REQ_DURATION);
        r.thresholds.clear();
        r.overall_passed = true;

        let text = render(&r).unwrap_or_else(|e| panic!("{e}"));
        assert!(text.contains("  no samples"));
        assert!(!text.contains("Thresholds:"));
        assert!(text.ends_with("Result: PASSED\n"));
    }
}
