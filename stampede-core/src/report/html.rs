use crate::summary::{MetricValues, RunResult};

use super::{fmt_ms, fmt_pct};

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn verdict_class(passed: bool) -> &'static str {
    if passed {
        "threshold-pass"
    } else {
        "threshold-fail"
    }
}

fn duration_rows(r: &RunResult) -> String {
    let Some(MetricValues::Trend {
        avg,
        min,
        med,
        max,
        p90,
        p95,
        p99,
        ..
    }) = r.http_req_duration()
    else {
        return "    <p>No responses were recorded.</p>".to_string();
    };

    [
        ("Average", avg),
        ("Min", min),
        ("Median", med),
        ("Max", max),
        ("P90", p90),
        ("P95", p95),
        ("P99", p99),
    ]
    .iter()
    .map(|(label, v)| format!("    <p>{label}: <span class=\"value\">{}</span></p>", fmt_ms(**v)))
    .collect::<Vec<_>>()
    .join("\n")
}

fn check_rows(r: &RunResult) -> String {
    r.checks
        .iter()
        .map(|c| {
            format!(
                "      <tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td></tr>",
                verdict_class(c.fails == 0),
                html_escape(&c.name),
                c.passes,
                c.fails
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn threshold_rows(r: &RunResult) -> String {
    r.thresholds
        .iter()
        .map(|t| {
            let observed = t
                .observed
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
            format!(
                "      <tr class=\"{}\"><td>{}</td><td>{}</td><td>{observed}</td><td>{}</td></tr>",
                verdict_class(t.passed),
                html_escape(&t.metric),
                html_escape(&t.expression),
                if t.passed { "✓" } else { "✗" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(super) fn render(r: &RunResult) -> String {
    let (requests, rps) = r.requests();
    let error_rate = r.error_rate();
    let generated = humantime::format_rfc3339_seconds(r.finished_at);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Load Test Report</title>
  <style>
    body {{ font-family: Arial, sans-serif; margin: 40px; }}
    h1 {{ color: #333; }}
    .metric {{ margin: 20px 0; padding: 15px; background: #f5f5f5; border-radius: 5px; }}
    .metric h3 {{ margin-top: 0; color: #666; }}
    .value {{ font-size: 24px; font-weight: bold; color: #0066cc; }}
    table {{ border-collapse: collapse; }}
    td, th {{ padding: 4px 12px; text-align: left; }}
    .threshold-pass {{ color: #00aa00; }}
    .threshold-fail {{ color: #cc0000; }}
  </style>
</head>
<body>
  <h1>Load Test Report</h1>
  <p>Target: {base_url}</p>
  <p>Generated: {generated}</p>
  <p class="{overall_class}">Result: {overall}</p>

  <div class="metric">
    <h3>HTTP Request Duration</h3>
{duration_rows}
  </div>

  <div class="metric">
    <h3>Throughput</h3>
    <p>Total Requests: <span class="value">{requests}</span></p>
    <p>Requests/sec: <span class="value">{rps:.2}</span></p>
    <p>Iterations: <span class="value">{iterations}</span></p>
    <p>Max VUs: <span class="value">{max_vus}</span></p>
  </div>

  <div class="metric">
    <h3>Error Rate</h3>
    <p class="{error_class}">{error_rate}</p>
  </div>

  <div class="metric">
    <h3>Checks</h3>
    <table>
      <tr><th>Check</th><th>Passed</th><th>Failed</th></tr>
{check_rows}
    </table>
  </div>

  <div class="metric">
    <h3>Thresholds</h3>
    <table>
      <tr><th>Metric</th><th>Threshold</th><th>Observed</th><th></th></tr>
{threshold_rows}
    </table>
  </div>
</body>
</html>
"#,
        base_url = html_escape(&r.base_url),
        overall_class = verdict_class(r.overall_passed),
        overall = if r.overall_passed { "PASSED" } else { "FAILED" },
        duration_rows = duration_rows(r),
        iterations = r.total_iterations,
        max_vus = r.max_observed_vus,
        // Styled by the http_req_failed verdict when one exists.
        error_class = verdict_class(
            r.thresholds
                .iter()
                .filter(|t| t.metric == crate::builtin::HTTP_REQ_FAILED)
                .all(|t| t.passed)
        ),
        error_rate = fmt_pct(error_rate),
        check_rows = check_rows(r),
        threshold_rows = threshold_rows(r),
    )
}
