use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use stampede_core::report::{FormatRenderer, ReportFormat};
use stampede_core::{ProgressFn, ProgressUpdate, RunPlan};

use super::OutputFormatter;

/// Progress as NDJSON on stderr; stdout carries only the summary document.
pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan: &RunPlan) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u: ProgressUpdate| {
            emit_json_line(&JsonProgressLine::from(&u));
        }))
    }

    fn finish_progress(&self) {}

    fn summary(&self) -> FormatRenderer {
        FormatRenderer::stdout(ReportFormat::Json)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_ms: u64,
    pub total_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,
    pub target: u64,
    pub live_vus: u64,
    pub iterations_total: u64,
    pub requests_total: u64,
}

impl From<&ProgressUpdate> for JsonProgressLine {
    fn from(u: &ProgressUpdate) -> Self {
        Self {
            kind: "progress",
            tick: u.tick,
            elapsed_ms: u64::try_from(u.elapsed.as_millis()).unwrap_or(u64::MAX),
            total_ms: u64::try_from(u.total_duration.as_millis()).unwrap_or(u64::MAX),
            stage: u.stage.as_ref().map(|s| s.stage),
            target: u.target,
            live_vus: u.live_vus,
            iterations_total: u.iterations_total,
            requests_total: u.requests_total,
        }
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let Ok(s) = serde_json::to_string(line) else {
        return;
    };
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "{s}");
}
