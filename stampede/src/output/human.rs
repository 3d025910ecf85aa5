use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

mod format;
mod progress;

use format::{format_elapsed, format_rate};
use progress::HumanProgress;
use stampede_core::report::{FormatRenderer, ReportFormat};
use stampede_core::{ProgressFn, ProgressUpdate, RunPlan};

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, plan: &RunPlan) {
        println!("target: {}", plan.base_url);
        println!(
            "stages: {} total={} peak_vus={} think_time={}",
            plan.stages.len(),
            format_elapsed(plan.total_duration()),
            plan.peak_target(),
            format_elapsed(plan.think_time)
        );
        if !plan.thresholds.is_empty() {
            let metrics = plan
                .thresholds
                .iter()
                .map(|t| t.metric.as_str())
                .collect::<Vec<_>>()
                .join(",");
            println!("thresholds: {metrics}");
        }
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        let prev_iters = Arc::new(AtomicU64::new(0));
        let prev_elapsed_ms = Arc::new(AtomicU64::new(0));

        Some(Arc::new(move |u: ProgressUpdate| {
            let elapsed_ms = u64::try_from(u.elapsed.as_millis()).unwrap_or(u64::MAX);
            let prev_ms = prev_elapsed_ms.swap(elapsed_ms, Ordering::Relaxed);
            let prev = prev_iters.swap(u.iterations_total, Ordering::Relaxed);

            let dt = (elapsed_ms.saturating_sub(prev_ms) as f64 / 1000.0).max(1e-9);
            let iters_per_sec = u.iterations_total.saturating_sub(prev) as f64 / dt;

            progress.update(u.total_duration, u.elapsed, message(&u, iters_per_sec));
        }))
    }

    fn finish_progress(&self) {
        self.progress.finish();
    }

    fn summary(&self) -> FormatRenderer {
        FormatRenderer::stdout(ReportFormat::Text)
    }
}

fn message(u: &ProgressUpdate, iters_per_sec: f64) -> String {
    let rates = format!(
        "vus={}/{} iters={} iters/s={} reqs={}",
        u.live_vus,
        u.target,
        u.iterations_total,
        format_rate(iters_per_sec),
        u.requests_total
    );
    match &u.stage {
        Some(stage) => format!(
            "stage={}/{} elapsed={} stage_remaining={} {rates}",
            stage.stage,
            stage.stages,
            format_elapsed(u.elapsed),
            format_elapsed(stage.stage_remaining),
        ),
        None => format!("draining elapsed={} {rates}", format_elapsed(u.elapsed)),
    }
}
