use stampede_core::report::FormatRenderer;
use stampede_core::{ProgressFn, RunPlan};

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, plan: &RunPlan);
    fn progress(&self) -> Option<ProgressFn>;
    /// Called once the pool has drained, before any report is printed.
    fn finish_progress(&self);
    /// The report that goes to stdout.
    fn summary(&self) -> FormatRenderer;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
