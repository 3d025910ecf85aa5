use anyhow::Context as _;
use std::sync::Arc;

use stampede_core::report::{FormatRenderer, ReportFormat, ReportRenderer, render_all};
use stampede_core::{RunResult, write_outputs};

use crate::cli::{ConfigArgs, RunArgs};
use crate::config::{FileConfig, Overrides, Resolved, load_file};
use crate::exit_codes::ExitCode;
use crate::output;
use crate::profiles::Profile;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let overrides = Overrides {
        base_url: args.config.base_url.clone(),
        think_time: args.config.think_time,
        summary_json: args.summary_json.clone(),
        html: args.html.clone(),
        no_summary_file: args.no_summary_file,
    };
    let Resolved {
        plan,
        scenario,
        outputs,
    } = resolve(&args.config, &overrides)
        .await
        .map_err(RunError::InvalidInput)?;

    out.print_header(&plan);
    let result = stampede_core::run(plan, Arc::new(scenario), out.progress()).await;
    out.finish_progress();
    let result = result?;

    let mut renderers = vec![out.summary()];
    if let Some(path) = outputs.summary_json {
        renderers.push(FormatRenderer::file(ReportFormat::Json, path));
    }
    if let Some(path) = outputs.html {
        renderers.push(FormatRenderer::file(ReportFormat::Html, path));
    }
    write_reports(&result, &renderers).map_err(RunError::RuntimeError)?;

    print_threshold_failures(&result);
    Ok(ExitCode::from_verdict(result.overall_passed))
}

pub async fn validate(args: ConfigArgs) -> Result<ExitCode, RunError> {
    let overrides = Overrides {
        base_url: args.base_url.clone(),
        think_time: args.think_time,
        ..Overrides::default()
    };
    let resolved = resolve(&args, &overrides)
        .await
        .map_err(RunError::InvalidInput)?;
    let prepared = stampede_core::prepare(&resolved.plan, &resolved.scenario)?;

    let plan = &resolved.plan;
    println!("configuration ok");
    println!("  target: {}", plan.base_url);
    println!(
        "  stages: {} (total {}, peak {} VUs)",
        plan.stages.len(),
        humantime::format_duration(plan.total_duration()),
        plan.peak_target()
    );
    println!("  steps: {}", resolved.scenario.steps().count());
    println!("  thresholds: {}", prepared.thresholds.len());
    Ok(ExitCode::Success)
}

/// Profile (explicit, or `health` without a file), then the file, then flags.
async fn resolve(args: &ConfigArgs, overrides: &Overrides) -> anyhow::Result<Resolved> {
    let profile = match (args.profile, &args.config) {
        (Some(p), _) => Some(p),
        (None, None) => Some(Profile::Health),
        (None, Some(_)) => None,
    };
    tracing::debug!(profile = ?profile, config = ?args.config, "resolving configuration");

    let mut cfg = match profile {
        Some(p) => p.load()?,
        None => FileConfig::default(),
    };
    if let Some(path) = &args.config {
        cfg = cfg.overlay(load_file(path).await?);
    }
    cfg.resolve(overrides)
}

fn write_reports(result: &RunResult, renderers: &[FormatRenderer]) -> anyhow::Result<()> {
    let renderers = renderers
        .iter()
        .map(|r| r as &dyn ReportRenderer)
        .collect::<Vec<_>>();
    let rendered = render_all(result, &renderers).context("failed to render reports")?;

    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let written = write_outputs(&cwd, &rendered, &mut std::io::stdout().lock())
        .context("failed to write reports")?;
    for path in written {
        eprintln!("report: {}", path.display());
    }
    Ok(())
}

fn print_threshold_failures(result: &RunResult) {
    let failed = result.thresholds.iter().filter(|t| !t.passed).collect::<Vec<_>>();
    if failed.is_empty() {
        return;
    }

    eprintln!("thresholds failed: {}", failed.len());
    for t in failed {
        match t.observed {
            Some(o) => eprintln!("  {}: {} (observed {o})", t.metric, t.expression),
            None => eprintln!("  {}: {} (no samples)", t.metric, t.expression),
        }
    }
}
