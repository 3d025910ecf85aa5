use std::sync::Arc;

use stampede_http::{DEFAULT_CONNECT_TIMEOUT, HttpClient};
use stampede_metrics::Registry;

use crate::builtin::{builtin_metrics, register_all};
use crate::config::RunPlan;
use crate::error::Result;
use crate::pool::{PoolConfig, VuPool};
use crate::progress::ProgressFn;
use crate::schedule::RampingSchedule;
use crate::summary::RunResult;
use crate::thresholds::Thresholds;
use crate::vu::{RunContext, Scenario};

/// A run that passed every configuration check. Nothing has been sent yet.
#[derive(Debug)]
pub struct PreparedRun {
    pub registry: Registry,
    pub thresholds: Thresholds,
}

/// Validates the plan and the scenario, registers built-in and scenario
/// metrics and compiles thresholds against them.
pub fn prepare<S: Scenario>(plan: &RunPlan, scenario: &S) -> Result<PreparedRun> {
    plan.validate()?;
    scenario.validate()?;

    let registry = Registry::new();
    register_all(&registry, &builtin_metrics())?;
    register_all(&registry, &scenario.metrics())?;

    let thresholds = Thresholds::compile(&plan.thresholds, &registry.definitions())?;
    Ok(PreparedRun {
        registry,
        thresholds,
    })
}

/// Runs `scenario` through every stage of `plan`, drains, and evaluates
/// thresholds once against the final metrics.
pub async fn run<S: Scenario>(
    plan: RunPlan,
    scenario: Arc<S>,
    progress: Option<ProgressFn>,
) -> Result<RunResult> {
    let PreparedRun {
        registry,
        thresholds,
    } = prepare(&plan, scenario.as_ref())?;

    tracing::info!(
        base_url = %plan.base_url,
        stages = plan.stages.len(),
        total = ?plan.total_duration(),
        peak_vus = plan.peak_target(),
        thresholds = thresholds.len(),
        "starting run"
    );

    let client = HttpClient::new(Some(DEFAULT_CONNECT_TIMEOUT), plan.request_timeout);
    let ctx = Arc::new(RunContext::new(plan.base_url.clone(), client, registry));

    let pool = VuPool::new(
        RampingSchedule::new(plan.stages.clone()),
        PoolConfig {
            poll_interval: plan.poll_interval,
            drain_timeout: plan.drain_timeout,
            think_time: plan.think_time,
        },
        ctx.clone(),
        scenario,
    );
    let report = pool.run(progress).await?;

    let snapshot = ctx.registry.snapshot();
    let verdicts = thresholds.evaluate(&snapshot, report.elapsed);
    for v in verdicts.iter().filter(|v| !v.passed) {
        tracing::info!(
            metric = %v.metric,
            threshold = %v.expression,
            observed = ?v.observed,
            "threshold failed"
        );
    }

    let result = RunResult::new(plan.base_url, plan.stages, &report, &snapshot, verdicts);
    tracing::info!(
        passed = result.overall_passed,
        iterations = result.total_iterations,
        duration = ?result.run_duration,
        "run finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::MetricDecl;
    use crate::config::Stage;
    use crate::error::Error;
    use crate::thresholds::ThresholdSet;
    use crate::vu::{IterationResult, VuContext};
    use std::time::Duration;

    struct Noop(Vec<MetricDecl>);

    impl Scenario for Noop {
        async fn iteration(&self, _vu: &mut VuContext) -> IterationResult {
            Ok(())
        }

        fn metrics(&self) -> Vec<MetricDecl> {
            self.0.clone()
        }
    }

    fn plan() -> RunPlan {
        RunPlan::new(
            "http://localhost:3000",
            vec![Stage::new(Duration::from_secs(1), 1)],
        )
    }

    #[test]
    fn prepare_registers_custom_metrics_for_thresholds() {
        let mut plan = plan();
        plan.thresholds = vec![
            ThresholdSet::new("http_req_duration", ["p(95)<500"]),
            ThresholdSet::new("errors", ["rate<0.1"]),
        ];
        let prepared = prepare(&plan, &Noop(vec![MetricDecl::rate("errors")]))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(prepared.thresholds.len(), 2);
        assert_eq!(prepared.registry.definitions().len(), 7);
    }

    #[test]
    fn prepare_rejects_unknown_threshold_metric() {
        let mut plan = plan();
        plan.thresholds = vec![ThresholdSet::new("errors", ["rate<0.1"])];
        let err = prepare(&plan, &Noop(Vec::new())).err();
        assert!(matches!(err, Some(Error::UnknownThresholdMetric(_))));
    }

    #[test]
    fn custom_metric_cannot_change_a_builtin_kind() {
        let err = prepare(&plan(), &Noop(vec![MetricDecl::counter("checks")])).err();
        assert!(err.is_some_and(|e| e.is_configuration()));
    }
}
