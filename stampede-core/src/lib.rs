mod builtin;
mod checks;
mod config;
mod error;
mod outputs;
mod pool;
mod progress;
mod run;
mod scenario;
mod schedule;
mod summary;
mod thresholds;
mod vu;

pub mod report;

pub use builtin::{
    CHECK_TAG, CHECKS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, HTTP_REQS, HttpMetrics,
    ITERATION_DURATION, ITERATIONS, IterationMetrics, MetricDecl, builtin_metrics, register_all,
};
pub use checks::{Check, CheckResults, CheckRule, CheckSet, run_checks};
pub use config::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT, RunPlan, Stage,
    validate_base_url, validate_stages,
};
pub use error::{Error, Result};
pub use outputs::write_outputs;
pub use pool::{PoolConfig, PoolReport, PoolStats, RetireSignal, VuPool};
pub use progress::{ProgressFn, ProgressUpdate};
pub use run::{PreparedRun, prepare, run};
pub use scenario::{HttpScenario, MetricWiring, Step};
pub use schedule::{RampingSchedule, SchedulePoint, StageSnapshot};
pub use summary::{CheckSummary, MetricSummary, MetricValues, RunResult};
pub use thresholds::{
    CompiledThreshold, ThresholdExpr, ThresholdOp, ThresholdResult, ThresholdSet, ThresholdStat,
    Thresholds, parse_threshold_expr,
};
pub use vu::{IterationError, IterationResult, RunContext, Scenario, VuContext, join_url};

pub use stampede_http::{HttpClient, HttpRequest, HttpResponse, Invocation, Method};
pub use stampede_metrics::{MetricKind, MetricsSnapshot, Registry, TagSet};
