use std::time::Duration;

use stampede_http::Invocation;
use stampede_metrics::{Counter, MetricKind, Rate, Registry, TagSet, Trend};

use crate::error::Result;

pub const HTTP_REQS: &str = "http_reqs";
/// Milliseconds, only for exchanges that produced a response.
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
/// `true` on a network error or a status of 400 and above.
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const ITERATIONS: &str = "iterations";
/// Milliseconds.
pub const ITERATION_DURATION: &str = "iteration_duration";
/// One series per check, tagged `check=<name>`.
pub const CHECKS: &str = "checks";
pub const CHECK_TAG: &str = "check";

/// A metric a scenario wants registered before the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDecl {
    pub name: String,
    pub kind: MetricKind,
}

impl MetricDecl {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn counter(name: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub fn rate(name: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Rate)
    }

    pub fn trend(name: impl Into<String>) -> Self {
        Self::new(name, MetricKind::Trend)
    }
}

pub fn builtin_metrics() -> [MetricDecl; 6] {
    [
        MetricDecl::counter(HTTP_REQS),
        MetricDecl::trend(HTTP_REQ_DURATION),
        MetricDecl::rate(HTTP_REQ_FAILED),
        MetricDecl::counter(ITERATIONS),
        MetricDecl::trend(ITERATION_DURATION),
        MetricDecl::rate(CHECKS),
    ]
}

pub fn register_all<'a>(
    registry: &Registry,
    decls: impl IntoIterator<Item = &'a MetricDecl>,
) -> Result<()> {
    for decl in decls {
        registry.register(&decl.name, decl.kind)?;
    }
    Ok(())
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Per-VU handles for the HTTP metrics.
#[derive(Debug, Clone)]
pub struct HttpMetrics {
    reqs: Counter,
    duration: Trend,
    failed: Rate,
}

impl HttpMetrics {
    pub fn resolve(registry: &Registry) -> Result<Self> {
        let tags = TagSet::empty();
        Ok(Self {
            reqs: registry.counter(HTTP_REQS, &tags)?,
            duration: registry.trend(HTTP_REQ_DURATION, &tags)?,
            failed: registry.rate(HTTP_REQ_FAILED, &tags)?,
        })
    }

    pub fn record(&self, inv: &Invocation) {
        self.reqs.inc();
        if inv.response().is_some() {
            self.duration.add(ms(inv.duration));
        }
        self.failed.add(inv.is_failed());
    }

    pub fn requests_total(&self) -> u64 {
        self.reqs.value()
    }
}

/// Per-VU handles for the iteration metrics.
#[derive(Debug, Clone)]
pub struct IterationMetrics {
    iterations: Counter,
    duration: Trend,
}

impl IterationMetrics {
    pub fn resolve(registry: &Registry) -> Result<Self> {
        let tags = TagSet::empty();
        Ok(Self {
            iterations: registry.counter(ITERATIONS, &tags)?,
            duration: registry.trend(ITERATION_DURATION, &tags)?,
        })
    }

    pub fn record(&self, elapsed: Duration) {
        self.iterations.inc();
        self.duration.add(ms(elapsed));
    }
}
