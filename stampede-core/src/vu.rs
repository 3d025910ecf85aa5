use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use stampede_http::{HttpClient, HttpRequest, Invocation};
use stampede_metrics::{Counter, Rate, Registry, TagSet, Trend};

use crate::builtin::{CHECK_TAG, CHECKS, HttpMetrics, MetricDecl};
use crate::checks::{CheckResults, CheckSet, run_checks};
use crate::error::Result;

pub type IterationResult = std::result::Result<(), IterationError>;

/// Why an iteration ended early. Logged and counted; the worker keeps going.
#[derive(Debug, thiserror::Error)]
pub enum IterationError {
    #[error(transparent)]
    Metric(#[from] stampede_metrics::Error),

    #[error(transparent)]
    Http(#[from] stampede_http::Error),

    #[error("{0}")]
    Failed(String),
}

impl IterationError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// The per-iteration workload. One instance is shared by every VU; per-VU
/// state lives in [`VuContext`].
pub trait Scenario: Send + Sync + 'static {
    fn iteration(&self, vu: &mut VuContext) -> impl Future<Output = IterationResult> + Send;

    /// Custom metrics the scenario writes to. Registered before the run so
    /// thresholds can refer to them.
    fn metrics(&self) -> Vec<MetricDecl> {
        Vec::new()
    }

    /// Configuration problems detectable before any traffic.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// State shared by all workers of one run.
#[derive(Debug)]
pub struct RunContext {
    pub base_url: String,
    pub client: HttpClient,
    pub registry: Registry,
}

impl RunContext {
    pub fn new(base_url: impl Into<String>, client: HttpClient, registry: Registry) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            registry,
        }
    }
}

pub struct VuContext {
    vu_id: u64,
    iteration: u64,
    run: Arc<RunContext>,
    http: HttpMetrics,

    check_rates: HashMap<String, Rate>,
    counters: HashMap<String, Counter>,
    rates: HashMap<String, Rate>,
    trends: HashMap<String, Trend>,
}

impl std::fmt::Debug for VuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VuContext")
            .field("vu_id", &self.vu_id)
            .field("iteration", &self.iteration)
            .field("base_url", &self.run.base_url)
            .finish_non_exhaustive()
    }
}

/// Joins `path` onto `base` with exactly one slash between them. Absolute
/// http(s) urls are returned unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl VuContext {
    pub fn new(vu_id: u64, run: Arc<RunContext>) -> Result<Self> {
        let http = HttpMetrics::resolve(&run.registry)?;
        Ok(Self {
            vu_id,
            iteration: 0,
            run,
            http,
            check_rates: HashMap::new(),
            counters: HashMap::new(),
            rates: HashMap::new(),
            trends: HashMap::new(),
        })
    }

    /// 1-based, unique for the run.
    pub fn vu_id(&self) -> u64 {
        self.vu_id
    }

    /// 1-based iteration number of this VU; 0 before the first iteration.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn begin_iteration(&mut self) {
        self.iteration = self.iteration.saturating_add(1);
    }

    pub fn base_url(&self) -> &str {
        &self.run.base_url
    }

    pub fn registry(&self) -> &Registry {
        &self.run.registry
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.run.base_url, path)
    }

    /// Sends `req` and records `http_reqs`, `http_req_duration` and
    /// `http_req_failed`.
    pub async fn request(&mut self, req: HttpRequest) -> Invocation {
        let inv = self.run.client.invoke(req).await;
        self.http.record(&inv);
        inv
    }

    pub async fn get(&mut self, path: &str) -> Invocation {
        let url = self.url(path);
        self.request(HttpRequest::get(url)).await
    }

    /// Evaluates `checks` and records each outcome into `checks{check=<name>}`.
    pub fn check(
        &mut self,
        inv: &Invocation,
        checks: &CheckSet,
    ) -> stampede_metrics::Result<CheckResults> {
        let results = run_checks(inv, checks);
        for (name, ok) in results.iter() {
            let rate = match self.check_rates.get(name) {
                Some(rate) => rate.clone(),
                None => {
                    let tags = TagSet::new([(CHECK_TAG, name)]);
                    let rate = self.run.registry.rate(CHECKS, &tags)?;
                    self.check_rates.insert(name.to_string(), rate.clone());
                    rate
                }
            };
            rate.add(ok);
        }
        Ok(results)
    }

    pub fn counter(&mut self, name: &str) -> stampede_metrics::Result<Counter> {
        cached(&mut self.counters, name, |n| {
            self.run.registry.counter(n, &TagSet::empty())
        })
    }

    pub fn rate(&mut self, name: &str) -> stampede_metrics::Result<Rate> {
        cached(&mut self.rates, name, |n| {
            self.run.registry.rate(n, &TagSet::empty())
        })
    }

    pub fn trend(&mut self, name: &str) -> stampede_metrics::Result<Trend> {
        cached(&mut self.trends, name, |n| {
            self.run.registry.trend(n, &TagSet::empty())
        })
    }
}

fn cached<H: Clone>(
    cache: &mut HashMap<String, H>,
    name: &str,
    resolve: impl FnOnce(&str) -> stampede_metrics::Result<H>,
) -> stampede_metrics::Result<H> {
    if let Some(handle) = cache.get(name) {
        return Ok(handle.clone());
    }
    let handle = resolve(name)?;
    cache.insert(name.to_string(), handle.clone());
    Ok(handle)
}
