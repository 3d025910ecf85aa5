use bytes::Bytes;
use stampede_http::{HttpRequest, Method};
use stampede_metrics::validate_name;

use crate::builtin::MetricDecl;
use crate::checks::{CheckRule, CheckSet};
use crate::error::{Error, Result};
use crate::vu::{IterationError, IterationResult, Scenario, VuContext};

/// One request of an [`HttpScenario`] iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub method: Method,
    /// Relative to the base url, or an absolute http(s) url.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub checks: Vec<(String, CheckRule)>,
}

impl Step {
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: Method::GET,
            path: path.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            checks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_check(mut self, name: impl Into<String>, rule: CheckRule) -> Self {
        self.checks.push((name.into(), rule));
        self
    }
}

/// Custom metrics fed from every step's outcome. Each is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricWiring {
    /// Rate: `true` when the request failed at the network level or any of
    /// its checks failed.
    pub error_rate: Option<String>,
    /// Trend of request durations in ms (responses only).
    pub duration_trend: Option<String>,
    /// Counter of requests sent.
    pub request_counter: Option<String>,
}

impl MetricWiring {
    fn decls(&self) -> Vec<MetricDecl> {
        let mut out = Vec::new();
        if let Some(name) = &self.error_rate {
            out.push(MetricDecl::rate(name));
        }
        if let Some(name) = &self.duration_trend {
            out.push(MetricDecl::trend(name));
        }
        if let Some(name) = &self.request_counter {
            out.push(MetricDecl::counter(name));
        }
        out
    }
}

struct PreparedStep {
    step: Step,
    checks: CheckSet,
}

/// Sends its steps in order on every iteration.
pub struct HttpScenario {
    steps: Vec<PreparedStep>,
    wiring: MetricWiring,
}

impl std::fmt::Debug for HttpScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpScenario")
            .field("steps", &self.steps.iter().map(|s| &s.step).collect::<Vec<_>>())
            .field("wiring", &self.wiring)
            .finish()
    }
}

impl HttpScenario {
    pub fn new(steps: Vec<Step>, wiring: MetricWiring) -> Self {
        let steps = steps
            .into_iter()
            .map(|step| {
                let checks = step
                    .checks
                    .iter()
                    .fold(CheckSet::new(), |set, (name, rule)| {
                        set.with(name.clone(), rule.clone())
                    });
                PreparedStep { step, checks }
            })
            .collect();
        Self { steps, wiring }
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> + '_ {
        self.steps.iter().map(|s| &s.step)
    }

    pub fn wiring(&self) -> &MetricWiring {
        &self.wiring
    }
}

impl Scenario for HttpScenario {
    async fn iteration(&self, vu: &mut VuContext) -> IterationResult {
        let mut first_error = None;

        for prepared in &self.steps {
            let step = &prepared.step;
            let mut req = HttpRequest::new(step.method.clone(), vu.url(&step.path));
            req.headers = step.headers.clone();
            req.body = step.body.clone();

            let inv = vu.request(req).await;
            let results = vu.check(&inv, &prepared.checks)?;

            if let Some(name) = &self.wiring.error_rate {
                vu.rate(name)?
                    .add(inv.error().is_some() || !results.all_passed());
            }
            if let Some(name) = &self.wiring.duration_trend
                && inv.response().is_some()
            {
                vu.trend(name)?.add(inv.duration_ms());
            }
            if let Some(name) = &self.wiring.request_counter {
                vu.counter(name)?.inc();
            }

            if let Err(err) = inv.outcome
                && first_error.is_none()
            {
                first_error = Some(err);
            }
        }

        match first_error {
            Some(err) => Err(IterationError::Http(err)),
            None => Ok(()),
        }
    }

    fn metrics(&self) -> Vec<MetricDecl> {
        self.wiring.decls()
    }

    fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::InvalidScenario(
                "at least one step is required".to_string(),
            ));
        }

        for prepared in &self.steps {
            let step = &prepared.step;
            if step.path.is_empty() {
                return Err(Error::InvalidScenario(format!(
                    "step `{}` has an empty path",
                    step.name
                )));
            }
            for (name, rule) in &step.checks {
                rule.validate(name)?;
            }
        }

        for decl in self.wiring.decls() {
            validate_name(&decl.name)?;
        }
        Ok(())
    }
}
