use std::fmt;
use std::time::Duration;

use serde::Serialize;
use stampede_metrics::{MetricKind, MetricsSnapshot, ValueSnapshot};

use crate::error::{Error, Result};

/// Raw threshold expressions for one metric, as written in configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<String>,
}

impl ThresholdSet {
    pub fn new<S: Into<String>>(metric: impl Into<String>, expressions: impl IntoIterator<Item = S>) -> Self {
        Self {
            metric: metric.into(),
            expressions: expressions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ThresholdOp {
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Lte,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Gte,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
}

impl ThresholdOp {
    fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Eq => left == right,
            Self::Ne => left != right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdStat {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    /// Percentile in `(0, 100]`.
    P(f64),
}

impl ThresholdStat {
    pub fn applies_to(self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Counter => matches!(self, Self::Count | Self::Rate),
            MetricKind::Rate => matches!(self, Self::Rate | Self::Count),
            MetricKind::Trend => !matches!(self, Self::Rate),
        }
    }
}

impl fmt::Display for ThresholdStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avg => f.write_str("avg"),
            Self::Min => f.write_str("min"),
            Self::Max => f.write_str("max"),
            Self::Med => f.write_str("med"),
            Self::Count => f.write_str("count"),
            Self::Rate => f.write_str("rate"),
            Self::P(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub stat: ThresholdStat,
    pub op: ThresholdOp,
    pub bound: f64,
}

pub fn parse_threshold_expr(raw: &str) -> std::result::Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    // Two-character operators first so `<=` is not read as `<`.
    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("!=", ThresholdOp::Ne),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| "missing comparison operator".to_string())?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = right_with_op.get(op_len..).unwrap_or_default();
    if left.is_empty() || right.is_empty() {
        return Err("expected `<statistic><operator><number>`".to_string());
    }

    let stat = match left.to_ascii_lowercase().as_str() {
        "avg" => ThresholdStat::Avg,
        "min" => ThresholdStat::Min,
        "max" => ThresholdStat::Max,
        "med" => ThresholdStat::Med,
        "count" => ThresholdStat::Count,
        "rate" => ThresholdStat::Rate,
        other => {
            let Some(inner) = other.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) else {
                return Err(format!("unknown statistic `{left}`"));
            };
            let p: f64 = inner
                .parse()
                .map_err(|_| format!("invalid percentile `{inner}`"))?;
            if !(p > 0.0 && p <= 100.0) {
                return Err(format!("percentile `{inner}` out of range (0, 100]"));
            }
            ThresholdStat::P(p)
        }
    };

    let bound: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric bound `{right}`"))?;
    if !bound.is_finite() {
        return Err(format!("invalid numeric bound `{right}`"));
    }

    Ok(ThresholdExpr { stat, op, bound })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledThreshold {
    pub metric: String,
    pub expression: String,
    pub expr: ThresholdExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Thresholds validated against the metrics a run will register.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholds {
    items: Vec<CompiledThreshold>,
}

impl Thresholds {
    /// Parses every expression and checks it against `known_metrics`.
    /// Any problem is a configuration error.
    pub fn compile(sets: &[ThresholdSet], known_metrics: &[(String, MetricKind)]) -> Result<Self> {
        let mut items = Vec::new();

        for set in sets {
            let kind = known_metrics
                .iter()
                .find(|(name, _)| *name == set.metric)
                .map(|(_, kind)| *kind)
                .ok_or_else(|| Error::UnknownThresholdMetric(set.metric.clone()))?;

            for raw in &set.expressions {
                let expr = parse_threshold_expr(raw).map_err(|reason| Error::InvalidThreshold {
                    metric: set.metric.clone(),
                    expression: raw.clone(),
                    reason,
                })?;

                if !expr.stat.applies_to(kind) {
                    return Err(Error::ThresholdStatMismatch {
                        metric: set.metric.clone(),
                        kind,
                        stat: expr.stat.to_string(),
                    });
                }

                items.push(CompiledThreshold {
                    metric: set.metric.clone(),
                    expression: raw.trim().to_string(),
                    expr,
                });
            }
        }

        Ok(Self { items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledThreshold> + '_ {
        self.items.iter()
    }

    /// One result per threshold, in declaration order. A statistic without a
    /// value (empty trend, missing metric) fails.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot, run_duration: Duration) -> Vec<ThresholdResult> {
        self.items
            .iter()
            .map(|t| {
                let observed = snapshot
                    .get(&t.metric)
                    .and_then(|m| stat_value(&m.total, t.expr.stat, run_duration));
                let passed = observed.is_some_and(|v| t.expr.op.apply(v, t.expr.bound));
                ThresholdResult {
                    metric: t.metric.clone(),
                    expression: t.expression.clone(),
                    observed,
                    passed,
                }
            })
            .collect()
    }
}

/// Resolves `stat` against a folded metric value. Counter `rate` is the
/// per-second throughput over `run_duration`.
pub fn stat_value(value: &ValueSnapshot, stat: ThresholdStat, run_duration: Duration) -> Option<f64> {
    match (value, stat) {
        (ValueSnapshot::Counter(n), ThresholdStat::Count) => Some(*n as f64),
        (ValueSnapshot::Counter(n), ThresholdStat::Rate) => {
            let secs = run_duration.as_secs_f64();
            (secs > 0.0).then(|| *n as f64 / secs)
        }

        (v @ ValueSnapshot::Rate { .. }, ThresholdStat::Rate) => v.rate(),
        (v @ ValueSnapshot::Rate { .. }, ThresholdStat::Count) => Some(v.count() as f64),

        (ValueSnapshot::Trend(s), ThresholdStat::Avg) => s.avg(),
        (ValueSnapshot::Trend(s), ThresholdStat::Min) => s.min(),
        (ValueSnapshot::Trend(s), ThresholdStat::Max) => s.max(),
        (ValueSnapshot::Trend(s), ThresholdStat::Med) => s.med(),
        (ValueSnapshot::Trend(s), ThresholdStat::Count) => Some(s.len() as f64),
        (ValueSnapshot::Trend(s), ThresholdStat::P(p)) => s.percentile(p),

        _ => None,
    }
}
