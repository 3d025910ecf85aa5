use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use stampede_core::{
    CheckRule, HttpScenario, Method, MetricWiring, RunPlan, Stage, Step, ThresholdSet,
};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub(crate) const DEFAULT_SUMMARY_JSON: &str = "test-results/summary.json";

/// One configuration layer: a profile or a YAML file. Unset fields fall
/// through to the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub base_url: Option<String>,
    pub stages: Option<Vec<StageYaml>>,
    pub think_time: Option<YamlDuration>,
    pub poll_interval: Option<YamlDuration>,
    pub drain_timeout: Option<YamlDuration>,
    pub request_timeout: Option<YamlDuration>,
    pub thresholds: Option<ThresholdsYaml>,
    pub steps: Option<Vec<StepYaml>>,
    pub metrics: Option<MetricsYaml>,
    pub outputs: Option<OutputsYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub duration: YamlDuration,
    pub target: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 30s, 500ms, 1m) or seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("duration cannot be negative"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// `metric: expr | [expr, ...]` entries in declaration order.
#[derive(Debug, Clone, Default)]
pub(crate) struct ThresholdsYaml(Vec<(String, ThresholdExprYaml)>);

impl<'de> Deserialize<'de> for ThresholdsYaml {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = ThresholdsYaml;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of metric name to threshold expression(s)")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut entries: Vec<(String, ThresholdExprYaml)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((metric, exprs)) = map.next_entry::<String, ThresholdExprYaml>()? {
                    if entries.iter().any(|(m, _)| *m == metric) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate threshold metric `{metric}`"
                        )));
                    }
                    entries.push((metric, exprs));
                }
                Ok(ThresholdsYaml(entries))
            }
        }

        deserializer.deserialize_map(V)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprYaml {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct StepYaml {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

/// A named declarative check: `{ name, <rule>: <arg> }`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CheckSpec {
    pub name: String,
    #[serde(flatten)]
    pub rule: CheckRuleYaml,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum CheckRuleYaml {
    Status(u16),
    StatusIn(Vec<u16>),
    MaxDuration(YamlDuration),
    BodyContains(String),
    JsonField(JsonFieldYaml),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct JsonFieldYaml {
    pub path: String,
    pub equals: serde_json::Value,
}

impl From<CheckRuleYaml> for CheckRule {
    fn from(rule: CheckRuleYaml) -> Self {
        match rule {
            CheckRuleYaml::Status(code) => Self::Status(code),
            CheckRuleYaml::StatusIn(codes) => Self::StatusIn(codes),
            CheckRuleYaml::MaxDuration(d) => Self::MaxDuration(d.into_inner()),
            CheckRuleYaml::BodyContains(s) => Self::BodyContains(s),
            CheckRuleYaml::JsonField(f) => Self::JsonField {
                path: f.path,
                equals: f.equals,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct MetricsYaml {
    pub error_rate: Option<String>,
    pub duration_trend: Option<String>,
    pub request_counter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct OutputsYaml {
    pub summary_json: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

/// Values taken from flags and the environment. They win over every layer.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub base_url: Option<String>,
    pub think_time: Option<Duration>,
    pub summary_json: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub no_summary_file: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Outputs {
    pub summary_json: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

#[derive(Debug)]
pub(crate) struct Resolved {
    pub plan: RunPlan,
    pub scenario: HttpScenario,
    pub outputs: Outputs,
}

pub(crate) fn parse_yaml(raw: &str) -> anyhow::Result<FileConfig> {
    Ok(serde_yaml::from_str(raw)?)
}

pub(crate) async fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse_yaml(&raw).with_context(|| format!("failed to parse YAML: {}", path.display()))
}

impl FileConfig {
    /// Layers `top` over `self`: every field `top` sets replaces ours.
    #[must_use]
    pub(crate) fn overlay(self, top: FileConfig) -> FileConfig {
        FileConfig {
            base_url: top.base_url.or(self.base_url),
            stages: top.stages.or(self.stages),
            think_time: top.think_time.or(self.think_time),
            poll_interval: top.poll_interval.or(self.poll_interval),
            drain_timeout: top.drain_timeout.or(self.drain_timeout),
            request_timeout: top.request_timeout.or(self.request_timeout),
            thresholds: top.thresholds.or(self.thresholds),
            steps: top.steps.or(self.steps),
            metrics: top.metrics.or(self.metrics),
            outputs: top.outputs.or(self.outputs),
        }
    }

    pub(crate) fn resolve(self, overrides: &Overrides) -> anyhow::Result<Resolved> {
        let base_url = overrides
            .base_url
            .clone()
            .or(self.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let stages = self
            .stages
            .unwrap_or_default()
            .into_iter()
            .map(|s| Stage::new(s.duration.into_inner(), s.target))
            .collect();

        let mut plan = RunPlan::new(base_url, stages);
        plan.thresholds = self
            .thresholds
            .unwrap_or_default()
            .0
            .into_iter()
            .map(|(metric, exprs)| ThresholdSet::new(metric, exprs.into_vec()))
            .collect();
        if let Some(d) = overrides
            .think_time
            .or(self.think_time.map(YamlDuration::into_inner))
        {
            plan.think_time = d;
        }
        if let Some(d) = self.poll_interval {
            plan.poll_interval = d.into_inner();
        }
        if let Some(d) = self.drain_timeout {
            plan.drain_timeout = d.into_inner();
        }
        if let Some(d) = self.request_timeout {
            plan.request_timeout = d.into_inner();
        }

        let steps = self
            .steps
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, s)| step_from_yaml(idx, s))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let metrics = self.metrics.unwrap_or_default();
        let scenario = HttpScenario::new(
            steps,
            MetricWiring {
                error_rate: metrics.error_rate,
                duration_trend: metrics.duration_trend,
                request_counter: metrics.request_counter,
            },
        );

        let file_outputs = self.outputs.unwrap_or_default();
        let summary_json = if overrides.no_summary_file {
            None
        } else {
            Some(
                overrides
                    .summary_json
                    .clone()
                    .or(file_outputs.summary_json)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SUMMARY_JSON)),
            )
        };
        let outputs = Outputs {
            summary_json,
            html: overrides.html.clone().or(file_outputs.html),
        };
        for path in outputs.summary_json.iter().chain(outputs.html.iter()) {
            check_output_path(path)?;
        }

        Ok(Resolved {
            plan,
            scenario,
            outputs,
        })
    }
}

fn step_from_yaml(idx: usize, s: StepYaml) -> anyhow::Result<Step> {
    let name = s
        .name
        .unwrap_or_else(|| format!("step_{}", idx + 1));
    let method = match s.method {
        Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
            .with_context(|| format!("step `{name}`: invalid method `{m}`"))?,
        None => Method::GET,
    };

    Ok(Step {
        method,
        path: s.path,
        headers: s.headers.into_iter().collect(),
        body: s.body.map(Into::into).unwrap_or_default(),
        checks: s
            .checks
            .into_iter()
            .map(|c| (c.name, c.rule.into()))
            .collect(),
        name,
    })
}

/// Relative report paths stay under the working directory.
fn check_output_path(path: &Path) -> anyhow::Result<()> {
    if path.as_os_str().is_empty() {
        anyhow::bail!("output path cannot be empty");
    }
    if !path.is_absolute() && path.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!(
            "output path `{}` must not contain `..`",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
baseUrl: http://localhost:3000
stages:
  - { duration: 30s, target: 10 }
  - { duration: 1m, target: 0 }
thinkTime: 1s
pollInterval: 250ms
drainTimeout: 5s
requestTimeout: 10
thresholds:
  http_req_duration: ["p(95)<500", "p(99)<1000"]
  http_req_failed: "rate<0.01"
steps:
  - name: health
    method: get
    path: /api/health
    headers: { accept: application/json }
    checks:
      - { name: "status is 200", status: 200 }
      - { name: "ok or created", statusIn: [200, 201] }
      - { name: "has status field", jsonField: { path: status, equals: ok } }
      - { name: "fast", maxDuration: 500ms }
      - { name: "mentions ok", bodyContains: ok }
  - path: /
metrics:
  errorRate: errors
  durationTrend: health_check_duration
  requestCounter: requests
outputs:
  summaryJson: out/summary.json
  html: out/report.html
"#;

    fn full() -> FileConfig {
        parse_yaml(FULL).unwrap_or_else(|e| panic!("{e:#}"))
    }

    #[test]
    fn full_document_resolves() {
        let resolved = full()
            .resolve(&Overrides::default())
            .unwrap_or_else(|e| panic!("{e:#}"));
        let plan = &resolved.plan;

        assert_eq!(plan.base_url, "http://localhost:3000");
        assert_eq!(
            plan.stages,
            vec![
                Stage::new(Duration::from_secs(30), 10),
                Stage::new(Duration::from_secs(60), 0)
            ]
        );
        assert_eq!(plan.think_time, Duration::from_secs(1));
        assert_eq!(plan.poll_interval, Duration::from_millis(250));
        assert_eq!(plan.drain_timeout, Duration::from_secs(5));
        assert_eq!(plan.request_timeout, Duration::from_secs(10));
        assert_eq!(
            plan.thresholds,
            vec![
                ThresholdSet::new("http_req_duration", ["p(95)<500", "p(99)<1000"]),
                ThresholdSet::new("http_req_failed", ["rate<0.01"]),
            ]
        );

        let steps: Vec<_> = resolved.scenario.steps().collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].method, Method::GET);
        assert_eq!(
            steps[0].headers,
            vec![("accept".to_string(), "application/json".to_string())]
        );
        assert_eq!(
            steps[0].checks[2],
            (
                "has status field".to_string(),
                CheckRule::JsonField {
                    path: "status".to_string(),
                    equals: serde_json::json!("ok"),
                }
            )
        );
        assert_eq!(
            steps[0].checks[3].1,
            CheckRule::MaxDuration(Duration::from_millis(500))
        );
        assert_eq!(steps[1].name, "step_2");
        assert_eq!(
            resolved.scenario.wiring().request_counter.as_deref(),
            Some("requests")
        );
        assert_eq!(
            resolved.outputs,
            Outputs {
                summary_json: Some(PathBuf::from("out/summary.json")),
                html: Some(PathBuf::from("out/report.html")),
            }
        );
    }

    #[test]
    fn overrides_win_over_the_file() {
        let overrides = Overrides {
            base_url: Some("http://127.0.0.1:9999".to_string()),
            think_time: Some(Duration::ZERO),
            summary_json: Some(PathBuf::from("elsewhere.json")),
            html: None,
            no_summary_file: false,
        };
        let resolved = full()
            .resolve(&overrides)
            .unwrap_or_else(|e| panic!("{e:#}"));
        assert_eq!(resolved.plan.base_url, "http://127.0.0.1:9999");
        assert_eq!(resolved.plan.think_time, Duration::ZERO);
        assert_eq!(
            resolved.outputs.summary_json,
            Some(PathBuf::from("elsewhere.json"))
        );
        assert_eq!(
            resolved.outputs.html,
            Some(PathBuf::from("out/report.html"))
        );
    }

    #[test]
    fn defaults_apply_to_an_empty_document() {
        let resolved = FileConfig::default()
            .resolve(&Overrides::default())
            .unwrap_or_else(|e| panic!("{e:#}"));
        assert_eq!(resolved.plan.base_url, DEFAULT_BASE_URL);
        assert!(resolved.plan.stages.is_empty());
        assert_eq!(
            resolved.outputs.summary_json,
            Some(PathBuf::from(DEFAULT_SUMMARY_JSON))
        );

        let quiet = FileConfig::default()
            .resolve(&Overrides {
                no_summary_file: true,
                ..Overrides::default()
            })
            .unwrap_or_else(|e| panic!("{e:#}"));
        assert_eq!(quiet.outputs.summary_json, None);
    }

    #[test]
    fn overlay_replaces_only_fields_that_are_set() {
        let base = full();
        let top = parse_yaml("baseUrl: http://other:1\nthinkTime: 0s\n")
            .unwrap_or_else(|e| panic!("{e:#}"));
        let merged = base.overlay(top);
        assert_eq!(merged.base_url.as_deref(), Some("http://other:1"));
        assert_eq!(merged.think_time, Some(YamlDuration(Duration::ZERO)));
        assert_eq!(merged.stages.map(|s| s.len()), Some(2));
        assert!(merged.steps.is_some());
    }

    #[test]
    fn unknown_keys_and_rules_are_rejected() {
        assert!(parse_yaml("stagez: []").is_err());
        assert!(parse_yaml("steps: [{ path: /, checks: [{ name: x, teapot: 418 }] }]").is_err());
        assert!(parse_yaml("stages: [{ duration: -1, target: 1 }]").is_err());
    }

    #[test]
    fn thresholds_keep_declaration_order() {
        let cfg = parse_yaml(
            "thresholds:\n  http_req_failed: \"rate<0.01\"\n  errors: \"rate<0.1\"\n  checks: [\"rate>0.9\"]\n",
        )
        .unwrap_or_else(|e| panic!("{e:#}"));
        let resolved = cfg
            .resolve(&Overrides::default())
            .unwrap_or_else(|e| panic!("{e:#}"));
        let metrics: Vec<_> = resolved
            .plan
            .thresholds
            .iter()
            .map(|t| t.metric.as_str())
            .collect();
        assert_eq!(metrics, vec!["http_req_failed", "errors", "checks"]);

        assert!(parse_yaml("thresholds:\n  errors: \"rate<0.1\"\n  errors: \"rate<0.2\"\n").is_err());
    }

    #[test]
    fn invalid_method_is_reported() {
        let cfg = parse_yaml("steps: [{ name: bad, method: \"GE T\", path: / }]")
            .unwrap_or_else(|e| panic!("{e:#}"));
        let err = cfg
            .resolve(&Overrides::default())
            .err()
            .unwrap_or_else(|| panic!("expected an error"));
        assert!(format!("{err:#}").contains("invalid method"));
    }

    #[test]
    fn output_paths_may_not_climb_out() {
        let overrides = Overrides {
            html: Some(PathBuf::from("../report.html")),
            ..Overrides::default()
        };
        assert!(FileConfig::default().resolve(&overrides).is_err());
    }
}
