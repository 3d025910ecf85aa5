use std::fmt;
use std::time::Duration;

use serde_json::Value;
use stampede_http::{HttpResponse, Invocation};

use crate::error::{Error, Result};

/// A named boolean assertion against one response.
pub trait Check: Send + Sync {
    fn evaluate(&self, res: &HttpResponse, duration: Duration) -> bool;
}

impl<F> Check for F
where
    F: Fn(&HttpResponse, Duration) -> bool + Send + Sync,
{
    fn evaluate(&self, res: &HttpResponse, duration: Duration) -> bool {
        self(res, duration)
    }
}

/// Ordered name → check mapping.
#[derive(Default)]
pub struct CheckSet {
    checks: Vec<(String, Box<dyn Check>)>,
}

impl fmt::Debug for CheckSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.checks.iter().map(|(name, _)| name))
            .finish()
    }
}

impl CheckSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a check. A repeated name replaces the earlier check in place.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, check: impl Check + 'static) -> Self {
        self.insert(name, Box::new(check));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, check: Box<dyn Check>) {
        let name = name.into();
        if let Some(slot) = self.checks.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = check;
        } else {
            self.checks.push((name, check));
        }
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.checks.iter().map(|(n, _)| n.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResults {
    results: Vec<(String, bool)>,
}

impl CheckResults {
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.results.iter().map(|(n, ok)| (n.as_str(), *ok))
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.results.iter().find(|(n, _)| n == name).map(|(_, ok)| *ok)
    }

    /// True for an empty set.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|(_, ok)| *ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> + '_ {
        self.results
            .iter()
            .filter(|(_, ok)| !*ok)
            .map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Evaluates every check in order. Without a response (network error) every
/// check fails.
pub fn run_checks(invocation: &Invocation, checks: &CheckSet) -> CheckResults {
    let results = checks
        .checks
        .iter()
        .map(|(name, check)| {
            let ok = invocation
                .response()
                .is_some_and(|res| check.evaluate(res, invocation.duration));
            (name.clone(), ok)
        })
        .collect();
    CheckResults { results }
}

/// Declarative checks, as written in configuration files.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckRule {
    Status(u16),
    StatusIn(Vec<u16>),
    MaxDuration(Duration),
    BodyContains(String),
    /// Dot-separated path into a JSON body; numeric segments index arrays.
    JsonField { path: String, equals: Value },
}

impl CheckRule {
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidCheck {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        match self {
            Self::StatusIn(list) if list.is_empty() => Err(invalid("`statusIn` must not be empty")),
            Self::JsonField { path, .. } if path.split('.').any(str::is_empty) => {
                Err(invalid("`jsonField.path` must be a dot-separated path"))
            }
            _ => Ok(()),
        }
    }
}

fn json_lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |cur, seg| match cur {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Strings in configuration compare equal to scalars with the same text, so
/// `equals: "1"` matches `1` and `equals: ok` matches `"ok"`.
fn json_matches(found: &Value, expected: &Value) -> bool {
    if found == expected {
        return true;
    }
    match (found, expected) {
        (Value::Number(n), Value::String(s)) => n.to_string() == *s,
        (Value::Bool(b), Value::String(s)) => b.to_string() == *s,
        _ => false,
    }
}

impl Check for CheckRule {
    fn evaluate(&self, res: &HttpResponse, duration: Duration) -> bool {
        match self {
            Self::Status(code) => res.status == *code,
            Self::StatusIn(codes) => codes.contains(&res.status),
            Self::MaxDuration(max) => duration < *max,
            Self::BodyContains(needle) => res.body_utf8().is_some_and(|b| b.contains(needle.as_str())),
            Self::JsonField { path, equals } => res
                .json::<Value>()
                .ok()
                .is_some_and(|body| json_lookup(&body, path).is_some_and(|v| json_matches(v, equals))),
        }
    }
}
