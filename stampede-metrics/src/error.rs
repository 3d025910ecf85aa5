use crate::MetricKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "invalid metric name `{0}` (expected 1-128 ASCII letters, digits, `_` or `.`, not starting with a digit)"
    )]
    InvalidName(String),

    #[error("metric `{name}` is already registered as {existing}, not {requested}")]
    KindMismatch {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("metric `{0}` is not registered")]
    UnknownMetric(String),
}
