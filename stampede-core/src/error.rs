pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`stages` must be a non-empty list of {{ duration, target }}")]
    EmptyStages,

    #[error("stage {index} has a zero duration")]
    ZeroDurationStage { index: usize },

    #[error("invalid base url `{0}` (expected an absolute http:// or https:// url)")]
    InvalidBaseUrl(String),

    #[error("`pollInterval` must be a positive duration")]
    InvalidPollInterval,

    #[error("invalid threshold `{expression}` on `{metric}`: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },

    #[error("threshold references unknown metric `{0}`")]
    UnknownThresholdMetric(String),

    #[error("statistic `{stat}` does not apply to {kind} metric `{metric}`")]
    ThresholdStatMismatch {
        metric: String,
        kind: stampede_metrics::MetricKind,
        stat: String,
    },

    #[error("invalid check `{name}`: {reason}")]
    InvalidCheck { name: String, reason: String },

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error(transparent)]
    Metric(#[from] stampede_metrics::Error),

    #[error("invalid output path: `{0}`")]
    InvalidOutputPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to format report: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Problems detected before any traffic is generated.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyStages
                | Self::ZeroDurationStage { .. }
                | Self::InvalidBaseUrl(_)
                | Self::InvalidPollInterval
                | Self::InvalidThreshold { .. }
                | Self::UnknownThresholdMetric(_)
                | Self::ThresholdStatMismatch { .. }
                | Self::InvalidCheck { .. }
                | Self::InvalidScenario(_)
                | Self::Metric(_)
                | Self::InvalidOutputPath(_)
        )
    }
}
