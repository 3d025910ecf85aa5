use anyhow::Context as _;

use crate::config::{FileConfig, parse_yaml};

/// Built-in load shapes against the sample service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Profile {
    /// Ramp 10 → 50 → 100 → 0 over 3.5 minutes, 1s think time.
    Health,
    /// Jump from 10 to 500 VUs and back, 0.5s think time.
    Spike,
    /// Climb to 500 VUs in steps over 11 minutes, then recover.
    Stress,
}

impl Profile {
    fn source(self) -> &'static str {
        match self {
            Self::Health => include_str!("../profiles/health.yaml"),
            Self::Spike => include_str!("../profiles/spike.yaml"),
            Self::Stress => include_str!("../profiles/stress.yaml"),
        }
    }

    pub(crate) fn load(self) -> anyhow::Result<FileConfig> {
        parse_yaml(self.source()).with_context(|| format!("built-in profile `{self}` is invalid"))
    }
}
