pub mod error;
pub mod metrics;
pub mod registry;
pub mod snapshot;
pub mod tags;
pub mod trend;

pub use error::{Error, Result};
pub use metrics::{Counter, MetricKind, Rate, Trend};
pub use registry::{Registry, validate_name};
pub use snapshot::{MetricSnapshot, MetricsSnapshot, SeriesSnapshot, ValueSnapshot};
pub use tags::TagSet;
pub use trend::Samples;
