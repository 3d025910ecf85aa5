use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// A request that could not complete. Callers record it as a failed sample
/// and carry on; it never aborts a run.
#[derive(Debug, thiserror::Error, strum::EnumDiscriminants)]
#[strum_discriminants(
    name(TransportErrorKind),
    derive(Hash, strum::Display, strum::EnumString, strum::IntoStaticStr),
    strum(serialize_all = "snake_case")
)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// and https:// urls can be requested: {0}")]
    UnsupportedScheme(String),

    #[error("could not build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("response body could not be read: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl Error {
    /// Stable snake_case label, e.g. `timeout` or `invalid_url`.
    #[must_use]
    pub fn transport_error_kind(&self) -> TransportErrorKind {
        self.into()
    }

    /// The request never left this process (bad url or headers).
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self.transport_error_kind(),
            TransportErrorKind::InvalidUrl
                | TransportErrorKind::UnsupportedScheme
                | TransportErrorKind::RequestBuild
                | TransportErrorKind::HeaderName
                | TransportErrorKind::HeaderValue
        )
    }
}
