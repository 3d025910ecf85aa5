#![forbid(unsafe_code)]

mod client;
mod error;
mod types;

pub use client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, HttpClient};
pub use error::{Error, TransportErrorKind, Result};
pub use types::{HttpRequest, HttpResponse, Invocation};

pub use http::Method;
