use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::{Error, HttpRequest, HttpResponse, Invocation, Result};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    request_timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        // The OS-level TCP connect timeout can be tens of seconds; an unreachable
        // target would otherwise stall every VU for that long.
        Self::new(Some(DEFAULT_CONNECT_TIMEOUT), DEFAULT_REQUEST_TIMEOUT)
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>, request_timeout: Duration) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(connect_timeout);
        http_connector.set_nodelay(true);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let inner = Client::builder(TokioExecutor::new()).build(https_connector);

        Self {
            inner,
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Sends `req` and times it. Never fails: transport problems end up in
    /// [`Invocation::outcome`].
    pub async fn invoke(&self, req: HttpRequest) -> Invocation {
        let method = req.method.clone();
        let started = Instant::now();
        let outcome = self.request(req).await;
        let duration = started.elapsed();

        if let Err(err) = &outcome {
            tracing::debug!(
                %method,
                kind = %err.transport_error_kind(),
                local = err.is_local(),
                error = %err,
                "http request failed"
            );
        }

        Invocation { duration, outcome }
    }

    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let timeout = req.timeout.unwrap_or(self.request_timeout);
        let parsed = url::Url::parse(&req.url).map_err(|_| Error::InvalidUrl(req.url.clone()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::UnsupportedScheme(req.url));
        }

        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.to_string()))?;

        let mut builder = Request::builder().method(req.method).uri(uri);
        for (k, v) in &req.headers {
            let name = http::header::HeaderName::from_bytes(k.as_bytes())?;
            let value = http::header::HeaderValue::from_str(v)?;
            builder = builder.header(name, value);
        }

        let req: Request<Full<Bytes>> = builder.body(Full::new(req.body))?;

        // The deadline covers the body as well, so a trickling response cannot
        // hold a VU past its timeout.
        let exchange = async {
            let res: hyper::Response<Incoming> = self.inner.request(req).await?;
            let (parts, body) = res.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok::<_, Error>((parts, body))
        };

        let (parts, body) = match tokio::time::timeout(timeout, exchange).await {
            Ok(res) => res?,
            Err(_) => return Err(Error::Timeout(timeout)),
        };

        // Normalize headers to lowercase keys; repeated headers are joined with ", ".
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in parts.headers.iter() {
            let key = name.as_str().to_ascii_lowercase();
            let v = String::from_utf8_lossy(value.as_bytes()).to_string();
            merged
                .entry(key)
                .and_modify(|cur| {
                    if !cur.is_empty() {
                        cur.push_str(", ");
                    }
                    cur.push_str(&v);
                })
                .or_insert(v);
        }

        Ok(HttpResponse {
            status: parts.status.as_u16(),
            headers: merged.into_iter().collect(),
            body,
        })
    }

    pub async fn get(&self, url: &str) -> Invocation {
        self.invoke(HttpRequest::get(url)).await
    }
}
