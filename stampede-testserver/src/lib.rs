//! Small HTTP target used by integration tests: health probes, a JSON hello,
//! a validated users resource and a few knobs (slow responses, forced status
//! codes). Every handler bumps shared counters so tests can compare what the
//! load generator recorded against what the server actually saw.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_ROOT: &str = "/";
pub const PATH_HEALTH: &str = "/api/health";
pub const PATH_READY: &str = "/api/ready";
pub const PATH_HELLO: &str = "/api/hello";
pub const PATH_USERS: &str = "/api/users";
pub const PATH_USER: &str = "/api/users/{id}";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_STATUS: &str = "/status/{code}";

const DEFAULT_SLOW_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    health_requests: Arc<AtomicU64>,
    rejected_users: Arc<AtomicU64>,
    next_user_id: Arc<AtomicU64>,
    started: Instant,
}

impl Default for TestServerStats {
    fn default() -> Self {
        Self {
            requests_total: Arc::default(),
            health_requests: Arc::default(),
            rejected_users: Arc::default(),
            next_user_id: Arc::new(AtomicU64::new(1)),
            started: Instant::now(),
        }
    }
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn health_requests(&self) -> u64 {
        self.health_requests.load(Ordering::Relaxed)
    }

    pub fn rejected_users(&self) -> u64 {
        self.rejected_users.load(Ordering::Relaxed)
    }
}

fn timestamp() -> String {
    humantime::format_rfc3339_millis(SystemTime::now()).to_string()
}

async fn handle_root(State(stats): State<TestServerStats>) -> &'static str {
    stats.inc_requests_total();
    "ok"
}

async fn handle_health(State(stats): State<TestServerStats>) -> Json<Value> {
    stats.inc_requests_total();
    stats.health_requests.fetch_add(1, Ordering::Relaxed);
    Json(json!({
        "status": "ok",
        "timestamp": timestamp(),
        "uptime": stats.started.elapsed().as_secs_f64(),
    }))
}

async fn handle_ready(State(stats): State<TestServerStats>) -> Json<Value> {
    stats.inc_requests_total();
    Json(json!({ "status": "ready", "timestamp": timestamp() }))
}

async fn handle_hello(State(stats): State<TestServerStats>) -> Json<Value> {
    stats.inc_requests_total();
    Json(json!({ "message": "Hello from stampede-testserver!", "timestamp": timestamp() }))
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    name: String,
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

fn validate_user(user: &NewUser) -> Vec<&'static str> {
    let mut problems = Vec::new();
    let name_len = user.name.chars().count();
    if !(1..=100).contains(&name_len) {
        problems.push("name must be 1-100 characters");
    }
    let email_ok = user
        .email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !email_ok {
        problems.push("email is invalid");
    }
    problems
}

async fn handle_create_user(
    State(stats): State<TestServerStats>,
    body: axum::body::Bytes,
) -> (StatusCode, Json<Value>) {
    stats.inc_requests_total();

    let reject = |details: Vec<&'static str>| {
        stats.rejected_users.fetch_add(1, Ordering::Relaxed);
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Validation failed", "details": details })),
        )
    };

    let user: NewUser = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return reject(vec!["body must be a JSON object with name and email"]),
    };

    let problems = validate_user(&user);
    if !problems.is_empty() {
        return reject(problems);
    }

    let id = stats.next_user_id.fetch_add(1, Ordering::Relaxed);
    let created = User {
        id: id.to_string(),
        name: user.name,
        email: user.email,
        created_at: Some(timestamp()),
    };
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": created })),
    )
}

async fn handle_get_user(
    State(stats): State<TestServerStats>,
    Path(id): Path<String>,
) -> Json<Value> {
    stats.inc_requests_total();
    let user = User {
        id,
        name: "Sample User".to_string(),
        email: "user@example.com".to_string(),
        created_at: None,
    };
    Json(json!({ "success": true, "data": user }))
}

#[derive(Debug, Deserialize)]
struct SlowQuery {
    ms: Option<u64>,
}

async fn handle_slow(
    State(stats): State<TestServerStats>,
    Query(q): Query<SlowQuery>,
) -> &'static str {
    stats.inc_requests_total();
    sleep(Duration::from_millis(q.ms.unwrap_or(DEFAULT_SLOW_MS))).await;
    "slow"
}

async fn handle_status(
    State(stats): State<TestServerStats>,
    Path(code): Path<u16>,
) -> StatusCode {
    stats.inc_requests_total();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_ROOT, get(handle_root))
        .route(PATH_HEALTH, get(handle_health))
        .route(PATH_READY, get(handle_ready))
        .route(PATH_HELLO, get(handle_hello))
        .route(PATH_USERS, post(handle_create_user))
        .route(PATH_USER, get(handle_get_user))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_STATUS, get(handle_status))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_validation_matches_rules() {
        let ok = NewUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        };
        assert!(validate_user(&ok).is_empty());

        let bad = NewUser {
            name: String::new(),
            email: "nope".to_string(),
        };
        assert_eq!(validate_user(&bad).len(), 2);

        let long = NewUser {
            name: "x".repeat(101),
            email: "a@b.io".to_string(),
        };
        assert_eq!(validate_user(&long), vec!["name must be 1-100 characters"]);
    }
}
