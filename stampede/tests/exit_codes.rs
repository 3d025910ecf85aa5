use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::Context as _;
use stampede_testserver::TestServer;

fn status_code(out: &Output) -> i32 {
    out.status.code().unwrap_or(-1)
}

fn describe(out: &Output) -> String {
    format!(
        "exit code {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

fn write_config(dir: &Path, name: &str, yaml: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, yaml).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Runs the binary off the runtime thread so the in-process test server keeps serving.
async fn stampede(args: Vec<String>, cwd: PathBuf) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_stampede");
    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(&args)
            .current_dir(cwd)
            .env_remove("BASE_URL")
            .env_remove("RUST_LOG")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run stampede binary")
}

const QUICK: &str = r#"
stages:
  - { duration: 600ms, target: 3 }
  - { duration: 300ms, target: 0 }
thinkTime: 20ms
pollInterval: 50ms
drainTimeout: 5s
"#;

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_stampede"))
        .arg("run")
        .arg("--think-time")
        .arg("10x")
        .output()
        .context("run stampede binary")?;

    anyhow::ensure!(status_code(&out) == 30, "{}", describe(&out));
    Ok(())
}

#[tokio::test]
async fn passing_run_exits_0_and_writes_reports() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let config = write_config(
        dir.path(),
        "pass.yaml",
        &format!(
            r#"{QUICK}
thresholds:
  http_req_failed: "rate<0.01"
  http_req_duration: "p(95)<2000"
steps:
  - name: health
    path: /api/health
    checks:
      - {{ name: "status is 200", status: 200 }}
      - {{ name: "has status field", jsonField: {{ path: status, equals: ok }} }}
"#
        ),
    )?;

    let out = stampede(
        vec![
            "run".into(),
            config.display().to_string(),
            "--base-url".into(),
            server.base_url().to_string(),
            "--html".into(),
            "reports/report.html".into(),
        ],
        dir.path().to_path_buf(),
    )
    .await?;
    let served = server.stats().requests_total();
    server.shutdown().await;

    anyhow::ensure!(status_code(&out) == 0, "{}", describe(&out));

    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("Result: PASSED"), "{}", describe(&out));

    let summary = std::fs::read_to_string(dir.path().join("test-results/summary.json"))
        .context("default summary should be written")?;
    let v: serde_json::Value = serde_json::from_str(&summary)?;
    anyhow::ensure!(v["overall_passed"] == true, "{summary}");
    anyhow::ensure!(
        v["metrics"]["http_reqs"]["values"]["count"] == served,
        "server saw {served} requests\n{summary}"
    );

    let html = std::fs::read_to_string(dir.path().join("reports/report.html"))
        .context("html report should be written")?;
    anyhow::ensure!(html.contains("threshold-pass"));
    Ok(())
}

#[tokio::test]
async fn thresholds_failed_exit_11() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let config = write_config(
        dir.path(),
        "fail.yaml",
        &format!(
            r#"{QUICK}
baseUrl: {}
thresholds:
  http_req_failed: "rate<0.01"
steps:
  - path: /status/503
"#,
            server.base_url()
        ),
    )?;

    let out = stampede(
        vec![
            "run".into(),
            config.display().to_string(),
            "--output".into(),
            "json".into(),
            "--no-summary-file".into(),
        ],
        dir.path().to_path_buf(),
    )
    .await?;
    server.shutdown().await;

    anyhow::ensure!(status_code(&out) == 11, "{}", describe(&out));

    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).with_context(|| describe(&out))?;
    anyhow::ensure!(v["overall_passed"] == false);
    anyhow::ensure!(!dir.path().join("test-results").exists());
    Ok(())
}

#[tokio::test]
async fn invalid_threshold_exits_30_without_traffic() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let config = write_config(
        dir.path(),
        "bad.yaml",
        &format!(
            r#"{QUICK}
baseUrl: {}
thresholds:
  http_req_duration: "rate<0.1"
steps:
  - path: /api/health
"#,
            server.base_url()
        ),
    )?;

    for command in ["validate", "run"] {
        let out = stampede(
            vec![command.into(), config.display().to_string()],
            dir.path().to_path_buf(),
        )
        .await?;
        anyhow::ensure!(status_code(&out) == 30, "{command}: {}", describe(&out));
    }

    let served = server.stats().requests_total();
    server.shutdown().await;
    anyhow::ensure!(served == 0, "expected no traffic, server saw {served} requests");
    Ok(())
}

#[tokio::test]
async fn validate_accepts_every_profile() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    for profile in ["health", "spike", "stress"] {
        let out = stampede(
            vec!["validate".into(), "--profile".into(), profile.into()],
            dir.path().to_path_buf(),
        )
        .await?;
        anyhow::ensure!(status_code(&out) == 0, "{profile}: {}", describe(&out));
        anyhow::ensure!(String::from_utf8_lossy(&out.stdout).contains("configuration ok"));
    }
    Ok(())
}
