use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Where `stampede run` points when no base URL is given.
const DEFAULT_BIND: &str = "127.0.0.1:3000";

const USAGE: &str = "stampede-testserver\n\nUSAGE:\n  stampede-testserver [--bind 127.0.0.1:3000]\n\nServes the sample API that the built-in profiles target.\nPrints BASE_URL=<url> to stdout once ready.";

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Serve(SocketAddr),
    Help,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Invocation> {
    let mut bind: SocketAddr = DEFAULT_BIND.parse()?;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--bind requires an address, e.g. {DEFAULT_BIND}"))?;
                bind = addr
                    .parse()
                    .map_err(|err| anyhow::anyhow!("invalid --bind `{addr}`: {err}"))?;
            }
            "-h" | "--help" => return Ok(Invocation::Help),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(Invocation::Serve(bind))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let bind = match parse_args(std::env::args().skip(1))? {
        Invocation::Serve(addr) => addr,
        Invocation::Help => {
            eprintln!("{USAGE}");
            return Ok(());
        }
    };

    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| anyhow::anyhow!("failed to bind {bind}: {err}"))?;
    let addr = listener.local_addr()?;

    let stats = stampede_testserver::TestServerStats::default();
    let app = stampede_testserver::router(stats.clone());

    println!("BASE_URL=http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    eprintln!(
        "served {} requests ({} health, {} rejected users)",
        stats.requests_total(),
        stats.health_requests(),
        stats.rejected_users()
    );
    Ok(())
}
