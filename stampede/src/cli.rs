use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::profiles::Profile;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 1s, 500ms, 1m)".to_string());
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}' (expected e.g. 1s, 500ms, 1m): {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar on stderr, text summary on stdout.
    Human,
    /// JSON summary on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stampede",
    author,
    version,
    about = "Staged-concurrency HTTP load generator",
    long_about = "stampede drives a pool of virtual users against an HTTP service.\n\nThe number of virtual users follows a list of stages (linear ramps), every virtual user repeats the configured request steps, and the run passes or fails on the thresholds evaluated over the collected metrics.\n\nConfiguration comes from a YAML file, a built-in profile, or both (the file overrides the profile).",
    after_help = "Examples:\n  stampede run --profile health\n  stampede run --profile spike --base-url http://staging:3000\n  stampede run load.yaml --html test-results/report.html\n  stampede validate load.yaml\n\nExit codes: 0 passed, 11 thresholds failed, 30 invalid input, 40 runtime error."
)]
pub struct Cli {
    /// Log filter (e.g. info, stampede_core=debug). Falls back to RUST_LOG, then `warn`.
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test
    #[command(
        long_about = "Run a load test through every stage, drain, evaluate thresholds and write the reports.\n\nFlags override the environment, which overrides the file, which overrides the profile."
    )]
    Run(RunArgs),

    /// Resolve the configuration and compile thresholds without sending traffic
    Validate(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Path to a YAML configuration file
    pub config: Option<PathBuf>,

    /// Built-in profile used as the base configuration (defaults to `health` without a file)
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// Target base URL
    #[arg(long, env = "BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Pause between iterations of one VU (e.g. 1s, 500ms, 0s)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub think_time: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Where to write the JSON summary (default: test-results/summary.json)
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Also write an HTML report
    #[arg(long, value_name = "PATH")]
    pub html: Option<PathBuf>,

    /// Do not write the JSON summary file
    #[arg(long, conflicts_with = "summary_json")]
    pub no_summary_file: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|err| panic!("failed to parse args: {err}"))
    }

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1s"), Ok(Duration::from_secs(1)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn cli_parses_run_with_flags() {
        let cli = parse(&[
            "stampede",
            "run",
            "load.yaml",
            "--profile",
            "spike",
            "--base-url",
            "http://127.0.0.1:8080",
            "--think-time",
            "250ms",
            "--html",
            "out/report.html",
            "--output",
            "json",
            "--log-level",
            "debug",
        ]);

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.config.config, Some(PathBuf::from("load.yaml")));
                assert_eq!(args.config.profile, Some(Profile::Spike));
                assert_eq!(
                    args.config.base_url.as_deref(),
                    Some("http://127.0.0.1:8080")
                );
                assert_eq!(args.config.think_time, Some(Duration::from_millis(250)));
                assert_eq!(args.html, Some(PathBuf::from("out/report.html")));
                assert_eq!(args.summary_json, None);
                assert!(!args.no_summary_file);
                assert_eq!(args.output, OutputFormat::Json);
            }
            Command::Validate(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_validate_defaults() {
        let cli = parse(&["stampede", "validate", "--profile", "stress"]);
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.config, None);
                assert_eq!(args.profile, Some(Profile::Stress));
                assert_eq!(args.think_time, None);
            }
            Command::Run(_) => panic!("expected validate command"),
        }
    }

    #[test]
    fn no_summary_file_conflicts_with_summary_path() {
        let res = Cli::try_parse_from([
            "stampede",
            "run",
            "--no-summary-file",
            "--summary-json",
            "a.json",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn unknown_profile_is_rejected() {
        assert!(Cli::try_parse_from(["stampede", "run", "--profile", "soak"]).is_err());
    }
}
