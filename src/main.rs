use clap::{Parser, Subcommand};
use cranedash::error::Result;
use cranedash::k8s::quantity::{Quantity, Unit};
use cranedash::prom::config::{DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_MAX_ATTEMPTS};
use cranedash::prom::{PromClient, RangeWindow, RetryPolicy, USER_AGENT};
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the metrics backend
    #[arg(long, env = "CRANEDASH_PROM_URL", default_value = "http://localhost:9090")]
    url: String,

    /// Attempts per request before giving up
    #[arg(long, env = "CRANEDASH_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Per-attempt timeout in milliseconds
    #[arg(long, env = "CRANEDASH_TIMEOUT_MS", default_value_t = DEFAULT_ATTEMPT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[arg(long, env = "CRANEDASH_USER_AGENT", default_value = USER_AGENT)]
    user_agent: String,

    /// Indent JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate an expression at a single point in time
    Instant {
        query: String,
        /// Evaluation time in epoch seconds, defaults to now
        #[arg(long)]
        time: Option<i64>,
    },
    /// Evaluate an expression over a time window
    Range {
        query: String,
        /// Window start in epoch seconds
        #[arg(long, conflicts_with = "window")]
        start: Option<i64>,
        /// Window end in epoch seconds
        #[arg(long, conflicts_with = "window")]
        end: Option<i64>,
        /// Named window: last-1-day, last-7-day or last-30-day
        #[arg(long)]
        window: Option<RangeWindow>,
        /// Step literal such as 15m0s or 1h
        #[arg(long)]
        step: Option<String>,
    },
    /// Last hour of an expression with its week-over-week trend
    Board { query: String },
    /// Convert a Kubernetes quantity to another unit
    Convert { quantity: String, unit: Unit },
}

#[derive(Serialize)]
struct Conversion {
    input: String,
    unit: String,
    magnitude: f64,
    display: String,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn connect(url: &str, max_attempts: u32, timeout_ms: u64, user_agent: &str) -> Result<PromClient> {
    let policy = RetryPolicy::default()
        .with_max_attempts(max_attempts)
        .with_attempt_timeout(Duration::from_millis(timeout_ms));
    PromClient::new(url, user_agent, policy)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let Args {
        url,
        max_attempts,
        timeout_ms,
        user_agent,
        pretty,
        command,
    } = Args::parse();

    match command {
        Command::Instant { query, time } => {
            let client = connect(&url, max_attempts, timeout_ms, &user_agent)?;
            let series = client.instant(&query, time).await?;
            print_json(&series, pretty)
        }
        Command::Range {
            query,
            start,
            end,
            window,
            step,
        } => {
            let client = connect(&url, max_attempts, timeout_ms, &user_agent)?;
            let series = match window {
                Some(window) => client.range_window(&query, window, step.as_deref()).await?,
                None => client.range(&query, start, end, step.as_deref()).await?,
            };
            print_json(&series, pretty)
        }
        Command::Board { query } => {
            let client = connect(&url, max_attempts, timeout_ms, &user_agent)?;
            let board = client.board(&query).await?;
            print_json(&board, pretty)
        }
        Command::Convert { quantity, unit } => {
            let converted = Quantity::parse(&quantity)?.convert(unit);
            let conversion = Conversion {
                input: quantity,
                unit: unit.to_string(),
                magnitude: converted.magnitude,
                display: converted.to_string(),
            };
            print_json(&conversion, pretty)
        }
    }
}
