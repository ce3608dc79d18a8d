//! CLI driver: send a batch of queries to a replica cluster

use clap::Parser;
use futures_util::future::join_all;
use hedgerpc::client::StrategyKind;
use hedgerpc::common::{load_replica_addresses, parse_duration, Settings};
use hedgerpc::ClusterClient;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_QUERIES: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetuer", "adipiscing", "elit", "sed",
    "diam", "nonummy", "nibh", "euismod", "tincidunt", "ut", "laoreet", "dolore", "magna",
    "aliquam", "erat",
];

#[derive(Parser)]
#[command(name = "hedgerpc")]
#[command(about = "Query a hedgerpc replica cluster")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// File with one replica URI per line
    #[arg(short = 'f', long = "file")]
    replicas_file: Option<PathBuf>,

    /// Replica URI (repeatable)
    #[arg(short, long = "replica")]
    replicas: Vec<String>,

    /// Dispatch strategy
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Per-query deadline (e.g. "6s", "2500ms")
    #[arg(short, long, value_parser = duration_arg)]
    timeout: Option<Duration>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Queries to send; a built-in word list when omitted
    queries: Vec<String>,
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(file) = cli.replicas_file {
        settings.client.replicas_file = Some(file);
    }
    if let Some(strategy) = cli.strategy {
        settings.client.strategy = strategy;
    }
    if let Some(timeout) = cli.timeout {
        settings.client.timeout_ms = timeout.as_millis() as u64;
    }
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut replicas = match &settings.client.replicas_file {
        Some(path) => load_replica_addresses(path)?,
        None => Vec::new(),
    };
    replicas.extend(settings.client.replicas.iter().cloned());
    replicas.extend(cli.replicas);
    if replicas.is_empty() {
        anyhow::bail!("no replicas given; use --file or --replica");
    }

    let queries: Vec<String> = if cli.queries.is_empty() {
        DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        cli.queries
    };

    let client = ClusterClient::from_config(replicas, &settings.client)?;
    let timeout = settings.client.timeout();

    println!(
        "Testing {} over {} replicas started",
        client.strategy_name(),
        client.replicas().len()
    );

    let client = &client;
    let results = join_all(queries.iter().map(|query| async move {
        let started = Instant::now();
        let result = client.process(query, timeout).await;
        (query, result, started.elapsed())
    }))
    .await;

    let mut failed = 0;
    for (query, result, elapsed) in results {
        match result {
            Ok(digest) => println!(
                "Processed query \"{}\" in {} ms: {}",
                query,
                elapsed.as_millis(),
                digest
            ),
            Err(e) => {
                failed += 1;
                println!("Query \"{}\" failed ({} ms): {}", query, elapsed.as_millis(), e);
            }
        }
    }

    println!(
        "Testing {} finished: {}/{} answered",
        client.strategy_name(),
        queries.len() - failed,
        queries.len()
    );
    Ok(())
}
