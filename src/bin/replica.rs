//! Replica binary

use clap::Parser;
use hedgerpc::common::{parse_duration, ServerMode, Settings};
use hedgerpc::ReplicaServer;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hedgerpc-replica")]
#[command(about = "hedgerpc replica: answers queries after a simulated delay")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listening port
    #[arg(long)]
    port: Option<u16>,

    /// Bind address
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Path segment the query method is served under
    #[arg(long)]
    method: Option<String>,

    /// Simulated processing time (e.g. "250ms", "1s")
    #[arg(long, value_parser = duration_arg)]
    duration: Option<Duration>,

    /// Processing mode
    #[arg(long, value_enum)]
    mode: Option<ServerMode>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config file and environment first, command line on top
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.replica.port = port;
    }
    if let Some(bind) = cli.bind {
        settings.replica.bind_addr = bind;
    }
    if let Some(method) = cli.method {
        settings.replica.method_name = method;
    }
    if let Some(duration) = cli.duration {
        settings.replica.method_duration_ms = duration.as_millis() as u64;
    }
    if let Some(mode) = cli.mode {
        settings.replica.mode = mode;
    }
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    settings.replica.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ReplicaServer::new(settings.replica);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    server.stop();

    Ok(())
}
