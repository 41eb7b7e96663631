use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tpa_core::BridgeConfig;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config file; TPA_* environment variables override it.
    #[arg(long, env = "TPA_CONFIG")]
    config: Option<PathBuf>,

    /// Reject unknown keys in the config file.
    #[arg(long)]
    strict_config: bool,
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    // The log level lives in the config, so the subscriber comes second.
    let cfg = BridgeConfig::resolve(args.config.as_deref(), args.strict_config)?;

    init_logging(&cfg.log_level);

    tracing::info!(event = "server_start", config = ?cfg);
    if !cfg.enabled {
        tracing::warn!(event = "assistant_disabled", "set TPA_ENABLED=1 to serve /assistant routes");
    }

    tpa_server::server::run(cfg).await
}
