use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use futurgenie_gate::config::GateConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let mut config = GateConfig::from_env();
    let args: Vec<String> = std::env::args().collect();
    config.apply_args(&args);

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "futurgenie",
        "Futur Génie gate starting: RUST_LOG='{}', bind={}, http_port={}, store_timeout_ms={}, seed={:?}, routes={:?}",
        rust_log,
        config.bind,
        config.http_port,
        config.store_timeout.as_millis(),
        config.seed_file,
        config.route_table_file
    );

    futurgenie_gate::server::run_with_config(config).await
}
