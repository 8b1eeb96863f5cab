use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use argh::FromArgs;
use tracing::info;
use weather_compare::{
    AppConfig, ComparisonService, FjallStore, MemoryStore, ProviderRegistry, WeatherStore,
    telemetry, web,
};

#[derive(FromArgs, Debug)]
/// Weather comparison server - aggregates providers and scores forecast accuracy
struct Args {
    /// path to a TOML configuration file
    /// Default: weather-compare/config.toml in the user config directory
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn WeatherStore>> {
    match config.storage.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        _ => {
            let path = &config.storage.path;
            std::fs::create_dir_all(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let store = FjallStore::open(path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    let config = AppConfig::load_from_path(args.config)?;
    telemetry::init(&config.logging)?;
    info!(version = weather_compare::VERSION, "Starting weather-compare");

    let registry = ProviderRegistry::from_config(&config.providers)?;
    registry.log_configuration_status();

    let store = open_store(&config)?;
    info!(backend = %config.storage.backend, "Store ready");

    let service = Arc::new(ComparisonService::new(Arc::new(registry), store));
    web::run(&config.server, service).await
}
