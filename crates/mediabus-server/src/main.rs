use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use mediabus_core::Runtime;
use mediabus_server::config::HostConfig;
use mediabus_server::supervisor::Supervisor;
use mediabus_store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(config.log_filter.clone())).init();
    config.validate()?;

    info!(hostname = %config.hostname, port = config.port, db = %config.database_path.display(), "starting mediabus");

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    let identity = mediabus_identity::acquire(&*store, &config.hostname).await?;
    let runtime = Runtime::new(store).await?;

    runtime.spawn_presence_tick();

    let (supervisor, mut state_rx) = Supervisor::new(runtime, config.hostname.clone(), config.port, identity);
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow().clone();
            tracing::debug!(status = %state.status_text, ip = ?state.ip_address, "host state changed");
        }
    });

    tokio::select! {
        _ = supervisor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    Ok(())
}

fn load_config() -> HostConfig {
    match std::env::var("MEDIABUS_CONFIG_PATH") {
        Ok(path) => HostConfig::from_toml_file(std::path::Path::new(&path)).unwrap_or_else(|err| {
            eprintln!("failed to load {path}: {err}; falling back to environment/defaults");
            HostConfig::from_env()
        }),
        Err(_) => HostConfig::from_env(),
    }
}
