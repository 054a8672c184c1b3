use std::sync::Arc;

use etcd_registry::config::Config;
use etcd_registry::registry::{EtcdRegistry, Registry, RegistryError};
use etcd_registry::store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    let options = config.registry.options();
    tracing::info!(
        prefix = %options.prefix,
        ttl_secs = options.ttl.as_secs(),
        "Starting registry"
    );

    let store = Arc::new(MemoryStore::new());
    store.start_expiry_sweep(config.registry.sweep_interval());

    let registry = EtcdRegistry::new(options, store);
    let mut watcher = registry.watch().await?;

    if config.service.name.is_empty() {
        tracing::warn!("No service configured, nothing to register");
    } else {
        registry.register(&config.service).await?;
    }

    let listing = registry.list_services_with_report().await?;
    for service in &listing.services {
        tracing::info!(
            service_name = %service.name,
            service_id = %service.id,
            address = %format!("{}:{}", service.ip, service.port),
            "Visible service"
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = watcher.next() => match event {
                Ok(event) => tracing::info!(
                    action = ?event.action,
                    service_name = %event.service.name,
                    "Service changed"
                ),
                Err(RegistryError::WatcherStopped) => break,
                Err(err) => tracing::warn!(error = %err, "Watch error"),
            },
        }
    }

    watcher.stop();
    registry.close().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
