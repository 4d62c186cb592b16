use conduit::api::{build_api, AppState};
use conduit::config::{AppConfig, StorageKind};
use conduit::persistence::memory::MemoryRepository;
use conduit::persistence::repo::Repository;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    let app_state = match config.storage {
        StorageKind::DynamoDb => {
            let repository = Arc::new(Repository::new().await);
            AppState::new(repository.clone(), repository, &config)
        }
        StorageKind::Memory => {
            let repository = Arc::new(MemoryRepository::new());
            AppState::new(repository.clone(), repository, &config)
        }
    };
    let router = build_api(app_state, &config);

    let listener = match tokio::net::TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", config.bind_address, err);
            std::process::exit(1);
        }
    };
    info!("listening on {} with {:?} storage", config.bind_address, config.storage);
    if let Err(err) = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await {
        error!("server stopped: {}", err);
        std::process::exit(1);
    }
}
