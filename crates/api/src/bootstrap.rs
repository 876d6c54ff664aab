//! Construction of the connection service from configuration.
//!
//! Every deployment-dependent choice (allocator, character directory,
//! ticket store, role catalog) is made here, once, at startup. Handlers only
//! ever see the assembled [`ConnectionService`].

use std::sync::Arc;

use handoff_core::character::{CharacterDirectory, InMemoryCharacterDirectory};
use handoff_core::connection::ConnectionService;
use handoff_core::error::CoreError;
use handoff_core::fleet::{FleetAllocator, LoopbackAllocator};
use handoff_core::pending::{InMemoryPendingConnectionStore, PendingConnectionStore};
use handoff_db::{DbPool, PgPendingConnectionStore};
use handoff_upstream::{ClusterAllocator, HttpCharacterDirectory};

use crate::config::{DeploymentMode, DirectoryConfig, ServerConfig};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database setup failed: {0}")]
    Database(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Pick the allocator implementation for the deployment mode.
pub fn build_allocator(config: &ServerConfig) -> Arc<dyn FleetAllocator> {
    match (config.deployment, &config.fleet.allocator_url) {
        (DeploymentMode::Cluster, Some(url)) => {
            Arc::new(ClusterAllocator::new(url.clone(), config.fleet.namespace.clone()))
        }
        (DeploymentMode::Cluster, None) => {
            tracing::warn!("Cluster mode without ALLOCATOR_URL, falling back to loopback");
            loopback(config)
        }
        (DeploymentMode::Local, _) => loopback(config),
    }
}

fn loopback(config: &ServerConfig) -> Arc<dyn FleetAllocator> {
    Arc::new(LoopbackAllocator::new(
        config.loopback.server_name.clone(),
        config.loopback.address.clone(),
        config.loopback.port,
    ))
}

/// Character service client, or an in-memory directory when no service URL
/// is configured.
pub async fn build_directory(
    config: &DirectoryConfig,
) -> Result<Arc<dyn CharacterDirectory>, BootstrapError> {
    if let Some(url) = &config.service_url {
        tracing::info!(%url, "Using character service");
        return Ok(Arc::new(HttpCharacterDirectory::new(
            url.clone(),
            config.service_token.clone(),
        )));
    }

    let directory = match &config.seed_file {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| BootstrapError::Io {
                    path: path.clone(),
                    source,
                })?;
            InMemoryCharacterDirectory::from_json(&json)?
        }
        None => InMemoryCharacterDirectory::new(),
    };
    tracing::info!(
        characters = directory.len().await,
        "Using in-memory character directory"
    );
    Ok(Arc::new(directory))
}

/// Postgres ticket store when `DATABASE_URL` is set, in-memory otherwise.
pub async fn build_store(
    config: &ServerConfig,
) -> Result<(Arc<dyn PendingConnectionStore>, Option<DbPool>), BootstrapError> {
    let Some(database_url) = &config.database_url else {
        tracing::info!("Using in-memory ticket store");
        return Ok((Arc::new(InMemoryPendingConnectionStore::new()), None));
    };

    let pool = handoff_db::create_pool(database_url)
        .await
        .map_err(|e| BootstrapError::Database(e.to_string()))?;
    tracing::info!("Database connection pool created");

    handoff_db::health_check(&pool)
        .await
        .map_err(|e| BootstrapError::Database(e.to_string()))?;
    tracing::info!("Database health check passed");

    handoff_db::run_migrations(&pool)
        .await
        .map_err(|e| BootstrapError::Database(e.to_string()))?;
    tracing::info!("Database migrations applied");

    Ok((Arc::new(PgPendingConnectionStore::new(pool.clone())), Some(pool)))
}

/// Assemble a [`ConnectionService`] from already-built collaborators.
pub fn build_service(
    config: &ServerConfig,
    directory: Arc<dyn CharacterDirectory>,
    allocator: Arc<dyn FleetAllocator>,
    store: Arc<dyn PendingConnectionStore>,
) -> Result<ConnectionService, BootstrapError> {
    config.tickets.validate()?;
    config.fleet.validate()?;
    let roles = config.roles.catalog()?;
    let selectors = config.fleet.selector_policy()?;

    Ok(
        ConnectionService::new(roles, directory, allocator, store, selectors)
            .with_ticket_ttl(config.tickets.ttl())
            .with_allocation_timeout(config.fleet.allocation_timeout()),
    )
}

/// Build the complete application state.
pub async fn build_state(config: ServerConfig) -> Result<AppState, BootstrapError> {
    let allocator = build_allocator(&config);
    tracing::info!(
        deployment = config.deployment.as_str(),
        allocator = allocator.kind(),
        "Fleet allocator selected"
    );

    let directory = build_directory(&config.directory).await?;
    let (store, pool) = build_store(&config).await?;
    let service = build_service(&config, directory, allocator, store)?;

    Ok(AppState {
        config: Arc::new(config),
        connections: Arc::new(service),
        pool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_without_url_or_seed_is_empty_in_memory() {
        let directory = build_directory(&DirectoryConfig::default()).await.unwrap();
        let found = directory
            .get_character(&handoff_core::character::CharacterTarget::ById(1))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn missing_seed_file_is_reported() {
        let config = DirectoryConfig {
            seed_file: Some("/nonexistent/characters.json".to_string()),
            ..Default::default()
        };
        let result = build_directory(&config).await;
        assert!(matches!(result, Err(BootstrapError::Io { .. })));
    }

}
