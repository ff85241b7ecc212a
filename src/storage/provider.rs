// src/storage/provider.rs
use async_trait::async_trait;
use log::debug;
use std::path::PathBuf;
use crate::error::ProviderError;
use crate::models::server::ServerConfig;

/// Source of server connection configs (database, file, ...).
#[async_trait]
pub trait ServerConfigProvider: Send + Sync {
    async fn get_server(&self, server_id: i32) -> Result<ServerConfig, ProviderError>;

    async fn list_servers(&self) -> Result<Vec<ServerConfig>, ProviderError>;
}

/// Reads a JSON array of configs from disk on every call, so edits to the
/// file are picked up by the next reload.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ServerConfigProvider for JsonFileProvider {
    async fn get_server(&self, server_id: i32) -> Result<ServerConfig, ProviderError> {
        self.list_servers()
            .await?
            .into_iter()
            .find(|c| c.server_id == server_id)
            .ok_or(ProviderError::NotFound(server_id))
    }

    async fn list_servers(&self) -> Result<Vec<ServerConfig>, ProviderError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let configs: Vec<ServerConfig> = serde_json::from_str(&raw)?;
        debug!("Read {} server configs from {}", configs.len(), self.path.display());
        Ok(configs)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    servers: Vec<ServerConfig>,
}

impl StaticProvider {
    pub fn new(servers: Vec<ServerConfig>) -> Self {
        Self { servers }
    }
}

#[async_trait]
impl ServerConfigProvider for StaticProvider {
    async fn get_server(&self, server_id: i32) -> Result<ServerConfig, ProviderError> {
        self.servers
            .iter()
            .find(|c| c.server_id == server_id)
            .cloned()
            .ok_or(ProviderError::NotFound(server_id))
    }

    async fn list_servers(&self) -> Result<Vec<ServerConfig>, ProviderError> {
        Ok(self.servers.clone())
    }
}
