//! Application state management

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::proxy::AssetProxy;
use crate::store::EquipmentStore;

/// Shared application state
pub struct AppState {
    /// Equipment records
    pub store: RwLock<EquipmentStore>,
    /// Split asset reconstruction
    pub proxy: Arc<AssetProxy>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let store = EquipmentStore::load_or_create(Path::new(&config.store.path))
            .context("Failed to load equipment store")?;
        let proxy = AssetProxy::from_config(&config)?;

        for descriptor in proxy.descriptors() {
            info!(
                asset = %descriptor.name,
                parts = descriptor.parts.len(),
                "Serving split asset"
            );
        }

        Ok(Arc::new(Self {
            store: RwLock::new(store),
            proxy: Arc::new(proxy),
            config,
        }))
    }
}
