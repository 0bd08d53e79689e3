//! Configuration loading and validation

use anyhow::{Context, Result};
use plantview_core::{AssetCatalog, AssetDescriptor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Split model assets served by the reconstruction proxy
    #[serde(default)]
    pub asset: Vec<AssetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Directory holding the frontend build
    #[serde(default = "default_web_path")]
    pub path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            path: default_web_path(),
        }
    }
}

fn default_web_path() -> String {
    "./web".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Equipment records file (JSON)
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "./equipment.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Timeout for a single remote part fetch
    #[serde(default = "default_part_timeout")]
    pub part_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            part_timeout_secs: default_part_timeout(),
        }
    }
}

fn default_part_timeout() -> u64 {
    30
}

/// One logical asset and where its parts live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// File name clients request, e.g. "facility.glb"
    pub name: String,
    /// Part identifiers in concatenation order
    pub parts: Vec<String>,
    pub source: PartSourceConfig,
}

/// Storage location of asset parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PartSourceConfig {
    /// Parts are files in a local directory
    Directory { path: PathBuf },
    /// Parts are fetched from `{base_url}/{part}`
    Http { base_url: String },
}

impl Config {
    /// Descriptors for every configured asset, validated
    pub fn asset_catalog(&self) -> Result<AssetCatalog> {
        let descriptors = self
            .asset
            .iter()
            .map(|a| AssetDescriptor::new(a.name.clone(), a.parts.clone()))
            .collect();
        AssetCatalog::new(descriptors).context("Invalid [[asset]] configuration")
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.asset_catalog()?;
        info!(path = %path.display(), assets = config.asset.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
