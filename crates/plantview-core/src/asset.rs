//! Split model assets: descriptors and byte reassembly
//!
//! Object storage caps the size of a single object, so a large facility model
//! is stored as several parts. A descriptor lists those parts in order; the
//! logical file is their concatenation.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset {0} declares no parts")]
    NoParts(String),
    #[error("Asset {0} is declared more than once")]
    Duplicate(String),
    #[error("Asset name {0:?} must be a plain file name")]
    InvalidName(String),
}

/// One logical file made of ordered parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Logical file name requested by clients, e.g. "facility.glb"
    pub name: String,
    /// Part identifiers in concatenation order
    pub parts: Vec<String>,
}

impl AssetDescriptor {
    pub fn new(name: impl Into<String>, parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(AssetError::InvalidName(self.name.clone()));
        }
        if self.parts.is_empty() {
            return Err(AssetError::NoParts(self.name.clone()));
        }
        Ok(())
    }

    /// True when the last segment of a request path, once percent-decoded,
    /// is this asset's name
    pub fn matches_path(&self, path: &str) -> bool {
        let Some(segment) = path.rsplit('/').next() else {
            return false;
        };
        match percent_decode_str(segment).decode_utf8() {
            Ok(decoded) => decoded == self.name.as_str(),
            Err(_) => false,
        }
    }
}

/// Part payloads of one asset in concatenation order.
///
/// The parts are kept as fetched and handed out one after another, so the
/// logical file is never copied into a second buffer.
#[derive(Debug, Clone)]
pub struct Reassembly<B> {
    parts: Vec<B>,
    len: u64,
}

impl<B: AsRef<[u8]>> Reassembly<B> {
    pub fn new(parts: Vec<B>) -> Self {
        let len = parts.iter().map(|p| p.as_ref().len() as u64).sum();
        Self { parts, len }
    }

    /// Length of the logical file
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_parts(self) -> Vec<B> {
        self.parts
    }
}

/// All split assets known to the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetCatalog {
    #[serde(default)]
    pub asset: Vec<AssetDescriptor>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<AssetDescriptor>) -> Result<Self, AssetError> {
        let catalog = Self { asset: assets };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        let mut seen = HashSet::new();
        for descriptor in &self.asset {
            descriptor.validate()?;
            if !seen.insert(descriptor.name.as_str()) {
                return Err(AssetError::Duplicate(descriptor.name.clone()));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asset.is_empty()
    }
}
