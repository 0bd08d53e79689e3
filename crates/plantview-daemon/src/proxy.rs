//! Split asset reconstruction middleware
//!
//! Requests whose last path segment names a configured asset are answered
//! with the asset's parts fetched concurrently and streamed back in declared
//! order. Any part failure fails the whole request with a 500; a truncated
//! asset is never served. HEAD requests are answered from part sizes alone.
//! All other requests pass through untouched.

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::{future::try_join_all, stream};
use plantview_core::{AssetDescriptor, Reassembly};
use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{Config, PartSourceConfig};

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("part {part:?} is not a valid relative identifier")]
    InvalidPart { part: String },
    #[error("failed to read part {part}: {source}")]
    Io {
        part: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch part {part}: {source}")]
    Http {
        part: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("part {part} returned status {status}")]
    Status {
        part: String,
        status: reqwest::StatusCode,
    },
}

/// Where the parts of one asset are stored
#[derive(Debug, Clone)]
pub enum PartSource {
    Directory(PathBuf),
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

impl PartSource {
    pub fn from_config(config: &PartSourceConfig, timeout: Duration) -> Result<Self> {
        Ok(match config {
            PartSourceConfig::Directory { path } => Self::Directory(path.clone()),
            PartSourceConfig::Http { base_url } => {
                let client = reqwest::Client::builder()
                    .timeout(timeout)
                    .build()
                    .context("Failed to create HTTP client")?;
                Self::Http {
                    client,
                    base_url: base_url.trim_end_matches('/').to_string(),
                }
            }
        })
    }

    /// Read one part fully into memory
    pub async fn fetch(&self, part: &str) -> Result<Bytes, ProxyError> {
        if !is_plain_relative(part) {
            return Err(ProxyError::InvalidPart {
                part: part.to_string(),
            });
        }

        match self {
            Self::Directory(dir) => {
                let data = tokio::fs::read(dir.join(part))
                    .await
                    .map_err(|source| ProxyError::Io {
                        part: part.to_string(),
                        source,
                    })?;
                debug!(part = %part, bytes = data.len(), "Read asset part");
                Ok(Bytes::from(data))
            }
            Self::Http { client, base_url } => {
                let url = format!("{}/{}", base_url, part);
                let http_err = |source| ProxyError::Http {
                    part: part.to_string(),
                    source,
                };
                let response = client.get(&url).send().await.map_err(http_err)?;
                if !response.status().is_success() {
                    return Err(ProxyError::Status {
                        part: part.to_string(),
                        status: response.status(),
                    });
                }
                let data = response.bytes().await.map_err(http_err)?;
                debug!(url = %url, bytes = data.len(), "Fetched asset part");
                Ok(data)
            }
        }
    }

    /// Size of one part, without reading its body where the source allows it
    pub async fn part_len(&self, part: &str) -> Result<u64, ProxyError> {
        if !is_plain_relative(part) {
            return Err(ProxyError::InvalidPart {
                part: part.to_string(),
            });
        }

        match self {
            Self::Directory(dir) => {
                let metadata = tokio::fs::metadata(dir.join(part))
                    .await
                    .map_err(|source| ProxyError::Io {
                        part: part.to_string(),
                        source,
                    })?;
                Ok(metadata.len())
            }
            Self::Http { client, base_url } => {
                let url = format!("{}/{}", base_url, part);
                let response = client
                    .head(&url)
                    .send()
                    .await
                    .map_err(|source| ProxyError::Http {
                        part: part.to_string(),
                        source,
                    })?;
                if !response.status().is_success() {
                    return Err(ProxyError::Status {
                        part: part.to_string(),
                        status: response.status(),
                    });
                }
                // reqwest reports a zero body size for HEAD, so read the header itself
                let advertised = response
                    .headers()
                    .get(reqwest::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                match advertised {
                    Some(len) => Ok(len),
                    None => Ok(self.fetch(part).await?.len() as u64),
                }
            }
        }
    }
}

fn is_plain_relative(part: &str) -> bool {
    !part.is_empty()
        && Path::new(part)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// A logical asset and the storage holding its parts
#[derive(Debug, Clone)]
pub struct SplitAsset {
    pub descriptor: AssetDescriptor,
    pub source: PartSource,
}

impl SplitAsset {
    /// Fetch all parts concurrently, kept in declared order
    pub async fn assemble(&self) -> Result<Reassembly<Bytes>, ProxyError> {
        let parts = try_join_all(self.descriptor.parts.iter().map(|p| self.source.fetch(p))).await?;
        Ok(Reassembly::new(parts))
    }

    /// Length of the logical file from part sizes
    pub async fn content_length(&self) -> Result<u64, ProxyError> {
        let sizes =
            try_join_all(self.descriptor.parts.iter().map(|p| self.source.part_len(p))).await?;
        Ok(sizes.into_iter().sum())
    }
}

/// All assets served through reconstruction
#[derive(Debug, Clone, Default)]
pub struct AssetProxy {
    assets: Vec<SplitAsset>,
}

impl AssetProxy {
    pub fn new(assets: Vec<SplitAsset>) -> Self {
        Self { assets }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = config.asset_catalog()?;
        let timeout = Duration::from_secs(config.proxy.part_timeout_secs);
        let assets = catalog
            .asset
            .into_iter()
            .zip(&config.asset)
            .map(|(descriptor, asset)| {
                Ok(SplitAsset {
                    descriptor,
                    source: PartSource::from_config(&asset.source, timeout)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(assets))
    }

    /// Asset answering the given request path
    pub fn find(&self, path: &str) -> Option<&SplitAsset> {
        self.assets.iter().find(|a| a.descriptor.matches_path(path))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.assets.iter().map(|a| &a.descriptor)
    }
}

/// Reconstruction middleware
///
/// Only GET and HEAD are intercepted; other methods reach the router.
pub async fn asset_proxy_middleware(
    State(proxy): State<Arc<AssetProxy>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return next.run(request).await;
    }
    let Some(asset) = proxy.find(request.uri().path()) else {
        return next.run(request).await;
    };

    let name = &asset.descriptor.name;
    let served = if method == Method::HEAD {
        asset
            .content_length()
            .await
            .map(|len| (len, Body::empty()))
    } else {
        asset.assemble().await.map(|whole| {
            let len = whole.len();
            let parts = whole.into_parts().into_iter().map(Ok::<_, Infallible>);
            (len, Body::from_stream(stream::iter(parts)))
        })
    };

    match served {
        Ok((len, body)) => {
            info!(
                asset = %name,
                method = %method,
                parts = asset.descriptor.parts.len(),
                bytes = len,
                "Served reconstructed asset"
            );
            (
                StatusCode::OK,
                [
                    (
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/octet-stream"),
                    ),
                    (header::CONTENT_LENGTH, HeaderValue::from(len)),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!(asset = %name, error = %e, "Asset reconstruction failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to reconstruct {}: {}", name, e),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    const MIB: usize = 1024 * 1024;

    fn proxy_router(dir: &Path, parts: &[&str]) -> Router {
        named_proxy_router("facility.glb", dir, parts)
    }

    fn named_proxy_router(name: &str, dir: &Path, parts: &[&str]) -> Router {
        let proxy = Arc::new(AssetProxy::new(vec![SplitAsset {
            descriptor: AssetDescriptor::new(name, parts.iter().copied()),
            source: PartSource::Directory(dir.to_path_buf()),
        }]));
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .fallback(|| async { (StatusCode::NOT_FOUND, "fallthrough") })
            .layer(middleware::from_fn_with_state(proxy, asset_proxy_middleware))
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_parts_are_concatenated_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = vec![0xAAu8; 4 * MIB];
        let b = vec![0xBBu8; 3 * MIB];
        std::fs::write(dir.path().join("facility.glb.part1"), &a).unwrap();
        std::fs::write(dir.path().join("facility.glb.part2"), &b).unwrap();

        let app = proxy_router(dir.path(), &["facility.glb.part1", "facility.glb.part2"]);
        let response = app
            .oneshot(axum::http::Request::get("/models/facility.glb").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            (7 * MIB).to_string().as_str()
        );
        let body = body_bytes(response).await;
        assert_eq!(body.len(), 7 * MIB);
        assert_eq!(&body[..4 * MIB], a.as_slice());
        assert_eq!(&body[4 * MIB..], b.as_slice());
    }

    #[tokio::test]
    async fn test_missing_part_fails_whole_request() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("facility.glb.part1"), vec![1u8; 1024]).unwrap();

        let app = proxy_router(dir.path(), &["facility.glb.part1", "facility.glb.part2"]);
        let response = app
            .oneshot(axum::http::Request::get("/facility.glb").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_bytes(response).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("facility.glb.part2"));
        assert!(!body.starts_with(&[1u8; 16]));
    }

    #[tokio::test]
    async fn test_other_requests_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let app = proxy_router(dir.path(), &["facility.glb.part1"]);

        let health = app
            .clone()
            .oneshot(axum::http::Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_bytes(health).await, "ok");

        let part = app
            .clone()
            .oneshot(axum::http::Request::get("/facility.glb.part1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_bytes(part).await, "fallthrough");

        let post = app
            .oneshot(axum::http::Request::post("/facility.glb").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(post.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_reports_length_without_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("facility.glb.part1"), vec![7u8; 2 * MIB]).unwrap();
        std::fs::write(dir.path().join("facility.glb.part2"), vec![8u8; MIB + 5]).unwrap();

        let app = proxy_router(dir.path(), &["facility.glb.part1", "facility.glb.part2"]);
        let response = app
            .oneshot(axum::http::Request::head("/models/facility.glb").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            (3 * MIB + 5).to_string().as_str()
        );
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_head_with_missing_part_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("facility.glb.part1"), vec![1u8; 64]).unwrap();

        let app = proxy_router(dir.path(), &["facility.glb.part1", "facility.glb.part2"]);
        let response = app
            .oneshot(axum::http::Request::head("/facility.glb").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_percent_encoded_name_is_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part1"), b"plant").unwrap();
        std::fs::write(dir.path().join("part2"), b" model").unwrap();

        let app = named_proxy_router("plant model.glb", dir.path(), &["part1", "part2"]);
        let response = app
            .oneshot(
                axum::http::Request::get("/models/plant%20model.glb")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, "plant model");
    }

    #[tokio::test]
    async fn test_traversal_part_is_rejected() {
        let source = PartSource::Directory(PathBuf::from("."));
        let err = source.fetch("../secret").await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidPart { .. }));
        let err = source.part_len("../secret").await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidPart { .. }));
    }
}
