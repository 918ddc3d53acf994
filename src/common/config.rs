//! Configuration for the minicouch server

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Bucket connection settings
    #[serde(default)]
    pub bucket: BucketConfig,
}

/// Bucket connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Bucket server URL (`memory:`, or `sled:<path>` with the sled feature)
    #[serde(default = "default_bucket_url")]
    pub url: String,

    /// Name of the pool the bucket lives in
    #[serde(default = "default_pool_name")]
    pub pool: String,

    /// Name of the bucket
    #[serde(default = "default_bucket_name")]
    pub name: String,
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:4984".parse().expect("static default")
}
fn default_bucket_url() -> String {
    "memory:".to_string()
}
fn default_pool_name() -> String {
    "default".to_string()
}
fn default_bucket_name() -> String {
    "couchdb".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            bucket: BucketConfig::default(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            url: default_bucket_url(),
            pool: default_pool_name(),
            name: default_bucket_name(),
        }
    }
}

impl ServerConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&content)
            .map_err(|e| crate::Error::BadRequest(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.bucket.url.is_empty() {
            return Err(crate::Error::BadRequest("bucket url is required".into()));
        }
        if self.bucket.name.is_empty() {
            return Err(crate::Error::BadRequest("bucket name is required".into()));
        }
        if self.bucket.pool.is_empty() {
            return Err(crate::Error::BadRequest("pool name is required".into()));
        }
        Ok(())
    }
}
