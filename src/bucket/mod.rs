//! Bucket adapter: the key/value store contract all persistence goes
//! through.
//!
//! Two backends ship behind the [`Bucket`] trait: an in-memory map
//! (default) and a sled-backed store (feature `sled`). The engine only
//! ever sees the trait, so a real remote bucket client slots in the
//! same way.

pub mod memory;
#[cfg(feature = "sled")]
pub mod sled;
pub mod views;

pub use memory::MemoryBucket;
pub use views::{DesignDoc, ViewDef};

use crate::common::{BucketConfig, Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// Options accepted by [`Bucket::view`].
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Inclusive lower key bound.
    pub startkey: Option<Value>,
    /// Inclusive upper key bound.
    pub endkey: Option<Value>,
    /// Emit rows in reverse key order.
    pub descending: bool,
    /// Maximum number of rows returned.
    pub limit: Option<usize>,
    /// Run the view's reduce function over the selected rows.
    pub reduce: bool,
}

/// One row of a view query result.
#[derive(Debug, Clone)]
pub struct ViewRow {
    /// Bucket key of the record the row was emitted from.
    pub id: String,
    pub key: Value,
    pub value: Value,
}

/// Contract consumed from the underlying K/V store. Errors are mapped
/// by kind; callers rely on `NotFound` and `AlreadyExists` being
/// distinguishable from transport failures.
pub trait Bucket: Send + Sync {
    /// Read a key. Missing keys are `Error::NotFound`.
    fn get(&self, key: &str) -> Result<Value>;

    /// Unconditional write.
    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Write-if-absent. Existing keys are `Error::AlreadyExists`.
    fn add(&self, key: &str, value: &Value) -> Result<()>;

    /// Delete a key. Missing keys are `Error::NotFound`.
    fn delete(&self, key: &str) -> Result<()>;

    /// Atomic counter. A missing key with `delta > 0` is initialized to
    /// `initial`; `delta == 0` reads without mutation and fails with
    /// `NotFound` when the counter has never been written.
    fn incr(&self, key: &str, delta: u64, initial: u64) -> Result<u64>;

    /// Query a view previously registered via [`Bucket::install_design`].
    fn view(&self, design: &str, name: &str, opts: &ViewOptions) -> Result<Vec<ViewRow>>;

    /// Register a design document. Idempotent.
    fn install_design(&self, ddoc: &DesignDoc) -> Result<()>;
}

/// Open the bucket named by the config and install the standard views.
/// A failed view install is logged, not fatal; the views may already
/// exist.
pub fn connect(config: &BucketConfig) -> Result<Arc<dyn Bucket>> {
    let scheme = config.url.split(':').next().unwrap_or_default();
    let bucket: Arc<dyn Bucket> = match scheme {
        "memory" => Arc::new(MemoryBucket::new()),
        #[cfg(feature = "sled")]
        "sled" => {
            let path = config.url.trim_start_matches("sled:");
            Arc::new(sled::SledBucket::open(path)?)
        }
        other => {
            return Err(Error::BadRequest(format!(
                "unsupported bucket URL scheme: {}",
                other
            )))
        }
    };
    tracing::info!(
        "Connected to <{}>, pool {}, bucket {}",
        config.url,
        config.pool,
        config.name
    );
    if let Err(e) = views::install_views(bucket.as_ref()) {
        tracing::warn!("Error installing design doc: {}", e);
    }
    Ok(bucket)
}
