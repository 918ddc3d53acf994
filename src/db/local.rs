//! `_local` documents: per-node client state (replication checkpoints
//! and the like). Stored as raw bucket values with no revision
//! history, no sequence, and no changes-feed visibility.

use crate::bucket::Bucket;
use crate::common::{Error, Result};
use crate::db::{Body, Database};
use serde_json::Value;

impl Database {
    /// Body of a local document, or `None` when absent.
    pub fn get_local(&self, docid: &str) -> Result<Option<Body>> {
        match self.bucket().get(&self.local_doc_id(docid)) {
            Ok(Value::Object(body)) => Ok(Some(body)),
            Ok(_) => Err(Error::BadGateway(format!(
                "local document {} is not an object",
                docid
            ))),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn put_local(&self, docid: &str, body: Body) -> Result<()> {
        self.bucket()
            .set(&self.local_doc_id(docid), &Value::Object(body))
    }

    pub fn delete_local(&self, docid: &str) -> Result<()> {
        self.bucket().delete(&self.local_doc_id(docid))
    }
}
