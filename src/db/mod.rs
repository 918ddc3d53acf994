//! Logical databases within a bucket: the registry, per-database
//! sequences, and the queries built on the installed views.
//!
//! A [`Database`] handle is immutable after creation; all mutable state
//! lives in the bucket. Handles are cheap to open per-request.

pub mod changes;
pub mod crud;
pub mod local;
pub mod revision;

pub use changes::{ChangeEntry, ChangeRev, ChangesOptions};
pub use crud::{DocRecord, RevsDiffEntry, RevsDiffInput, RevsDiffOutput};

use crate::bucket::views::{DESIGN_DOC, VIEW_ALL_DOCS};
use crate::bucket::{Bucket, ViewOptions};
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// A document body: a JSON object keyed by field name.
pub type Body = serde_json::Map<String, Value>;

/// Permitted database-name characters.
fn valid_db_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            matches!(c, 'a'..='z' | '0'..='9' | '-' | '%' | '+' | '(' | ')' | '$' | '_')
        })
}

/// Bucket key of the database's registry record.
fn db_internal_doc_name(name: &str) -> Result<String> {
    if !valid_db_name(name) {
        return Err(Error::BadRequest("illegal database name".into()));
    }
    Ok(format!("cdb:{}", name))
}

/// Registry record stored at `cdb:<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbRecord {
    name: String,
    #[serde(rename = "docPrefix")]
    doc_prefix: String,
}

/// A handle on one logical database within a bucket.
#[derive(Clone)]
pub struct Database {
    name: String,
    doc_prefix: String,
    bucket: Arc<dyn Bucket>,
}

impl Database {
    /// Create a database. Fails with 412 if one of that name exists.
    pub fn create(bucket: Arc<dyn Bucket>, name: &str) -> Result<Database> {
        let docname = db_internal_doc_name(name)?;
        match bucket.get(&docname) {
            Ok(_) => {
                return Err(Error::AlreadyExists(format!(
                    "database {} already exists",
                    name
                )))
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let record = DbRecord {
            name: name.to_string(),
            doc_prefix: format!("doc:{}/{}:", name, Uuid::new_v4().simple()),
        };
        let value = serde_json::to_value(&record).map_err(|e| Error::Internal(e.to_string()))?;
        // create-only write, so a racing creator still gets 412
        match bucket.add(&docname, &value) {
            Ok(()) => {}
            Err(Error::AlreadyExists(_)) => {
                return Err(Error::AlreadyExists(format!(
                    "database {} already exists",
                    name
                )))
            }
            Err(e) => return Err(e),
        }
        Ok(Database {
            name: record.name,
            doc_prefix: record.doc_prefix,
            bucket,
        })
    }

    /// Open an existing database. Fails with 404 if absent.
    pub fn open(bucket: Arc<dyn Bucket>, name: &str) -> Result<Database> {
        let docname = db_internal_doc_name(name)?;
        let value = match bucket.get(&docname) {
            Ok(v) => v,
            Err(Error::NotFound(_)) => {
                return Err(Error::NotFound(format!("no such database {}", name)))
            }
            Err(e) => return Err(e),
        };
        let record: DbRecord = serde_json::from_value(value)
            .map_err(|e| Error::BadGateway(format!("corrupt database record: {}", e)))?;
        Ok(Database {
            name: record.name,
            doc_prefix: record.doc_prefix,
            bucket,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace segment the views key on: the doc prefix without
    /// its `doc:` head and trailing colon.
    pub fn uuid(&self) -> &str {
        &self.doc_prefix[4..self.doc_prefix.len() - 1]
    }

    pub(crate) fn real_doc_id(&self, docid: &str) -> String {
        format!("{}{}", self.doc_prefix, docid)
    }

    fn sequence_doc_id(&self) -> String {
        format!("cdb:{}:nextsequence", self.name)
    }

    pub(crate) fn local_doc_id(&self, docid: &str) -> String {
        format!("cdb:{}:local:{}", self.name, docid)
    }

    /// Allocate the next sequence number. Strictly monotonic per
    /// database; never reused, even after deletes.
    pub(crate) fn generate_sequence(&self) -> Result<u64> {
        self.bucket.incr(&self.sequence_doc_id(), 1, 1)
    }

    /// Latest sequence issued, 0 if the database has never been written.
    pub fn last_sequence(&self) -> Result<u64> {
        match self.bucket.incr(&self.sequence_doc_id(), 0, 0) {
            Ok(v) => Ok(v),
            Err(Error::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn bucket(&self) -> &dyn Bucket {
        self.bucket.as_ref()
    }

    fn all_docs_opts(&self, reduce: bool) -> ViewOptions {
        ViewOptions {
            startkey: Some(json!([self.uuid()])),
            endkey: Some(json!([self.uuid(), {}])),
            reduce,
            ..Default::default()
        }
    }

    /// All document IDs in this database, ascending.
    pub fn all_doc_ids(&self) -> Result<Vec<String>> {
        let rows = self
            .bucket
            .view(DESIGN_DOC, VIEW_ALL_DOCS, &self.all_docs_opts(false))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.key.get(1).and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    /// The number of document records (tombstones included).
    pub fn doc_count(&self) -> Result<u64> {
        let rows = self
            .bucket
            .view(DESIGN_DOC, VIEW_ALL_DOCS, &self.all_docs_opts(true))?;
        Ok(rows.first().and_then(|row| row.value.as_u64()).unwrap_or(0))
    }

    /// Delete the database and everything in it. Once the registry
    /// record is gone the database is unaddressable, so per-document
    /// failures are logged and swallowed.
    pub fn delete(self) -> Result<()> {
        let rows = self
            .bucket
            .view(DESIGN_DOC, VIEW_ALL_DOCS, &self.all_docs_opts(false))?;
        self.bucket.delete(&db_internal_doc_name(&self.name)?)?;

        if let Err(e) = self.bucket.delete(&self.sequence_doc_id()) {
            if !matches!(e, Error::NotFound(_)) {
                tracing::warn!("failed to delete sequence counter of {}: {}", self.name, e);
            }
        }
        for row in rows {
            if let Err(e) = self.bucket.delete(&row.id) {
                if !matches!(e, Error::NotFound(_)) {
                    tracing::warn!("failed to delete {}: {}", row.id, e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::MemoryBucket;

    fn test_bucket() -> Arc<dyn Bucket> {
        let bucket = MemoryBucket::new();
        crate::bucket::views::install_views(&bucket).unwrap();
        Arc::new(bucket)
    }

    #[test]
    fn test_valid_db_name() {
        assert!(valid_db_name("mydb"));
        assert!(valid_db_name("a-b_c%d+e(f)$0"));
        assert!(!valid_db_name(""));
        assert!(!valid_db_name("MyDB"));
        assert!(!valid_db_name("has space"));
        assert!(!valid_db_name("slash/y"));
    }

    #[test]
    fn test_create_then_open() {
        let bucket = test_bucket();
        let db = Database::create(bucket.clone(), "mydb").unwrap();
        assert_eq!(db.name(), "mydb");
        assert!(db.uuid().starts_with("mydb/"));

        let reopened = Database::open(bucket, "mydb").unwrap();
        assert_eq!(reopened.uuid(), db.uuid());
    }

    #[test]
    fn test_create_duplicate_fails() {
        let bucket = test_bucket();
        Database::create(bucket.clone(), "mydb").unwrap();
        assert!(matches!(
            Database::create(bucket, "mydb"),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_open_missing_fails() {
        assert!(matches!(
            Database::open(test_bucket(), "nosuch"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_illegal_names_rejected() {
        let bucket = test_bucket();
        assert!(matches!(
            Database::create(bucket.clone(), "Bad Name"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            Database::open(bucket, "Bad Name"),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_sequences_are_monotonic() {
        let bucket = test_bucket();
        let db = Database::create(bucket, "seqdb").unwrap();
        assert_eq!(db.last_sequence().unwrap(), 0);
        assert_eq!(db.generate_sequence().unwrap(), 1);
        assert_eq!(db.generate_sequence().unwrap(), 2);
        assert_eq!(db.last_sequence().unwrap(), 2);
        assert_eq!(db.last_sequence().unwrap(), 2);
    }

    #[test]
    fn test_two_databases_do_not_share_sequences_or_docs() {
        let bucket = test_bucket();
        let db1 = Database::create(bucket.clone(), "one").unwrap();
        let db2 = Database::create(bucket.clone(), "two").unwrap();

        db1.put("a", serde_json::Map::new()).unwrap();
        assert_eq!(db1.last_sequence().unwrap(), 1);
        assert_eq!(db2.last_sequence().unwrap(), 0);
        assert_eq!(db1.all_doc_ids().unwrap(), vec!["a"]);
        assert!(db2.all_doc_ids().unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_everything() {
        let bucket = test_bucket();
        let db = Database::create(bucket.clone(), "gone").unwrap();
        db.put("a", serde_json::Map::new()).unwrap();
        db.put("b", serde_json::Map::new()).unwrap();
        let doc_key = db.real_doc_id("a");
        db.delete().unwrap();

        assert!(matches!(bucket.get("cdb:gone"), Err(Error::NotFound(_))));
        assert!(matches!(
            bucket.get("cdb:gone:nextsequence"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(bucket.get(&doc_key), Err(Error::NotFound(_))));
        assert!(matches!(
            Database::open(bucket, "gone"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_doc_count() {
        let bucket = test_bucket();
        let db = Database::create(bucket, "countdb").unwrap();
        assert_eq!(db.doc_count().unwrap(), 0);
        db.put("a", serde_json::Map::new()).unwrap();
        db.put("b", serde_json::Map::new()).unwrap();
        assert_eq!(db.doc_count().unwrap(), 2);
    }
}
