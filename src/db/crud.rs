//! Document CRUD: revision-checked writes, reads, tombstoning, and the
//! replicator-facing forced write and revs-diff operations.

use crate::bucket::Bucket;
use crate::common::{Error, Result};
use crate::db::{revision, Body, Database};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Stored form of a document: the latest body, the revision history of
/// its branch (newest first), and the sequence stamped on the last
/// write. The record outlives deletion; a tombstone keeps feeding the
/// changes feed and replication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocRecord {
    pub current: Body,
    pub revisions: Vec<String>,
    pub sequence: u64,
}

impl DocRecord {
    pub fn current_rev(&self) -> &str {
        self.current
            .get("_rev")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn is_deleted(&self) -> bool {
        self.current
            .get("_deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Input to [`Database::revs_diff`]: docid → revids the caller holds.
pub type RevsDiffInput = HashMap<String, Vec<String>>;

/// Output of [`Database::revs_diff`]: docid → revids the server lacks.
pub type RevsDiffOutput = HashMap<String, RevsDiffEntry>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevsDiffEntry {
    pub missing: Vec<String>,
}

/// Places the incoming branch at the head of the stored history without
/// discarding ancestors: everything up to the first revid both sides
/// know, then the stored tail from that revid on.
fn merge_history(incoming: &[String], stored: &[String]) -> Vec<String> {
    for (i, rev) in incoming.iter().enumerate() {
        if let Some(j) = stored.iter().position(|r| r == rev) {
            let mut merged = incoming[..i].to_vec();
            merged.extend_from_slice(&stored[j..]);
            return merged;
        }
    }
    incoming.to_vec()
}

impl Database {
    pub(crate) fn load_record(&self, docid: &str) -> Result<Option<DocRecord>> {
        match self.bucket().get(&self.real_doc_id(docid)) {
            Ok(value) => {
                let record = serde_json::from_value(value)
                    .map_err(|e| Error::BadGateway(format!("corrupt document record: {}", e)))?;
                Ok(Some(record))
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store_record(&self, docid: &str, record: &DocRecord) -> Result<()> {
        let value = serde_json::to_value(record).map_err(|e| Error::Internal(e.to_string()))?;
        self.bucket().set(&self.real_doc_id(docid), &value)
    }

    /// Finalize a write: stamp `_id`/`_rev`/`_deleted` into the body,
    /// allocate a sequence, and store the record.
    fn commit_record(
        &self,
        docid: &str,
        mut body: Body,
        rev: &str,
        deleted: bool,
        revisions: Vec<String>,
    ) -> Result<()> {
        body.insert("_id".into(), Value::String(docid.to_string()));
        body.insert("_rev".into(), Value::String(rev.to_string()));
        if deleted {
            body.insert("_deleted".into(), Value::Bool(true));
        }
        let sequence = self.generate_sequence()?;
        self.store_record(
            docid,
            &DocRecord {
                current: body,
                revisions,
                sequence,
            },
        )
    }

    fn check_doc_id(docid: &str, body: &Body) -> Result<()> {
        if let Some(id) = body.get("_id").and_then(Value::as_str) {
            if id != docid {
                return Err(Error::BadRequest(
                    "document _id does not match the request path".into(),
                ));
            }
        }
        Ok(())
    }

    /// Write a new revision of `docid`. `body._rev` must name the
    /// current revision, or be absent when the document does not exist
    /// (a tombstone counts as absent). Returns the new revid.
    pub fn put(&self, docid: &str, body: Body) -> Result<String> {
        Self::check_doc_id(docid, &body)?;
        let existing = self.load_record(docid)?;
        // a tombstone has no parent; updating it starts a fresh branch
        let (parent_rev, old_revisions) = match &existing {
            Some(record) if !record.is_deleted() => {
                (record.current_rev().to_string(), record.revisions.clone())
            }
            _ => (String::new(), Vec::new()),
        };

        let asserted = body.get("_rev").and_then(Value::as_str).unwrap_or("");
        if asserted != parent_rev {
            return Err(Error::Conflict("document update conflict".into()));
        }

        let deleted = body
            .get("_deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let stripped = revision::strip_reserved(&body);
        let new_rev = revision::new_rev_id(&parent_rev, deleted, &stripped)?;

        let mut revisions = Vec::with_capacity(old_revisions.len() + 1);
        revisions.push(new_rev.clone());
        revisions.extend(old_revisions);
        self.commit_record(docid, stripped, &new_rev, deleted, revisions)?;
        Ok(new_rev)
    }

    /// Create a document under a generated ID. Returns `(docid, rev)`.
    pub fn post(&self, body: Body) -> Result<(String, String)> {
        let docid = Uuid::new_v4().simple().to_string();
        let rev = self.put(&docid, body)?;
        Ok((docid, rev))
    }

    /// Tombstone `docid` at revision `revid`.
    pub fn delete_doc(&self, docid: &str, revid: &str) -> Result<String> {
        let mut body = Body::new();
        if !revid.is_empty() {
            body.insert("_rev".into(), Value::String(revid.to_string()));
        }
        body.insert("_deleted".into(), Value::Bool(true));
        self.put(docid, body)
    }

    /// Current body of `docid` with `_id` and `_rev` filled in, or
    /// `None` when the document is missing or tombstoned.
    pub fn get(&self, docid: &str) -> Result<Option<Body>> {
        match self.load_record(docid)? {
            Some(record) if !record.is_deleted() => Ok(Some(record.current)),
            _ => Ok(None),
        }
    }

    /// Replicator-forced write: store `body` under the caller-supplied
    /// revid `revs[0]` and merge the (descending) `revs` list into the
    /// history. A revid already present in the history is a no-op, and
    /// in particular allocates no sequence.
    pub fn put_existing_rev(&self, docid: &str, body: Body, revs: &[String]) -> Result<()> {
        let new_rev = revs
            .first()
            .ok_or_else(|| Error::BadRequest("empty revision list".into()))?;
        for rev in revs {
            revision::parse_rev_id(rev)?;
        }
        Self::check_doc_id(docid, &body)?;

        let existing = self.load_record(docid)?;
        if let Some(record) = &existing {
            if record.revisions.iter().any(|r| r == new_rev) {
                return Ok(());
            }
        }
        let history = match &existing {
            Some(record) => merge_history(revs, &record.revisions),
            None => revs.to_vec(),
        };

        let deleted = body
            .get("_deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let stripped = revision::strip_reserved(&body);
        self.commit_record(docid, stripped, new_rev, deleted, history)
    }

    /// For each docid, the subset of the caller's revids this server
    /// does not have. Docids with nothing missing are omitted.
    pub fn revs_diff(&self, input: RevsDiffInput) -> Result<RevsDiffOutput> {
        let mut output = RevsDiffOutput::new();
        for (docid, revs) in input {
            let known = match self.load_record(&docid)? {
                Some(record) => record.revisions,
                None => Vec::new(),
            };
            let missing: Vec<String> = revs.into_iter().filter(|r| !known.contains(r)).collect();
            if !missing.is_empty() {
                output.insert(docid, RevsDiffEntry { missing });
            }
        }
        Ok(output)
    }
}
