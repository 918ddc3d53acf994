//! The one-shot `_changes` feed over the `changes` view.

use crate::bucket::views::{DESIGN_DOC, VIEW_CHANGES};
use crate::bucket::{Bucket, ViewOptions};
use crate::common::Result;
use crate::db::Database;
use serde::Serialize;
use serde_json::{json, Value};

/// Options for [`Database::get_changes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangesOptions {
    /// Only report changes with a sequence greater than this.
    pub since: u64,
    /// Maximum number of entries; 0 means unlimited.
    pub limit: usize,
    /// Emit in decreasing sequence order.
    pub descending: bool,
}

/// One changes-feed entry, in the CouchDB `_changes` wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEntry {
    pub seq: u64,
    pub id: String,
    pub changes: Vec<ChangeRev>,
    #[serde(skip_serializing_if = "is_false")]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeRev {
    pub rev: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Database {
    /// Changes made to this database, ordered by sequence. The key
    /// range ends at the `{}` sentinel so rows of other databases in
    /// the bucket never leak in.
    pub fn get_changes(&self, options: ChangesOptions) -> Result<Vec<ChangeEntry>> {
        let opts = ViewOptions {
            startkey: Some(json!([self.uuid(), options.since.saturating_add(1)])),
            endkey: Some(json!([self.uuid(), {}])),
            descending: options.descending,
            limit: (options.limit > 0).then_some(options.limit),
            reduce: false,
        };
        let rows = self.bucket().view(DESIGN_DOC, VIEW_CHANGES, &opts)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let seq = row.key.get(1).and_then(Value::as_u64).unwrap_or(0);
            let value = row.value.as_array().cloned().unwrap_or_default();
            entries.push(ChangeEntry {
                seq,
                id: value
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                changes: vec![ChangeRev {
                    rev: value
                        .get(1)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }],
                deleted: value.get(2).and_then(Value::as_bool).unwrap_or(false),
            });
        }
        Ok(entries)
    }
}
