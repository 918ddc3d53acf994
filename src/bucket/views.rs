//! Built-in views and the collation rules behind them.
//!
//! The bucket's secondary-index facility is modeled as native Rust map
//! functions registered through a design document. Two views are
//! installed on connect: `all_docs` indexes every document key, and
//! `changes` indexes documents by their assigned sequence. Both key on
//! the database namespace first so a per-database query is a contiguous
//! key-range scan.

use crate::bucket::{Bucket, ViewOptions, ViewRow};
use crate::common::{Error, Result};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

/// Name of the shared design document.
pub const DESIGN_DOC: &str = "couchdb";
/// View indexing `[namespace, docid]` for every document record.
pub const VIEW_ALL_DOCS: &str = "all_docs";
/// View indexing `[namespace, sequence]` for every sequenced record.
pub const VIEW_CHANGES: &str = "changes";

/// A native map function: invoked with the bucket key and stored value,
/// returns the emitted (key, value) pairs.
pub type MapFn = fn(&str, &Value) -> Vec<(Value, Value)>;

/// Built-in reduce functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceFn {
    /// Row count over the selected range.
    Count,
}

/// One view of a design document.
#[derive(Clone)]
pub struct ViewDef {
    pub name: &'static str,
    pub map: MapFn,
    pub reduce: Option<ReduceFn>,
}

/// A design document: a named group of views.
#[derive(Clone)]
pub struct DesignDoc {
    pub name: &'static str,
    pub views: Vec<ViewDef>,
}

impl DesignDoc {
    pub fn view(&self, name: &str) -> Option<&ViewDef> {
        self.views.iter().find(|v| v.name == name)
    }

    /// JSON descriptor persisted under `_design/<name>` so installation
    /// is observable in the bucket itself.
    pub fn descriptor(&self) -> Value {
        let mut views = Map::new();
        for view in &self.views {
            let mut def = Map::new();
            def.insert("map".into(), json!("native"));
            if let Some(ReduceFn::Count) = view.reduce {
                def.insert("reduce".into(), json!("_count"));
            }
            views.insert(view.name.to_string(), Value::Object(def));
        }
        json!({ "language": "rust", "views": views })
    }
}

/// The standard design document: `all_docs` and `changes`.
pub fn standard_design_doc() -> DesignDoc {
    DesignDoc {
        name: DESIGN_DOC,
        views: vec![
            ViewDef {
                name: VIEW_ALL_DOCS,
                map: map_all_docs,
                reduce: Some(ReduceFn::Count),
            },
            ViewDef {
                name: VIEW_CHANGES,
                map: map_changes,
                reduce: None,
            },
        ],
    }
}

/// Register the standard views with the bucket. Idempotent; racing
/// installers write the same payload.
pub fn install_views(bucket: &dyn Bucket) -> Result<()> {
    bucket.install_design(&standard_design_doc())?;
    tracing::info!("Installed design doc <_design/{}>", DESIGN_DOC);
    Ok(())
}

/// Splits a document bucket key of the form `doc:<namespace>:<docid>`.
fn parse_doc_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("doc:")?;
    rest.split_once(':')
}

fn map_all_docs(key: &str, _doc: &Value) -> Vec<(Value, Value)> {
    match parse_doc_key(key) {
        Some((namespace, docid)) => vec![(json!([namespace, docid]), Value::Null)],
        None => Vec::new(),
    }
}

fn map_changes(key: &str, doc: &Value) -> Vec<(Value, Value)> {
    let Some((namespace, _)) = parse_doc_key(key) else {
        return Vec::new();
    };
    let Some(sequence) = doc.get("sequence").and_then(Value::as_u64) else {
        return Vec::new();
    };
    let current = doc.get("current").cloned().unwrap_or(Value::Null);
    let mut value = vec![
        current.get("_id").cloned().unwrap_or(Value::Null),
        current.get("_rev").cloned().unwrap_or(Value::Null),
    ];
    if current.get("_deleted").and_then(Value::as_bool) == Some(true) {
        value.push(Value::Bool(true));
    }
    vec![(json!([namespace, sequence]), Value::Array(value))]
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// CouchDB view collation: null < false < true < numbers < strings <
/// arrays < objects. The empty object is the customary "infinity"
/// terminator for key ranges.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let ord = collate(ex, ey);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let ord = x.len().cmp(&y.len());
            if ord != Ordering::Equal {
                return ord;
            }
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let ord = kx.cmp(ky).then_with(|| collate(vx, vy));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        _ => Ordering::Equal,
    }
}

/// Evaluate a view over every bucket entry and apply the query options:
/// collation-sorted rows, inclusive key bounds, reversed when
/// descending, then the row limit. With `reduce` the single result row
/// carries the count of selected rows.
pub fn run_view<I>(entries: I, view: &ViewDef, opts: &ViewOptions) -> Result<Vec<ViewRow>>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut rows: Vec<ViewRow> = Vec::new();
    for (key, value) in entries {
        for (vkey, vvalue) in (view.map)(&key, &value) {
            rows.push(ViewRow {
                id: key.clone(),
                key: vkey,
                value: vvalue,
            });
        }
    }
    rows.sort_by(|a, b| collate(&a.key, &b.key));
    if let Some(start) = &opts.startkey {
        rows.retain(|r| collate(&r.key, start) != Ordering::Less);
    }
    if let Some(end) = &opts.endkey {
        rows.retain(|r| collate(&r.key, end) != Ordering::Greater);
    }

    if opts.reduce {
        match view.reduce {
            Some(ReduceFn::Count) => {
                return Ok(vec![ViewRow {
                    id: String::new(),
                    key: Value::Null,
                    value: json!(rows.len()),
                }])
            }
            None => {
                return Err(Error::BadRequest(format!(
                    "view {} has no reduce function",
                    view.name
                )))
            }
        }
    }

    if opts.descending {
        rows.reverse();
    }
    if let Some(limit) = opts.limit {
        rows.truncate(limit);
    }
    Ok(rows)
}
