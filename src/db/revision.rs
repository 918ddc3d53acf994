//! Revision identifiers and the deterministic digest behind them.
//!
//! A revid is `<generation>-<digest>`. The digest covers the parent
//! revid, the deletion flag, and the canonical (sorted-key) JSON of the
//! body with reserved keys stripped, so two replicas applying the same
//! update converge on the same revid.

use crate::common::{hash, Error, Result};
use serde_json::{Map, Value};

/// Top-level keys stripped from a body before digesting and storage.
const RESERVED_KEYS: &[&str] = &["_id", "_rev", "_deleted", "_revisions"];

/// Split a revid into its generation number and digest.
pub fn parse_rev_id(rev: &str) -> Result<(u64, &str)> {
    let (gen, digest) = rev
        .split_once('-')
        .ok_or_else(|| Error::BadRequest(format!("invalid revision id: {}", rev)))?;
    let gen: u64 = gen
        .parse()
        .map_err(|_| Error::BadRequest(format!("invalid revision id: {}", rev)))?;
    if gen == 0 || digest.is_empty() {
        return Err(Error::BadRequest(format!("invalid revision id: {}", rev)));
    }
    Ok((gen, digest))
}

/// Generation number of a revid; 0 for the empty (no-parent) revid or
/// anything unparsable.
pub fn generation(rev: &str) -> u64 {
    parse_rev_id(rev).map(|(gen, _)| gen).unwrap_or(0)
}

/// Copy of `body` without the reserved keys.
pub fn strip_reserved(body: &Map<String, Value>) -> Map<String, Value> {
    body.iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Compute the revid for a write of `stripped_body` on top of
/// `parent_rev` (empty string for a create).
pub fn new_rev_id(
    parent_rev: &str,
    deleted: bool,
    stripped_body: &Map<String, Value>,
) -> Result<String> {
    let canonical =
        serde_json::to_vec(stripped_body).map_err(|e| Error::Internal(e.to_string()))?;
    let mut input = Vec::with_capacity(parent_rev.len() + canonical.len() + 3);
    input.extend_from_slice(parent_rev.as_bytes());
    input.push(0);
    input.push(deleted as u8);
    input.push(0);
    input.extend_from_slice(&canonical);
    Ok(format!(
        "{}-{}",
        generation(parent_rev) + 1,
        hash::short_digest(&input)
    ))
}

/// Parse a CouchDB `_revisions` property `{start, ids}` into a
/// descending revid list. `start` must cover all of `ids`.
pub fn parse_revisions(body: &Map<String, Value>) -> Result<Vec<String>> {
    let revisions = body
        .get("_revisions")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::BadRequest("bad _revisions".into()))?;
    let start = revisions
        .get("start")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::BadRequest("bad _revisions".into()))?;
    let ids = revisions
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::BadRequest("bad _revisions".into()))?;
    if (start as usize) < ids.len() {
        return Err(Error::BadRequest("bad _revisions".into()));
    }
    let mut result = Vec::with_capacity(ids.len());
    let mut gen = start;
    for id in ids {
        let id = id
            .as_str()
            .ok_or_else(|| Error::BadRequest("bad _revisions".into()))?;
        result.push(format!("{}-{}", gen, id));
        gen -= 1;
    }
    Ok(result)
}
