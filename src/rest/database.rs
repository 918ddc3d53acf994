//! Handlers for database-level routes: lifecycle, _all_docs,
//! _bulk_docs, _changes, and _revs_diff.

use crate::common::{Error, Result};
use crate::db::{revision, Body, ChangesOptions, Database, RevsDiffInput, RevsDiffOutput};
use crate::rest::{check_doc_id, open_db, read_json, AppState};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn create_db(
    State(state): State<AppState>,
    Path(db): Path<String>,
) -> Result<impl IntoResponse> {
    Database::create(state.bucket.clone(), &db)?;
    tracing::info!("Created database {}", db);
    Ok((StatusCode::CREATED, Json(json!({"ok": true}))))
}

pub async fn db_info(
    State(state): State<AppState>,
    Path(db): Path<String>,
) -> Result<Json<Value>> {
    let db = open_db(&state, &db)?;
    Ok(Json(json!({
        "db_name": db.name(),
        "doc_count": db.doc_count()?,
    })))
}

pub async fn delete_db(
    State(state): State<AppState>,
    Path(db): Path<String>,
) -> Result<Json<Value>> {
    let db = open_db(&state, &db)?;
    let name = db.name().to_string();
    db.delete()?;
    tracing::info!("Deleted database {}", name);
    Ok(Json(json!({"ok": true})))
}

pub async fn all_docs(
    State(state): State<AppState>,
    Path(db): Path<String>,
) -> Result<Json<Vec<String>>> {
    let db = open_db(&state, &db)?;
    Ok(Json(db.all_doc_ids()?))
}

/// One `_bulk_docs` item: a put for docs carrying an `_id`, a post
/// otherwise; with `new_edits == false` every item takes the
/// replicator path.
fn bulk_item(db: &Database, doc: &Body, docid: &str, new_edits: bool) -> Result<(String, String)> {
    if !docid.is_empty() {
        check_doc_id(docid)?;
    }
    if new_edits {
        if docid.is_empty() {
            return db.post(doc.clone());
        }
        let rev = db.put(docid, doc.clone())?;
        return Ok((docid.to_string(), rev));
    }
    if docid.is_empty() {
        return Err(Error::BadRequest("missing _id".into()));
    }
    let revs = revision::parse_revisions(doc)?;
    db.put_existing_rev(docid, doc.clone(), &revs)?;
    Ok((docid.to_string(), revs[0].clone()))
}

pub async fn bulk_docs(
    State(state): State<AppState>,
    Path(db): Path<String>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<impl IntoResponse> {
    let db = open_db(&state, &db)?;
    let payload: Body = read_json(&headers, &payload)?;
    let new_edits = payload
        .get("new_edits")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let docs = payload
        .get("docs")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::BadRequest("missing docs".into()))?;

    let mut results = Vec::with_capacity(docs.len());
    for item in docs {
        let Some(doc) = item.as_object() else {
            results.push(json!({"error": "bad_request"}));
            continue;
        };
        let docid = doc.get("_id").and_then(Value::as_str).unwrap_or_default();
        let status = match bulk_item(&db, doc, docid, new_edits) {
            Ok((id, rev)) => json!({"id": id, "rev": rev}),
            Err(e) if docid.is_empty() => json!({"error": e.reason()}),
            Err(e) => json!({"id": docid, "error": e.reason()}),
        };
        tracing::debug!("bulk_docs: {}", status);
        results.push(status);
    }
    Ok((StatusCode::CREATED, Json(json!({"docs": results}))))
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangesParams {
    since: Option<String>,
    limit: Option<String>,
    descending: Option<String>,
}

/// Integer value of a query parameter, 0 when missing or unparseable.
fn uint_param(value: &Option<String>) -> u64 {
    value
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

pub async fn changes(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<ChangesParams>,
) -> Result<Json<Value>> {
    let db = open_db(&state, &db)?;
    let options = ChangesOptions {
        since: uint_param(&params.since),
        limit: uint_param(&params.limit) as usize,
        descending: params.descending.as_deref() == Some("true"),
    };
    let results = db.get_changes(options)?;
    let last_seq = db.last_sequence()?;
    Ok(Json(json!({"results": results, "last_seq": last_seq})))
}

pub async fn revs_diff(
    State(state): State<AppState>,
    Path(db): Path<String>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<RevsDiffOutput>> {
    let db = open_db(&state, &db)?;
    let input: RevsDiffInput = read_json(&headers, &payload)?;
    Ok(Json(db.revs_diff(input)?))
}
