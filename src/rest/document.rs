//! Handlers for document-level routes, including the `_local`
//! namespace.

use crate::common::{Error, Result};
use crate::db::{revision, Body};
use crate::rest::{check_doc_id, open_db, read_json, AppState};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

fn created(docid: &str, rev: String) -> (StatusCode, [(HeaderName, String); 1], Json<Value>) {
    (
        StatusCode::CREATED,
        [(header::ETAG, rev.clone())],
        Json(json!({"ok": true, "id": docid, "rev": rev})),
    )
}

pub async fn get_doc(
    State(state): State<AppState>,
    Path((db, doc)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    check_doc_id(&doc)?;
    let db = open_db(&state, &db)?;
    let body = db
        .get(&doc)?
        .ok_or_else(|| Error::NotFound(format!("missing document {}", doc)))?;
    let rev = body
        .get("_rev")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(([(header::ETAG, rev)], Json(Value::Object(body))))
}

#[derive(Debug, Default, Deserialize)]
pub struct PutDocParams {
    new_edits: Option<String>,
}

pub async fn put_doc(
    State(state): State<AppState>,
    Path((db, doc)): Path<(String, String)>,
    Query(params): Query<PutDocParams>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<impl IntoResponse> {
    check_doc_id(&doc)?;
    let db = open_db(&state, &db)?;
    let body: Body = read_json(&headers, &payload)?;

    if params.new_edits.as_deref() == Some("false") {
        // Replicator-style PUT: the body names its own revisions
        let revs = revision::parse_revisions(&body)?;
        db.put_existing_rev(&doc, body, &revs)?;
        return Ok(created(&doc, revs[0].clone()));
    }

    let rev = db.put(&doc, body)?;
    Ok(created(&doc, rev))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteDocParams {
    rev: Option<String>,
}

pub async fn delete_doc(
    State(state): State<AppState>,
    Path((db, doc)): Path<(String, String)>,
    Query(params): Query<DeleteDocParams>,
) -> Result<Json<Value>> {
    check_doc_id(&doc)?;
    let db = open_db(&state, &db)?;
    let rev = db.delete_doc(&doc, params.rev.as_deref().unwrap_or_default())?;
    Ok(Json(json!({"ok": true, "id": doc, "rev": rev})))
}

pub async fn post_doc(
    State(state): State<AppState>,
    Path(db): Path<String>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<impl IntoResponse> {
    let db = open_db(&state, &db)?;
    let body: Body = read_json(&headers, &payload)?;
    let (docid, rev) = db.post(body)?;
    Ok((
        StatusCode::CREATED,
        [
            (header::ETAG, rev.clone()),
            (header::LOCATION, docid.clone()),
        ],
        Json(json!({"ok": true, "id": docid, "rev": rev})),
    ))
}

pub async fn get_local(
    State(state): State<AppState>,
    Path((db, doc)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let db = open_db(&state, &db)?;
    let body = db
        .get_local(&doc)?
        .ok_or_else(|| Error::NotFound(format!("missing local document {}", doc)))?;
    Ok(Json(Value::Object(body)))
}

pub async fn put_local(
    State(state): State<AppState>,
    Path((db, doc)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<impl IntoResponse> {
    let db = open_db(&state, &db)?;
    let body: Body = read_json(&headers, &payload)?;
    db.put_local(&doc, body)?;
    Ok((StatusCode::CREATED, Json(json!({"ok": true}))))
}

pub async fn delete_local(
    State(state): State<AppState>,
    Path((db, doc)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let db = open_db(&state, &db)?;
    db.delete_local(&doc)?;
    Ok(Json(json!({"ok": true})))
}
