//! HTTP façade: the CouchDB REST dialect over the document engine.
//!
//! A thin shell; every handler opens a [`Database`] handle, calls into
//! the engine, and maps the outcome onto CouchDB wire shapes. Errors
//! travel as [`Error`] all the way to the edge, where they render as
//! the standard `{"error": <status>, "reason": <message>}` envelope.

pub mod database;
pub mod document;

use crate::bucket::Bucket;
use crate::common::{Error, Result, ServerConfig};
use crate::db::Database;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub bucket: Arc<dyn Bucket>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        tracing::debug!("Returning response {}: {}", status.as_u16(), self);
        (
            status,
            Json(json!({"error": status.as_u16(), "reason": self.to_string()})),
        )
            .into_response()
    }
}

/// Decode a JSON request body, enforcing the content type.
pub(crate) fn read_json<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T> {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default();
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        if !content_type.is_empty() && media_type != "application/json" {
            return Err(Error::UnsupportedMediaType(content_type.to_string()));
        }
    }
    serde_json::from_slice(body).map_err(|_| Error::BadJson("could not parse JSON body".into()))
}

pub(crate) fn open_db(state: &AppState, name: &str) -> Result<Database> {
    Database::open(state.bucket.clone(), name)
}

/// Document IDs outside the reserved routes may not start with an
/// underscore.
pub(crate) fn check_doc_id(docid: &str) -> Result<()> {
    if docid.starts_with('_') {
        return Err(Error::BadRequest(format!("invalid document id {}", docid)));
    }
    Ok(())
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({"couchdb": "welcome", "version": crate::VERSION}))
}

async fn unhandled(method: Method, uri: Uri) -> Error {
    tracing::warn!("Unhandled {} {}", method, uri);
    Error::BadRequest(format!("unhandled request: {} {}", method, uri.path()))
}

/// Creates the HTTP router with all public endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome).fallback(unhandled))
        .route(
            "/:db",
            put(database::create_db)
                .get(database::db_info)
                .delete(database::delete_db)
                .post(document::post_doc)
                .fallback(unhandled),
        )
        .route(
            "/:db/_all_docs",
            get(database::all_docs).fallback(unhandled),
        )
        .route(
            "/:db/_bulk_docs",
            post(database::bulk_docs).fallback(unhandled),
        )
        .route("/:db/_changes", get(database::changes).fallback(unhandled))
        .route(
            "/:db/_revs_diff",
            post(database::revs_diff).fallback(unhandled),
        )
        .route(
            "/:db/_local/:doc",
            get(document::get_local)
                .put(document::put_local)
                .delete(document::delete_local)
                .fallback(unhandled),
        )
        .route(
            "/:db/:doc",
            get(document::get_doc)
                .put(document::put_doc)
                .delete(document::delete_doc)
                .fallback(unhandled),
        )
        .fallback(unhandled)
        .with_state(state)
}

/// Bind and serve the REST API until the process is stopped.
pub async fn serve(config: &ServerConfig, bucket: Arc<dyn Bucket>) -> Result<()> {
    let router = create_router(AppState { bucket });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Starting server on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
