//! # minicouch
//!
//! A CouchDB-compatible document database layered over a key/value
//! bucket:
//! - Document CRUD with revision tracking and conflict detection
//! - A strictly monotonic per-database sequence feeding `_changes`
//! - The server side of the CouchDB replication protocol
//!   (`_revs_diff`, forced revision writes via `new_edits=false`)
//! - `_local` documents for replicator checkpoints
//!
//! Documents live in a single flat bucket; two installed views
//! (`all_docs` and `changes`) key on a per-database namespace so
//! enumeration and the changes feed are contiguous key-range scans.
//!
//! ## Usage
//!
//! ```bash
//! minicouch --bind 0.0.0.0:4984 --url memory: --bucket couchdb
//! ```
//!
//! Then speak CouchDB to it:
//!
//! ```bash
//! curl -X PUT http://localhost:4984/mydb
//! curl -X PUT http://localhost:4984/mydb/doc1 -d '{"channel": "news"}' \
//!   -H 'Content-Type: application/json'
//! curl http://localhost:4984/mydb/_changes?since=0
//! ```

pub mod bucket;
pub mod common;
pub mod db;
pub mod rest;

// Re-export commonly used types
pub use common::{Error, Result, ServerConfig};
pub use db::{Body, Database};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
