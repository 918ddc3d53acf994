//! Error types for minicouch

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("bad JSON: {0}")]
    BadJson(String),

    #[error("invalid content type: {0}")]
    UnsupportedMediaType(String),

    #[error("bucket error: {0}")]
    BadGateway(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::AlreadyExists(_) => StatusCode::PRECONDITION_FAILED,
            Error::BadRequest(_) | Error::BadJson(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedMediaType(_) => StatusCode::NOT_ACCEPTABLE,
            Error::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short CouchDB-style error name, used in per-document bulk results.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::AlreadyExists(_) => "file_exists",
            Error::BadRequest(_) => "bad_request",
            Error::BadJson(_) => "bad_json",
            Error::UnsupportedMediaType(_) => "not_acceptable",
            Error::BadGateway(_) => "bad_gateway",
            Error::Io(_) | Error::Internal(_) => "internal_error",
        }
    }
}

#[cfg(feature = "sled")]
impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::BadGateway(e.to_string())
    }
}
