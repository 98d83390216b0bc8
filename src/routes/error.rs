use crate::db::is_unique_violation;
use crate::import::pipeline::IngestError;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde_json::json;

/// Every handler failure. Rendered as `{"detail": "..."}` with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Database(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                Status::InternalServerError
            }
        }
    }

    /// Map a failed insert/update: a uniqueness clash becomes 409 with
    /// `conflict`, anything else stays a database error.
    pub fn from_write(err: rusqlite::Error, conflict: &str) -> Self {
        if is_unique_violation(&err) {
            ApiError::Conflict(conflict.to_string())
        } else {
            ApiError::Database(err)
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnknownSpecies(_) => ApiError::NotFound(err.to_string()),
            IngestError::Database(e) => ApiError::Database(e),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let detail = if status.code >= 500 {
            tracing::error!("{} {}: {:#}", req.method(), req.uri(), self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "detail": detail }))).respond_to(req)
    }
}
