use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures the relay reports to callers. Everything maps to a 500 with a
/// JSON `detail` string; recoverable conditions (malformed stream frames,
/// unexpected response shapes, failed local actions) never reach this type.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing GROQ_API_KEY in environment")]
    MissingCredential,

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid conversation history: {0}")]
    InvalidHistory(#[source] serde_json::Error),
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}
