//! Error responses for the query endpoints.
//!
//! The SQL console reports `{"error": "..."}` with a 200 of its own accord
//! (see `handlers::render_sql_console`) since a bad ad-hoc statement is an
//! expected console interaction, not a server fault. Every other query-path
//! DB error funnels through `ApiError` instead and propagates as a 500 —
//! an invalid service name is the one case that gets a real 404.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no such service: {0}")]
    UnknownService(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::UnknownService(service) => {
                (StatusCode::NOT_FOUND, format!("no such service: {service}")).into_response()
            }
            Self::Db(e) => {
                tracing::warn!(error = %e, "query-path database error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
            }
        }
    }
}
