use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use filmdb_dal::movie::{violations, Violations};
use http::StatusCode;
use serde_json::json;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
const CONFLICT_MESSAGE: &str = "unable to update the record due to an edit conflict, please try again";
const INTERNAL_MESSAGE: &str = "the server encountered a problem and could not process your request";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {0:?}")]
    Validation(Violations),
    #[error("Invalid request body: {0}")]
    InvalidFormat(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Edit conflict on record {id}, version {version}")]
    Conflict { id: i64, version: i32 },
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidFormat(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::BadRequest(_) | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidIdentifier(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<filmdb_dal::Error> for ApiError {
    fn from(error: filmdb_dal::Error) -> Self {
        match error {
            filmdb_dal::Error::RecordNotFound(what) => ApiError::NotFound(what),
            filmdb_dal::Error::FailedUpdate { id, version } => ApiError::Conflict { id, version },
            filmdb_dal::Error::InvalidOrderByField(field) => {
                ApiError::InvalidQuery(format!("Invalid sort field {field}"))
            }
            e @ (filmdb_dal::Error::DatabaseError(_) | filmdb_dal::Error::MigrationError(_)) => {
                ApiError::Internal(e.into())
            }
        }
    }
}

impl From<garde::Report> for ApiError {
    fn from(report: garde::Report) -> Self {
        ApiError::Validation(violations(&report))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ApiError::InvalidFormat(e.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidQuery(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            ApiError::Validation(violations) => json!(violations),
            ApiError::InvalidFormat(msg)
            | ApiError::BadRequest(msg)
            | ApiError::InvalidQuery(msg) => json!(msg),
            ApiError::InvalidIdentifier(_) | ApiError::NotFound(_) => json!(NOT_FOUND_MESSAGE),
            ApiError::Conflict { .. } => json!(CONFLICT_MESSAGE),
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                json!(INTERNAL_MESSAGE)
            }
        };

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 10_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_validation_response() {
        let mut violations = Violations::new();
        violations.insert("title".to_string(), "must be provided".to_string());
        violations.insert("year".to_string(), "must be provided".to_string());

        let (status, body) = body_json(ApiError::Validation(violations)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body,
            json!({"error": {"title": "must be provided", "year": "must be provided"}})
        );
    }

    #[tokio::test]
    async fn test_dal_errors_mapping() {
        let (status, body) =
            body_json(filmdb_dal::Error::RecordNotFound("Movie".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], NOT_FOUND_MESSAGE);

        let (status, _) = body_json(filmdb_dal::Error::FailedUpdate { id: 1, version: 2 }.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) =
            body_json(filmdb_dal::Error::InvalidOrderByField("genres".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_internal_error_is_not_leaked() {
        let error: ApiError = filmdb_dal::Error::DatabaseError(sqlx::Error::PoolTimedOut).into();
        let (status, body) = body_json(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_MESSAGE);
    }

    #[test]
    fn test_invalid_identifier_status() {
        assert_eq!(
            ApiError::InvalidIdentifier("abc".into()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
