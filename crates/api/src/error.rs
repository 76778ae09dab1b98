use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::services::scan_ingestion::{IngestError, StorageError};
use serde::Serialize;
use shared::jwt::JwtError;
use shared::pagination::CursorError;
use shared::password::PasswordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// A validation error without per-field details.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation {
                message,
                details: field_details,
            } => {
                if !field_details.is_empty() {
                    details = Some(field_details);
                }
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is unavailable".into())
            }
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => ApiError::Conflict("Resource already exists".into()),
                Some("23503") => ApiError::NotFound("Referenced resource not found".into()),
                Some("23514") => ApiError::validation("Value violates a data constraint"),
                _ => ApiError::Internal(format!("Database error: {}", db_err)),
            },
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = match details.as_slice() {
            [] => "Invalid request".to_string(),
            [single] => single.message.clone(),
            many => format!("{} validation errors", many.len()),
        };

        ApiError::Validation { message, details }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
                ApiError::Unauthorized("Invalid or expired token".into())
            }
            JwtError::EncodingError(e) | JwtError::InvalidKey(e) => {
                ApiError::Internal(format!("Token error: {}", e))
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(format!("Password error: {}", err))
    }
}

impl From<CursorError> for ApiError {
    fn from(err: CursorError) -> Self {
        ApiError::validation(format!("Invalid cursor: {}", err))
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => {
                tracing::error!("Scan storage unavailable: {}", msg);
                ApiError::ServiceUnavailable("Scan storage is unavailable".into())
            }
            StorageError::Query(msg) => ApiError::Internal(format!("Scan storage error: {}", msg)),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::EmptyStudentId => ApiError::validation("Student ID is required"),
            IngestError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::validation("x"), StatusCode::BAD_REQUEST),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Unauthorized("test".to_string())),
            "Unauthorized: test"
        );
        assert_eq!(
            format!("{}", ApiError::validation("bad pin")),
            "Validation error: bad pin"
        );
        assert_eq!(format!("{}", ApiError::RateLimited), "Rate limited");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::Internal("connection refused on 10.0.0.3".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, ApiError::NotFound(msg) if msg == "Resource not found"));
    }

    #[test]
    fn test_from_sqlx_pool_timeout() {
        let error: ApiError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(error, ApiError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_from_jwt_error() {
        let error: ApiError = JwtError::TokenExpired.into();
        assert!(matches!(error, ApiError::Unauthorized(_)));
        let error: ApiError = JwtError::InvalidKey("bad pem".into()).into();
        assert!(matches!(error, ApiError::Internal(_)));
    }

    #[test]
    fn test_from_ingest_error() {
        let error: ApiError = IngestError::EmptyStudentId.into();
        assert!(matches!(error, ApiError::Validation { .. }));
        let error: ApiError = IngestError::Storage(StorageError::Unavailable("down".into())).into();
        assert!(matches!(error, ApiError::ServiceUnavailable(_)));
        let error: ApiError = IngestError::Storage(StorageError::Query("oops".into())).into();
        assert!(matches!(error, ApiError::Internal(_)));
    }

    #[test]
    fn test_from_cursor_error() {
        let error: ApiError = CursorError::InvalidFormat.into();
        assert!(matches!(error, ApiError::Validation { .. }));
    }

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
        #[validate(range(min = 1, max = 10, message = "Out of range"))]
        size: i32,
    }

    #[tokio::test]
    async fn test_from_validation_errors_single() {
        let probe = Probe {
            name: String::new(),
            size: 5,
        };
        let error: ApiError = probe.validate().unwrap_err().into();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Name is required");
        assert_eq!(body["details"][0]["field"], "name");
    }

    #[test]
    fn test_from_validation_errors_multiple() {
        let probe = Probe {
            name: String::new(),
            size: 50,
        };
        let error: ApiError = probe.validate().unwrap_err().into();
        match error {
            ApiError::Validation { message, details } => {
                assert_eq!(message, "2 validation errors");
                assert_eq!(details[0].field, "name");
                assert_eq!(details[1].field, "size");
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
