//! Error types for the HTTP layer and server startup.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use rmp_database::DbError;
use rmp_search::StoreError;
use rmp_server_models::ApiErrorBody;
use thiserror::Error;

/// A failed API request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadInput(String),
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[from] StoreError),
    #[error("Export failed: {0}")]
    Export(#[from] csv::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::BackendUnavailable(_) | Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Self::NotFound(message) | Self::BadInput(message) => message.clone(),
            Self::BackendUnavailable(e) => {
                log::error!("Backend error: {e}");
                "Backend unavailable".to_string()
            }
            Self::Export(e) => {
                log::error!("Failed to write CSV export: {e}");
                "Export failed".to_string()
            }
        };
        let status = self.status_code();

        HttpResponse::build(status).json(ApiErrorBody {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message,
        })
    }
}

/// A failure while configuring or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown backend '{0}', expected documents, postgres, or sqlite")]
    UnknownBackend(String),
    #[error("DATABASE_URL is required for the postgres backend")]
    MissingDatabaseUrl,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;

    use super::*;

    async fn body(error: &ApiError) -> ApiErrorBody {
        let bytes = to_bytes(error.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn not_found_names_the_identifier() {
        let error = ApiError::NotFound("Facility not found: 1000".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        let body = body(&error).await;
        assert_eq!(body.error, "Not Found");
        assert_eq!(body.message, "Facility not found: 1000");
    }

    #[actix_web::test]
    async fn backend_errors_are_not_leaked() {
        let error = ApiError::from(StoreError::Database("password rejected".to_string()));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&error).await;
        assert_eq!(body.message, "Backend unavailable");
        assert!(!body.message.contains("password"));
    }
}
