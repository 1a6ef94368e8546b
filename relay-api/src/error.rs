use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use relay_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::Core(err) => match err {
                CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                CoreError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::AuthenticationError(msg) => msg,
            AppError::Core(CoreError::Fatal(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Core(CoreError::Unavailable(msg)) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                "Service temporarily unavailable".to_string()
            }
            AppError::Core(CoreError::InvalidInput(msg))
            | AppError::Core(CoreError::NotFound(msg))
            | AppError::Core(CoreError::Conflict(msg))
            | AppError::Core(CoreError::Forbidden(msg)) => msg,
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_status_codes() {
        let cases = [
            (CoreError::invalid("bad"), StatusCode::BAD_REQUEST),
            (CoreError::not_found("gone"), StatusCode::NOT_FOUND),
            (CoreError::Conflict("taken".into()), StatusCode::CONFLICT),
            (CoreError::forbidden("no"), StatusCode::FORBIDDEN),
            (CoreError::Unavailable("geocoder".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::Fatal("balance missing".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let response = AppError::AuthenticationError("missing bearer token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
