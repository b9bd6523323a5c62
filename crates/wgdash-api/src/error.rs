use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use wgdash_core::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error("too many attempts, try again in {retry_after_secs} seconds")]
    TooManyAttempts { retry_after_secs: u64 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Gateway(GatewayError),

    #[error("internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(err) => match err {
                GatewayError::InvalidName | GatewayError::PoolExhausted => StatusCode::BAD_REQUEST,
                GatewayError::AlreadyExists(_) => StatusCode::CONFLICT,
                GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
                GatewayError::NotConfigured | GatewayError::NotRunning => StatusCode::CONFLICT,
                GatewayError::Exec(_) | GatewayError::Io(_) | GatewayError::Qr(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        if matches!(
            err,
            GatewayError::Exec(_) | GatewayError::Io(_) | GatewayError::Qr(_)
        ) {
            tracing::error!(error = %err, "gateway failure");
        }
        Self::Gateway(err)
    }
}
