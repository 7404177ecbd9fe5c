use actix_web::http::header::{ContentType, RETRY_AFTER};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder, ResponseError};

/// Every error the Write Gateway's handlers can return, mapped to the
/// status codes spec.md §7 assigns: 400 for a request the caller must fix,
/// 503 for admission-layer backpressure, 502 when the queue itself rejects
/// a publish.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("missing or invalid Idempotency-Key header")]
    MissingIdempotencyKey,
    #[error("too many in-flight writes")]
    Backpressure { retry_after_ms: u64 },
    #[error("circuit breaker open")]
    CircuitOpen { retry_after_ms: u64 },
    #[error("failed to publish write")]
    Upstream(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MissingIdempotencyKey => StatusCode::BAD_REQUEST,
            Self::Backpressure { .. } | Self::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponseBuilder::new(self.status_code());
        if let Self::Backpressure { retry_after_ms } | Self::CircuitOpen { retry_after_ms } = self {
            let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);
            builder.insert_header((RETRY_AFTER, retry_after_secs.to_string()));
        }
        builder
            .content_type(ContentType::json())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}
