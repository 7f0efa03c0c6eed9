use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use impactarea_core::error::ImpactError;
use serde::Serialize;

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not Authorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ImpactError> for ApiError {
    fn from(err: ImpactError) -> Self {
        let details = err.to_string();
        match &err {
            ImpactError::NotAuthorized | ImpactError::Authentication { .. } => {
                Self::unauthorized().with_details(details)
            }
            ImpactError::InvalidInput { .. }
            | ImpactError::InvalidGeometry { .. }
            | ImpactError::UnknownIndex { .. }
            | ImpactError::UnsupportedIndex { .. } => {
                Self::bad_request("Invalid request").with_details(details)
            }
            ImpactError::DataUnavailable { .. } => {
                Self::not_found("Data unavailable").with_details(details)
            }
            ImpactError::InsufficientData { .. } => {
                Self::unprocessable("Insufficient data").with_details(details)
            }
            ImpactError::Upstream { .. } | ImpactError::Storage { .. } => {
                Self::bad_gateway("Upstream service failed").with_details(details)
            }
            _ => {
                tracing::error!(error = %err, "Request failed");
                Self::internal("Internal error").with_details(details)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status = |e: ImpactError| ApiError::from(e).status;
        assert_eq!(status(ImpactError::NotAuthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(ImpactError::UnknownIndex { name: "X".to_string() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(ImpactError::unavailable("none")), StatusCode::NOT_FOUND);
        assert_eq!(status(ImpactError::insufficient("none")), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(ImpactError::storage("AWS S3", "denied")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(ImpactError::MissingCredentials { provider: "AWS S3".to_string() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
