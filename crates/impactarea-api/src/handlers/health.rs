use axum::Json;

use crate::dto::HealthResponse;

/// Liveness check, no upstream calls
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
