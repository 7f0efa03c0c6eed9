use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    Json,
};
use impactarea_core::models::{OutputModel, Parameters};
use impactarea_fetch::SessionToken;

use crate::dto::{ImpactQuery, StacImpactRequest};
use crate::error::ApiError;
use crate::services::ImpactService;
use crate::state::AppState;

/// Bearer token of the caller, checked against the validator
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<SessionToken, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(SessionToken::from_authorization)
        .ok_or_else(ApiError::unauthorized)?;
    state.validator.check(&token.access_token)?;
    Ok(token)
}

pub async fn impacted_area_from_map_reference(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ImpactQuery>,
    Json(parameters): Json<Parameters>,
) -> Result<Json<OutputModel>, ApiError> {
    let token = authorize(&state, &headers)?;
    tracing::info!(
        indicator = %query.indicator,
        entity_id = %query.entity_id,
        provider = ?query.cloud_storage_provider,
        "Processing map reference request"
    );

    let output = ImpactService::execute(&state, token, &query, parameters, None).await?;
    Ok(Json(output))
}

pub async fn impacted_area_from_stac(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ImpactQuery>,
    Json(body): Json<StacImpactRequest>,
) -> Result<Json<OutputModel>, ApiError> {
    let token = authorize(&state, &headers)?;
    tracing::info!(
        indicator = %query.indicator,
        entity_id = %query.entity_id,
        collection = %body.sensor_collection,
        "Processing STAC request"
    );

    let (parameters, stac) = body.into_parts();
    let output = ImpactService::execute(&state, token, &query, parameters, Some(stac)).await?;
    Ok(Json(output))
}
