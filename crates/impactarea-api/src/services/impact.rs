use impactarea_core::models::{InputModel, OutputModel, Parameters, StacParameters};
use impactarea_fetch::SessionToken;
use impactarea_processor::{ImpactedAreasProcessor, ProcessRequest};
use tracing::Instrument;
use uuid::Uuid;

use crate::dto::ImpactQuery;
use crate::error::ApiError;
use crate::state::AppState;

/// Service running the impacted area processor for one request
pub struct ImpactService;

impl ImpactService {
    pub async fn execute(
        state: &AppState,
        token: SessionToken,
        query: &ImpactQuery,
        parameters: Parameters,
        stac: Option<StacParameters>,
    ) -> Result<OutputModel, ApiError> {
        let mut request = ProcessRequest::new(token)
            .with_entity_id(query.entity_id.clone())
            .with_metrics(query.wants_metrics()?);
        if let Some(provider) = query.provider()? {
            request = request.with_storage(provider, query.aws_s3_bucket.clone());
        }

        let input = InputModel {
            parameters,
            indicator: query.indicator.clone(),
            stac,
        };

        let request_id = Uuid::new_v4();
        let processor = ImpactedAreasProcessor::new(state.backends.clone(), state.settings.clone());
        let output = processor
            .trigger(&input, &request)
            .instrument(tracing::info_span!("impact_request", %request_id))
            .await
            .map_err(|e| {
                tracing::warn!(%request_id, error = %e, entity_id = %query.entity_id, "Impacted area request failed");
                ApiError::from(e)
            })?;

        Ok(output)
    }
}
