//! Imagery and storage backends used by a processor run

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use impactarea_core::error::Result;
use impactarea_core::models::CloudStorageProvider;
use impactarea_core::ports::{ImageryCatalog, TimeSeriesSource};
use impactarea_core::TransferMeter;
use impactarea_fetch::{
    GeosysClient, GeosysCredentials, IdentityClient, SessionToken, StacClient, StacClientOptions,
    StacTimeSeriesSource,
};
use impactarea_store::{open_store, ObjectStore};

use crate::settings::ProcessorSettings;

/// Where the imagery of a run comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Geosys map reference imagery
    MapReference,
    /// STAC catalog collections
    Stac,
}

/// Imagery ports for one run
#[derive(Clone)]
pub struct Imagery {
    /// Only needed to pick dates for map reference runs
    pub catalog: Option<Arc<dyn ImageryCatalog>>,
    pub source: Arc<dyn TimeSeriesSource>,
}

/// Factory of the adapters a run talks to
#[async_trait]
pub trait Backends: Send + Sync {
    /// Imagery adapters acting on behalf of `token`, counting bytes into `meter`
    async fn imagery(
        &self,
        reference: Reference,
        token: &SessionToken,
        meter: &TransferMeter,
    ) -> Result<Imagery>;

    /// Store receiving the exported result
    async fn object_store(
        &self,
        provider: CloudStorageProvider,
        bucket: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>>;
}

#[async_trait]
impl<T: Backends + ?Sized> Backends for Arc<T> {
    async fn imagery(
        &self,
        reference: Reference,
        token: &SessionToken,
        meter: &TransferMeter,
    ) -> Result<Imagery> {
        (**self).imagery(reference, token, meter).await
    }

    async fn object_store(
        &self,
        provider: CloudStorageProvider,
        bucket: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>> {
        (**self).object_store(provider, bucket).await
    }
}

/// Backends talking to the geosys platform, its STAC catalog and cloud storage
#[derive(Debug, Clone)]
pub struct PlatformBackends {
    settings: ProcessorSettings,
}

impl PlatformBackends {
    pub fn new(settings: ProcessorSettings) -> Self {
        Self { settings }
    }

    /// Caller token when given, otherwise a password grant with the account
    /// from the environment
    pub async fn session(&self, bearer: Option<&str>) -> Result<SessionToken> {
        if let Some(token) = bearer.and_then(SessionToken::from_authorization) {
            return Ok(token);
        }
        let credentials = GeosysCredentials::from_env()?;
        tracing::info!(username = %credentials.username, "Opening geosys session");
        IdentityClient::new(self.settings.identity_server_url.clone())
            .password_grant(&credentials)
            .await
    }

    /// STAC catalog token: client credentials when `SKYFOX_CLIENT_ID` and
    /// `SKYFOX_SECRET` are set, otherwise the caller's token
    async fn stac_token(&self, token: &SessionToken) -> Result<SessionToken> {
        let client_id = env::var("SKYFOX_CLIENT_ID").ok().filter(|v| !v.is_empty());
        let secret = env::var("SKYFOX_SECRET").ok().filter(|v| !v.is_empty());
        match (client_id, secret) {
            (Some(client_id), Some(secret)) => {
                IdentityClient::new(self.settings.stac_auth_url.clone())
                    .client_credentials(&client_id, &secret)
                    .await
            }
            _ => Ok(token.clone()),
        }
    }
}

#[async_trait]
impl Backends for PlatformBackends {
    async fn imagery(
        &self,
        reference: Reference,
        token: &SessionToken,
        meter: &TransferMeter,
    ) -> Result<Imagery> {
        match reference {
            Reference::MapReference => {
                let client = Arc::new(
                    GeosysClient::new(self.settings.geosys_api_url.clone(), token.clone())
                        .with_meter(meter.clone()),
                );
                Ok(Imagery {
                    catalog: Some(client.clone()),
                    source: client,
                })
            }
            Reference::Stac => {
                let client = StacClient::new(self.settings.stac_url.clone(), StacClientOptions::default())?
                    .with_token(self.stac_token(token).await?)
                    .with_meter(meter.clone());
                Ok(Imagery {
                    catalog: None,
                    source: Arc::new(StacTimeSeriesSource::new(client)),
                })
            }
        }
    }

    async fn object_store(
        &self,
        provider: CloudStorageProvider,
        bucket: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>> {
        open_store(provider, bucket, &self.settings.store_settings()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_prefers_caller_token() {
        let backends = PlatformBackends::new(ProcessorSettings::default());
        let token = backends.session(Some("Bearer abc")).await.unwrap();
        assert_eq!(token.access_token, "abc");
    }

    #[tokio::test]
    async fn test_map_reference_has_catalog() {
        let backends = PlatformBackends::new(ProcessorSettings::default());
        let imagery = backends
            .imagery(Reference::MapReference, &SessionToken::bearer("t"), &TransferMeter::new())
            .await
            .unwrap();
        assert!(imagery.catalog.is_some());
    }
}
