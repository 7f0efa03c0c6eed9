//! STAC API client with pagination and retry

use std::time::Duration;

use impactarea_core::error::{ImpactError, Result};
use impactarea_core::TransferMeter;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;

use super::models::{StacItem, StacItemCollection, StacLink, StacSearchParams};
use crate::auth::SessionToken;

const SERVICE: &str = "STAC";

/// Client tuning
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    pub request_timeout: Duration,
    /// Retries on transient failures; client errors are never retried
    pub max_retries: u32,
    /// Upper bound on items collected across pages
    pub max_items: usize,
    /// First retry delay, doubled on each further attempt
    pub backoff: Duration,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            max_items: 500,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Part of an asset body
#[derive(Debug, Clone)]
pub struct AssetBytes {
    pub offset: u64,
    /// Size of the whole asset, when the server reports it
    pub total: Option<u64>,
    pub bytes: Vec<u8>,
}

/// Total size from `bytes 0-99/1234`
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

pub struct StacClient {
    base_url: String,
    client: reqwest::Client,
    options: StacClientOptions,
    token: Option<SessionToken>,
    meter: TransferMeter,
}

impl StacClient {
    pub fn new(base_url: impl Into<String>, options: StacClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| ImpactError::upstream(SERVICE, format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            options,
            token: None,
            meter: TransferMeter::new(),
        })
    }

    pub fn with_token(mut self, token: SessionToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_meter(mut self, meter: TransferMeter) -> Self {
        self.meter = meter;
        self
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    /// One page of results
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        let url = self.search_url();
        self.post_search(&url, params).await
    }

    /// Follow `next` links until exhausted or `max_items` is reached
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let max = self.options.max_items;
        let mut items: Vec<StacItem> = Vec::new();
        let mut page = self.search(params).await?;

        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);

            if items.len() >= max {
                break;
            }

            match next {
                Some(link) => {
                    page = self.follow_next(&link, params).await?;
                    if page.is_empty() {
                        break;
                    }
                }
                None => break,
            }
        }

        items.truncate(max);
        tracing::debug!(items = items.len(), "STAC search complete");
        Ok(items)
    }

    /// Bytes `offset..offset + len` of an asset.
    ///
    /// A server that ignores the range answers with the whole body, which is
    /// returned as starting at zero.
    pub async fn fetch_range(&self, href: &str, offset: u64, len: u64) -> Result<AssetBytes> {
        let last = offset + len.max(1) - 1;
        let response = self
            .authorized(self.client.get(href))
            .header(RANGE, format!("bytes={}-{}", offset, last))
            .send()
            .await
            .map_err(|e| ImpactError::upstream(SERVICE, format!("asset download {}: {}", href, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImpactError::upstream(
                SERVICE,
                format!("asset download {} returned HTTP {}", href, status),
            ));
        }
        let partial = status == StatusCode::PARTIAL_CONTENT;
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImpactError::upstream(SERVICE, format!("reading asset {}: {}", href, e)))?;
        self.meter.record_download(bytes.len() as u64);

        Ok(if partial {
            AssetBytes { offset, total, bytes: bytes.to_vec() }
        } else {
            AssetBytes { offset: 0, total: Some(bytes.len() as u64), bytes: bytes.to_vec() }
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(&token.access_token),
            None => request,
        }
    }

    async fn post_search(&self, url: &str, params: &StacSearchParams) -> Result<StacItemCollection> {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = self.options.backoff * (1 << (attempt - 1));
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Retrying STAC search");
                tokio::time::sleep(delay).await;
            }

            let response = self.authorized(self.client.post(url).json(params)).send().await;

            match response {
                Ok(r) if r.status().is_success() => {
                    let body = r
                        .bytes()
                        .await
                        .map_err(|e| ImpactError::upstream(SERVICE, format!("reading response body: {}", e)))?;
                    self.meter.record_download(body.len() as u64);
                    return serde_json::from_slice(&body).map_err(|e| {
                        ImpactError::upstream(SERVICE, format!("parsing search response: {}", e))
                    });
                }
                Ok(r) => {
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    last_err = Some(ImpactError::upstream(
                        SERVICE,
                        format!(
                            "search returned HTTP {}: {}",
                            status,
                            body.chars().take(500).collect::<String>()
                        ),
                    ));
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_err = Some(ImpactError::upstream(SERVICE, format!("search request failed: {}", e)));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ImpactError::upstream(SERVICE, "search failed")))
    }

    /// POST links carry a body (optionally merged into the previous one), others are plain GETs
    async fn follow_next(&self, link: &StacLink, previous: &StacSearchParams) -> Result<StacItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();

        if method == "POST" {
            let mut body = serde_json::to_value(previous)?;
            match (&link.body, link.merge.unwrap_or(false)) {
                (Some(link_body), true) => {
                    if let (Some(base), Some(overlay)) = (body.as_object_mut(), link_body.as_object()) {
                        for (k, v) in overlay {
                            base.insert(k.clone(), v.clone());
                        }
                    }
                }
                (Some(link_body), false) => body = link_body.clone(),
                (None, _) => {}
            }
            let params: StacSearchParams = serde_json::from_value(body)?;
            return self.post_search(&link.href, &params).await;
        }

        let response = self
            .authorized(self.client.get(&link.href))
            .send()
            .await
            .map_err(|e| ImpactError::upstream(SERVICE, format!("GET pagination: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ImpactError::upstream(
                SERVICE,
                format!("pagination returned HTTP {}", status),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ImpactError::upstream(SERVICE, format!("reading pagination body: {}", e)))?;
        self.meter.record_download(body.len() as u64);
        serde_json::from_slice(&body)
            .map_err(|e| ImpactError::upstream(SERVICE, format!("parsing pagination response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_trims_slash() {
        let client = StacClient::new("https://stac.example.com/", StacClientOptions::default()).unwrap();
        assert_eq!(client.search_url(), "https://stac.example.com/search");
    }

    #[test]
    fn test_default_options() {
        let options = StacClientOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("bytes 0-65535/1048576"), Some(1_048_576));
        assert_eq!(content_range_total("bytes 0-99/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }
}
