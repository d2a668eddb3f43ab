//! Resilient HTTP client for the VEP region endpoint
//!
//! One `POST` per batch. Connection errors, 5xx/429 responses and
//! undecodable bodies are retried with jittered exponential backoff; other
//! 4xx responses fail immediately.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use super::failure::{classify_status, classify_transport_error, FailureKind};
use super::model::{VepRecord, VepRequest};
use super::retry::RetryPolicy;
use super::{AnnotationService, AnnotationServiceError, ServiceError};
use crate::metrics;
use crate::shutdown::SharedShutdown;

/// GRCh37 VEP region endpoint
pub const DEFAULT_VEP_URL: &str = "https://grch37.rest.ensembl.org/vep/homo_sapiens/region";

/// Per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Longest error body echoed into a failure message
const MAX_ERROR_BODY: usize = 512;

/// Client configuration value object
#[derive(Debug, Clone)]
pub struct VepClientConfig {
    /// Full URL of the region endpoint
    pub url: String,
    /// Timeout for each individual attempt
    pub timeout: Duration,
    /// Retry policy applied to every batch request
    pub retry: RetryPolicy,
}

impl Default for VepClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_VEP_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP implementation of [`AnnotationService`]
pub struct VepHttpClient {
    client: Client,
    config: VepClientConfig,
    shutdown: Option<SharedShutdown>,
}

impl VepHttpClient {
    /// Build a client with JSON headers and the configured timeout
    pub fn new(config: VepClientConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Permanent {
                kind: FailureKind::RequestBuild,
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            config,
            shutdown: None,
        })
    }

    /// Attach a shared shutdown handle; backoff sleeps end early on shutdown
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Attempt budget per request
    pub fn max_attempts(&self) -> u32 {
        self.config.retry.max_attempts
    }

    /// Single attempt, no retry
    async fn post_once(&self, payload: &VepRequest, attempt: u32) -> Result<Vec<VepRecord>, ServiceError> {
        let started = Instant::now();
        debug!(
            url = %self.config.url,
            variants = payload.variants.len(),
            attempt,
            "Posting VEP request"
        );

        let response = match self.client.post(&self.config.url).json(payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let kind = classify_transport_error(&e);
                metrics::record_vep_request("network_error", started.elapsed());
                return Err(ServiceError::from_kind(kind, e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            metrics::record_vep_request(status.as_str(), started.elapsed());
            let kind = classify_status(status);
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            return Err(ServiceError::from_kind(kind, format!("HTTP {status}: {body}")));
        }

        let bytes = response.bytes().await.map_err(|e| {
            metrics::record_vep_request("body_error", started.elapsed());
            ServiceError::from_kind(classify_transport_error(&e), e.to_string())
        })?;
        metrics::record_vep_request(status.as_str(), started.elapsed());

        serde_json::from_slice::<Vec<VepRecord>>(&bytes).map_err(|e| ServiceError::Transient {
            kind: FailureKind::UndecodableBody,
            message: format!("Failed to decode VEP response: {e}"),
        })
    }
}

#[async_trait]
impl AnnotationService for VepHttpClient {
    async fn annotate(&self, regions: &[String]) -> Result<Vec<VepRecord>, AnnotationServiceError> {
        let payload = VepRequest {
            variants: regions.to_vec(),
        };
        let payload = &payload;

        self.config
            .retry
            .run(self.shutdown.as_deref(), move |attempt| {
                self.post_once(payload, attempt)
            })
            .await
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
