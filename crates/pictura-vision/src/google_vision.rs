//! Google Cloud Vision `images:annotate` client

use async_trait::async_trait;
use pictura_core::{AnnotationKind, ObjectRef, PipelineConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::traits::{AnnotationService, VisionError, VisionResult};

/// Annotates images in place by passing their `gs://` URI to Cloud Vision,
/// one feature per request.
pub struct GoogleVisionAnnotator {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl Debug for GoogleVisionAnnotator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GoogleVisionAnnotator")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl GoogleVisionAnnotator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> VisionResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(VisionError::ConfigError(
                "Cloud Vision API key is empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                VisionError::ConfigError(format!(
                    "Failed to create HTTP client for Google Vision API: {}",
                    e
                ))
            })?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> VisionResult<Self> {
        Self::new(
            config.vision_endpoint.clone(),
            config.vision_api_key.clone(),
            config.external_call_timeout(),
        )
    }

    fn feature_type(kind: AnnotationKind) -> &'static str {
        match kind {
            AnnotationKind::Labels => "LABEL_DETECTION",
            AnnotationKind::SafeSearch => "SAFE_SEARCH_DETECTION",
            AnnotationKind::WebDetection => "WEB_DETECTION",
        }
    }

    fn response_field(kind: AnnotationKind) -> &'static str {
        match kind {
            AnnotationKind::Labels => "labelAnnotations",
            AnnotationKind::SafeSearch => "safeSearchAnnotation",
            AnnotationKind::WebDetection => "webDetection",
        }
    }

    fn request_body(kind: AnnotationKind, source: &ObjectRef) -> Value {
        json!({
            "requests": [{
                "image": {
                    "source": { "imageUri": source.gs_uri() }
                },
                "features": [{ "type": Self::feature_type(kind) }]
            }]
        })
    }

    /// Pull the payload for `kind` out of the first response entry.
    fn extract_payload(kind: AnnotationKind, response: VisionResponse) -> VisionResult<Value> {
        let mut first = response
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::InvalidResponse("response list is empty".to_string()))?;

        if let Some(error) = first.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(VisionError::Api { code, message });
        }

        Ok(first
            .as_object_mut()
            .and_then(|entry| entry.remove(Self::response_field(kind)))
            .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl AnnotationService for GoogleVisionAnnotator {
    async fn detect(&self, kind: AnnotationKind, source: &ObjectRef) -> VisionResult<Value> {
        let url = format!("{}/v1/images:annotate", self.endpoint);
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(kind, source))
            .send()
            .await
            .map_err(|e| {
                VisionError::RequestFailed(format!(
                    "Failed to send request to Google Vision API: {}",
                    e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VisionError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: VisionResponse = response.json().await.map_err(|e| {
            VisionError::InvalidResponse(format!(
                "Failed to parse Google Vision API response: {}",
                e
            ))
        })?;

        let payload = Self::extract_payload(kind, parsed)?;

        tracing::debug!(
            kind = %kind,
            source = %source,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Google Vision annotation completed"
        );

        Ok(payload)
    }
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    #[serde(default)]
    responses: Vec<Value>,
}
