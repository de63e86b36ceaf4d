//! Azure Computer Vision client for image tagging and captioning

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

const API_VERSION_PATH: &str = "vision/v3.2";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Tags and detected object names for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageAnalysis {
    pub tags: Vec<String>,
    pub objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    objects: Vec<DetectedObject>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DetectedObject {
    #[serde(rename = "object")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    description: Description,
}

#[derive(Debug, Deserialize)]
struct Description {
    #[serde(default)]
    captions: Vec<Caption>,
}

#[derive(Debug, Deserialize)]
struct Caption {
    text: String,
}

/// Client for the Computer Vision REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct VisionClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl Debug for VisionClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VisionClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl VisionClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client for Computer Vision API")?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_image(&self, operation: &str, image: Bytes) -> Result<String> {
        let url = format!("{}/{}/{}", self.endpoint, API_VERSION_PATH, operation);
        let size_bytes = image.len();
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image)
            .send()
            .await
            .context("Failed to send request to Computer Vision API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Computer Vision API request failed: {} - {}",
                status,
                error_text
            ));
        }

        let body = response
            .text()
            .await
            .context("Failed to read Computer Vision API response")?;

        tracing::debug!(
            url = %url,
            size_bytes = size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Computer Vision API request completed"
        );

        Ok(body)
    }

    /// Tag an image and list the objects detected in it.
    ///
    /// A response without `tags` or `objects` yields empty lists.
    pub async fn analyze_image(&self, image: Bytes) -> Result<ImageAnalysis> {
        let body = self
            .post_image("analyze?visualFeatures=Tags,Objects", image)
            .await?;
        let parsed: AnalyzeResponse =
            serde_json::from_str(&body).context("Failed to parse Computer Vision analyze response")?;

        Ok(ImageAnalysis {
            tags: parsed.tags.into_iter().map(|t| t.name).collect(),
            objects: parsed.objects.into_iter().map(|o| o.name).collect(),
        })
    }

    /// Caption an image; returns the top-ranked caption text.
    pub async fn describe_image(&self, image: Bytes) -> Result<String> {
        let body = self.post_image("describe", image).await?;
        let parsed: DescribeResponse = serde_json::from_str(&body)
            .context("Failed to parse Computer Vision describe response")?;

        parsed
            .description
            .captions
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| anyhow::anyhow!("Computer Vision API returned no captions"))
    }
}
