//! External service clients

use anyhow::Result;
use filebox_core::Config;
use filebox_services::VisionClient;

/// Build the vision client when its endpoint and key are configured.
pub fn setup_vision(config: &Config) -> Result<Option<VisionClient>> {
    match config.vision_credentials() {
        Some((endpoint, api_key)) => {
            let client = VisionClient::new(endpoint, api_key)?;
            tracing::info!(endpoint = %client.endpoint(), "Vision API client configured");
            Ok(Some(client))
        }
        None => {
            tracing::warn!("VISION_ENDPOINT/VISION_API_KEY not set; image analysis disabled");
            Ok(None)
        }
    }
}
