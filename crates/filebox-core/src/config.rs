//! Configuration module
//!
//! This module provides the service configuration: server, storage backend,
//! vision API, and operational limits. Values come from the environment
//! (optionally seeded from a `.env` file).

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 4000;
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Parse a numeric setting; unset variables fall back to `default`, set but
/// malformed ones are an error.
fn numeric_setting<T: FromStr>(name: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(name) {
        Ok(value) => parse_number(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, anyhow::Error> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a valid number", name))
}

/// Convert a `MAX_UPLOAD_SIZE_MB` value to bytes.
fn upload_limit_bytes(megabytes: &str) -> Result<usize, anyhow::Error> {
    parse_number::<usize>("MAX_UPLOAD_SIZE_MB", megabytes)?
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub container_name: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, Azurite-S3, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    // Vision API configuration
    pub vision_endpoint: Option<String>,
    pub vision_api_key: Option<String>,
    // HTTP behavior
    pub static_dir: Option<String>,
    pub max_upload_size_bytes: Option<usize>,
    pub health_check_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::S3,
        };

        let max_upload_size_bytes = match env::var("MAX_UPLOAD_SIZE_MB") {
            Ok(value) => Some(upload_limit_bytes(&value)?),
            Err(_) => None,
        };

        let config = Config {
            server_port: numeric_setting("PORT", DEFAULT_PORT)?,
            environment,
            cors_origins,
            storage_backend,
            container_name: env::var("STORAGE_CONTAINER")
                .or_else(|_| env::var("S3_BUCKET"))
                .ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            vision_endpoint: env::var("VISION_ENDPOINT").ok(),
            vision_api_key: env::var("VISION_API_KEY").ok(),
            static_dir: env::var("STATIC_DIR").ok(),
            max_upload_size_bytes,
            health_check_timeout_secs: numeric_setting(
                "HEALTH_CHECK_TIMEOUT_SECS",
                HEALTH_CHECK_TIMEOUT_SECS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    /// Region for the S3 backend; `S3_REGION` wins over `AWS_REGION`.
    pub fn region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    /// Vision API endpoint and key, when both are configured.
    pub fn vision_credentials(&self) -> Option<(&str, &str)> {
        match (&self.vision_endpoint, &self.vision_api_key) {
            (Some(endpoint), Some(key)) => Some((endpoint.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.health_check_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "HEALTH_CHECK_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.vision_endpoint.is_some() != self.vision_api_key.is_some() {
            return Err(anyhow::anyhow!(
                "VISION_ENDPOINT and VISION_API_KEY must be set together"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.container_name.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_CONTAINER (or S3_BUCKET) must be set when using S3 storage backend"
                    ));
                }
                if self.region().is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Configuration for a local-storage deployment rooted at `path`.
    ///
    /// Used by tests and tools that do not go through the environment.
    pub fn local(path: impl Into<String>) -> Self {
        Config {
            server_port: DEFAULT_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            storage_backend: StorageBackend::Local,
            container_name: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: Some(path.into()),
            vision_endpoint: None,
            vision_api_key: None,
            static_dir: None,
            max_upload_size_bytes: None,
            health_check_timeout_secs: HEALTH_CHECK_TIMEOUT_SECS,
        }
    }
}
