//! Configuration module
//!
//! Pipeline configuration loaded from the environment (and an optional `.env`
//! file): backend selection, collaborator endpoints, external tool paths and
//! the resource limits applied to every invocation.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::DEFAULT_DOWNLOAD_URL_HOST;
use crate::storage_types::{DocumentBackend, StorageBackend};

// Common constants
const EXTERNAL_CALL_TIMEOUT_SECS: u64 = 120;
const MAX_CONCURRENT_EVENTS: usize = 4;
const DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub environment: String,
    // Object store
    pub storage_backend: StorageBackend,
    pub local_storage_path: PathBuf,
    pub gcs_api_base: String,
    pub gcs_access_token: Option<String>,
    pub download_url_host: String,
    // Document store
    pub document_backend: DocumentBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    // Annotation service
    pub vision_api_key: String,
    pub vision_endpoint: String,
    // External tools
    pub identify_path: String,
    pub convert_path: String,
    pub scratch_dir: PathBuf,
    // Limits and policy
    pub external_call_timeout_secs: u64,
    pub enforce_first_generation: bool,
    pub max_concurrent_events: usize,
    pub log_format: String,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()?;

        let document_backend = env::var("DOCUMENT_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<DocumentBackend>()?;

        let external_call_timeout_secs = env::var("EXTERNAL_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(EXTERNAL_CALL_TIMEOUT_SECS);

        let max_concurrent_events = env::var("MAX_CONCURRENT_EVENTS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(MAX_CONCURRENT_EVENTS);

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DB_MAX_CONNECTIONS);

        let enforce_first_generation = env::var("ENFORCE_FIRST_GENERATION")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let scratch_dir = env::var("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        Ok(Self {
            environment,
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/objects")),
            gcs_api_base: env::var("GCS_API_BASE")
                .unwrap_or_else(|_| "https://storage.googleapis.com".to_string()),
            gcs_access_token: env::var("GCS_ACCESS_TOKEN").ok().filter(|s| !s.is_empty()),
            download_url_host: env::var("DOWNLOAD_URL_HOST")
                .unwrap_or_else(|_| DEFAULT_DOWNLOAD_URL_HOST.to_string()),
            document_backend,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections,
            vision_api_key: env::var("VISION_API_KEY").unwrap_or_default(),
            vision_endpoint: env::var("VISION_ENDPOINT")
                .unwrap_or_else(|_| "https://vision.googleapis.com".to_string()),
            identify_path: env::var("IDENTIFY_PATH").unwrap_or_else(|_| "identify".to_string()),
            convert_path: env::var("CONVERT_PATH").unwrap_or_else(|_| "convert".to_string()),
            scratch_dir,
            external_call_timeout_secs,
            enforce_first_generation,
            max_concurrent_events,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.vision_api_key.is_empty() {
            return Err(anyhow::anyhow!("VISION_API_KEY must be set"));
        }

        if self.document_backend == DocumentBackend::Postgres {
            match &self.database_url {
                Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {}
                Some(_) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "DOCUMENT_STORE=postgres requires DATABASE_URL to be set"
                    ))
                }
            }
        }

        if self.external_call_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "EXTERNAL_CALL_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.max_concurrent_events == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_EVENTS must be at least 1"));
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(anyhow::anyhow!("LOG_FORMAT must be `text` or `json`"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn external_call_timeout(&self) -> Duration {
        Duration::from_secs(self.external_call_timeout_secs)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
