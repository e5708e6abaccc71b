//! Configuration module
//!
//! Configuration is read from the process environment (optionally seeded from a
//! `.env` file). Services never see [`Config`] directly: they receive the small
//! policy structs derived from it, which keeps them easy to build in tests.

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_FILE_SIZE_MB: u64 = 10;
const MAX_RANGE_BYTES: u64 = 1024 * 1024;
const PENDING_FILE_LIFETIME_MINS: u64 = 60;
const PENDING_MAX_FILES_PER_SWEEP: i64 = 100;
const PENDING_SWEEP_INTERVAL_SECS: u64 = 300;
const PENDING_SWEEP_RETRY_SECS: u64 = 300;
const PENDING_SWEEP_TIMEOUT_SECS: u64 = 120;
const DEFAULT_S3_REGION: &str = "us-east-1";

/// Upload and download limits enforced by the file service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Uploads of this many bytes or more are rejected. 0 disables the check.
    pub max_file_size_bytes: u64,
    /// Sniffed content types accepted on upload. Empty allows everything.
    pub allowed_content_types: Vec<String>,
    /// Largest span served for a single ranged download.
    pub max_range_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: Vec::new(),
            max_range_bytes: MAX_RANGE_BYTES,
        }
    }
}

/// Lifetime and batch size of the pending-file reclaim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPolicy {
    pub file_lifetime: Duration,
    pub max_files_per_sweep: i64,
}

impl Default for PendingPolicy {
    fn default() -> Self {
        Self {
            file_lifetime: Duration::from_secs(PENDING_FILE_LIFETIME_MINS * 60),
            max_files_per_sweep: PENDING_MAX_FILES_PER_SWEEP,
        }
    }
}

/// Cadence of the reclaim worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepSchedule {
    /// Delay before the next sweep after a successful one.
    pub interval: Duration,
    /// Delay before retrying after a failed or timed-out sweep.
    pub retry_backoff: Duration,
    /// Upper bound on a single sweep.
    pub timeout: Duration,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(PENDING_SWEEP_INTERVAL_SECS),
            retry_backoff: Duration::from_secs(PENDING_SWEEP_RETRY_SECS),
            timeout: Duration::from_secs(PENDING_SWEEP_TIMEOUT_SECS),
        }
    }
}

/// Process-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub request_timeout_secs: u64,
    pub log_format: String,
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_endpoint: Option<String>, // MinIO or another S3-compatible provider
    pub s3_region: String,
    pub s3_bucket_prefix: String,
    pub s3_allow_http: bool,
    pub upload: UploadPolicy,
    pub pending: PendingPolicy,
    pub sweep: SweepSchedule,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<GatewayConfig>);

impl Config {
    fn as_gateway(&self) -> &GatewayConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_gateway().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config(Box::new(GatewayConfig::from_vars(var)?)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_gateway().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.as_gateway().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_gateway().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_gateway().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_gateway().base.db_timeout_seconds
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.as_gateway().base.request_timeout_secs)
    }

    pub fn log_json(&self) -> bool {
        self.as_gateway().base.log_format.eq_ignore_ascii_case("json")
    }

    pub fn database_url(&self) -> &str {
        &self.as_gateway().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_gateway().storage_backend
    }

    pub fn local_storage_path(&self) -> &str {
        &self.as_gateway().local_storage_path
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_gateway().s3_endpoint.as_deref()
    }

    pub fn s3_region(&self) -> &str {
        &self.as_gateway().s3_region
    }

    pub fn s3_bucket_prefix(&self) -> &str {
        &self.as_gateway().s3_bucket_prefix
    }

    pub fn s3_allow_http(&self) -> bool {
        self.as_gateway().s3_allow_http
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.as_gateway().upload
    }

    pub fn pending_policy(&self) -> &PendingPolicy {
        &self.as_gateway().pending
    }

    pub fn sweep_schedule(&self) -> &SweepSchedule {
        &self.as_gateway().sweep
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl GatewayConfig {
    /// Build from a variable lookup; `Config::from_env` passes the process environment.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port = match var("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => SERVER_PORT,
        };

        let base = BaseConfig {
            server_port,
            environment,
            db_max_connections: parse_or(var("DB_MAX_CONNECTIONS"), MAX_CONNECTIONS),
            db_timeout_seconds: parse_or(var("DB_TIMEOUT_SECONDS"), CONNECTION_TIMEOUT_SECS),
            request_timeout_secs: parse_or(var("REQUEST_TIMEOUT_SECS"), REQUEST_TIMEOUT_SECS),
            log_format: var("LOG_FORMAT").unwrap_or_else(|| "compact".to_string()),
        };

        let storage_backend = match non_empty(var("STORAGE_BACKEND")) {
            Some(value) => value.parse()?,
            None => StorageBackend::Local,
        };

        let s3_endpoint = non_empty(var("S3_ENDPOINT"));
        let s3_allow_http = match var("S3_ALLOW_HTTP") {
            Some(value) => value.to_lowercase().parse().unwrap_or(false),
            None => s3_endpoint
                .as_deref()
                .is_some_and(|endpoint| endpoint.starts_with("http://")),
        };

        let allowed_content_types = var("ALLOWED_CONTENT_TYPES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let max_file_size_mb: u64 = parse_or(var("MAX_FILE_SIZE_MB"), MAX_FILE_SIZE_MB);
        let max_file_size_bytes = max_file_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("MAX_FILE_SIZE_MB is too large"))?;
        let pending_lifetime_secs =
            parse_or(var("PENDING_FILE_LIFETIME_MINS"), PENDING_FILE_LIFETIME_MINS)
                .checked_mul(60)
                .ok_or_else(|| anyhow::anyhow!("PENDING_FILE_LIFETIME_MINS is too large"))?;

        let config = GatewayConfig {
            base,
            database_url: var("DATABASE_URL").unwrap_or_default(),
            storage_backend,
            local_storage_path: non_empty(var("LOCAL_STORAGE_PATH"))
                .unwrap_or_else(|| "./data".to_string()),
            s3_endpoint,
            s3_region: non_empty(var("S3_REGION"))
                .or_else(|| non_empty(var("AWS_REGION")))
                .unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            s3_bucket_prefix: var("S3_BUCKET_PREFIX").unwrap_or_default(),
            s3_allow_http,
            upload: UploadPolicy {
                max_file_size_bytes,
                allowed_content_types,
                max_range_bytes: parse_or(var("MAX_RANGE_BYTES"), MAX_RANGE_BYTES),
            },
            pending: PendingPolicy {
                file_lifetime: Duration::from_secs(pending_lifetime_secs),
                max_files_per_sweep: parse_or(
                    var("PENDING_MAX_FILES_PER_SWEEP"),
                    PENDING_MAX_FILES_PER_SWEEP,
                ),
            },
            sweep: SweepSchedule {
                interval: Duration::from_secs(parse_or(
                    var("PENDING_SWEEP_INTERVAL_SECS"),
                    PENDING_SWEEP_INTERVAL_SECS,
                )),
                retry_backoff: Duration::from_secs(parse_or(
                    var("PENDING_SWEEP_RETRY_SECS"),
                    PENDING_SWEEP_RETRY_SECS,
                )),
                timeout: Duration::from_secs(parse_or(
                    var("PENDING_SWEEP_TIMEOUT_SECS"),
                    PENDING_SWEEP_TIMEOUT_SECS,
                )),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.upload.max_range_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_RANGE_BYTES must be greater than zero"));
        }

        if self.pending.file_lifetime.is_zero() {
            return Err(anyhow::anyhow!(
                "PENDING_FILE_LIFETIME_MINS must be greater than zero"
            ));
        }

        if self.pending.max_files_per_sweep <= 0 {
            return Err(anyhow::anyhow!(
                "PENDING_MAX_FILES_PER_SWEEP must be greater than zero"
            ));
        }

        if self.sweep.interval.is_zero() || self.sweep.timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "PENDING_SWEEP_INTERVAL_SECS and PENDING_SWEEP_TIMEOUT_SECS must be greater than zero"
            ));
        }

        // Validate storage backend configuration
        match self.storage_backend {
            StorageBackend::S3 => {
                if let Some(endpoint) = &self.s3_endpoint {
                    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                        return Err(anyhow::anyhow!(
                            "S3_ENDPOINT must start with http:// or https://"
                        ));
                    }
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, anyhow::Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/depot")]).unwrap();
        assert_eq!(config.base.server_port, SERVER_PORT);
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.upload, UploadPolicy::default());
        assert_eq!(config.pending, PendingPolicy::default());
        assert_eq!(config.sweep, SweepSchedule::default());
        assert!(!config.s3_allow_http);
    }

    #[test]
    fn parses_policies() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/depot"),
            ("MAX_FILE_SIZE_MB", "2"),
            ("ALLOWED_CONTENT_TYPES", "image/png, Image/JPEG,,"),
            ("PENDING_FILE_LIFETIME_MINS", "5"),
            ("PENDING_MAX_FILES_PER_SWEEP", "7"),
            ("MAX_RANGE_BYTES", "4096"),
        ])
        .unwrap();
        assert_eq!(config.upload.max_file_size_bytes, 2 * 1024 * 1024);
        assert_eq!(
            config.upload.allowed_content_types,
            vec!["image/png".to_string(), "image/jpeg".to_string()]
        );
        assert_eq!(config.upload.max_range_bytes, 4096);
        assert_eq!(config.pending.file_lifetime, Duration::from_secs(300));
        assert_eq!(config.pending.max_files_per_sweep, 7);
    }

    #[test]
    fn minio_endpoint_allows_http() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/depot"),
            ("STORAGE_BACKEND", "minio"),
            ("S3_ENDPOINT", "http://localhost:9000"),
        ])
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::S3);
        assert!(config.s3_allow_http);
        assert_eq!(config.s3_region, DEFAULT_S3_REGION);
    }

    #[test]
    fn rejects_missing_database_url() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn rejects_zero_batch() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/depot"),
            ("PENDING_MAX_FILES_PER_SWEEP", "0"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_overflowing_sizes() {
        let huge = u64::MAX.to_string();
        for key in ["MAX_FILE_SIZE_MB", "PENDING_FILE_LIFETIME_MINS"] {
            let result = load(&[
                ("DATABASE_URL", "postgres://localhost/depot"),
                (key, huge.as_str()),
            ]);
            let err = result.unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }

    #[test]
    fn rejects_bad_port() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/depot"),
            ("PORT", "eighty"),
        ]);
        assert!(result.is_err());
    }
}
