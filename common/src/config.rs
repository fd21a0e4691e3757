use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Execution engine the whole process runs against. Chosen once at startup.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Single-process Arrow compute over in-memory batches.
    Local,
    /// Partition-parallel DataFusion plans over a parquet table store.
    #[serde(alias = "databricks", alias = "distributed")]
    Cluster,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => write!(f, "local"),
            ExecutionMode::Cluster => write!(f, "cluster"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreKind {
    Filesystem,
    S3,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    pub kind: ObjectStoreKind,
    #[serde(default = "default_s3_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Key prefix inside the bucket under which the layers live.
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_execution_mode")]
    pub execution_mode: ExecutionMode,

    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    #[serde(default = "default_bronze_path")]
    pub bronze_path: String,
    #[serde(default = "default_silver_path")]
    pub silver_path: String,
    #[serde(default = "default_gold_path")]
    pub gold_path: String,
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,

    /// Backing store for the cluster engine. Defaults to the local filesystem
    /// rooted at `storage_path`.
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,

    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    // Reserved for a retrying runner; the batch runner does not read them.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_execution_mode() -> ExecutionMode {
    ExecutionMode::Local
}

fn default_storage_path() -> String {
    "./data".to_string()
}

fn default_bronze_path() -> String {
    "bronze".to_string()
}

fn default_silver_path() -> String {
    "silver".to_string()
}

fn default_gold_path() -> String {
    "gold".to_string()
}

fn default_metadata_path() -> String {
    "metadata".to_string()
}

fn default_s3_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            execution_mode: default_execution_mode(),
            storage_path: default_storage_path(),
            bronze_path: default_bronze_path(),
            silver_path: default_silver_path(),
            gold_path: default_gold_path(),
            metadata_path: default_metadata_path(),
            object_store: None,
            api_host: default_api_host(),
            api_port: default_api_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Settings {
    /// Loads settings from an optional config file, then `APP_*` environment
    /// variables (nested keys use `__`, e.g. `APP_OBJECT_STORE__BUCKET`).
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            execution_mode = %settings.execution_mode,
            storage_path = %settings.storage_path,
            "Loaded settings"
        );

        Ok(settings)
    }

    /// Settings rooted at `storage_path`, everything else defaulted.
    pub fn with_storage_path(storage_path: impl Into<String>) -> Self {
        Self {
            storage_path: storage_path.into(),
            ..Self::default()
        }
    }

    pub fn bronze_full_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_path).join(&self.bronze_path)
    }

    pub fn silver_full_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_path).join(&self.silver_path)
    }

    pub fn gold_full_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_path).join(&self.gold_path)
    }

    pub fn metadata_full_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_path).join(&self.metadata_path)
    }
}
