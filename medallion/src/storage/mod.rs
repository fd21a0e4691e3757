pub mod local;
pub mod table;

pub use local::LocalRepository;
pub use table::TableRepository;

use crate::models::Dataset;
use crate::processor::BatchMetadata;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use common::Result;
use common::config::{ExecutionMode, Settings};
use parquet::arrow::ArrowWriter;
use std::sync::Arc;

/// Persistence for the three layers plus per-batch metadata.
///
/// Writes are append-only and keyed by batch id: writing the same
/// `(batch_id, layer)` twice is an error, never an overwrite. Reads of a layer
/// with no data return an empty dataset that still carries a schema.
#[async_trait]
pub trait Repository: Send + Sync {
    fn engine(&self) -> ExecutionMode;

    async fn read_bronze(&self) -> Result<Dataset>;
    async fn write_silver(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()>;
    async fn read_silver(&self) -> Result<Dataset>;
    async fn write_gold(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()>;
    async fn read_gold(&self) -> Result<Dataset>;
    async fn save_metadata(&self, metadata: &BatchMetadata) -> Result<()>;

    /// Round-trips a probe through the backing medium.
    async fn health_check(&self) -> bool;
}

/// Builds the repository matching `settings.execution_mode`.
pub async fn from_settings(settings: &Settings) -> Result<Arc<dyn Repository>> {
    match settings.execution_mode {
        ExecutionMode::Local => Ok(Arc::new(LocalRepository::new(settings)?)),
        ExecutionMode::Cluster => Ok(Arc::new(TableRepository::new(settings).await?)),
    }
}

/// Encodes `batches` as a single parquet file.
pub(crate) fn encode_parquet(schema: arrow::datatypes::SchemaRef, batches: &[RecordBatch]) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, None)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(buffer)
}
