use super::{Repository, encode_parquet};
use crate::models::Dataset;
use crate::processor::{BatchMetadata, Layer};
use crate::schema::{BRONZE_SCHEMA, GOLD_SCHEMA};
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use common::config::{ExecutionMode, Settings};
use common::{Error, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PROBE_FILE: &str = ".health_check";
const PROBE_PAYLOAD: &[u8] = b"ok";

/// Parquet files and JSON metadata in plain directories, one file per
/// `(batch_id, layer)`.
pub struct LocalRepository {
    root: PathBuf,
    bronze_dir: PathBuf,
    silver_dir: PathBuf,
    gold_dir: PathBuf,
    metadata_dir: PathBuf,
}

impl LocalRepository {
    pub fn new(settings: &Settings) -> Result<Self> {
        let repo = Self {
            root: PathBuf::from(&settings.storage_path),
            bronze_dir: settings.bronze_full_path(),
            silver_dir: settings.silver_full_path(),
            gold_dir: settings.gold_full_path(),
            metadata_dir: settings.metadata_full_path(),
        };

        for dir in [&repo.bronze_dir, &repo.silver_dir, &repo.gold_dir, &repo.metadata_dir] {
            fs::create_dir_all(dir)?;
        }

        Ok(repo)
    }

    fn layer_dir(&self, layer: Layer) -> &Path {
        match layer {
            Layer::Bronze => &self.bronze_dir,
            Layer::Silver => &self.silver_dir,
            Layer::Gold => &self.gold_dir,
        }
    }

    /// Concatenates every parquet file in `dir`, in file-name order.
    fn read_layer(dir: &Path, empty_schema: &SchemaRef) -> Result<Dataset> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        files.sort();

        let mut schema: Option<SchemaRef> = None;
        let mut batches = Vec::new();
        for path in &files {
            let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
            schema.get_or_insert_with(|| builder.schema().clone());
            for batch in builder.build()? {
                batches.push(batch?);
            }
        }

        let Some(schema) = schema else {
            debug!(dir = %dir.display(), "No parquet data found");
            return Ok(Dataset::Local(RecordBatch::new_empty(empty_schema.clone())));
        };

        let combined = concat_batches(&schema, &batches).map_err(|e| {
            Error::SchemaMismatch(format!(
                "Parquet files under {} do not share a schema: {}",
                dir.display(),
                e
            ))
        })?;

        debug!(dir = %dir.display(), files = files.len(), rows = combined.num_rows(), "Read layer");
        Ok(Dataset::Local(combined))
    }

    fn create_exclusive(path: &Path, contents: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    Error::Storage(format!("{} already exists", path.display()))
                }
                _ => Error::Io(e),
            })?;
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(())
    }

    fn write_layer(&self, layer: Layer, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
        let batch = dataset.into_local()?;
        let buffer = encode_parquet(batch.schema(), &[batch])?;
        let path = self
            .layer_dir(layer)
            .join(format!("{}.parquet", metadata.batch_id));

        Self::create_exclusive(&path, &buffer)?;
        debug!(path = %path.display(), layer = %layer, "Wrote layer");
        Ok(())
    }

    fn probe(&self) -> Result<()> {
        let path = self.metadata_dir.join(PROBE_FILE);
        fs::write(&path, PROBE_PAYLOAD)?;
        let read_back = fs::read(&path)?;
        fs::remove_file(&path)?;

        if read_back != PROBE_PAYLOAD {
            return Err(Error::Storage(format!(
                "Probe file {} did not round-trip",
                path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for LocalRepository {
    fn engine(&self) -> ExecutionMode {
        ExecutionMode::Local
    }

    async fn read_bronze(&self) -> Result<Dataset> {
        Self::read_layer(&self.bronze_dir, &BRONZE_SCHEMA)
    }

    async fn write_silver(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
        self.write_layer(Layer::Silver, dataset, metadata)
    }

    async fn read_silver(&self) -> Result<Dataset> {
        Self::read_layer(&self.silver_dir, &BRONZE_SCHEMA)
    }

    async fn write_gold(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
        self.write_layer(Layer::Gold, dataset, metadata)
    }

    async fn read_gold(&self) -> Result<Dataset> {
        Self::read_layer(&self.gold_dir, &GOLD_SCHEMA)
    }

    async fn save_metadata(&self, metadata: &BatchMetadata) -> Result<()> {
        let path = self
            .metadata_dir
            .join(format!("{}_{}.json", metadata.batch_id, metadata.layer));
        let json = serde_json::to_vec_pretty(metadata)?;

        Self::create_exclusive(&path, &json)?;
        debug!(path = %path.display(), "Saved batch metadata");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.probe() {
            Ok(()) => true,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Local storage health check failed");
                false
            }
        }
    }
}
