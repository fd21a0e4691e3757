use super::{Repository, encode_parquet};
use crate::models::Dataset;
use crate::processor::{BatchMetadata, Layer};
use crate::schema::{BRONZE_SCHEMA, GOLD_SCHEMA};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use common::config::{ExecutionMode, ObjectStoreConfig, ObjectStoreKind, Settings};
use common::{Error, Result};
use datafusion::prelude::*;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Layers stored as batch-partitioned parquet tables in an object store and
/// read back through a DataFusion session.
///
/// ```text
/// {root}/{layer}/batch_id={batch_id}/part-0.parquet
/// {root}/{metadata}/{layer}/batch_id={batch_id}.json
/// ```
pub struct TableRepository {
    ctx: SessionContext,
    store: Arc<dyn ObjectStore>,
    /// Object key prefix of the table root.
    root: ObjectPath,
    /// URL of the table root as DataFusion sees it, with a trailing slash.
    root_url: Url,
    bronze_path: String,
    silver_path: String,
    gold_path: String,
    metadata_path: String,
}

impl TableRepository {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let ctx = SessionContext::new();

        let (store, root, root_url): (Arc<dyn ObjectStore>, ObjectPath, Url) =
            match &settings.object_store {
                Some(config) if config.kind == ObjectStoreKind::S3 => {
                    let (store, root, root_url) = Self::s3_store(config)?;
                    let bucket_url = Url::parse(&format!("s3://{}", config.bucket))?;
                    ctx.register_object_store(&bucket_url, store.clone());
                    (store, root, root_url)
                }
                _ => {
                    let (store, root, root_url) = Self::filesystem_store(&settings.storage_path)?;
                    let file_url = Url::parse("file://")?;
                    ctx.register_object_store(&file_url, store.clone());
                    (store, root, root_url)
                }
            };

        info!(root = %root_url, "Opened table repository");

        Ok(Self {
            ctx,
            store,
            root,
            root_url,
            bronze_path: settings.bronze_path.clone(),
            silver_path: settings.silver_path.clone(),
            gold_path: settings.gold_path.clone(),
            metadata_path: settings.metadata_path.clone(),
        })
    }

    fn filesystem_store(storage_path: &str) -> Result<(Arc<dyn ObjectStore>, ObjectPath, Url)> {
        fs::create_dir_all(storage_path)?;
        let absolute = fs::canonicalize(storage_path)?;

        let root = ObjectPath::from_filesystem_path(&absolute)?;
        let root_url = Url::from_directory_path(&absolute).map_err(|_| {
            Error::InvalidUri(format!("{} is not an absolute path", absolute.display()))
        })?;

        Ok((Arc::new(LocalFileSystem::new()), root, root_url))
    }

    fn s3_store(config: &ObjectStoreConfig) -> Result<(Arc<dyn ObjectStore>, ObjectPath, Url)> {
        if config.bucket.is_empty() {
            return Err(Error::InvalidInput(
                "object_store.bucket is required for s3".to_string(),
            ));
        }

        let s3 = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_endpoint(&config.endpoint)
            .with_allow_http(true)
            .build()?;

        let prefix = config.prefix.trim_matches('/');
        let root = ObjectPath::from(prefix);
        let root_url = if prefix.is_empty() {
            Url::parse(&format!("s3://{}/", config.bucket))?
        } else {
            Url::parse(&format!("s3://{}/{}/", config.bucket, prefix))?
        };

        Ok((Arc::new(s3), root, root_url))
    }

    fn layer_name(&self, layer: Layer) -> &str {
        match layer {
            Layer::Bronze => &self.bronze_path,
            Layer::Silver => &self.silver_path,
            Layer::Gold => &self.gold_path,
        }
    }

    fn join(&self, parts: &[&str]) -> ObjectPath {
        parts
            .iter()
            .flat_map(|part| part.split('/'))
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.child(segment))
    }

    fn data_key(&self, layer: Layer, batch_id: &str) -> ObjectPath {
        self.join(&[
            self.layer_name(layer),
            &format!("batch_id={}", batch_id),
            "part-0.parquet",
        ])
    }

    fn metadata_key(&self, metadata: &BatchMetadata) -> ObjectPath {
        self.join(&[
            &self.metadata_path,
            metadata.layer.as_str(),
            &format!("batch_id={}.json", metadata.batch_id),
        ])
    }

    async fn exists(&self, key: &ObjectPath) -> Result<bool> {
        match self.store.head(key).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Puts `payload` at `key`, refusing to replace an existing object.
    async fn put_new(&self, key: &ObjectPath, payload: Bytes) -> Result<()> {
        if self.exists(key).await? {
            return Err(Error::Storage(format!("Object {} already exists", key)));
        }
        self.store.put(key, PutPayload::from(payload)).await?;
        Ok(())
    }

    async fn read_layer(&self, layer: Layer, empty_schema: &SchemaRef) -> Result<Dataset> {
        let prefix = self.join(&[self.layer_name(layer)]);
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;
        let has_data = objects
            .iter()
            .any(|meta| meta.location.as_ref().ends_with(".parquet"));

        if !has_data {
            debug!(layer = %layer, "No parquet data found");
            let empty = RecordBatch::new_empty(empty_schema.clone());
            return Ok(Dataset::Cluster(self.ctx.read_batch(empty)?));
        }

        let url = self.root_url.join(&format!("{}/", self.layer_name(layer)))?;
        let df = self
            .ctx
            .read_parquet(url.as_str(), ParquetReadOptions::default())
            .await?;
        Ok(Dataset::Cluster(df))
    }

    async fn write_layer(&self, layer: Layer, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
        let df = dataset.into_cluster()?;
        let planned_schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        let schema = batches
            .first()
            .map(|batch| batch.schema())
            .unwrap_or(planned_schema);
        let buffer = encode_parquet(schema, &batches)?;

        let key = self.data_key(layer, &metadata.batch_id);
        self.put_new(&key, Bytes::from(buffer)).await?;
        debug!(key = %key, layer = %layer, "Wrote layer");
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let key = self.join(&[
            &self.metadata_path,
            &format!("_health_{}", Utc::now().timestamp_micros()),
        ]);
        let payload = Bytes::from_static(b"ok");

        self.store.put(&key, PutPayload::from(payload.clone())).await?;
        let read_back = self.store.get(&key).await?.bytes().await?;
        self.store.delete(&key).await?;

        if read_back != payload {
            return Err(Error::Storage(format!("Probe object {} did not round-trip", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for TableRepository {
    fn engine(&self) -> ExecutionMode {
        ExecutionMode::Cluster
    }

    async fn read_bronze(&self) -> Result<Dataset> {
        self.read_layer(Layer::Bronze, &BRONZE_SCHEMA).await
    }

    async fn write_silver(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
        self.write_layer(Layer::Silver, dataset, metadata).await
    }

    async fn read_silver(&self) -> Result<Dataset> {
        self.read_layer(Layer::Silver, &BRONZE_SCHEMA).await
    }

    async fn write_gold(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
        self.write_layer(Layer::Gold, dataset, metadata).await
    }

    async fn read_gold(&self) -> Result<Dataset> {
        self.read_layer(Layer::Gold, &GOLD_SCHEMA).await
    }

    async fn save_metadata(&self, metadata: &BatchMetadata) -> Result<()> {
        let key = self.metadata_key(metadata);
        let json = serde_json::to_vec_pretty(metadata)?;

        self.put_new(&key, Bytes::from(json)).await?;
        debug!(key = %key, "Saved batch metadata");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.probe().await {
            Ok(()) => true,
            Err(e) => {
                warn!(root = %self.root_url, error = %e, "Table storage health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use tempfile::TempDir;

    async fn repository() -> (TempDir, TableRepository) {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::with_storage_path(dir.path().to_str().unwrap());
        settings.execution_mode = ExecutionMode::Cluster;
        let repo = TableRepository::new(&settings).await.unwrap();
        (dir, repo)
    }

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("entity_id", Arc::new(StringArray::from(vec!["entity_1", "entity_2"])) as ArrayRef),
            ("value", Arc::new(Float64Array::from(vec![1.0, 2.0])) as ArrayRef),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_absent_layers_are_schema_bearing() {
        let (_dir, repo) = repository().await;

        let bronze = repo.read_bronze().await.unwrap();
        assert_eq!(bronze.engine(), ExecutionMode::Cluster);
        assert_eq!(bronze.row_count().await.unwrap(), 0);
        assert!(bronze.has_column("entity_id"));

        let gold = repo.read_gold().await.unwrap();
        assert!(gold.has_column("date"));
    }

    #[tokio::test]
    async fn test_partitioned_write_and_read_back() {
        let (dir, repo) = repository().await;
        let df = repo.ctx.read_batch(batch()).unwrap();

        repo.write_gold(
            Dataset::Cluster(df.clone()),
            &BatchMetadata::new("20260220_100000", "test", Layer::Gold, 2),
        )
        .await
        .unwrap();
        repo.write_gold(
            Dataset::Cluster(df.clone()),
            &BatchMetadata::new("20260220_100001", "test", Layer::Gold, 2),
        )
        .await
        .unwrap();

        assert!(
            dir.path()
                .join("gold/batch_id=20260220_100000/part-0.parquet")
                .exists()
        );

        let gold = repo.read_gold().await.unwrap();
        assert_eq!(gold.row_count().await.unwrap(), 4);
        assert_eq!(gold.distinct_count("entity_id").await.unwrap(), 2);

        let err = repo
            .write_gold(
                Dataset::Cluster(df),
                &BatchMetadata::new("20260220_100000", "test", Layer::Gold, 2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_metadata_layout() {
        let (dir, repo) = repository().await;

        repo.save_metadata(&BatchMetadata::new("20260220_100000", "test", Layer::Silver, 5))
            .await
            .unwrap();

        let path = dir
            .path()
            .join("metadata/silver/batch_id=20260220_100000.json");
        let stored: BatchMetadata = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(stored.record_count, 5);
    }

    #[tokio::test]
    async fn test_rejects_local_dataset() {
        let (_dir, repo) = repository().await;

        let err = repo
            .write_silver(
                Dataset::Local(batch()),
                &BatchMetadata::new("20260220_100000", "test", Layer::Silver, 2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineMismatch { .. }));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_dir, repo) = repository().await;

        assert!(repo.health_check().await);
    }
}
