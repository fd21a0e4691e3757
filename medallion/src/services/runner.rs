use super::batch_id::generate_batch_id;
use super::metrics::{PipelineMetrics, RunFailure, RunStage};
use super::pipeline::Pipeline;
use crate::processor::{BatchMetadata, Layer};
use common::Result;
use std::time::Instant;
use tracing::{error, info};

pub const DEFAULT_SOURCE: &str = "cli";

/// Runs one batch end to end and always hands back metrics; failures are
/// logged and folded into the result, never returned as errors.
pub struct BatchRunner {
    pipeline: Pipeline,
    source: String,
}

impl BatchRunner {
    pub fn new(pipeline: Pipeline, source: impl Into<String>) -> Self {
        Self {
            pipeline,
            source: source.into(),
        }
    }

    pub async fn run(&self) -> PipelineMetrics {
        let batch_id = generate_batch_id();
        let started = Instant::now();
        let mut stage = RunStage::Started;

        info!(
            event = "batch_started",
            batch_id = %batch_id,
            source = %self.source,
            "Starting batch"
        );

        let outcome = self.execute(&batch_id, &mut stage).await;
        let duration_seconds = started.elapsed().as_secs_f64();

        let metrics = match outcome {
            Ok((records_in, records_out)) => PipelineMetrics {
                batch_id,
                records_in,
                records_out,
                duration_seconds,
                errors: 0,
                stage: RunStage::Completed,
                failure: None,
            },
            Err(err) => {
                error!(
                    event = "batch_failed",
                    batch_id = %batch_id,
                    stage = %stage,
                    error = %err,
                    "Batch failed"
                );
                PipelineMetrics {
                    batch_id,
                    records_in: 0,
                    records_out: 0,
                    duration_seconds,
                    errors: 1,
                    stage,
                    failure: Some(RunFailure {
                        stage,
                        message: err.to_string(),
                    }),
                }
            }
        };

        info!(
            event = "batch_completed",
            batch_id = %metrics.batch_id,
            metrics = %metrics.to_json(),
            "Batch completed"
        );

        metrics
    }

    /// Returns `(records_in, records_out)`. `stage` tracks the last point
    /// reached so a failure can be attributed.
    async fn execute(&self, batch_id: &str, stage: &mut RunStage) -> Result<(usize, usize)> {
        let repository = self.pipeline.repository();

        let bronze = repository.read_bronze().await?;
        let records_in = bronze.row_count().await?;
        drop(bronze);
        *stage = RunStage::BronzeLoaded;
        info!(
            event = "bronze_loaded",
            batch_id,
            source = %self.source,
            record_count = records_in,
            "Loaded bronze"
        );

        let output = self.pipeline.run_batch().await?;

        let silver_metadata = BatchMetadata::new(
            batch_id,
            &self.source,
            Layer::Silver,
            output.silver_count as u64,
        );
        repository
            .write_silver(output.silver, &silver_metadata)
            .await?;
        repository.save_metadata(&silver_metadata).await?;
        *stage = RunStage::SilverWritten;
        info!(
            event = "silver_written",
            batch_id,
            record_count = output.silver_count,
            "Wrote silver"
        );

        let gold_metadata = BatchMetadata::new(
            batch_id,
            &self.source,
            Layer::Gold,
            output.gold_count as u64,
        );
        repository.write_gold(output.gold, &gold_metadata).await?;
        repository.save_metadata(&gold_metadata).await?;
        *stage = RunStage::GoldWritten;
        info!(
            event = "gold_written",
            batch_id,
            record_count = output.gold_count,
            "Wrote gold"
        );

        Ok((records_in, output.gold_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dataset;
    use crate::processor::Transformers;
    use crate::storage::Repository;
    use arrow::array::{ArrayRef, StringArray};
    use arrow::record_batch::RecordBatch;
    use async_trait::async_trait;
    use common::Error;
    use common::config::ExecutionMode;
    use std::sync::{Arc, Mutex};

    /// In-memory repository that records writes and can fail on demand.
    #[derive(Default)]
    struct RecordingRepository {
        fail_silver_write: bool,
        fail_gold_metadata: bool,
        writes: Mutex<Vec<String>>,
    }

    impl RecordingRepository {
        fn writes(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    fn bronze() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                "timestamp",
                Arc::new(StringArray::from(vec![
                    "2026-02-20 10:00:00",
                    "2026-02-20 10:00:00",
                    "2026-02-20 11:00:00",
                ])) as ArrayRef,
            ),
            (
                "entity_id",
                Arc::new(StringArray::from(vec!["entity_1", "entity_1", "entity_2"])) as ArrayRef,
            ),
            (
                "value",
                Arc::new(StringArray::from(vec!["10", "10", "20"])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[async_trait]
    impl Repository for RecordingRepository {
        fn engine(&self) -> ExecutionMode {
            ExecutionMode::Local
        }

        async fn read_bronze(&self) -> Result<Dataset> {
            Ok(Dataset::Local(bronze()))
        }

        async fn write_silver(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
            if self.fail_silver_write {
                return Err(Error::Storage("silver volume unavailable".to_string()));
            }
            assert_eq!(dataset.row_count().await?, metadata.record_count as usize);
            self.writes.lock().unwrap().push("silver".to_string());
            Ok(())
        }

        async fn read_silver(&self) -> Result<Dataset> {
            unimplemented!()
        }

        async fn write_gold(&self, dataset: Dataset, metadata: &BatchMetadata) -> Result<()> {
            assert_eq!(dataset.row_count().await?, metadata.record_count as usize);
            self.writes.lock().unwrap().push("gold".to_string());
            Ok(())
        }

        async fn read_gold(&self) -> Result<Dataset> {
            unimplemented!()
        }

        async fn save_metadata(&self, metadata: &BatchMetadata) -> Result<()> {
            if self.fail_gold_metadata && metadata.layer == Layer::Gold {
                return Err(Error::Storage("metadata volume unavailable".to_string()));
            }
            self.writes
                .lock()
                .unwrap()
                .push(format!("{}_metadata", metadata.layer));
            Ok(())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn runner(repository: Arc<RecordingRepository>) -> BatchRunner {
        let pipeline = Pipeline::new(repository, Transformers::for_mode(ExecutionMode::Local));
        BatchRunner::new(pipeline, "test")
    }

    #[tokio::test]
    async fn test_successful_run_writes_layers_in_order() {
        let repository = Arc::new(RecordingRepository::default());

        let metrics = runner(repository.clone()).run().await;

        assert_eq!(metrics.errors, 0);
        assert_eq!(metrics.records_in, 3);
        assert_eq!(metrics.records_out, 2);
        assert_eq!(metrics.stage, RunStage::Completed);
        assert!(metrics.failure.is_none());
        assert_eq!(
            repository.writes(),
            vec!["silver", "silver_metadata", "gold", "gold_metadata"]
        );
    }

    #[tokio::test]
    async fn test_silver_write_failure_zeroes_metrics() {
        let repository = Arc::new(RecordingRepository {
            fail_silver_write: true,
            ..Default::default()
        });

        let metrics = runner(repository.clone()).run().await;

        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.records_in, 0);
        assert_eq!(metrics.records_out, 0);
        assert_eq!(metrics.stage, RunStage::BronzeLoaded);
        let failure = metrics.failure.unwrap();
        assert_eq!(failure.stage, RunStage::BronzeLoaded);
        assert!(failure.message.contains("silver volume unavailable"));
        assert!(repository.writes().is_empty());
    }

    #[tokio::test]
    async fn test_gold_metadata_failure_keeps_earlier_writes() {
        let repository = Arc::new(RecordingRepository {
            fail_gold_metadata: true,
            ..Default::default()
        });

        let metrics = runner(repository.clone()).run().await;

        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.records_in, 0);
        assert_eq!(metrics.stage, RunStage::SilverWritten);
        assert_eq!(
            repository.writes(),
            vec!["silver", "silver_metadata", "gold"]
        );
    }
}
