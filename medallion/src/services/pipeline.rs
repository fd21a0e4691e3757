use crate::models::Dataset;
use crate::processor::Transformers;
use crate::storage::{self, Repository};
use common::config::Settings;
use common::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Everything one bronze to gold pass produced.
pub struct BatchOutput {
    pub silver: Dataset,
    pub gold: Dataset,
    pub silver_count: usize,
    pub gold_count: usize,
}

/// One repository plus the matching pair of transformers.
pub struct Pipeline {
    repository: Arc<dyn Repository>,
    transformers: Transformers,
}

impl Pipeline {
    pub fn new(repository: Arc<dyn Repository>, transformers: Transformers) -> Self {
        Self {
            repository,
            transformers,
        }
    }

    /// Builds the repository and transformers for `settings.execution_mode`.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let repository = storage::from_settings(settings).await?;
        if repository.engine() != settings.execution_mode {
            return Err(Error::EngineMismatch {
                expected: settings.execution_mode,
                found: repository.engine(),
            });
        }

        Ok(Self::new(
            repository,
            Transformers::for_mode(settings.execution_mode),
        ))
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Reads bronze and derives silver and gold from it. Nothing is written;
    /// any read or transform error is returned as is.
    pub async fn run_batch(&self) -> Result<BatchOutput> {
        let bronze = self.repository.read_bronze().await?;

        let silver = self.transformers.bronze_to_silver.transform(bronze)?;
        let silver_count = silver.row_count().await?;

        let gold = self.transformers.silver_to_gold.transform(silver.clone())?;
        let gold_count = gold.row_count().await?;

        debug!(silver_count, gold_count, "Pipeline pass finished");

        Ok(BatchOutput {
            silver,
            gold,
            silver_count,
            gold_count,
        })
    }
}
