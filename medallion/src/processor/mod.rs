pub mod gold;
pub mod metadata;
pub mod silver;
pub mod validation;

pub use gold::{ClusterSilverToGold, LocalSilverToGold};
pub use metadata::{BatchMetadata, Layer};
pub use silver::{ClusterBronzeToSilver, LocalBronzeToSilver};
pub use validation::{ValidationResult, validate_bronze_schema, validate_silver_quality};

use crate::models::Dataset;
use arrow::datatypes::DataType;
use common::Result;
use common::config::ExecutionMode;
use datafusion::prelude::*;
use std::sync::Arc;

/// Cleans raw bronze readings into the canonical silver shape.
///
/// Malformed rows are dropped or flagged, never reported as errors; an `Err`
/// only signals that the dataset could not be processed at all (for example a
/// dataset from the other engine).
pub trait BronzeToSilver: Send + Sync {
    fn transform(&self, dataset: Dataset) -> Result<Dataset>;
}

/// Aggregates silver readings into per-entity daily gold metrics. Returns the
/// input unchanged when the expected columns are absent.
pub trait SilverToGold: Send + Sync {
    fn transform(&self, dataset: Dataset) -> Result<Dataset>;
}

/// The pair of transformers for one execution engine.
#[derive(Clone)]
pub struct Transformers {
    pub bronze_to_silver: Arc<dyn BronzeToSilver>,
    pub silver_to_gold: Arc<dyn SilverToGold>,
}

impl Transformers {
    pub fn for_mode(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Local => Self {
                bronze_to_silver: Arc::new(LocalBronzeToSilver),
                silver_to_gold: Arc::new(LocalSilverToGold),
            },
            ExecutionMode::Cluster => Self {
                bronze_to_silver: Arc::new(ClusterBronzeToSilver),
                silver_to_gold: Arc::new(ClusterSilverToGold),
            },
        }
    }
}

pub(crate) fn df_has_column(df: &DataFrame, name: &str) -> bool {
    df.schema().fields().iter().any(|f| f.name() == name)
}

/// Column expression with string views and large strings cast to `Utf8`.
pub(crate) fn utf8_normalized(df: &DataFrame, name: &str) -> Expr {
    let needs_cast = df.schema().fields().iter().any(|f| {
        f.name() == name && matches!(f.data_type(), DataType::Utf8View | DataType::LargeUtf8)
    });

    if needs_cast {
        cast(col(name), DataType::Utf8)
    } else {
        col(name)
    }
}
