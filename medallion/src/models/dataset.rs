use crate::utils::arrow::{coerce, first_occurrence_mask, min_max_display};
use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use common::config::ExecutionMode;
use common::{Error, Result};
use datafusion::functions_aggregate::expr_fn::{max, min};
use datafusion::prelude::*;

/// A table flowing through the medallion layers, tagged with the engine that
/// owns it. Transformations consume a dataset and return a new one.
#[derive(Debug, Clone)]
pub enum Dataset {
    /// Fully materialised, single in-memory batch.
    Local(RecordBatch),
    /// Lazy DataFusion plan, executed on demand.
    Cluster(DataFrame),
}

impl Dataset {
    pub fn engine(&self) -> ExecutionMode {
        match self {
            Dataset::Local(_) => ExecutionMode::Local,
            Dataset::Cluster(_) => ExecutionMode::Cluster,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            Dataset::Local(batch) => batch.schema(),
            Dataset::Cluster(df) => df.schema().inner().clone(),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema().fields().iter().any(|f| f.name() == name)
    }

    fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(Error::SchemaMismatch(format!(
                "Column '{}' not found in dataset",
                name
            )))
        }
    }

    fn local_column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
        batch.column_by_name(name).cloned().ok_or_else(|| {
            Error::SchemaMismatch(format!("Column '{}' not found in dataset", name))
        })
    }

    pub async fn row_count(&self) -> Result<usize> {
        match self {
            Dataset::Local(batch) => Ok(batch.num_rows()),
            Dataset::Cluster(df) => Ok(df.clone().count().await?),
        }
    }

    /// Number of null entries in `column`.
    pub async fn null_count(&self, column: &str) -> Result<usize> {
        self.require_column(column)?;
        match self {
            Dataset::Local(batch) => Ok(Self::local_column(batch, column)?.null_count()),
            Dataset::Cluster(df) => Ok(df
                .clone()
                .filter(ident(column).is_null())?
                .count()
                .await?),
        }
    }

    /// Rows whose values across `columns` repeat an earlier row.
    pub async fn duplicate_count(&self, columns: &[&str]) -> Result<usize> {
        for column in columns {
            self.require_column(column)?;
        }
        match self {
            Dataset::Local(batch) => {
                let arrays = columns
                    .iter()
                    .map(|c| Self::local_column(batch, c))
                    .collect::<Result<Vec<_>>>()?;
                let mask = first_occurrence_mask(&arrays)?;
                Ok(mask.len() - mask.true_count())
            }
            Dataset::Cluster(df) => {
                let total = df.clone().count().await?;
                let keys: Vec<Expr> = columns.iter().map(|c| ident(*c)).collect();
                let distinct = df.clone().select(keys)?.distinct()?.count().await?;
                Ok(total - distinct)
            }
        }
    }

    /// Number of non-null `false` entries in a boolean `column`.
    pub async fn false_count(&self, column: &str) -> Result<usize> {
        self.require_column(column)?;
        match self {
            Dataset::Local(batch) => {
                let flags = coerce(&Self::local_column(batch, column)?, &DataType::Boolean)?;
                let flags = flags
                    .as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(|| {
                        Error::Other(format!("Column '{}' is not boolean", column))
                    })?;
                Ok(flags.false_count())
            }
            Dataset::Cluster(df) => Ok(df
                .clone()
                .filter(ident(column).eq(lit(false)))?
                .count()
                .await?),
        }
    }

    /// Number of distinct non-null values in `column`.
    pub async fn distinct_count(&self, column: &str) -> Result<usize> {
        self.require_column(column)?;
        match self {
            Dataset::Local(batch) => {
                let values = Self::local_column(batch, column)?;
                let mask = first_occurrence_mask(&[values.clone()])?;
                Ok((0..values.len())
                    .filter(|&i| mask.value(i) && !values.is_null(i))
                    .count())
            }
            Dataset::Cluster(df) => Ok(df
                .clone()
                .select(vec![ident(column)])?
                .filter(ident(column).is_not_null())?
                .distinct()?
                .count()
                .await?),
        }
    }

    /// Smallest and largest non-null values of `column`, rendered as strings.
    pub async fn min_max(&self, column: &str) -> Result<Option<(String, String)>> {
        self.require_column(column)?;
        match self {
            Dataset::Local(batch) => min_max_display(Self::local_column(batch, column)?.as_ref()),
            Dataset::Cluster(df) => {
                let batches = df
                    .clone()
                    .aggregate(
                        vec![],
                        vec![
                            min(ident(column)).alias("min"),
                            max(ident(column)).alias("max"),
                        ],
                    )?
                    .collect()
                    .await?;

                let Some(batch) = batches.into_iter().find(|b| b.num_rows() > 0) else {
                    return Ok(None);
                };
                if batch.column(0).is_null(0) || batch.column(1).is_null(0) {
                    return Ok(None);
                }

                let options = FormatOptions::default();
                let min = ArrayFormatter::try_new(batch.column(0).as_ref(), &options)?
                    .value(0)
                    .to_string();
                let max = ArrayFormatter::try_new(batch.column(1).as_ref(), &options)?
                    .value(0)
                    .to_string();
                Ok(Some((min, max)))
            }
        }
    }

    /// First `n` rows.
    pub fn limit(self, n: usize) -> Result<Dataset> {
        match self {
            Dataset::Local(batch) => {
                let len = n.min(batch.num_rows());
                Ok(Dataset::Local(batch.slice(0, len)))
            }
            Dataset::Cluster(df) => Ok(Dataset::Cluster(df.limit(0, Some(n))?)),
        }
    }

    /// Materialises the dataset.
    pub async fn collect(self) -> Result<Vec<RecordBatch>> {
        match self {
            Dataset::Local(batch) => Ok(vec![batch]),
            Dataset::Cluster(df) => Ok(df.collect().await?),
        }
    }

    pub fn into_local(self) -> Result<RecordBatch> {
        match self {
            Dataset::Local(batch) => Ok(batch),
            other => Err(Error::EngineMismatch {
                expected: ExecutionMode::Local,
                found: other.engine(),
            }),
        }
    }

    pub fn into_cluster(self) -> Result<DataFrame> {
        match self {
            Dataset::Cluster(df) => Ok(df),
            other => Err(Error::EngineMismatch {
                expected: ExecutionMode::Cluster,
                found: other.engine(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};
    use std::sync::Arc;

    fn readings() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                "entity_id",
                Arc::new(StringArray::from(vec![Some("e1"), Some("e1"), None, Some("e2")])) as ArrayRef,
            ),
            (
                "timestamp",
                Arc::new(StringArray::from(vec!["2026-02-20 10:00:00", "2026-02-20 10:00:00", "2026-02-20 11:00:00", "2026-02-20 12:00:00"])) as ArrayRef,
            ),
            (
                "value",
                Arc::new(Float64Array::from(vec![Some(1.0), Some(2.0), None, Some(3.0)])) as ArrayRef,
            ),
            (
                "value_is_valid",
                Arc::new(BooleanArray::from(vec![true, true, false, true])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    fn both_engines() -> Vec<Dataset> {
        let batch = readings();
        let ctx = SessionContext::new();
        let df = ctx.read_batch(batch.clone()).unwrap();
        vec![Dataset::Local(batch), Dataset::Cluster(df)]
    }

    #[tokio::test]
    async fn test_operations_agree_across_engines() {
        for dataset in both_engines() {
            let engine = dataset.engine();
            assert_eq!(dataset.row_count().await.unwrap(), 4, "{engine}");
            assert_eq!(dataset.null_count("value").await.unwrap(), 1, "{engine}");
            assert_eq!(
                dataset
                    .duplicate_count(&["entity_id", "timestamp"])
                    .await
                    .unwrap(),
                1,
                "{engine}"
            );
            assert_eq!(dataset.false_count("value_is_valid").await.unwrap(), 1, "{engine}");
            assert_eq!(dataset.distinct_count("entity_id").await.unwrap(), 2, "{engine}");
            assert_eq!(
                dataset.min_max("entity_id").await.unwrap(),
                Some(("e1".to_string(), "e2".to_string())),
                "{engine}"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_column_is_schema_mismatch() {
        for dataset in both_engines() {
            assert!(!dataset.has_column("date"));
            let err = dataset.null_count("date").await.unwrap_err();
            assert!(matches!(err, Error::SchemaMismatch(_)));
        }
    }

    #[tokio::test]
    async fn test_limit_caps_rows() {
        for dataset in both_engines() {
            let limited = dataset.limit(2).unwrap();
            assert_eq!(limited.row_count().await.unwrap(), 2);
        }

        let local = Dataset::Local(readings()).limit(10).unwrap();
        assert_eq!(local.row_count().await.unwrap(), 4);
    }

    #[test]
    fn test_engine_tag_is_checked_on_unwrap() {
        let dataset = Dataset::Local(readings());

        let err = dataset.clone().into_cluster().unwrap_err();
        assert!(matches!(
            err,
            Error::EngineMismatch {
                expected: ExecutionMode::Cluster,
                found: ExecutionMode::Local
            }
        ));
        assert!(dataset.into_local().is_ok());
    }
}
