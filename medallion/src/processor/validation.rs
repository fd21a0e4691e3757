use crate::models::Dataset;
use crate::schema::{ENTITY_ID, REQUIRED_BRONZE_COLUMNS, TIMESTAMP, VALUE_IS_VALID};
use common::Result;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub records_validated: usize,
    pub records_failed: usize,
}

impl ValidationResult {
    /// Fraction of validated records that passed, `0.0` when nothing was
    /// validated. Null counts are summed per column, so this can go negative
    /// when several columns are null on the same rows.
    pub fn success_rate(&self) -> f64 {
        if self.records_validated == 0 {
            return 0.0;
        }
        let validated = self.records_validated as f64;
        (validated - self.records_failed as f64) / validated
    }
}

#[derive(Default)]
struct Report {
    errors: Vec<String>,
    warnings: Vec<String>,
    records_validated: usize,
    records_failed: usize,
}

impl Report {
    fn finish(self) -> ValidationResult {
        ValidationResult {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            records_validated: self.records_validated,
            records_failed: self.records_failed,
        }
    }

    fn fail(mut self, err: common::Error) -> ValidationResult {
        self.errors.push(format!("Validation error: {}", err));
        self.records_validated = 0;
        self.finish()
    }
}

/// Checks that a bronze dataset carries the required columns and reports
/// nulls in them. Never fails; problems are reported in the result.
pub async fn validate_bronze_schema(dataset: &Dataset) -> ValidationResult {
    let mut report = Report::default();
    match check_bronze_schema(dataset, &mut report).await {
        Ok(()) => report.finish(),
        Err(err) => report.fail(err),
    }
}

async fn check_bronze_schema(dataset: &Dataset, report: &mut Report) -> Result<()> {
    let mut missing: Vec<&str> = REQUIRED_BRONZE_COLUMNS
        .iter()
        .copied()
        .filter(|c| !dataset.has_column(c))
        .collect();
    missing.sort_unstable();
    if !missing.is_empty() {
        report
            .errors
            .push(format!("Missing required columns: {}", missing.join(", ")));
    }

    let rows = dataset.row_count().await?;
    if rows == 0 {
        report.warnings.push("Dataset is empty".to_string());
    }

    for column in REQUIRED_BRONZE_COLUMNS {
        if !dataset.has_column(column) {
            continue;
        }
        let nulls = dataset.null_count(column).await?;
        if nulls > 0 {
            report
                .warnings
                .push(format!("Column '{}' has {} null values", column, nulls));
            report.records_failed += nulls;
        }
    }

    report.records_validated = rows;
    debug!(rows, errors = report.errors.len(), "Validated bronze schema");
    Ok(())
}

/// Checks a silver dataset for duplicate `(entity_id, timestamp)` pairs and
/// rows flagged with invalid values.
pub async fn validate_silver_quality(dataset: &Dataset) -> ValidationResult {
    let mut report = Report::default();
    match check_silver_quality(dataset, &mut report).await {
        Ok(()) => report.finish(),
        Err(err) => report.fail(err),
    }
}

async fn check_silver_quality(dataset: &Dataset, report: &mut Report) -> Result<()> {
    report.records_validated = dataset.row_count().await?;

    if dataset.has_column(ENTITY_ID) && dataset.has_column(TIMESTAMP) {
        let duplicates = dataset.duplicate_count(&[ENTITY_ID, TIMESTAMP]).await?;
        if duplicates > 0 {
            report
                .errors
                .push(format!("Found {} duplicate records", duplicates));
            report.records_failed += duplicates;
        }
    }

    if dataset.has_column(VALUE_IS_VALID) {
        let invalid = dataset.false_count(VALUE_IS_VALID).await?;
        if invalid > 0 {
            report
                .warnings
                .push(format!("Found {} records with invalid values", invalid));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VALUE;
    use arrow::array::{ArrayRef, BooleanArray, Date32Array, Float64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use datafusion::prelude::SessionContext;
    use std::sync::Arc;

    fn both_engines(batch: RecordBatch) -> Vec<Dataset> {
        let ctx = SessionContext::new();
        let df = ctx.read_batch(batch.clone()).unwrap();
        vec![Dataset::Local(batch), Dataset::Cluster(df)]
    }

    #[tokio::test]
    async fn test_bronze_missing_columns_is_an_error() {
        let batch = RecordBatch::try_from_iter(vec![(
            ENTITY_ID,
            Arc::new(StringArray::from(vec!["entity_1", "entity_2"])) as ArrayRef,
        )])
        .unwrap();

        for dataset in both_engines(batch) {
            let result = validate_bronze_schema(&dataset).await;

            assert!(!result.is_valid);
            assert_eq!(result.errors, vec!["Missing required columns: timestamp, value"]);
            assert_eq!(result.records_validated, 2);
        }
    }

    #[tokio::test]
    async fn test_bronze_nulls_are_warnings() {
        let batch = RecordBatch::try_from_iter(vec![
            (
                TIMESTAMP,
                Arc::new(StringArray::from(vec![Some("2026-02-20 10:00:00"), None])) as ArrayRef,
            ),
            (
                ENTITY_ID,
                Arc::new(StringArray::from(vec!["entity_1", "entity_1"])) as ArrayRef,
            ),
            (
                VALUE,
                Arc::new(Float64Array::from(vec![None, Some(1.0)])) as ArrayRef,
            ),
        ])
        .unwrap();

        for dataset in both_engines(batch) {
            let result = validate_bronze_schema(&dataset).await;

            assert!(result.is_valid);
            assert_eq!(result.warnings.len(), 2);
            assert_eq!(result.records_failed, 2);
            assert_eq!(result.success_rate(), 0.0);
        }
    }

    #[tokio::test]
    async fn test_bronze_empty_dataset_warns() {
        let batch = RecordBatch::new_empty(crate::schema::BRONZE_SCHEMA.clone());

        for dataset in both_engines(batch) {
            let result = validate_bronze_schema(&dataset).await;

            assert!(result.is_valid);
            assert_eq!(result.warnings, vec!["Dataset is empty"]);
            assert_eq!(result.success_rate(), 0.0);
        }
    }

    #[tokio::test]
    async fn test_silver_duplicate_pair_is_one_error() {
        let batch = RecordBatch::try_from_iter(vec![
            (
                TIMESTAMP,
                Arc::new(StringArray::from(vec![
                    "2026-02-20 10:00:00",
                    "2026-02-20 10:00:00",
                    "2026-02-20 11:00:00",
                ])) as ArrayRef,
            ),
            (
                ENTITY_ID,
                Arc::new(StringArray::from(vec!["entity_1", "entity_1", "entity_1"])) as ArrayRef,
            ),
            (
                VALUE_IS_VALID,
                Arc::new(BooleanArray::from(vec![true, true, false])) as ArrayRef,
            ),
        ])
        .unwrap();

        for dataset in both_engines(batch) {
            let result = validate_silver_quality(&dataset).await;

            assert!(!result.is_valid);
            assert_eq!(result.errors, vec!["Found 1 duplicate records"]);
            assert_eq!(result.warnings, vec!["Found 1 records with invalid values"]);
            assert_eq!(result.records_validated, 3);
            assert_eq!(result.records_failed, 1);
        }
    }

    #[tokio::test]
    async fn test_silver_clean_dataset_passes() {
        let batch = RecordBatch::try_from_iter(vec![
            (
                TIMESTAMP,
                Arc::new(StringArray::from(vec!["2026-02-20 10:00:00", "2026-02-20 11:00:00"])) as ArrayRef,
            ),
            (
                ENTITY_ID,
                Arc::new(StringArray::from(vec!["entity_1", "entity_1"])) as ArrayRef,
            ),
        ])
        .unwrap();

        for dataset in both_engines(batch) {
            let result = validate_silver_quality(&dataset).await;

            assert!(result.is_valid);
            assert!(result.warnings.is_empty());
            assert_eq!(result.success_rate(), 1.0);
        }
    }

    #[test]
    fn test_success_rate_is_a_fraction() {
        let partial = ValidationResult {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
            records_validated: 4,
            records_failed: 1,
        };
        assert_eq!(partial.success_rate(), 0.75);

        let overcounted = ValidationResult {
            records_validated: 2,
            records_failed: 3,
            ..partial
        };
        assert_eq!(overcounted.success_rate(), -0.5);
    }

    #[tokio::test]
    async fn test_inspection_error_is_captured() {
        // A date column where the validity flag should be cannot be compared
        // against `false` on either engine.
        let batch = RecordBatch::try_from_iter(vec![
            (
                TIMESTAMP,
                Arc::new(StringArray::from(vec!["2026-02-20 10:00:00", "2026-02-20 11:00:00"])) as ArrayRef,
            ),
            (
                ENTITY_ID,
                Arc::new(StringArray::from(vec!["entity_1", "entity_1"])) as ArrayRef,
            ),
            (
                VALUE_IS_VALID,
                Arc::new(Date32Array::from(vec![20504, 20505])) as ArrayRef,
            ),
        ])
        .unwrap();

        for dataset in both_engines(batch) {
            let engine = dataset.engine();
            let result = validate_silver_quality(&dataset).await;

            assert!(!result.is_valid, "{engine}");
            assert_eq!(result.errors.len(), 1, "{engine}");
            assert!(result.errors[0].starts_with("Validation error: "), "{engine}");
            assert_eq!(result.records_validated, 0, "{engine}");
            assert_eq!(result.success_rate(), 0.0);
        }
    }
}
