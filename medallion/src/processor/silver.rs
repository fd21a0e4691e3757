use super::{BronzeToSilver, df_has_column, utf8_normalized};
use crate::models::Dataset;
use crate::schema::{ENTITY_ID, PROCESSED_AT, TIMESTAMP, VALUE, VALUE_IS_VALID, canonical_timestamp_type};
use crate::utils::arrow::{coerce, first_occurrence_mask, with_column};
use arrow::array::{Array, TimestampMicrosecondArray};
use arrow::compute::{filter_record_batch, is_not_null};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use common::Result;
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use std::sync::Arc;
use tracing::debug;

/// Bronze to silver cleaning over a single in-memory batch.
pub struct LocalBronzeToSilver;

impl BronzeToSilver for LocalBronzeToSilver {
    fn transform(&self, dataset: Dataset) -> Result<Dataset> {
        let batch = dataset.into_local()?;
        let rows_in = batch.num_rows();

        let mut batch = drop_duplicate_rows(&batch)?;
        batch = drop_nulls(&batch, TIMESTAMP)?;
        batch = drop_nulls(&batch, ENTITY_ID)?;

        if let Some(raw) = batch.column_by_name(TIMESTAMP).cloned() {
            let timestamps = coerce(&raw, &canonical_timestamp_type())?;
            batch = with_column(&batch, TIMESTAMP, timestamps)?;
            batch = drop_nulls(&batch, TIMESTAMP)?;
        }

        if let Some(raw) = batch.column_by_name(VALUE).cloned() {
            let values = coerce(&raw, &DataType::Float64)?;
            let valid = is_not_null(values.as_ref())?;
            batch = with_column(&batch, VALUE, values)?;
            batch = with_column(&batch, VALUE_IS_VALID, Arc::new(valid))?;
        }

        let processed_at =
            TimestampMicrosecondArray::from_value(Utc::now().timestamp_micros(), batch.num_rows());
        batch = with_column(&batch, PROCESSED_AT, Arc::new(processed_at))?;

        debug!(rows_in, rows_out = batch.num_rows(), "Cleaned bronze batch");
        Ok(Dataset::Local(batch))
    }
}

fn drop_duplicate_rows(batch: &RecordBatch) -> Result<RecordBatch> {
    if batch.num_columns() == 0 {
        return Ok(batch.clone());
    }
    let mask = first_occurrence_mask(batch.columns())?;
    Ok(filter_record_batch(batch, &mask)?)
}

fn drop_nulls(batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    match batch.column_by_name(column) {
        Some(array) if array.null_count() > 0 => {
            let mask = is_not_null(array.as_ref())?;
            Ok(filter_record_batch(batch, &mask)?)
        }
        _ => Ok(batch.clone()),
    }
}

/// Bronze to silver cleaning as a lazy DataFusion plan.
pub struct ClusterBronzeToSilver;

impl BronzeToSilver for ClusterBronzeToSilver {
    fn transform(&self, dataset: Dataset) -> Result<Dataset> {
        let mut df = dataset.into_cluster()?.distinct()?;

        if df_has_column(&df, TIMESTAMP) {
            df = df.filter(col(TIMESTAMP).is_not_null())?;
        }
        if df_has_column(&df, ENTITY_ID) {
            df = df.filter(col(ENTITY_ID).is_not_null())?;
        }

        if df_has_column(&df, TIMESTAMP) {
            let timestamps = try_cast(utf8_normalized(&df, TIMESTAMP), canonical_timestamp_type());
            df = df
                .with_column(TIMESTAMP, timestamps)?
                .filter(col(TIMESTAMP).is_not_null())?;
        }

        if df_has_column(&df, VALUE) {
            let values = try_cast(utf8_normalized(&df, VALUE), DataType::Float64);
            df = df
                .with_column(VALUE, values)?
                .with_column(VALUE_IS_VALID, col(VALUE).is_not_null())?;
        }

        let now = ScalarValue::TimestampMicrosecond(Some(Utc::now().timestamp_micros()), None);
        df = df.with_column(PROCESSED_AT, lit(now))?;

        Ok(Dataset::Cluster(df))
    }
}
