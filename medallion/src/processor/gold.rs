use super::{SilverToGold, utf8_normalized};
use crate::models::Dataset;
use crate::schema::{
    AGGREGATED_AT, AVG_VALUE, DATE, ENTITY_ID, GOLD_SCHEMA, MAX_VALUE, MIN_VALUE, RECORD_COUNT,
    TIMESTAMP, TOTAL_VALUE, VALUE, VALUE_RANGE, canonical_timestamp_type,
};
use crate::utils::arrow::coerce;
use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use common::{Error, Result};
use datafusion::functions_aggregate::expr_fn::{avg, count, max, min, sum};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

fn has_aggregation_columns(dataset: &Dataset) -> bool {
    [TIMESTAMP, ENTITY_ID, VALUE]
        .iter()
        .all(|c| dataset.has_column(c))
}

#[derive(Default)]
struct GroupStats {
    sum: f64,
    count: i64,
    min: Option<f64>,
    max: Option<f64>,
}

impl GroupStats {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Other(format!("Unexpected array type {:?}", array.data_type())))
}

/// Daily per-entity aggregation over a single in-memory batch. Groups come
/// out ordered by entity, then date.
pub struct LocalSilverToGold;

impl SilverToGold for LocalSilverToGold {
    fn transform(&self, dataset: Dataset) -> Result<Dataset> {
        if !has_aggregation_columns(&dataset) {
            return Ok(dataset);
        }
        let batch = dataset.into_local()?;

        let timestamps = coerce(&column(&batch, TIMESTAMP)?, &canonical_timestamp_type())?;
        let dates = compute::cast(&timestamps, &DataType::Date32)?;
        let entities = coerce(&column(&batch, ENTITY_ID)?, &DataType::Utf8)?;
        let values = coerce(&column(&batch, VALUE)?, &DataType::Float64)?;

        let dates = downcast::<Date32Array>(&dates)?;
        let entities = downcast::<StringArray>(&entities)?;
        let values = downcast::<Float64Array>(&values)?;

        let mut groups: BTreeMap<(String, i32), GroupStats> = BTreeMap::new();
        for i in 0..batch.num_rows() {
            if entities.is_null(i) || dates.is_null(i) {
                continue;
            }
            let stats = groups
                .entry((entities.value(i).to_string(), dates.value(i)))
                .or_default();
            if values.is_valid(i) {
                stats.push(values.value(i));
            }
        }

        let n = groups.len();
        let mut entity_ids = Vec::with_capacity(n);
        let mut days = Vec::with_capacity(n);
        let mut totals = Vec::with_capacity(n);
        let mut avgs = Vec::with_capacity(n);
        let mut mins = Vec::with_capacity(n);
        let mut maxs = Vec::with_capacity(n);
        let mut counts = Vec::with_capacity(n);
        let mut ranges = Vec::with_capacity(n);

        for ((entity, day), stats) in groups {
            entity_ids.push(entity);
            days.push(day);
            totals.push((stats.count > 0).then_some(stats.sum));
            avgs.push((stats.count > 0).then(|| stats.sum / stats.count as f64));
            mins.push(stats.min);
            maxs.push(stats.max);
            counts.push(stats.count);
            ranges.push(stats.min.zip(stats.max).map(|(lo, hi)| hi - lo));
        }

        let aggregated_at = TimestampMicrosecondArray::from_value(Utc::now().timestamp_micros(), n);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(entity_ids)),
            Arc::new(Date32Array::from(days)),
            Arc::new(Float64Array::from(totals)),
            Arc::new(Float64Array::from(avgs)),
            Arc::new(Float64Array::from(mins)),
            Arc::new(Float64Array::from(maxs)),
            Arc::new(Int64Array::from(counts)),
            Arc::new(Float64Array::from(ranges)),
            Arc::new(aggregated_at),
        ];

        let gold = RecordBatch::try_new(GOLD_SCHEMA.clone(), columns)?;
        debug!(groups = gold.num_rows(), "Aggregated silver batch");
        Ok(Dataset::Local(gold))
    }
}

fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| Error::SchemaMismatch(format!("Column '{}' not found in dataset", name)))
}

/// Daily per-entity aggregation as a grouped DataFusion plan.
pub struct ClusterSilverToGold;

impl SilverToGold for ClusterSilverToGold {
    fn transform(&self, dataset: Dataset) -> Result<Dataset> {
        if !has_aggregation_columns(&dataset) {
            return Ok(dataset);
        }
        let df = dataset.into_cluster()?;

        let timestamps = try_cast(utf8_normalized(&df, TIMESTAMP), canonical_timestamp_type());
        let entities = cast(col(ENTITY_ID), DataType::Utf8);
        let values = try_cast(utf8_normalized(&df, VALUE), DataType::Float64);

        let df = df
            .with_column(TIMESTAMP, timestamps)?
            .with_column(ENTITY_ID, entities)?
            .with_column(VALUE, values)?
            .with_column(DATE, cast(col(TIMESTAMP), DataType::Date32))?
            .filter(col(ENTITY_ID).is_not_null().and(col(DATE).is_not_null()))?
            .aggregate(
                vec![col(ENTITY_ID), col(DATE)],
                vec![
                    sum(col(VALUE)).alias(TOTAL_VALUE),
                    avg(col(VALUE)).alias(AVG_VALUE),
                    min(col(VALUE)).alias(MIN_VALUE),
                    max(col(VALUE)).alias(MAX_VALUE),
                    count(col(VALUE)).alias(RECORD_COUNT),
                ],
            )?
            .with_column(VALUE_RANGE, col(MAX_VALUE) - col(MIN_VALUE))?;

        let now = ScalarValue::TimestampMicrosecond(Some(Utc::now().timestamp_micros()), None);
        let gold = df
            .with_column(AGGREGATED_AT, lit(now))?
            .sort(vec![
                col(ENTITY_ID).sort(true, false),
                col(DATE).sort(true, false),
            ])?;

        Ok(Dataset::Cluster(gold))
    }
}
