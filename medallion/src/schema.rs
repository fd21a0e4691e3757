use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use once_cell::sync::Lazy;
use std::sync::Arc;

// Bronze columns
pub const TIMESTAMP: &str = "timestamp";
pub const ENTITY_ID: &str = "entity_id";
pub const VALUE: &str = "value";

// Silver additions
pub const VALUE_IS_VALID: &str = "value_is_valid";
pub const PROCESSED_AT: &str = "processed_at";

// Gold columns
pub const DATE: &str = "date";
pub const TOTAL_VALUE: &str = "total_value";
pub const AVG_VALUE: &str = "avg_value";
pub const MIN_VALUE: &str = "min_value";
pub const MAX_VALUE: &str = "max_value";
pub const RECORD_COUNT: &str = "record_count";
pub const VALUE_RANGE: &str = "value_range";
pub const AGGREGATED_AT: &str = "aggregated_at";

/// Columns every bronze dataset is expected to carry.
pub const REQUIRED_BRONZE_COLUMNS: [&str; 3] = [TIMESTAMP, ENTITY_ID, VALUE];

/// Temporal type every silver `timestamp` is coerced to.
pub fn canonical_timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

pub fn bronze_schema() -> Schema {
    Schema::new(vec![
        Field::new(TIMESTAMP, canonical_timestamp_type(), true),
        Field::new(ENTITY_ID, DataType::Utf8, true),
        Field::new(VALUE, DataType::Float64, true),
    ])
}

pub fn gold_schema() -> Schema {
    Schema::new(vec![
        Field::new(ENTITY_ID, DataType::Utf8, true),
        Field::new(DATE, DataType::Date32, true),
        Field::new(TOTAL_VALUE, DataType::Float64, true),
        Field::new(AVG_VALUE, DataType::Float64, true),
        Field::new(MIN_VALUE, DataType::Float64, true),
        Field::new(MAX_VALUE, DataType::Float64, true),
        Field::new(RECORD_COUNT, DataType::Int64, false),
        Field::new(VALUE_RANGE, DataType::Float64, true),
        Field::new(AGGREGATED_AT, canonical_timestamp_type(), false),
    ])
}

pub static BRONZE_SCHEMA: Lazy<SchemaRef> = Lazy::new(|| Arc::new(bronze_schema()));
pub static GOLD_SCHEMA: Lazy<SchemaRef> = Lazy::new(|| Arc::new(gold_schema()));
