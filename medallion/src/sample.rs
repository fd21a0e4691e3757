use crate::schema::BRONZE_SCHEMA;
use crate::storage::encode_parquet;
use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use common::config::{ObjectStoreKind, Settings};
use common::{Error, Result};
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const SAMPLE_FILE: &str = "sample_data.parquet";
const SAMPLE_ENTITIES: [&str; 3] = ["entity_1", "entity_2", "entity_3"];

fn midnight(year: i32, month: u32, day: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidInput(format!("invalid date {}-{}-{}", year, month, day)))
}

/// Hourly readings for three entities from 2026-02-01 through 2026-02-20
/// midnight, with values drawn uniformly from `[10, 100)`.
pub fn sample_bronze_batch() -> Result<RecordBatch> {
    let start = midnight(2026, 2, 1)?;
    let end = midnight(2026, 2, 20)?;
    let mut rng = rand::rng();

    let mut timestamps = Vec::new();
    let mut entities = Vec::new();
    let mut values = Vec::new();

    let mut at = start;
    while at <= end {
        for entity in SAMPLE_ENTITIES {
            timestamps.push(at.and_utc().timestamp_micros());
            entities.push(entity);
            values.push(rng.random_range(10.0..100.0));
        }
        at += Duration::hours(1);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMicrosecondArray::from(timestamps)),
        Arc::new(StringArray::from(entities)),
        Arc::new(Float64Array::from(values)),
    ];
    Ok(RecordBatch::try_new(BRONZE_SCHEMA.clone(), columns)?)
}

/// Writes a fresh sample file into the bronze directory, replacing any
/// earlier sample. Only filesystem-backed storage is supported.
pub fn write_sample_bronze(settings: &Settings) -> Result<(PathBuf, usize)> {
    if let Some(store) = &settings.object_store {
        if store.kind == ObjectStoreKind::S3 {
            return Err(Error::InvalidInput(
                "sample data can only be generated for filesystem storage".to_string(),
            ));
        }
    }

    let batch = sample_bronze_batch()?;
    let rows = batch.num_rows();
    let buffer = encode_parquet(batch.schema(), &[batch])?;

    let dir = settings.bronze_full_path();
    fs::create_dir_all(&dir)?;
    let path = dir.join(SAMPLE_FILE);
    fs::write(&path, buffer)?;

    info!(path = %path.display(), rows, "Generated sample bronze data");
    Ok((path, rows))
}
