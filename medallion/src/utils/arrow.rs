use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::compute::{self, SortOptions};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use common::{Error, Result};
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub fn batches_to_json(batches: &[RecordBatch]) -> Result<Vec<Value>> {
    let mut json_rows = Vec::new();

    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let mut row = serde_json::Map::new();

            for (col_idx, field) in batch.schema().fields().iter().enumerate() {
                let column = batch.column(col_idx);
                let value = arrow_array_to_json(column.as_ref(), row_idx)?;
                row.insert(field.name().clone(), value);
            }

            json_rows.push(Value::Object(row));
        }
    }

    Ok(json_rows)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::Other(format!(
            "Failed to downcast {:?} array",
            array.data_type()
        ))
    })
}

pub fn arrow_array_to_json(array: &dyn Array, index: usize) -> Result<Value> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }

    Ok(match array.data_type() {
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(array)?.value(index)),
        DataType::Int32 => Value::Number(Number::from(downcast::<Int32Array>(array)?.value(index))),
        DataType::Int64 => Value::Number(Number::from(downcast::<Int64Array>(array)?.value(index))),
        DataType::Float64 => {
            // NaN and infinities have no JSON representation
            Number::from_f64(downcast::<Float64Array>(array)?.value(index))
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        DataType::Utf8 => Value::String(downcast::<StringArray>(array)?.value(index).to_string()),
        DataType::Date32 => {
            let array = downcast::<Date32Array>(array)?;
            match array.value_as_date(index) {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::Null,
            }
        }
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
            Value::String(formatter.value(index).to_string())
        }
    })
}

/// Casts string-like columns (views, large strings) down to plain `Utf8` so
/// downstream casts only deal with one string layout.
pub fn normalize_strings(array: &ArrayRef) -> Result<ArrayRef> {
    match array.data_type() {
        DataType::Utf8View | DataType::LargeUtf8 => Ok(compute::cast(array, &DataType::Utf8)?),
        _ => Ok(Arc::clone(array)),
    }
}

/// Lenient cast: values that cannot be converted become null.
pub fn coerce(array: &ArrayRef, to_type: &DataType) -> Result<ArrayRef> {
    let array = normalize_strings(array)?;
    Ok(compute::cast(&array, to_type)?)
}

/// `true` for the first occurrence of every distinct row across `columns`.
/// Nulls compare equal to each other.
pub fn first_occurrence_mask(columns: &[ArrayRef]) -> Result<BooleanArray> {
    if columns.is_empty() {
        return Ok(BooleanArray::from(Vec::<bool>::new()));
    }

    let fields = columns
        .iter()
        .map(|c| SortField::new(c.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(columns)?;

    let mut seen = HashSet::with_capacity(rows.num_rows());
    let mask: Vec<bool> = rows.iter().map(|row| seen.insert(row)).collect();

    Ok(BooleanArray::from(mask))
}

/// Returns `batch` with `name` replaced by `array`, or appended if absent.
pub fn with_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    let field = Field::new(name, array.data_type().clone(), true);

    match schema.index_of(name) {
        Ok(idx) => {
            fields[idx] = field;
            columns[idx] = array;
        }
        Err(_) => {
            fields.push(field);
            columns.push(array);
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Smallest and largest non-null values of `array`, rendered as strings.
pub fn min_max_display(array: &dyn Array) -> Result<Option<(String, String)>> {
    let non_null = array.len() - array.null_count();
    if non_null == 0 {
        return Ok(None);
    }

    let options = SortOptions {
        descending: false,
        nulls_first: false,
    };
    let indices = compute::sort_to_indices(array, Some(options), None)?;
    let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;

    let min = formatter.value(indices.value(0) as usize).to_string();
    let max = formatter.value(indices.value(non_null - 1) as usize).to_string();
    Ok(Some((min, max)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::TimestampMicrosecondArray;

    #[test]
    fn test_first_occurrence_mask_treats_nulls_as_equal() {
        let ids: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), Some("a"), None, None, Some("b")]));
        let values: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 1.0, 2.0, 2.0, 1.0]));

        let mask = first_occurrence_mask(&[ids, values]).unwrap();

        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![Some(true), Some(false), Some(true), Some(false), Some(true)]
        );
    }

    #[test]
    fn test_coerce_marks_unparseable_values_null() {
        let raw: ArrayRef = Arc::new(StringArray::from(vec!["100.5", "invalid", "7"]));

        let coerced = coerce(&raw, &DataType::Float64).unwrap();
        let coerced = coerced.as_any().downcast_ref::<Float64Array>().unwrap();

        assert_eq!(coerced.value(0), 100.5);
        assert!(coerced.is_null(1));
        assert_eq!(coerced.value(2), 7.0);
    }

    #[test]
    fn test_with_column_replaces_and_appends() {
        let batch = RecordBatch::try_from_iter(vec![(
            "value",
            Arc::new(StringArray::from(vec!["1", "2"])) as ArrayRef,
        )])
        .unwrap();

        let replaced = with_column(
            &batch,
            "value",
            Arc::new(Float64Array::from(vec![1.0, 2.0])),
        )
        .unwrap();
        assert_eq!(replaced.num_columns(), 1);
        assert_eq!(replaced.schema().field(0).data_type(), &DataType::Float64);

        let appended = with_column(
            &replaced,
            "value_is_valid",
            Arc::new(BooleanArray::from(vec![true, true])),
        )
        .unwrap();
        assert_eq!(appended.num_columns(), 2);
        assert_eq!(appended.schema().field(1).name(), "value_is_valid");
    }

    #[test]
    fn test_min_max_display_skips_nulls() {
        let dates = Date32Array::from(vec![Some(20508), None, Some(20504)]);

        let (min, max) = min_max_display(&dates).unwrap().unwrap();

        assert_eq!(min, "2026-02-20");
        assert_eq!(max, "2026-02-24");
        assert!(min_max_display(&Date32Array::from(vec![None::<i32>])).unwrap().is_none());
    }

    #[test]
    fn test_batches_to_json_renders_dates_and_timestamps() {
        let batch = RecordBatch::try_from_iter(vec![
            ("entity_id", Arc::new(StringArray::from(vec!["entity_1"])) as ArrayRef),
            ("date", Arc::new(Date32Array::from(vec![20504])) as ArrayRef),
            (
                "aggregated_at",
                Arc::new(TimestampMicrosecondArray::from(vec![1_771_581_600_000_000])) as ArrayRef,
            ),
            ("avg_value", Arc::new(Float64Array::from(vec![f64::NAN])) as ArrayRef),
        ])
        .unwrap();

        let rows = batches_to_json(&[batch]).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["entity_id"], "entity_1");
        assert_eq!(rows[0]["date"], "2026-02-20");
        assert_eq!(rows[0]["aggregated_at"], "2026-02-20T10:00:00");
        assert_eq!(rows[0]["avg_value"], Value::Null);
    }
}
