//! Parquet layout of the durable image
//!
//! The image is a Parquet file with two non-null UTF-8 columns, `key` and
//! `value`, one row per entry. Rows are read back in file order and the
//! first row with an empty (or null) key ends the data.

use crate::error::{ColumnKvError, Result};
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;

pub const KEY_COLUMN: &str = "key";
pub const VALUE_COLUMN: &str = "value";

pub fn image_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(KEY_COLUMN, DataType::Utf8, false),
        Field::new(VALUE_COLUMN, DataType::Utf8, false),
    ]))
}

/// Write a snapshot as a Parquet file. Row order follows map iteration.
pub fn write_image<W: Write + Send>(writer: W, entries: &HashMap<String, String>) -> Result<()> {
    let schema = image_schema();
    let mut writer = ArrowWriter::try_new(writer, Arc::clone(&schema), None)?;

    if !entries.is_empty() {
        let (keys, values): (Vec<&str>, Vec<&str>) = entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .unzip();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(keys)),
            Arc::new(StringArray::from(values)),
        ];
        writer.write(&RecordBatch::try_new(schema, columns)?)?;
    }

    writer.close()?;
    Ok(())
}

/// Read a Parquet image back into a mapping, checking its schema first.
pub fn read_image(file: File) -> Result<HashMap<String, String>> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    validate_schema(builder.schema())?;

    let mut entries = HashMap::new();
    for batch in builder.build()? {
        let batch = batch?;
        let keys = string_column(&batch, KEY_COLUMN)?;
        let values = string_column(&batch, VALUE_COLUMN)?;

        for row in 0..batch.num_rows() {
            if keys.is_null(row) || keys.value(row).is_empty() {
                return Ok(entries);
            }
            let value = if values.is_null(row) { "" } else { values.value(row) };
            entries.insert(keys.value(row).to_string(), value.to_string());
        }
    }
    Ok(entries)
}

fn validate_schema(schema: &Schema) -> Result<()> {
    if schema.fields().len() != 2 {
        return Err(ColumnKvError::Persistence(format!(
            "expected 2 columns, found {}",
            schema.fields().len()
        )));
    }
    for name in [KEY_COLUMN, VALUE_COLUMN] {
        let field = schema
            .field_with_name(name)
            .map_err(|_| ColumnKvError::Persistence(format!("missing column {:?}", name)))?;
        if field.data_type() != &DataType::Utf8 {
            return Err(ColumnKvError::Persistence(format!(
                "column {:?} has type {}, expected Utf8",
                name,
                field.data_type()
            )));
        }
    }
    Ok(())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| ColumnKvError::Persistence(format!("column {:?} is not a string column", name)))
}
