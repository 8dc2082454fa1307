//! # Parquet Encoder
//!
//! Gera um arquivo Parquet em memória. O tipo Arrow de cada coluna é inferido
//! pelos valores não nulos; colunas mistas ou vazias viram texto.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType as ArrowDataType, Field, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::error::Result;
use crate::traits::TableEncoder;
use crate::types::{DataTable, DataValue};

/// Tipo de compressão suportado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
}

impl CompressionType {
    fn to_parquet(self) -> Compression {
        match self {
            CompressionType::Uncompressed => Compression::UNCOMPRESSED,
            CompressionType::Snappy => Compression::SNAPPY,
            CompressionType::Gzip => Compression::GZIP(GzipLevel::default()),
            CompressionType::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

/// Serializador Parquet
#[derive(Debug, Clone, Default)]
pub struct ParquetEncoder {
    compression: CompressionType,
}

impl ParquetEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define o algoritmo de compressão
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }
}

/// Infere o tipo Arrow de uma coluna
fn infer_column_type(table: &DataTable, column: &str) -> ArrowDataType {
    let mut inferred: Option<ArrowDataType> = None;

    for row in 0..table.len() {
        let candidate = match table.value(row, column) {
            DataValue::Null => continue,
            DataValue::Integer(_) => ArrowDataType::Int64,
            DataValue::Float(_) => ArrowDataType::Float64,
            DataValue::Boolean(_) => ArrowDataType::Boolean,
            DataValue::Date(_) => ArrowDataType::Date32,
            DataValue::DateTime(_) => ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
            DataValue::Timestamp(_) => {
                ArrowDataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
            }
            _ => return ArrowDataType::Utf8,
        };

        inferred = match (inferred, candidate) {
            (None, c) => Some(c),
            (Some(a), b) if a == b => Some(a),
            (Some(ArrowDataType::Int64), ArrowDataType::Float64)
            | (Some(ArrowDataType::Float64), ArrowDataType::Int64) => Some(ArrowDataType::Float64),
            _ => return ArrowDataType::Utf8,
        };
    }

    inferred.unwrap_or(ArrowDataType::Utf8)
}

fn build_array(table: &DataTable, column: &str, data_type: &ArrowDataType) -> ArrayRef {
    let values = (0..table.len()).map(|row| table.value(row, column));
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();

    match data_type {
        ArrowDataType::Int64 => Arc::new(values.map(DataValue::as_integer).collect::<Int64Array>()),
        ArrowDataType::Float64 => Arc::new(values.map(DataValue::as_float).collect::<Float64Array>()),
        ArrowDataType::Boolean => Arc::new(values.map(DataValue::as_boolean).collect::<BooleanArray>()),
        ArrowDataType::Date32 => Arc::new(
            values
                .map(|v| match v {
                    DataValue::Date(d) => Some((*d - epoch).num_days() as i32),
                    _ => None,
                })
                .collect::<Date32Array>(),
        ),
        ArrowDataType::Timestamp(_, tz) => {
            let array = values
                .map(|v| match v {
                    DataValue::DateTime(dt) => Some(dt.and_utc().timestamp_micros()),
                    DataValue::Timestamp(ts) => Some(ts.timestamp_micros()),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>();
            match tz {
                Some(tz) => Arc::new(array.with_timezone(tz.clone())),
                None => Arc::new(array),
            }
        }
        _ => Arc::new(values.map(DataValue::as_string).collect::<StringArray>()),
    }
}

impl TableEncoder for ParquetEncoder {
    fn encode(&self, table: &DataTable) -> Result<Vec<u8>> {
        let types: Vec<ArrowDataType> = table
            .columns
            .iter()
            .map(|c| infer_column_type(table, c))
            .collect();

        let schema = Arc::new(Schema::new(
            table
                .columns
                .iter()
                .zip(&types)
                .map(|(name, data_type)| Field::new(name, data_type.clone(), true))
                .collect::<Vec<_>>(),
        ));
        debug!(schema = ?schema, "Schema inferido");

        let arrays = table
            .columns
            .iter()
            .zip(&types)
            .map(|(name, data_type)| build_array(table, name, data_type))
            .collect();

        let options = RecordBatchOptions::new().with_row_count(Some(table.len()));
        let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)?;

        let props = WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .build();

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ParquetDecoder;
    use crate::traits::TableDecoder;

    #[test]
    fn test_parquet_round_trip() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let mut table = DataTable::new(["id", "score", "active", "name", "day", "at"]);
        table.push_values([
            DataValue::Integer(1),
            DataValue::Float(9.5),
            DataValue::Boolean(true),
            DataValue::from("Alice"),
            DataValue::Date(day),
            DataValue::DateTime(day.and_hms_opt(8, 30, 0).unwrap()),
        ]);
        table.push_values([
            DataValue::Integer(2),
            DataValue::Null,
            DataValue::Boolean(false),
            DataValue::Null,
            DataValue::Null,
            DataValue::Null,
        ]);

        for compression in [CompressionType::Snappy, CompressionType::Zstd] {
            let bytes = ParquetEncoder::new()
                .with_compression(compression)
                .encode(&table)
                .unwrap();
            let decoded = ParquetDecoder::new().decode(&bytes).unwrap();
            assert_eq!(decoded, table);
        }
    }

    #[test]
    fn test_mixed_numeric_column_becomes_float() {
        let mut table = DataTable::new(["v"]);
        table.push_values([DataValue::Integer(1)]);
        table.push_values([DataValue::Float(1.5)]);
        assert_eq!(infer_column_type(&table, "v"), ArrowDataType::Float64);

        table.push_values([DataValue::from("x")]);
        assert_eq!(infer_column_type(&table, "v"), ArrowDataType::Utf8);
    }

    #[test]
    fn test_empty_table_with_columns() {
        let table = DataTable::new(["a", "b"]);
        let bytes = ParquetEncoder::new().encode(&table).unwrap();
        let decoded = ParquetDecoder::new().decode(&bytes).unwrap();
        assert_eq!(decoded.columns, vec!["a", "b"]);
        assert!(decoded.is_empty());
    }
}
