//! # Parquet Decoder
//!
//! Lê um arquivo Parquet em memória, convertendo as colunas Arrow para
//! [`DataValue`]. Tipos sem conversão direta viram texto.

use arrow::array::{
    Array, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, LargeStringArray, StringArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType as ArrowDataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use bytes::Bytes;
use chrono::NaiveDateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use crate::error::{ETLError, ExtractError, Result};
use crate::traits::TableDecoder;
use crate::types::{DataRow, DataTable, DataValue};

/// Decodificador Parquet
#[derive(Debug, Clone)]
pub struct ParquetDecoder {
    batch_size: usize,
}

impl Default for ParquetDecoder {
    fn default() -> Self {
        Self { batch_size: 8192 }
    }
}

impl ParquetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define o tamanho do batch para leitura
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn convert_batch(batch: &RecordBatch, table: &mut DataTable) -> Result<()> {
        let schema = batch.schema();

        for row_index in 0..batch.num_rows() {
            let mut row = DataRow::with_capacity(schema.fields().len());
            for (col_index, field) in schema.fields().iter().enumerate() {
                let value = arrow_value(batch.column(col_index).as_ref(), row_index)?;
                row.insert(field.name().clone(), value);
            }
            table.rows.push(row);
        }

        Ok(())
    }
}

impl TableDecoder for ParquetDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DataTable> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?;
        let mut table = DataTable::new(builder.schema().fields().iter().map(|f| f.name().clone()));

        let reader = builder.with_batch_size(self.batch_size).build()?;
        for batch in reader {
            Self::convert_batch(&batch?, &mut table)?;
        }

        debug!(rows = table.len(), columns = table.columns.len(), "Parquet decodificado");
        Ok(table)
    }
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        ETLError::Extract(ExtractError::InvalidFormat(format!(
            "coluna Arrow com tipo inesperado: {}",
            array.data_type()
        )))
    })
}

fn datetime_value(dt: Option<NaiveDateTime>, utc: bool) -> DataValue {
    match dt {
        Some(dt) if utc => DataValue::Timestamp(dt.and_utc()),
        Some(dt) => DataValue::DateTime(dt),
        None => DataValue::Null,
    }
}

/// Converte valor Arrow para DataValue
fn arrow_value(array: &dyn Array, index: usize) -> Result<DataValue> {
    if array.is_null(index) {
        return Ok(DataValue::Null);
    }

    let value = match array.data_type() {
        ArrowDataType::Boolean => DataValue::Boolean(downcast::<BooleanArray>(array)?.value(index)),
        ArrowDataType::Int8 => DataValue::Integer(downcast::<Int8Array>(array)?.value(index) as i64),
        ArrowDataType::Int16 => DataValue::Integer(downcast::<Int16Array>(array)?.value(index) as i64),
        ArrowDataType::Int32 => DataValue::Integer(downcast::<Int32Array>(array)?.value(index) as i64),
        ArrowDataType::Int64 => DataValue::Integer(downcast::<Int64Array>(array)?.value(index)),
        ArrowDataType::UInt8 => DataValue::Integer(downcast::<UInt8Array>(array)?.value(index) as i64),
        ArrowDataType::UInt16 => DataValue::Integer(downcast::<UInt16Array>(array)?.value(index) as i64),
        ArrowDataType::UInt32 => DataValue::Integer(downcast::<UInt32Array>(array)?.value(index) as i64),
        ArrowDataType::UInt64 => {
            let v = downcast::<UInt64Array>(array)?.value(index);
            i64::try_from(v)
                .map(DataValue::Integer)
                .unwrap_or_else(|_| DataValue::String(v.to_string()))
        }
        ArrowDataType::Float32 => DataValue::Float(downcast::<Float32Array>(array)?.value(index) as f64),
        ArrowDataType::Float64 => DataValue::Float(downcast::<Float64Array>(array)?.value(index)),
        ArrowDataType::Utf8 => DataValue::String(downcast::<StringArray>(array)?.value(index).to_string()),
        ArrowDataType::LargeUtf8 => {
            DataValue::String(downcast::<LargeStringArray>(array)?.value(index).to_string())
        }
        ArrowDataType::Date32 => downcast::<Date32Array>(array)?
            .value_as_date(index)
            .map(DataValue::Date)
            .unwrap_or(DataValue::Null),
        ArrowDataType::Timestamp(unit, tz) => {
            let utc = tz.is_some();
            let dt = match unit {
                TimeUnit::Second => downcast::<TimestampSecondArray>(array)?.value_as_datetime(index),
                TimeUnit::Millisecond => {
                    downcast::<TimestampMillisecondArray>(array)?.value_as_datetime(index)
                }
                TimeUnit::Microsecond => {
                    downcast::<TimestampMicrosecondArray>(array)?.value_as_datetime(index)
                }
                TimeUnit::Nanosecond => {
                    downcast::<TimestampNanosecondArray>(array)?.value_as_datetime(index)
                }
            };
            datetime_value(dt, utc)
        }
        _ => DataValue::String(array_value_to_string(array, index)?),
    };

    Ok(value)
}
