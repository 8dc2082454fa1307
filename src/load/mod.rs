//! Serializadores: [`DataTable`] -> bytes de um arquivo

pub mod csv;
pub mod excel;
pub mod json;
pub mod parquet;

pub use self::csv::CsvEncoder;
pub use self::excel::ExcelEncoder;
pub use self::json::JsonEncoder;
pub use self::parquet::{CompressionType, ParquetEncoder};

use crate::error::{Result, StorageError};
use crate::traits::TableEncoder;
use crate::types::{CsvOptions, DataTable, FileFormat};

/// Serializador adequado ao formato
pub fn encoder_for(format: FileFormat, csv: &CsvOptions) -> Result<Box<dyn TableEncoder>> {
    match format {
        FileFormat::Csv => Ok(Box::new(CsvEncoder::with_options(csv.clone()))),
        FileFormat::Json => Ok(Box::new(JsonEncoder::new())),
        FileFormat::Parquet => Ok(Box::new(ParquetEncoder::new())),
        FileFormat::Excel => Ok(Box::new(ExcelEncoder::new().with_headers(csv.has_headers))),
        FileFormat::Bytes => Err(StorageError::UnsupportedFormat(format!(
            "{} não é tabular",
            format
        ))
        .into()),
    }
}

/// Serializa a tabela no formato indicado
pub fn encode(format: FileFormat, table: &DataTable, csv: &CsvOptions) -> Result<Vec<u8>> {
    encoder_for(format, csv)?.encode(table)
}
