//! Decodificadores: bytes de um arquivo -> [`DataTable`]

pub mod csv;
pub mod excel;
pub mod json;
pub mod parquet;

pub use self::csv::CsvDecoder;
pub use self::excel::ExcelDecoder;
pub use self::json::JsonDecoder;
pub use self::parquet::ParquetDecoder;

use crate::error::{Result, StorageError};
use crate::traits::TableDecoder;
use crate::types::{CsvOptions, DataTable, FileFormat};

/// Decodificador adequado ao formato
pub fn decoder_for(format: FileFormat, csv: &CsvOptions) -> Result<Box<dyn TableDecoder>> {
    match format {
        FileFormat::Csv => Ok(Box::new(CsvDecoder::with_options(csv.clone()))),
        FileFormat::Json => Ok(Box::new(JsonDecoder::new())),
        FileFormat::Parquet => Ok(Box::new(ParquetDecoder::new())),
        FileFormat::Excel => Ok(Box::new(ExcelDecoder::new().with_headers(csv.has_headers))),
        FileFormat::Bytes => Err(StorageError::UnsupportedFormat(format!(
            "{} não é tabular",
            format
        ))
        .into()),
    }
}

/// Decodifica bytes no formato indicado
pub fn decode(format: FileFormat, bytes: &[u8], csv: &CsvOptions) -> Result<DataTable> {
    decoder_for(format, csv)?.decode(bytes)
}
