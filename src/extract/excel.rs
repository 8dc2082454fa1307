//! Leitura da primeira planilha de um arquivo Excel (feature `excel`)

use crate::error::Result;
use crate::traits::TableDecoder;
use crate::types::DataTable;

#[cfg(feature = "excel")]
use {
    crate::error::{ETLError, ExtractError},
    crate::types::DataValue,
    calamine::{open_workbook_auto_from_rs, Data, Reader},
    std::io::Cursor,
};

/// Decodificador de planilhas (.xlsx/.xls)
#[derive(Debug, Clone)]
pub struct ExcelDecoder {
    has_headers: bool,
}

impl Default for ExcelDecoder {
    fn default() -> Self {
        Self { has_headers: true }
    }
}

impl ExcelDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }
}

#[cfg(feature = "excel")]
fn cell_value(cell: &Data) -> DataValue {
    match cell {
        Data::Empty | Data::Error(_) => DataValue::Null,
        Data::Bool(b) => DataValue::Boolean(*b),
        Data::Int(i) => DataValue::Integer(*i),
        // Números inteiros gravados como f64 voltam como inteiros
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            DataValue::Integer(*f as i64)
        }
        Data::Float(f) => DataValue::Float(*f),
        Data::String(s) => DataValue::infer(s),
        Data::DateTime(dt) => DataValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => DataValue::String(s.clone()),
    }
}

#[cfg(feature = "excel")]
impl TableDecoder for ExcelDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DataTable> {
        let invalid = |e: String| ETLError::Extract(ExtractError::InvalidFormat(format!("Excel: {}", e)));

        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| invalid(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| invalid("planilha vazia".to_string()))?
            .map_err(|e| invalid(e.to_string()))?;

        let mut rows = range.rows();
        let mut table = if self.has_headers {
            match rows.next() {
                Some(header) => DataTable::new(header.iter().map(|c| c.to_string())),
                None => return Ok(DataTable::default()),
            }
        } else {
            DataTable::new((0..range.width()).map(|i| format!("column_{}", i)))
        };

        for row in rows {
            table.push_values(row.iter().map(cell_value));
        }

        Ok(table)
    }
}

#[cfg(not(feature = "excel"))]
impl TableDecoder for ExcelDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<DataTable> {
        Err(crate::error::ETLError::Config(
            crate::error::ConfigError::InvalidConfig(
                "Feature 'excel' requerida para ExcelDecoder".to_string(),
            ),
        ))
    }
}

