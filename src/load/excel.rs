//! Escrita de planilhas .xlsx (feature `excel`)

use crate::error::Result;
use crate::traits::TableEncoder;
use crate::types::DataTable;

#[cfg(feature = "excel")]
use {
    crate::error::{ETLError, LoadError},
    crate::types::DataValue,
    rust_xlsxwriter::{Workbook, XlsxError},
};

/// Serializador de planilhas
#[derive(Debug, Clone)]
pub struct ExcelEncoder {
    sheet_name: String,
    has_headers: bool,
}

impl Default for ExcelEncoder {
    fn default() -> Self {
        Self {
            sheet_name: "Sheet1".to_string(),
            has_headers: true,
        }
    }
}

impl ExcelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }
}

#[cfg(feature = "excel")]
fn write_error(err: XlsxError) -> ETLError {
    ETLError::Load(LoadError::WriteError(format!("Excel: {}", err)))
}

#[cfg(feature = "excel")]
impl TableEncoder for ExcelEncoder {
    fn encode(&self, table: &DataTable) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name).map_err(write_error)?;

        let mut row_offset = 0u32;
        if self.has_headers {
            for (col, name) in table.columns.iter().enumerate() {
                worksheet.write_string(0, col as u16, name).map_err(write_error)?;
            }
            row_offset = 1;
        }

        for row in 0..table.len() {
            let excel_row = row as u32 + row_offset;
            for (col, name) in table.columns.iter().enumerate() {
                let col = col as u16;
                match table.value(row, name) {
                    DataValue::Null => {}
                    DataValue::Integer(i) => {
                        worksheet.write_number(excel_row, col, *i as f64).map_err(write_error)?;
                    }
                    DataValue::Float(f) => {
                        worksheet.write_number(excel_row, col, *f).map_err(write_error)?;
                    }
                    DataValue::Boolean(b) => {
                        worksheet.write_boolean(excel_row, col, *b).map_err(write_error)?;
                    }
                    other => {
                        let text = other.as_string().unwrap_or_default();
                        worksheet.write_string(excel_row, col, &text).map_err(write_error)?;
                    }
                }
            }
        }

        workbook.save_to_buffer().map_err(write_error)
    }
}

#[cfg(not(feature = "excel"))]
impl TableEncoder for ExcelEncoder {
    fn encode(&self, _table: &DataTable) -> Result<Vec<u8>> {
        Err(crate::error::ETLError::Config(
            crate::error::ConfigError::InvalidConfig(
                "Feature 'excel' requerida para ExcelEncoder".to_string(),
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExcelDecoder;
    use crate::traits::TableDecoder;

    #[cfg(feature = "excel")]
    #[test]
    fn test_excel_round_trip() {
        use crate::types::DataValue;

        let mut table = DataTable::new(["id", "score", "name", "ok"]);
        table.push_values([
            DataValue::Integer(1),
            DataValue::Float(9.5),
            DataValue::from("Alice"),
            DataValue::Boolean(true),
        ]);
        table.push_values([
            DataValue::Integer(2),
            DataValue::Float(7.25),
            DataValue::from("Bob"),
            DataValue::Boolean(false),
        ]);

        let bytes = ExcelEncoder::new().encode(&table).unwrap();
        let decoded = ExcelDecoder::new().decode(&bytes).unwrap();
        assert_eq!(decoded, table);
    }

    #[cfg(not(feature = "excel"))]
    #[test]
    fn test_excel_requires_feature() {
        let table = DataTable::new(["id"]);
        assert!(ExcelEncoder::new().encode(&table).is_err());
        assert!(ExcelDecoder::new().decode(b"").is_err());
    }
}
