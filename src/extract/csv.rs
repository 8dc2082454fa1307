use crate::error::Result;
use crate::traits::TableDecoder;
use crate::types::{CsvOptions, DataTable, DataValue};

/// Decodificador de arquivos CSV
#[derive(Debug, Clone, Default)]
pub struct CsvDecoder {
    options: CsvOptions,
}

impl CsvDecoder {
    /// Cria um novo decodificador CSV
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CsvOptions) -> Self {
        Self { options }
    }

    /// Define o delimitador
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    /// Define se tem cabeçalhos
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.options.has_headers = has_headers;
        self
    }

    /// Trata a primeira coluna como índice e a descarta
    pub fn with_index(mut self, include_index: bool) -> Self {
        self.options.include_index = include_index;
        self
    }
}

impl TableDecoder for CsvDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DataTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(self.options.has_headers)
            .from_reader(bytes);

        let skip = usize::from(self.options.include_index);
        let mut table = if self.options.has_headers {
            let headers = reader.headers()?;
            DataTable::new(headers.iter().skip(skip).map(str::to_string))
        } else {
            DataTable::default()
        };

        for result in reader.records() {
            let record = result?;

            if !self.options.has_headers && table.columns.is_empty() {
                table.columns = (0..record.len().saturating_sub(skip))
                    .map(|i| format!("column_{}", i))
                    .collect();
            }

            table.push_values(record.iter().skip(skip).map(DataValue::infer));
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_headers() {
        let data = b"id,name,score\n1,Alice,9.5\n2,Bob,\n";
        let table = CsvDecoder::new().decode(data).unwrap();

        assert_eq!(table.columns, vec!["id", "name", "score"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "score"), &DataValue::Float(9.5));
        assert_eq!(table.value(1, "score"), &DataValue::Null);
    }

    #[test]
    fn test_decode_custom_delimiter_and_index() {
        let data = b"index;id;city\n0;1;\"Rio; RJ\"\n";
        let table = CsvDecoder::new()
            .with_delimiter(b';')
            .with_index(true)
            .decode(data)
            .unwrap();

        assert_eq!(table.columns, vec!["id", "city"]);
        assert_eq!(table.value(0, "city"), &DataValue::from("Rio; RJ"));
    }

    #[test]
    fn test_decode_without_headers() {
        let table = CsvDecoder::new()
            .with_headers(false)
            .decode(b"1,a\n2,b\n")
            .unwrap();

        assert_eq!(table.columns, vec!["column_0", "column_1"]);
        assert_eq!(table.value(1, "column_1"), &DataValue::from("b"));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let data = b"id,name\n1,\xff\xfe\n";
        assert!(CsvDecoder::new().decode(data).is_err());
    }
}
