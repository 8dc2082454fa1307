use crate::error::{ETLError, LoadError, Result};
use crate::traits::TableEncoder;
use crate::types::{CsvOptions, DataTable};

/// Serializador CSV
///
/// Floats mantêm o ponto decimal (`2.0`), nulos viram campo vazio.
#[derive(Debug, Clone, Default)]
pub struct CsvEncoder {
    options: CsvOptions,
}

impl CsvEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.options.has_headers = has_headers;
        self
    }

    /// Escreve uma coluna `index` (0..n) antes das demais
    pub fn with_index(mut self, include_index: bool) -> Self {
        self.options.include_index = include_index;
        self
    }
}

impl TableEncoder for CsvEncoder {
    fn encode(&self, table: &DataTable) -> Result<Vec<u8>> {
        let indexed;
        let table = if self.options.include_index {
            indexed = table.with_index("index");
            &indexed
        } else {
            table
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .from_writer(Vec::new());

        if self.options.has_headers {
            writer.write_record(&table.columns)?;
        }

        for row in 0..table.len() {
            let record = table
                .columns
                .iter()
                .map(|column| table.value(row, column).as_string().unwrap_or_default());
            writer.write_record(record)?;
        }

        writer
            .into_inner()
            .map_err(|e| ETLError::Load(LoadError::WriteError(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataValue;

    fn sample() -> DataTable {
        let mut table = DataTable::new(["id", "price", "name"]);
        table.push_values([DataValue::Integer(1), DataValue::Float(2.0), DataValue::from("a,b")]);
        table.push_values([DataValue::Integer(2), DataValue::Null, DataValue::from("c")]);
        table
    }

    #[test]
    fn test_encode_csv() {
        let bytes = CsvEncoder::new().encode(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "id,price,name\n1,2.0,\"a,b\"\n2,,c\n");
    }

    #[test]
    fn test_encode_csv_with_index_and_delimiter() {
        let bytes = CsvEncoder::new()
            .with_delimiter(b';')
            .with_index(true)
            .encode(&sample())
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("index;id;price;name\n0;1;2.0;a,b\n"));
    }
}
