//! # JSON Encoder
//!
//! Serializa a tabela como lista de registros, com as chaves na ordem das colunas.

use crate::error::Result;
use crate::traits::TableEncoder;
use crate::types::DataTable;

/// Serializador de registros JSON
///
/// ```rust
/// use etltools::load::JsonEncoder;
/// use etltools::traits::TableEncoder;
/// use etltools::types::{DataTable, DataValue};
///
/// let mut table = DataTable::new(["id"]);
/// table.push_values([DataValue::Integer(1)]);
///
/// let bytes = JsonEncoder::new().encode(&table).unwrap();
/// assert_eq!(bytes, br#"[{"id":1}]"#);
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    pretty: bool,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define se deve usar formatação pretty-print
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Converte a tabela em `serde_json::Value`
    pub fn to_value(table: &DataTable) -> serde_json::Value {
        let records = (0..table.len())
            .map(|row| {
                let object = table
                    .columns
                    .iter()
                    .map(|column| (column.clone(), table.value(row, column).to_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();

        serde_json::Value::Array(records)
    }
}

impl TableEncoder for JsonEncoder {
    fn encode(&self, table: &DataTable) -> Result<Vec<u8>> {
        let value = Self::to_value(table);
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&value)?
        } else {
            serde_json::to_vec(&value)?
        };
        Ok(bytes)
    }
}
