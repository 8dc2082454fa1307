//! # JSON Decoder
//!
//! Lê uma lista de objetos (`[{...}, {...}]`) ou JSON Lines, preservando a
//! ordem das chaves como ordem de colunas.

use crate::error::{ETLError, ExtractError, Result};
use crate::traits::TableDecoder;
use crate::types::{DataRow, DataTable, DataValue};

/// Decodificador de registros JSON
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    pub fn new() -> Self {
        Self
    }

    fn parse_records(bytes: &[u8]) -> Result<Vec<serde_json::Value>> {
        match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(serde_json::Value::Array(items)) => Ok(items),
            Ok(object @ serde_json::Value::Object(_)) => Ok(vec![object]),
            Ok(other) => Err(ETLError::Extract(ExtractError::InvalidFormat(format!(
                "esperada lista de objetos JSON, encontrado: {}",
                other
            )))),
            Err(_) => {
                // JSON Lines: um objeto por linha
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    ETLError::Extract(ExtractError::InvalidFormat(format!("UTF-8 inválido: {}", e)))
                })?;
                text.lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| serde_json::from_str(line).map_err(ETLError::from))
                    .collect()
            }
        }
    }
}

impl TableDecoder for JsonDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DataTable> {
        let mut table = DataTable::default();

        for record in Self::parse_records(bytes)? {
            let serde_json::Value::Object(object) = record else {
                return Err(ETLError::Extract(ExtractError::ParseError(
                    "registro JSON não é um objeto".to_string(),
                )));
            };

            let mut row = DataRow::with_capacity(object.len());
            for (key, value) in &object {
                if !table.columns.contains(key) {
                    table.columns.push(key.clone());
                }
                row.insert(key.clone(), DataValue::from_json(value));
            }
            table.rows.push(row);
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_array_preserves_key_order() {
        let data = br#"[{"z": 1, "a": "x"}, {"z": 2, "a": null, "m": true}]"#;
        let table = JsonDecoder::new().decode(data).unwrap();

        assert_eq!(table.columns, vec!["z", "a", "m"]);
        assert_eq!(table.value(1, "a"), &DataValue::Null);
        assert_eq!(table.value(0, "m"), &DataValue::Null);
        assert_eq!(table.value(1, "m"), &DataValue::Boolean(true));
    }

    #[test]
    fn test_decode_json_lines() {
        let data = b"{\"id\": 1}\n\n{\"id\": 2}\n";
        let table = JsonDecoder::new().decode(data).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, "id"), &DataValue::Integer(2));
    }

    #[test]
    fn test_decode_rejects_scalars() {
        assert!(JsonDecoder::new().decode(b"[1, 2]").is_err());
        assert!(JsonDecoder::new().decode(b"42").is_err());
    }
}
