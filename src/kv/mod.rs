//! Leitura em massa de key-value stores (DynamoDB)

pub mod dynamodb;

pub use dynamodb::DynamoDbReader;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{ConfigError, ETLError, Result};

/// Parâmetros opcionais de um scan
///
/// Montado a partir dos `kwargs` já renderizados de uma entrada de download:
/// chaves iniciadas por `:` viram valores de expressão, por `#` viram nomes de
/// atributo; as demais precisam ser uma das opções conhecidas.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanOptions {
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub index_name: Option<String>,
    pub limit: Option<i32>,
    pub values: HashMap<String, String>,
    pub names: HashMap<String, String>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_kwargs(kwargs: &BTreeMap<String, String>) -> Result<Self> {
        let mut options = Self::default();

        for (key, value) in kwargs {
            if key.starts_with(':') {
                options.values.insert(key.clone(), value.clone());
                continue;
            }
            if key.starts_with('#') {
                options.names.insert(key.clone(), value.clone());
                continue;
            }

            match key.as_str() {
                "filter_expression" => options.filter_expression = Some(value.clone()),
                "projection_expression" => options.projection_expression = Some(value.clone()),
                "index_name" => options.index_name = Some(value.clone()),
                "limit" => {
                    let limit = value.parse::<i32>().map_err(|_| {
                        ETLError::Config(ConfigError::InvalidValue {
                            param: "limit".to_string(),
                            value: value.clone(),
                        })
                    })?;
                    options.limit = Some(limit);
                }
                other => {
                    return Err(ETLError::Config(ConfigError::InvalidValue {
                        param: "kwargs".to_string(),
                        value: other.to_string(),
                    }))
                }
            }
        }

        Ok(options)
    }

    pub fn with_filter(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    pub fn with_value(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(placeholder.into(), value.into());
        self
    }

    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(placeholder.into(), name.into());
        self
    }
}
