//! [`KeyValueReader`] sobre aws-sdk-dynamodb

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use crate::error::{ETLError, ExtractError, Result};
use crate::resolver::AwsCredentials;
use crate::traits::KeyValueReader;
use crate::types::{DataRow, DataTable, DataValue};

use super::ScanOptions;

/// Scan paginado de tabelas DynamoDB
#[derive(Debug, Clone, Default)]
pub struct DynamoDbReader {
    endpoint_url: Option<String>,
}

impl DynamoDbReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint alternativo (DynamoDB local)
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    async fn client(&self, credentials: &AwsCredentials) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "etltools",
            ));
        if let Some(url) = &self.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        Client::new(&loader.load().await)
    }
}

/// Converte um atributo DynamoDB em [`DataValue`]
pub fn attribute_value(attr: &AttributeValue) -> DataValue {
    match attr {
        AttributeValue::S(s) => DataValue::String(s.clone()),
        AttributeValue::N(n) => match n.parse::<i64>() {
            Ok(i) => DataValue::Integer(i),
            Err(_) => n
                .parse::<f64>()
                .map(DataValue::Float)
                .unwrap_or_else(|_| DataValue::String(n.clone())),
        },
        AttributeValue::Bool(b) => DataValue::Boolean(*b),
        AttributeValue::Null(_) => DataValue::Null,
        AttributeValue::L(items) => DataValue::Array(items.iter().map(attribute_value).collect()),
        AttributeValue::M(map) => DataValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), attribute_value(v)))
                .collect(),
        ),
        AttributeValue::Ss(items) => {
            DataValue::Array(items.iter().cloned().map(DataValue::String).collect())
        }
        AttributeValue::Ns(items) => DataValue::Array(
            items
                .iter()
                .map(|n| attribute_value(&AttributeValue::N(n.clone())))
                .collect(),
        ),
        AttributeValue::B(blob) => {
            DataValue::String(String::from_utf8_lossy(blob.as_ref()).into_owned())
        }
        _ => DataValue::Null,
    }
}

fn item_row(item: &HashMap<String, AttributeValue>) -> DataRow {
    item.iter()
        .map(|(k, v)| (k.clone(), attribute_value(v)))
        .collect()
}

#[async_trait]
impl KeyValueReader for DynamoDbReader {
    async fn scan(
        &self,
        table: &str,
        credentials: &AwsCredentials,
        options: &ScanOptions,
    ) -> Result<DataTable> {
        let client = self.client(credentials).await;

        let values: Option<HashMap<String, AttributeValue>> = (!options.values.is_empty()).then(|| {
            options
                .values
                .iter()
                .map(|(k, v)| (k.clone(), AttributeValue::S(v.clone())))
                .collect()
        });
        let names = (!options.names.is_empty()).then(|| options.names.clone());

        let mut rows: Vec<DataRow> = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        let mut pages = 0usize;

        loop {
            let output = client
                .scan()
                .table_name(table)
                .set_filter_expression(options.filter_expression.clone())
                .set_projection_expression(options.projection_expression.clone())
                .set_index_name(options.index_name.clone())
                .set_limit(options.limit)
                .set_expression_attribute_values(values.clone())
                .set_expression_attribute_names(names.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    ETLError::Extract(ExtractError::Connection(format!(
                        "DynamoDB {}: {}",
                        table,
                        DisplayErrorContext(&e)
                    )))
                })?;

            pages += 1;
            rows.extend(output.items().iter().map(item_row));
            debug!(table = %table, page = pages, rows = rows.len(), "Página lida");

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        info!(table = %table, pages = pages, rows = rows.len(), "Scan concluído");
        Ok(DataTable::from_rows(rows))
    }
}
