//! # etltools - Utilitários ETL dirigidos por configuração
//!
//! Move dados tabulares e semiestruturados entre bancos relacionais,
//! DynamoDB e a nuvem (buckets GCS/S3, BigQuery e Cloud SQL). Cada operação
//! é uma chamada parametrizada a uma biblioteca cliente, com resolução de
//! credenciais, templates explícitos e log estruturado.
//!
//! ## Características Principais
//!
//! - **Orquestrador**: fases download, delete, truncate e upload a partir de um [`EdlConfig`]
//! - **Relacional**: Postgres, MySQL, SQLite e Redshift (staging S3 + `COPY`) via sqlx
//! - **Object storage**: CSV, JSON, Parquet, Excel e bytes em `gs://` e `s3://`
//! - **GCP**: export/load no BigQuery e import/export no Cloud SQL com polling
//! - **Execução local**: logs de execução, tempo e erro; scripts de shell; map paralelo
//!
//! ## Exemplo Rápido
//!
//! ```rust,no_run
//! use etltools::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = EdlConfig::from_file("edl.toml")?;
//!     let connections = Connections::from_dotenv(".env")?;
//!
//!     let mut edl = ExtractDeleteAndLoad::builder()
//!         .config(config)
//!         .connections(connections)
//!         .build()?;
//!
//!     let vars = TemplateVars::new();
//!     edl.read_data(&vars).await?;
//!     edl.delete_data(&vars).await?;
//!
//!     let data = edl.take_raw_data();
//!     edl.upload_data(&data).await?.into_result()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod extract;
pub mod gcp;
pub mod kv;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod release;
pub mod resolver;
pub mod retry;
pub mod sql;
pub mod storage;
pub mod template;
pub mod traits;
pub mod types;

// Re-exports para facilitar o uso
pub use config::{Connections, ETLConfig, EdlConfig};
pub use error::{ETLError, Result};
pub use events::{InMemoryEventEmitter, LoggingEventEmitter};
pub use pipeline::{ExtractDeleteAndLoad, TemplateVars};
pub use traits::*;
pub use types::{DataRow, DataTable, DataValue, EdlEvent, FileFormat, Phase, PhaseReport};

/// Prelude com imports mais comuns
pub mod prelude {
    pub use crate::config::{Connections, ETLConfig, EdlConfig};
    pub use crate::error::{ETLError, Result};
    pub use crate::events::{InMemoryEventEmitter, LoggingEventEmitter};
    pub use crate::pipeline::{ExtractDeleteAndLoad, TemplateVars};
    pub use crate::storage::{InMemoryStoreProvider, ObjectStorage};
    pub use crate::template::{DateExpr, TemplateContext};
    pub use crate::traits::{EventEmitter, KeyValueReader, SqlClient, TableDecoder, TableEncoder};
    pub use crate::types::{CsvOptions, DataRow, DataTable, DataValue, FileFormat, Phase, PhaseReport};

    pub use crate::kv::DynamoDbReader;
    pub use crate::sql::SqlxClient;
}

/// Informações sobre a versão da biblioteca
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Informações sobre a biblioteca
pub fn about() -> &'static str {
    env!("CARGO_PKG_DESCRIPTION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_about() {
        assert!(!about().is_empty());
    }
}
