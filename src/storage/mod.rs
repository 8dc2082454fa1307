//! # Object storage
//!
//! Upload e download de tabelas, JSON e bytes em buckets GCS (`gs://`) ou S3
//! (`s3://`) sobre `object_store`. A URI é validada antes de qualquer acesso
//! à rede; um caminho só com o bucket usa o nome padrão do formato
//! (`file.csv`, `file.json`, ...).
//!
//! ```rust
//! use std::sync::Arc;
//! use etltools::storage::{InMemoryStoreProvider, ObjectStorage};
//! use etltools::types::{CsvOptions, DataTable, DataValue};
//!
//! # async fn exemplo() -> etltools::Result<()> {
//! let storage = ObjectStorage::new(Arc::new(InMemoryStoreProvider::new()));
//!
//! let mut table = DataTable::new(["id"]);
//! table.push_values([DataValue::Integer(1)]);
//!
//! storage.upload_table(&table, "gs://bucket/dados/ids.csv", None, &CsvOptions::default()).await?;
//! let lido = storage.read_table("gs://bucket/dados/ids.csv", None, &CsvOptions::default()).await?;
//! assert_eq!(lido, table);
//! # Ok(())
//! # }
//! ```

pub mod path;
pub mod provider;

pub use path::{ObjectUri, StorageScheme};
pub use provider::{CloudStoreProvider, InMemoryStoreProvider, StoreProvider};

use std::sync::Arc;

use bytes::Bytes;
use object_store::{Attribute, Attributes, PutOptions, PutPayload};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{CsvOptions, DataTable, FileFormat};

/// Situação de uma transferência
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Uploaded,
    Downloaded,
    Deleted,
}

/// Resumo informativo de uma transferência
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub uri: String,
    pub bucket: String,
    pub key: String,
    pub format: FileFormat,
    pub bytes: u64,
    pub status: TransferStatus,
}

impl TransferReport {
    fn new(uri: &ObjectUri, format: FileFormat, bytes: u64, status: TransferStatus) -> Self {
        Self {
            uri: uri.to_string(),
            bucket: uri.bucket.clone(),
            key: uri.key.clone(),
            format,
            bytes,
            status,
        }
    }
}

/// Operações de alto nível sobre buckets
#[derive(Clone)]
pub struct ObjectStorage {
    provider: Arc<dyn StoreProvider>,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage").finish_non_exhaustive()
    }
}

impl Default for ObjectStorage {
    fn default() -> Self {
        Self::new(Arc::new(CloudStoreProvider::new()))
    }
}

impl ObjectStorage {
    pub fn new(provider: Arc<dyn StoreProvider>) -> Self {
        Self { provider }
    }

    /// Formato explícito ou inferido pela extensão
    fn resolve(uri: &str, format: Option<FileFormat>) -> Result<(ObjectUri, FileFormat)> {
        let format = format.unwrap_or_else(|| FileFormat::from_path(uri));
        let parsed = ObjectUri::parse(uri, format.placeholder_name())?;
        Ok((parsed, format))
    }

    async fn put(&self, uri: &ObjectUri, format: FileFormat, payload: Bytes) -> Result<TransferReport> {
        let store = self.provider.store(uri)?;
        let size = payload.len() as u64;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, format.content_type().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        store
            .put_opts(&uri.location(), PutPayload::from(payload), options)
            .await?;

        info!(uri = %uri, format = %format, bytes = size, "Objeto enviado");
        Ok(TransferReport::new(uri, format, size, TransferStatus::Uploaded))
    }

    async fn get(&self, uri: &ObjectUri) -> Result<Bytes> {
        let store = self.provider.store(uri)?;
        let bytes = store.get(&uri.location()).await?.bytes().await?;
        debug!(uri = %uri, bytes = bytes.len(), "Objeto lido");
        Ok(bytes)
    }

    /// Serializa a tabela e envia
    pub async fn upload_table(
        &self,
        table: &DataTable,
        uri: &str,
        format: Option<FileFormat>,
        csv: &CsvOptions,
    ) -> Result<TransferReport> {
        let (uri, format) = Self::resolve(uri, format)?;
        let bytes = crate::load::encode(format, table, csv)?;
        self.put(&uri, format, Bytes::from(bytes)).await
    }

    /// Baixa e decodifica uma tabela
    pub async fn read_table(
        &self,
        uri: &str,
        format: Option<FileFormat>,
        csv: &CsvOptions,
    ) -> Result<DataTable> {
        let (uri, format) = Self::resolve(uri, format)?;
        let bytes = self.get(&uri).await?;
        crate::extract::decode(format, &bytes, csv)
    }

    /// Envia um valor JSON arbitrário
    pub async fn upload_json(&self, value: &serde_json::Value, uri: &str) -> Result<TransferReport> {
        let (uri, _) = Self::resolve(uri, Some(FileFormat::Json))?;
        let bytes = serde_json::to_vec(value)?;
        self.put(&uri, FileFormat::Json, Bytes::from(bytes)).await
    }

    pub async fn read_json(&self, uri: &str) -> Result<serde_json::Value> {
        let (uri, _) = Self::resolve(uri, Some(FileFormat::Json))?;
        let bytes = self.get(&uri).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn upload_bytes(
        &self,
        bytes: impl Into<Bytes>,
        uri: &str,
        format: Option<FileFormat>,
    ) -> Result<TransferReport> {
        let (uri, format) = Self::resolve(uri, format)?;
        self.put(&uri, format, bytes.into()).await
    }

    pub async fn read_bytes(&self, uri: &str) -> Result<Bytes> {
        let (uri, _) = Self::resolve(uri, Some(FileFormat::Bytes))?;
        self.get(&uri).await
    }

    pub async fn delete(&self, uri: &str) -> Result<TransferReport> {
        let (uri, format) = Self::resolve(uri, None)?;
        let store = self.provider.store(&uri)?;
        store.delete(&uri.location()).await?;

        info!(uri = %uri, "Objeto removido");
        Ok(TransferReport::new(&uri, format, 0, TransferStatus::Deleted))
    }
}
