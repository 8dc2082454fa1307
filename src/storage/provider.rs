//! Criação dos clientes `object_store` por esquema e bucket

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use tracing::debug;

use crate::error::{ETLError, Result};
use crate::resolver::AwsCredentials;

use super::path::{ObjectUri, StorageScheme};

/// Fornece o `ObjectStore` de um bucket
pub trait StoreProvider: Send + Sync {
    fn store(&self, uri: &ObjectUri) -> Result<Arc<dyn ObjectStore>>;
}

/// GCS e S3 reais
///
/// GCS usa as credenciais do ambiente (`GOOGLE_APPLICATION_CREDENTIALS`, ...).
/// S3 usa as credenciais explícitas quando presentes, senão o ambiente.
#[derive(Debug, Clone, Default)]
pub struct CloudStoreProvider {
    aws: Option<AwsCredentials>,
}

impl CloudStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aws_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.aws = Some(credentials);
        self
    }
}

impl StoreProvider for CloudStoreProvider {
    fn store(&self, uri: &ObjectUri) -> Result<Arc<dyn ObjectStore>> {
        debug!(scheme = ?uri.scheme, bucket = %uri.bucket, "Criando cliente de object storage");

        match uri.scheme {
            StorageScheme::Gcs => {
                let store = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(&uri.bucket)
                    .build()?;
                Ok(Arc::new(store))
            }
            StorageScheme::S3 => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(&uri.bucket);
                if let Some(ref aws) = self.aws {
                    builder = builder
                        .with_access_key_id(&aws.access_key_id)
                        .with_secret_access_key(&aws.secret_access_key)
                        .with_region(&aws.region);
                }
                Ok(Arc::new(builder.build()?))
            }
        }
    }
}

/// Buckets em memória, um `InMemory` por (esquema, bucket)
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreProvider {
    buckets: Arc<Mutex<HashMap<(StorageScheme, String), Arc<InMemory>>>>,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for InMemoryStoreProvider {
    fn store(&self, uri: &ObjectUri) -> Result<Arc<dyn ObjectStore>> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| ETLError::Generic(anyhow::anyhow!("mutex de buckets envenenado")))?;

        let store: Arc<dyn ObjectStore> = buckets
            .entry((uri.scheme, uri.bucket.clone()))
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();

        Ok(store)
    }
}
