use std::fmt;

use serde::Serialize;

use crate::error::{Result, StorageError};

/// Esquema de object storage aceito
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScheme {
    Gcs,
    S3,
}

impl StorageScheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            StorageScheme::Gcs => "gs://",
            StorageScheme::S3 => "s3://",
        }
    }
}

/// URI `scheme://bucket/chave` já decomposta
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectUri {
    pub scheme: StorageScheme,
    pub bucket: String,
    pub key: String,
}

impl ObjectUri {
    /// Decompõe a URI. Sem chave após o bucket, usa `default_name`.
    ///
    /// ```rust
    /// use etltools::storage::ObjectUri;
    ///
    /// let uri = ObjectUri::parse("gs://bucket/a/b.csv", "file.csv").unwrap();
    /// assert_eq!(uri.bucket, "bucket");
    /// assert_eq!(uri.key, "a/b.csv");
    /// ```
    pub fn parse(uri: &str, default_name: &str) -> Result<Self> {
        let (scheme, rest) = if let Some(rest) = uri.strip_prefix("gs://") {
            (StorageScheme::Gcs, rest)
        } else if let Some(rest) = uri.strip_prefix("s3://") {
            (StorageScheme::S3, rest)
        } else {
            return Err(StorageError::InvalidPath {
                path: uri.to_string(),
                expected: "gs://' ou 's3://".to_string(),
            }
            .into());
        };

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key.trim_start_matches('/')),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(StorageError::InvalidPath {
                path: uri.to_string(),
                expected: format!("{}<bucket>", scheme.prefix()),
            }
            .into());
        }

        let key = if key.is_empty() { default_name } else { key };

        Ok(Self {
            scheme,
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Exige um esquema específico
    pub fn parse_with_scheme(uri: &str, scheme: StorageScheme, default_name: &str) -> Result<Self> {
        if !uri.starts_with(scheme.prefix()) {
            return Err(StorageError::InvalidPath {
                path: uri.to_string(),
                expected: scheme.prefix().to_string(),
            }
            .into());
        }
        Self::parse(uri, default_name)
    }

    pub fn location(&self) -> object_store::path::Path {
        object_store::path::Path::from(self.key.as_str())
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", self.scheme.prefix(), self.bucket, self.key)
    }
}
