//! Import/export de instâncias Cloud SQL pela Admin API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::config::GcpConfig;
use crate::error::{ConfigError, ETLError, GcpError, Result};
use crate::storage::{ObjectUri, StorageScheme};

use super::{access_token, json_response, poll_until, PollSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlFileType {
    #[default]
    Sql,
    Csv,
}

impl SqlFileType {
    fn as_str(&self) -> &'static str {
        match self {
            SqlFileType::Sql => "SQL",
            SqlFileType::Csv => "CSV",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            SqlFileType::Sql => "file.sql",
            SqlFileType::Csv => "file.csv",
        }
    }
}

/// Import de um arquivo do bucket para um banco da instância
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub project: String,
    pub instance: String,
    pub uri: String,
    pub database: String,
    #[serde(default)]
    pub file_type: SqlFileType,
    /// Obrigatório para CSV
    pub table: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl ImportRequest {
    fn body(&self) -> Result<Value> {
        let uri = ObjectUri::parse_with_scheme(&self.uri, StorageScheme::Gcs, self.file_type.default_name())?;
        let mut context = json!({
            "fileType": self.file_type.as_str(),
            "uri": uri.to_string(),
            "database": self.database,
        });

        if self.file_type == SqlFileType::Csv {
            let table = self.table.as_deref().ok_or_else(|| {
                ETLError::Config(ConfigError::MissingRequiredParameter("table (import CSV)".to_string()))
            })?;
            context["csvImportOptions"] = json!({ "table": table, "columns": self.columns });
        }

        Ok(json!({ "importContext": context }))
    }
}

/// Export de um banco da instância para o bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub project: String,
    pub instance: String,
    pub uri: String,
    pub database: String,
    #[serde(default)]
    pub file_type: SqlFileType,
    /// Obrigatório para CSV
    pub select_query: Option<String>,
}

impl ExportRequest {
    fn body(&self) -> Result<Value> {
        let uri = ObjectUri::parse_with_scheme(&self.uri, StorageScheme::Gcs, self.file_type.default_name())?;
        let mut context = json!({
            "fileType": self.file_type.as_str(),
            "uri": uri.to_string(),
            "databases": [self.database],
        });

        if self.file_type == SqlFileType::Csv {
            let query = self.select_query.as_deref().ok_or_else(|| {
                ETLError::Config(ConfigError::MissingRequiredParameter(
                    "select_query (export CSV)".to_string(),
                ))
            })?;
            context["csvExportOptions"] = json!({ "selectQuery": query });
        }

        Ok(json!({ "exportContext": context }))
    }
}

/// Recurso `Operation` da Admin API
#[derive(Debug, Clone, PartialEq)]
pub struct OperationHandle {
    pub name: String,
    pub status: String,
    pub error: Option<Value>,
}

impl OperationHandle {
    pub fn from_resource(resource: &Value) -> Result<Self> {
        let name = resource["name"]
            .as_str()
            .ok_or_else(|| GcpError::UnexpectedResponse(format!("operação sem name: {}", resource)))?;

        Ok(Self {
            name: name.to_string(),
            status: resource["status"].as_str().unwrap_or("PENDING").to_string(),
            error: resource.get("error").cloned(),
        })
    }

    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Running,
    Completed,
}

/// Resumo de um import/export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub operation: String,
    pub kind: String,
    pub instance: String,
    pub database: String,
    pub uri: String,
    pub file_type: SqlFileType,
    pub status: OperationStatus,
}

#[async_trait]
pub trait SqlAdminApi: Send + Sync {
    async fn import(&self, project: &str, instance: &str, body: Value) -> Result<OperationHandle>;

    async fn export(&self, project: &str, instance: &str, body: Value) -> Result<OperationHandle>;

    async fn get_operation(&self, project: &str, operation: &str) -> Result<OperationHandle>;
}

/// Cliente REST da Cloud SQL Admin API
#[derive(Debug, Clone)]
pub struct CloudSqlRestClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl CloudSqlRestClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &GcpConfig) -> Result<Self> {
        Ok(Self::new(config.sqladmin_endpoint.clone(), access_token(config)?))
    }

    async fn post(&self, url: String, body: Value) -> Result<OperationHandle> {
        let response = self.http.post(url).bearer_auth(&self.token).json(&body).send().await?;
        OperationHandle::from_resource(&json_response(response).await?)
    }
}

#[async_trait]
impl SqlAdminApi for CloudSqlRestClient {
    async fn import(&self, project: &str, instance: &str, body: Value) -> Result<OperationHandle> {
        self.post(
            format!("{}/projects/{}/instances/{}/import", self.endpoint, project, instance),
            body,
        )
        .await
    }

    async fn export(&self, project: &str, instance: &str, body: Value) -> Result<OperationHandle> {
        self.post(
            format!("{}/projects/{}/instances/{}/export", self.endpoint, project, instance),
            body,
        )
        .await
    }

    async fn get_operation(&self, project: &str, operation: &str) -> Result<OperationHandle> {
        let response = self
            .http
            .get(format!("{}/projects/{}/operations/{}", self.endpoint, project, operation))
            .bearer_auth(&self.token)
            .send()
            .await?;
        OperationHandle::from_resource(&json_response(response).await?)
    }
}

async fn wait_operation<A: SqlAdminApi + ?Sized>(
    api: &A,
    project: &str,
    submitted: OperationHandle,
    poll: &PollSettings,
) -> Result<OperationHandle> {
    let name = submitted.name.clone();
    let done = if submitted.is_done() {
        submitted
    } else {
        poll_until(&name, poll, || async {
            let operation = api.get_operation(project, &name).await?;
            info!(operation = %operation.name, status = %operation.status, "Aguardando operação Cloud SQL");
            Ok(operation.is_done().then_some(operation))
        })
        .await?
    };

    if let Some(error) = done.error.clone() {
        return Err(GcpError::OperationFailed {
            operation: done.name,
            payload: error,
        }
        .into());
    }
    Ok(done)
}

/// Importa um arquivo SQL/CSV do bucket; com `wait` aguarda a conclusão
pub async fn import_data<A: SqlAdminApi + ?Sized>(
    api: &A,
    request: &ImportRequest,
    wait: bool,
    poll: &PollSettings,
) -> Result<OperationReport> {
    let body = request.body()?;
    let submitted = api.import(&request.project, &request.instance, body).await?;
    info!(
        operation = %submitted.name,
        instance = %request.instance,
        uri = %request.uri,
        "Import Cloud SQL submetido"
    );

    let (operation, status) = if wait {
        let done = wait_operation(api, &request.project, submitted, poll).await?;
        (done.name, OperationStatus::Completed)
    } else {
        (submitted.name, OperationStatus::Running)
    };

    Ok(OperationReport {
        operation,
        kind: "import".to_string(),
        instance: request.instance.clone(),
        database: request.database.clone(),
        uri: request.uri.clone(),
        file_type: request.file_type,
        status,
    })
}

/// Exporta um banco (ou consulta, em CSV) para o bucket
pub async fn export_data<A: SqlAdminApi + ?Sized>(
    api: &A,
    request: &ExportRequest,
    wait: bool,
    poll: &PollSettings,
) -> Result<OperationReport> {
    let body = request.body()?;
    let submitted = api.export(&request.project, &request.instance, body).await?;
    info!(
        operation = %submitted.name,
        instance = %request.instance,
        uri = %request.uri,
        "Export Cloud SQL submetido"
    );

    let (operation, status) = if wait {
        let done = wait_operation(api, &request.project, submitted, poll).await?;
        (done.name, OperationStatus::Completed)
    } else {
        (submitted.name, OperationStatus::Running)
    };

    Ok(OperationReport {
        operation,
        kind: "export".to_string(),
        instance: request.instance.clone(),
        database: request.database.clone(),
        uri: request.uri.clone(),
        file_type: request.file_type,
        status,
    })
}
