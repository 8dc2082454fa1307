//! Export e load de tabelas BigQuery via jobs assíncronos

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::config::GcpConfig;
use crate::error::{ConfigError, ETLError, GcpError, Result, StorageError};
use crate::storage::{ObjectUri, StorageScheme};
use crate::types::FileFormat;

use super::{access_token, json_response, poll_until, PollSettings};

/// Tabela no formato `projeto.dataset.tabela`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn parse(table: &str) -> Result<Self> {
        let parts: Vec<&str> = table.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table] if parts.iter().all(|p| !p.is_empty()) => Ok(Self {
                project_id: project.to_string(),
                dataset_id: dataset.to_string(),
                table_id: table.to_string(),
            }),
            _ => Err(ETLError::Config(ConfigError::InvalidValue {
                param: "table".to_string(),
                value: table.to_string(),
            })),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "projectId": self.project_id,
            "datasetId": self.dataset_id,
            "tableId": self.table_id,
        })
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    #[default]
    WriteTruncate,
    WriteAppend,
    WriteEmpty,
}

impl WriteDisposition {
    fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
            WriteDisposition::WriteAppend => "WRITE_APPEND",
            WriteDisposition::WriteEmpty => "WRITE_EMPTY",
        }
    }
}

fn source_format(format: FileFormat) -> Result<&'static str> {
    match format {
        FileFormat::Csv => Ok("CSV"),
        FileFormat::Json => Ok("NEWLINE_DELIMITED_JSON"),
        FileFormat::Parquet => Ok("PARQUET"),
        other => Err(StorageError::UnsupportedFormat(format!("BigQuery não aceita {}", other)).into()),
    }
}

/// Estado de um job
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub job_id: String,
    pub location: Option<String>,
    pub state: String,
    pub error_result: Option<Value>,
    pub statistics: Option<Value>,
}

impl JobHandle {
    /// Lê o recurso `Job` da API REST
    pub fn from_resource(resource: &Value) -> Result<Self> {
        let reference = &resource["jobReference"];
        let job_id = reference["jobId"]
            .as_str()
            .ok_or_else(|| GcpError::UnexpectedResponse(format!("job sem jobId: {}", resource)))?;

        Ok(Self {
            job_id: job_id.to_string(),
            location: reference["location"].as_str().map(str::to_string),
            state: resource["status"]["state"].as_str().unwrap_or("PENDING").to_string(),
            error_result: resource["status"].get("errorResult").cloned(),
            statistics: resource.get("statistics").cloned(),
        })
    }

    pub fn is_done(&self) -> bool {
        self.state == "DONE"
    }
}

/// Resumo de um job concluído
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub kind: String,
    pub source: String,
    pub destination: String,
    pub format: FileFormat,
    pub status: String,
    pub statistics: Option<Value>,
}

/// Operações da API de jobs usadas pela ponte
#[async_trait]
pub trait WarehouseApi: Send + Sync {
    async fn insert_job(&self, project: &str, configuration: Value) -> Result<JobHandle>;

    async fn get_job(&self, project: &str, job_id: &str, location: Option<&str>) -> Result<JobHandle>;
}

/// Cliente REST do BigQuery com token bearer
#[derive(Debug, Clone)]
pub struct BigQueryRestClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl BigQueryRestClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &GcpConfig) -> Result<Self> {
        Ok(Self::new(config.bigquery_endpoint.clone(), access_token(config)?))
    }
}

#[async_trait]
impl WarehouseApi for BigQueryRestClient {
    async fn insert_job(&self, project: &str, configuration: Value) -> Result<JobHandle> {
        let response = self
            .http
            .post(format!("{}/projects/{}/jobs", self.endpoint, project))
            .bearer_auth(&self.token)
            .json(&json!({ "configuration": configuration }))
            .send()
            .await?;
        JobHandle::from_resource(&json_response(response).await?)
    }

    async fn get_job(&self, project: &str, job_id: &str, location: Option<&str>) -> Result<JobHandle> {
        let mut request = self
            .http
            .get(format!("{}/projects/{}/jobs/{}", self.endpoint, project, job_id))
            .bearer_auth(&self.token);
        if let Some(location) = location {
            request = request.query(&[("location", location)]);
        }
        JobHandle::from_resource(&json_response(request.send().await?).await?)
    }
}

async fn run_job<A: WarehouseApi + ?Sized>(
    api: &A,
    project: &str,
    configuration: Value,
    poll: &PollSettings,
) -> Result<JobHandle> {
    let submitted = api.insert_job(project, configuration).await?;
    info!(job_id = %submitted.job_id, state = %submitted.state, "Job BigQuery submetido");

    let job_id = submitted.job_id.clone();
    let location = submitted.location.clone();
    let done = if submitted.is_done() {
        submitted
    } else {
        poll_until(&job_id, poll, || async {
            let job = api.get_job(project, &job_id, location.as_deref()).await?;
            Ok(job.is_done().then_some(job))
        })
        .await?
    };

    if let Some(error) = done.error_result.clone() {
        return Err(GcpError::JobFailed {
            job_id: done.job_id,
            payload: error,
        }
        .into());
    }
    Ok(done)
}

/// Exporta uma tabela para o object storage
pub async fn export_table<A: WarehouseApi + ?Sized>(
    api: &A,
    table: &str,
    uri: &str,
    format: FileFormat,
    poll: &PollSettings,
) -> Result<JobReport> {
    let table_ref = TableRef::parse(table)?;
    let destination = ObjectUri::parse_with_scheme(uri, StorageScheme::Gcs, format.placeholder_name())?;

    let configuration = json!({
        "extract": {
            "sourceTable": table_ref.to_json(),
            "destinationUris": [destination.to_string()],
            "destinationFormat": source_format(format)?,
        }
    });

    let job = run_job(api, &table_ref.project_id, configuration, poll).await?;
    info!(job_id = %job.job_id, table = %table_ref, uri = %destination, "Export concluído");

    Ok(JobReport {
        job_id: job.job_id,
        kind: "extract".to_string(),
        source: table_ref.to_string(),
        destination: destination.to_string(),
        format,
        status: "completed".to_string(),
        statistics: job.statistics,
    })
}

/// Carrega arquivos do object storage em uma tabela
pub async fn load_table<A: WarehouseApi + ?Sized>(
    api: &A,
    uri: &str,
    table: &str,
    format: FileFormat,
    write_disposition: WriteDisposition,
    poll: &PollSettings,
) -> Result<JobReport> {
    let table_ref = TableRef::parse(table)?;
    let source = ObjectUri::parse_with_scheme(uri, StorageScheme::Gcs, format.placeholder_name())?;

    let mut load = json!({
        "sourceUris": [source.to_string()],
        "destinationTable": table_ref.to_json(),
        "sourceFormat": source_format(format)?,
        "writeDisposition": write_disposition.as_str(),
        "autodetect": true,
    });
    if format == FileFormat::Csv {
        load["skipLeadingRows"] = json!(1);
    }

    let job = run_job(api, &table_ref.project_id, json!({ "load": load }), poll).await?;
    info!(job_id = %job.job_id, table = %table_ref, uri = %source, "Load concluído");

    Ok(JobReport {
        job_id: job.job_id,
        kind: "load".to_string(),
        source: source.to_string(),
        destination: table_ref.to_string(),
        format,
        status: "completed".to_string(),
        statistics: job.statistics,
    })
}
