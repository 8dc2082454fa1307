use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ETLError, Result};
use crate::types::Phase;

/// Configuração principal de runtime (ambiente)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ETLConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
}

/// Parâmetros de execução do pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub parallel_workers: usize,
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
    pub upload_chunk_size: usize,
    pub connection_pool_size: u32,
    pub connection_timeout_seconds: u64,
}

/// Configuração de observabilidade
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Formato de log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Endpoints e credenciais das APIs REST do GCP
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GcpConfig {
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub bigquery_endpoint: String,
    pub sqladmin_endpoint: String,
    pub poll_interval_seconds: u64,
    pub poll_timeout_seconds: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_workers: num_cpus::get(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
            upload_chunk_size: 100,
            connection_pool_size: 5,
            connection_timeout_seconds: 30,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            access_token: None,
            bigquery_endpoint: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            sqladmin_endpoint: "https://sqladmin.googleapis.com/v1".to_string(),
            poll_interval_seconds: 5,
            poll_timeout_seconds: None,
        }
    }
}

impl GcpConfig {
    /// Configuração de polling derivada
    pub fn poll_settings(&self) -> crate::gcp::PollSettings {
        crate::gcp::PollSettings {
            interval: Duration::from_secs(self.poll_interval_seconds),
            timeout: self.poll_timeout_seconds.map(Duration::from_secs),
        }
    }
}

impl ETLConfig {
    /// Cria um novo builder para configuração
    pub fn builder() -> ETLConfigBuilder {
        ETLConfigBuilder::default()
    }

    /// Carrega configuração do ambiente
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Ok(workers) = std::env::var("ETL_PARALLEL_WORKERS") {
            if let Ok(worker_count) = workers.parse::<usize>() {
                builder = builder.parallel_workers(worker_count);
            }
        }

        if let Ok(attempts) = std::env::var("ETL_RETRY_ATTEMPTS") {
            if let Ok(value) = attempts.parse::<usize>() {
                builder = builder.retry_attempts(value);
            }
        }

        if let Ok(chunk) = std::env::var("ETL_UPLOAD_CHUNK_SIZE") {
            if let Ok(value) = chunk.parse::<usize>() {
                builder = builder.upload_chunk_size(value);
            }
        }

        if let Ok(level) = std::env::var("ETL_LOG_LEVEL") {
            builder = builder.log_level(level);
        }

        if let Ok(project) = std::env::var("GOOGLE_CLOUD_PROJECT") {
            builder = builder.gcp_project(project);
        }

        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            builder = builder.gcp_access_token(token);
        }

        if let Ok(interval) = std::env::var("ETL_POLL_INTERVAL_SECONDS") {
            if let Ok(value) = interval.parse::<u64>() {
                builder = builder.poll_interval_seconds(value);
            }
        }

        builder.build()
    }

    /// Carrega configuração de arquivo
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Carrega configuração de string TOML
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml_str, config::FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Valida a configuração
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.parallel_workers == 0 {
            return Err(invalid_value("parallel_workers", "0"));
        }

        if self.pipeline.retry_attempts == 0 {
            return Err(invalid_value("retry_attempts", "0"));
        }

        if self.pipeline.upload_chunk_size == 0 {
            return Err(invalid_value("upload_chunk_size", "0"));
        }

        if self.gcp.poll_interval_seconds == 0 {
            return Err(invalid_value("poll_interval_seconds", "0"));
        }

        Ok(())
    }
}

fn invalid_value(param: &str, value: &str) -> ETLError {
    ETLError::Config(ConfigError::InvalidValue {
        param: param.to_string(),
        value: value.to_string(),
    })
}

/// Builder para configuração ETL
#[derive(Default)]
pub struct ETLConfigBuilder {
    config: ETLConfig,
}

impl ETLConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.config.pipeline.parallel_workers = workers;
        self
    }

    pub fn retry_attempts(mut self, attempts: usize) -> Self {
        self.config.pipeline.retry_attempts = attempts;
        self
    }

    pub fn retry_delay_ms(mut self, delay: u64) -> Self {
        self.config.pipeline.retry_delay_ms = delay;
        self
    }

    pub fn upload_chunk_size(mut self, size: usize) -> Self {
        self.config.pipeline.upload_chunk_size = size;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.observability.log_level = level.into();
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.observability.log_format = format;
        self
    }

    pub fn gcp_project(mut self, project: impl Into<String>) -> Self {
        self.config.gcp.project_id = Some(project.into());
        self
    }

    pub fn gcp_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.gcp.access_token = Some(token.into());
        self
    }

    pub fn poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.config.gcp.poll_interval_seconds = seconds;
        self
    }

    pub fn build(self) -> Result<ETLConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ---------------------------------------------------------------------------
// Dicionário de configuração do extract/delete/load
// ---------------------------------------------------------------------------

/// Entrada da fase download
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadEntry {
    pub connection: String,
    pub table: String,
    /// Consulta (template). Ausente: `SELECT * FROM <table>`
    pub sql: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub custom_conn_str: Option<String>,
    #[serde(default)]
    pub connect_args: BTreeMap<String, String>,
    /// Opções repassadas ao backend (templates)
    #[serde(default)]
    pub kwargs: BTreeMap<String, String>,
}

impl DownloadEntry {
    pub fn statement(&self) -> String {
        self.sql
            .clone()
            .unwrap_or_else(|| format!("SELECT * FROM {}", self.table))
    }
}

/// Entrada das fases delete e truncate
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatementEntry {
    pub connection: String,
    pub sql: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub custom_conn_str: Option<String>,
    #[serde(default)]
    pub connect_args: BTreeMap<String, String>,
}

/// Coluna de upload: nome + tipo lógico
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: String,
}

/// Estratégia de INSERT
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMethod {
    /// Várias linhas por INSERT
    #[default]
    Multi,
    /// Uma linha por INSERT
    Single,
}

/// Entrada da fase upload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadEntry {
    pub connection: String,
    pub table: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    pub custom_conn_str: Option<String>,
    #[serde(default)]
    pub connect_args: BTreeMap<String, String>,
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub method: InsertMethod,
    /// URI de staging (template) usada por backends que carregam via COPY
    pub staging_path: Option<String>,
    pub csv_separator: Option<String>,
    pub csv_encoding: Option<String>,
}

/// Seção de uma fase: entradas indexadas pela chave lógica
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhaseSection<T> {
    #[serde(default = "BTreeMap::new")]
    pub entries: BTreeMap<String, T>,
}

/// Dicionário de configuração do extract/delete/load
///
/// Uma seção por fase; fases ausentes só falham quando a operação
/// correspondente é chamada.
///
/// ```toml
/// max_n_try = 3
///
/// [download.entries.vendas]
/// connection = "postgresql_dw_prod"
/// table = "vendas"
/// sql = "SELECT * FROM vendas WHERE dia >= '{start_date}'"
/// start_date = "today-7d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EdlConfig {
    pub download: Option<PhaseSection<DownloadEntry>>,
    pub delete: Option<PhaseSection<StatementEntry>>,
    pub truncate: Option<PhaseSection<StatementEntry>>,
    pub upload: Option<PhaseSection<UploadEntry>>,
    pub max_n_try: Option<usize>,
    pub n_parallel: Option<usize>,
    /// Tipo lógico -> tipo SQL (ex.: `string` -> `VARCHAR`), sem distinção de caixa
    #[serde(default)]
    pub sql_type_aliases: BTreeMap<String, String>,
}

impl EdlConfig {
    /// Carrega de arquivo (TOML, JSON ou YAML pela extensão)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Self::from_str_format(toml_str, config::FileFormat::Toml)
    }

    pub fn from_json(json_str: &str) -> Result<Self> {
        Self::from_str_format(json_str, config::FileFormat::Json)
    }

    fn from_str_format(content: &str, format: config::FileFormat) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(content, format))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Pares (chave, nome de conexão) configurados para a fase
    pub fn connection_names(&self, phase: Phase) -> Option<Vec<(String, String)>> {
        fn collect<T>(
            section: &Option<PhaseSection<T>>,
            connection: impl Fn(&T) -> &str,
        ) -> Option<Vec<(String, String)>> {
            section.as_ref().map(|s| {
                s.entries
                    .iter()
                    .map(|(k, e)| (k.clone(), connection(e).to_string()))
                    .collect()
            })
        }

        match phase {
            Phase::Download => collect(&self.download, |e| &e.connection),
            Phase::Delete => collect(&self.delete, |e| &e.connection),
            Phase::Truncate => collect(&self.truncate, |e| &e.connection),
            Phase::Upload => collect(&self.upload, |e| &e.connection),
        }
    }

    pub fn max_n_try(&self, fallback: usize) -> usize {
        self.max_n_try.unwrap_or(fallback).max(1)
    }

    pub fn n_parallel(&self, fallback: usize) -> usize {
        self.n_parallel.unwrap_or(fallback).max(1)
    }
}

// ---------------------------------------------------------------------------
// Credenciais
// ---------------------------------------------------------------------------

/// Mapa plano de credenciais (`myserver_postgresql_prod`, `aws_access_key_id_prod`, ...)
///
/// Somente leitura depois de construído.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Connections {
    values: HashMap<String, String>,
}

impl Connections {
    pub fn from_map<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Carrega de arquivo plano (TOML/JSON/YAML) com pares chave = valor
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let values: HashMap<String, String> = config.try_deserialize()?;
        Ok(Self { values })
    }

    /// Carrega de um arquivo .env sem alterar o ambiente do processo
    pub fn from_dotenv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path.as_ref()).map_err(|e| {
            ETLError::Config(ConfigError::ParseError(format!(
                "{}: {}",
                path.as_ref().display(),
                e
            )))
        })?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| ETLError::Config(ConfigError::ParseError(e.to_string())))?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Valor ou string vazia quando ausente
    pub fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// Valor obrigatório
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            ETLError::Config(ConfigError::MissingRequiredParameter(key.to_string()))
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ETLConfig::default();
        assert_eq!(config.pipeline.retry_attempts, 3);
        assert_eq!(config.pipeline.upload_chunk_size, 100);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.gcp.poll_interval_seconds, 5);
        assert!(config.gcp.poll_timeout_seconds.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ETLConfig::builder()
            .parallel_workers(8)
            .retry_attempts(5)
            .log_level("debug")
            .gcp_project("meu-projeto")
            .build()
            .unwrap();

        assert_eq!(config.pipeline.parallel_workers, 8);
        assert_eq!(config.pipeline.retry_attempts, 5);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.gcp.project_id.as_deref(), Some("meu-projeto"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = ETLConfig::default();
        config.pipeline.upload_chunk_size = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
        [pipeline]
        parallel_workers = 4
        retry_attempts = 2

        [observability]
        log_level = "warn"
        log_format = "json"

        [gcp]
        project_id = "analytics"
        poll_interval_seconds = 10
        "#;

        let config = ETLConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.pipeline.parallel_workers, 4);
        assert_eq!(config.pipeline.retry_attempts, 2);
        assert_eq!(config.pipeline.upload_chunk_size, 100);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.gcp.poll_interval_seconds, 10);
    }

    #[test]
    fn test_edl_config_from_toml() {
        let toml_str = r#"
        max_n_try = 5

        [sql_type_aliases]
        string = "VARCHAR"

        [download.entries.vendas]
        connection = "postgresql_dw_prod"
        table = "vendas"
        start_date = "today-7d"

        [upload.entries.resumo]
        connection = "mysql_app_prod"
        table = "resumo"
        schema = "public"
        method = "single"
        columns = [
            { name = "id", dtype = "Integer" },
            { name = "nome", dtype = "String(50)" },
        ]
        "#;

        let config = EdlConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.max_n_try(3), 5);
        assert!(config.delete.is_none());

        let download = config.download.as_ref().unwrap();
        let vendas = &download.entries["vendas"];
        assert_eq!(vendas.statement(), "SELECT * FROM vendas");
        assert_eq!(vendas.start_date.as_deref(), Some("today-7d"));

        let upload = config.upload.as_ref().unwrap();
        let resumo = &upload.entries["resumo"];
        assert_eq!(resumo.method, InsertMethod::Single);
        assert_eq!(resumo.columns[1].name, "nome");

        let names = config.connection_names(Phase::Upload).unwrap();
        assert_eq!(names, vec![("resumo".to_string(), "mysql_app_prod".to_string())]);
        assert!(config.connection_names(Phase::Truncate).is_none());
    }

    #[test]
    fn test_connections_from_dotenv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "myserver_postgresql_prod=db.interno").unwrap();
        writeln!(file, "mypassword_postgresql_prod=segredo").unwrap();

        let connections = Connections::from_dotenv(file.path()).unwrap();
        assert_eq!(connections.len(), 2);
        assert_eq!(connections.get("myserver_postgresql_prod"), Some("db.interno"));
        assert_eq!(connections.get_or_empty("myuser_postgresql_prod"), "");
        assert!(connections.require("ausente").is_err());
    }
}
