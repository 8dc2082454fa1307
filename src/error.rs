use thiserror::Error;

/// Tipo Result principal da biblioteca
pub type Result<T> = std::result::Result<T, ETLError>;

/// Erro principal da biblioteca etltools
#[derive(Error, Debug)]
pub enum ETLError {
    #[error("Erro de extração: {0}")]
    Extract(#[from] ExtractError),

    #[error("Erro de carga: {0}")]
    Load(#[from] LoadError),

    #[error("Erro de configuração: {0}")]
    Config(#[from] ConfigError),

    #[error("Erro de object storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Erro de template: {0}")]
    Template(#[from] TemplateError),

    #[error("Erro GCP: {0}")]
    Gcp(#[from] GcpError),

    #[error("Erro de execução: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Erro genérico: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Erros relacionados à extração de dados
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Erro de conexão: {0}")]
    Connection(String),

    #[error("Formato inválido: {0}")]
    InvalidFormat(String),

    #[error("Erro de parsing: {0}")]
    ParseError(String),

    #[error("Erro de consulta: {0}")]
    Query(String),

    /// Deadlock, serialização ou banco ocupado
    #[error("Erro transitório do banco: {0}")]
    Transient(String),
}

/// Erros relacionados ao carregamento de dados
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Erro de conexão de destino: {0}")]
    DestinationConnection(String),

    #[error("Erro de escrita: {0}")]
    WriteError(String),

    #[error("Coluna ausente nos dados: {0}")]
    MissingColumn(String),

    #[error("Dados ausentes para a entrada: {0}")]
    MissingData(String),
}

/// Erros relacionados à configuração
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuração inválida: {0}")]
    InvalidConfig(String),

    #[error("Parâmetro obrigatório ausente: {0}")]
    MissingRequiredParameter(String),

    #[error("Valor inválido para {param}: {value}")]
    InvalidValue { param: String, value: String },

    #[error("Erro de parsing de configuração: {0}")]
    ParseError(String),

    #[error("Tipo de backend desconhecido: {0}")]
    UnknownBackend(String),
}

/// Erros de object storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Caminho inválido: {path}. Deve começar com '{expected}'")]
    InvalidPath { path: String, expected: String },

    #[error("Erro do object store: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Formato não suportado: {0}")]
    UnsupportedFormat(String),

    #[error("Encoding não suportado: {0}")]
    UnsupportedEncoding(String),
}

/// Erros de avaliação de templates e expressões de data
#[derive(Error, Debug, PartialEq)]
pub enum TemplateError {
    #[error("Variável não definida no contexto: {0}")]
    MissingVariable(String),

    #[error("Template mal formado: {0}")]
    Malformed(String),

    #[error("Expressão de data inválida: {0}")]
    InvalidDateExpr(String),

    #[error("Formato '{format}' não aplicável à variável {name}")]
    InvalidFormat { name: String, format: String },
}

/// Erros das pontes BigQuery / Cloud SQL
#[derive(Error, Debug)]
pub enum GcpError {
    #[error("Erro HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resposta inesperada da API: {0}")]
    UnexpectedResponse(String),

    #[error("Job {job_id} falhou: {payload}")]
    JobFailed { job_id: String, payload: serde_json::Value },

    #[error("Operação {operation} falhou: {payload}")]
    OperationFailed { operation: String, payload: serde_json::Value },

    #[error("Timeout aguardando {name} após {seconds}s")]
    Timeout { name: String, seconds: u64 },
}

/// Erros de execução de processos externos
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Processo '{command}' terminou com código {code:?}: {output}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Argumento inválido {name}: não pode ser vazio")]
    EmptyArgument { name: String },

    #[error("Erro no pool de workers: {0}")]
    WorkerPool(String),
}

impl ETLError {
    /// Verifica se o erro é recuperável
    pub fn is_recoverable(&self) -> bool {
        match self {
            ETLError::Extract(ExtractError::Connection(_)) => true,
            ETLError::Extract(ExtractError::Transient(_)) => true,
            ETLError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            ETLError::Load(LoadError::DestinationConnection(_)) => true,
            ETLError::Gcp(GcpError::Http(_)) => true,
            ETLError::Storage(StorageError::ObjectStore(_)) => true,
            _ => false,
        }
    }

    /// Retorna o código de erro
    pub fn error_code(&self) -> &'static str {
        match self {
            ETLError::Extract(_) => "EXTRACT_ERROR",
            ETLError::Load(_) => "LOAD_ERROR",
            ETLError::Config(_) => "CONFIG_ERROR",
            ETLError::Storage(_) => "STORAGE_ERROR",
            ETLError::Template(_) => "TEMPLATE_ERROR",
            ETLError::Gcp(_) => "GCP_ERROR",
            ETLError::Execution(_) => "EXECUTION_ERROR",
            ETLError::Io(_) => "IO_ERROR",
            ETLError::Serialization(_) => "SERIALIZATION_ERROR",
            ETLError::Generic(_) => "GENERIC_ERROR",
        }
    }
}

impl From<config::ConfigError> for ETLError {
    fn from(err: config::ConfigError) -> Self {
        ETLError::Config(ConfigError::ParseError(err.to_string()))
    }
}

impl From<object_store::Error> for ETLError {
    fn from(err: object_store::Error) -> Self {
        ETLError::Storage(StorageError::ObjectStore(err))
    }
}

impl From<reqwest::Error> for ETLError {
    fn from(err: reqwest::Error) -> Self {
        ETLError::Gcp(GcpError::Http(err))
    }
}

/// Códigos de erro que valem nova tentativa: SQLSTATE de conexão (`08xxx`),
/// serialização/deadlock (Postgres, MySQL) e `SQLITE_BUSY`/`SQLITE_LOCKED`
fn is_transient_db_code(code: &str) -> bool {
    code.starts_with("08")
        || matches!(code, "40001" | "40P01" | "57P01" | "5" | "6" | "261" | "262" | "517" | "773")
}

impl From<sqlx::Error> for ETLError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let transient = db_err.code().is_some_and(|code| is_transient_db_code(&code));
                if transient {
                    ETLError::Extract(ExtractError::Transient(db_err.to_string()))
                } else {
                    ETLError::Extract(ExtractError::Query(db_err.to_string()))
                }
            }
            sqlx::Error::Io(io_err) => ETLError::Io(io_err),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => {
                ETLError::Extract(ExtractError::Connection(err.to_string()))
            }
            sqlx::Error::Configuration(_) => {
                ETLError::Config(ConfigError::InvalidConfig(err.to_string()))
            }
            _ => ETLError::Generic(anyhow::anyhow!(err)),
        }
    }
}

impl From<csv::Error> for ETLError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(io_err) => ETLError::Io(std::io::Error::new(io_err.kind(), io_err.to_string())),
            csv::ErrorKind::Utf8 { .. } => {
                ETLError::Extract(ExtractError::InvalidFormat("UTF-8 inválido".to_string()))
            }
            _ => ETLError::Extract(ExtractError::ParseError(err.to_string())),
        }
    }
}

impl From<arrow::error::ArrowError> for ETLError {
    fn from(err: arrow::error::ArrowError) -> Self {
        ETLError::Extract(ExtractError::InvalidFormat(format!("Arrow: {}", err)))
    }
}

impl From<parquet::errors::ParquetError> for ETLError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        ETLError::Extract(ExtractError::InvalidFormat(format!("Parquet: {}", err)))
    }
}
