//! # Orquestrador extract/delete/load
//!
//! [`ExtractDeleteAndLoad`] percorre as entradas de cada fase do
//! [`EdlConfig`], resolve a conexão pelo nome (`tipo_..._sufixo`), renderiza
//! SQL, kwargs e caminhos com as datas da entrada e despacha para o backend:
//!
//! - `read_data`: DynamoDB via [`KeyValueReader`], demais via [`SqlClient::read`];
//! - `delete_data` / `truncate_data`: [`SqlClient::execute`];
//! - `upload_data`: Redshift via staging no S3 + `COPY`, demais via
//!   [`SqlClient::upload`]; DynamoDB é ignorado.
//!
//! Uma entrada com erro não interrompe a fase: o erro é logado, emitido como
//! [`EdlEvent::EntryFailed`] e registrado no [`PhaseReport`]. Fase ausente
//! na configuração é erro imediato.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::config::{Connections, DownloadEntry, ETLConfig, EdlConfig, StatementEntry, UploadEntry};
use crate::error::{ConfigError, ETLError, LoadError, Result};
use crate::events::LoggingEventEmitter;
use crate::kv::{DynamoDbReader, ScanOptions};
use crate::resolver::{AwsCredentials, BackendKind, ConnectionInfo, ConnectionResolver};
use crate::sql::{resolve_columns, SqlConnection, SqlxClient, StagingCopy, UploadTarget};
use crate::storage::{CloudStoreProvider, ObjectStorage, ObjectUri, StorageScheme};
use crate::template::TemplateContext;
use crate::traits::{EventEmitter, KeyValueReader, SqlClient};
use crate::types::{CsvOptions, DataTable, EdlEvent, EntryFailure, FileFormat, Phase, PhaseReport};

/// Resultado de uma entrada bem-sucedida
enum EntryOutcome {
    Rows(u64),
    Skipped(String),
}

/// Variáveis do chamador disponíveis nos templates
pub type TemplateVars = HashMap<String, String>;

/// Mensagem de progresso com o intervalo de datas da entrada
fn range_message(action: &str, key: &str, ctx: &TemplateContext) -> String {
    let start = ctx.get("start_date").map(|v| v.to_string());
    let end = ctx.get("end_date").map(|v| v.to_string());
    match (start, end) {
        (Some(s), Some(e)) => format!("{} dados de {}, de {} até {}", action, key, s, e),
        (Some(s), None) => format!("{} dados de {}, desde {}", action, key, s),
        (None, Some(e)) => format!("{} dados de {}, até {}", action, key, e),
        (None, None) => format!("{} dados de {}", action, key),
    }
}

fn missing_phase(phase: Phase) -> ETLError {
    ETLError::Config(ConfigError::MissingRequiredParameter(format!(
        "Seção '{}' não configurada",
        phase
    )))
}

/// Orquestrador das fases download, delete, truncate e upload
pub struct ExtractDeleteAndLoad {
    config: EdlConfig,
    connections: Connections,
    resolver: ConnectionResolver,
    sql: Arc<dyn SqlClient>,
    kv: Arc<dyn KeyValueReader>,
    staging: Option<ObjectStorage>,
    event_emitter: Arc<dyn EventEmitter>,
    today: NaiveDate,
    max_n_try: usize,
    n_parallel: usize,
    chunk_size: usize,
    raw_data: HashMap<String, DataTable>,
}

impl std::fmt::Debug for ExtractDeleteAndLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractDeleteAndLoad")
            .field("today", &self.today)
            .field("max_n_try", &self.max_n_try)
            .field("n_parallel", &self.n_parallel)
            .field("raw_data", &self.raw_data.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ExtractDeleteAndLoad {
    pub fn builder() -> ExtractDeleteAndLoadBuilder {
        ExtractDeleteAndLoadBuilder::default()
    }

    /// Tabelas lidas pelo último `read_data`
    pub fn raw_data(&self) -> &HashMap<String, DataTable> {
        &self.raw_data
    }

    pub fn take_raw_data(&mut self) -> HashMap<String, DataTable> {
        std::mem::take(&mut self.raw_data)
    }

    pub fn config(&self) -> &EdlConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Contexto da entrada: variáveis do chamador, `today` e datas avaliadas
    fn entry_context(
        &self,
        vars: &TemplateVars,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<TemplateContext> {
        let mut ctx = TemplateContext::new(self.today).with("today", self.today);
        ctx.extend_text(vars);
        if let Some(expr) = start_date {
            ctx.insert_date_expr("start_date", expr)?;
        }
        if let Some(expr) = end_date {
            ctx.insert_date_expr("end_date", expr)?;
        }
        Ok(ctx)
    }

    fn sql_connection(
        &self,
        info: &ConnectionInfo,
        custom_conn_str: Option<&String>,
        connect_args: &BTreeMap<String, String>,
    ) -> SqlConnection {
        SqlConnection {
            info: info.clone(),
            custom_conn_str: custom_conn_str.cloned(),
            connect_args: connect_args.clone(),
            max_n_try: self.max_n_try,
        }
    }

    async fn emit(&self, event: EdlEvent) -> Result<()> {
        self.event_emitter.emit(event).await
    }

    async fn start_phase(&self, phase: Phase, entries: usize) -> Result<Instant> {
        info!(phase = %phase, entries = entries, "Iniciando fase");
        self.emit(EdlEvent::PhaseStarted {
            phase,
            entries,
            timestamp: SystemTime::now(),
        })
        .await?;
        Ok(Instant::now())
    }

    /// Contabiliza o resultado de uma entrada e emite o evento correspondente
    async fn record(
        &self,
        report: &mut PhaseReport,
        key: &str,
        outcome: Result<EntryOutcome>,
    ) -> Result<()> {
        report.entries_processed += 1;
        let phase = report.phase;

        let event = match outcome {
            Ok(EntryOutcome::Rows(rows)) => {
                report.entries_successful += 1;
                report.rows += rows as usize;
                EdlEvent::EntryCompleted {
                    phase,
                    key: key.to_string(),
                    rows: Some(rows),
                    timestamp: SystemTime::now(),
                }
            }
            Ok(EntryOutcome::Skipped(reason)) => {
                report.entries_skipped += 1;
                EdlEvent::EntrySkipped {
                    phase,
                    key: key.to_string(),
                    reason,
                    timestamp: SystemTime::now(),
                }
            }
            Err(e) => {
                warn!(phase = %phase, key = %key, error_code = e.error_code(), "Entrada falhou, seguindo para a próxima");
                report.failures.push(EntryFailure {
                    key: key.to_string(),
                    error: e.to_string(),
                });
                EdlEvent::EntryFailed {
                    phase,
                    key: key.to_string(),
                    error: e.to_string(),
                    timestamp: SystemTime::now(),
                }
            }
        };

        self.emit(event).await
    }

    async fn finish_phase(&self, mut report: PhaseReport, started: Instant) -> Result<PhaseReport> {
        report.execution_time_ms = started.elapsed().as_millis() as u64;
        self.emit(EdlEvent::PhaseCompleted {
            report: report.clone(),
            timestamp: SystemTime::now(),
        })
        .await?;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // download
    // -----------------------------------------------------------------------

    /// Lê todas as entradas de `download` para o buffer de dados brutos
    ///
    /// O buffer é reiniciado a cada chamada; entradas com falha ficam fora dele.
    pub async fn read_data(&mut self, vars: &TemplateVars) -> Result<PhaseReport> {
        let entries = self
            .config
            .download
            .as_ref()
            .ok_or_else(|| missing_phase(Phase::Download))?
            .entries
            .clone();

        self.raw_data.clear();
        let started = self.start_phase(Phase::Download, entries.len()).await?;
        let mut report = PhaseReport::new(Phase::Download);

        for (key, entry) in &entries {
            let outcome = match self.read_entry(key, entry, vars).await {
                Ok(table) => {
                    let rows = table.len() as u64;
                    self.raw_data.insert(key.clone(), table);
                    Ok(EntryOutcome::Rows(rows))
                }
                Err(e) => Err(e),
            };
            self.record(&mut report, key, outcome).await?;
        }

        self.finish_phase(report, started).await
    }

    async fn read_entry(&self, key: &str, entry: &DownloadEntry, vars: &TemplateVars) -> Result<DataTable> {
        let info = self.resolver.resolve(Phase::Download, key)?;
        let ctx = self.entry_context(vars, entry.start_date.as_deref(), entry.end_date.as_deref())?;
        info!(key = %key, backend = %info.kind, "{}", range_message("Lendo", key, &ctx));

        match info.kind {
            BackendKind::DynamoDb => {
                let credentials = AwsCredentials::from_connections(&self.connections, &info.suffix)?;
                let kwargs = entry
                    .kwargs
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), ctx.render(v)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?;
                let options = ScanOptions::from_kwargs(&kwargs)?;
                self.kv.scan(&entry.table, &credentials, &options).await
            }
            _ => {
                let statement = ctx.render(&entry.statement())?;
                let conn = self.sql_connection(info, entry.custom_conn_str.as_ref(), &entry.connect_args);
                self.sql.read(&conn, &statement).await
            }
        }
    }

    // -----------------------------------------------------------------------
    // delete / truncate
    // -----------------------------------------------------------------------

    /// Executa os comandos de `delete` com as datas de cada entrada
    pub async fn delete_data(&self, vars: &TemplateVars) -> Result<PhaseReport> {
        let section = self.config.delete.as_ref().ok_or_else(|| missing_phase(Phase::Delete))?;
        self.run_statements(Phase::Delete, &section.entries, vars, "Removendo").await
    }

    /// Executa os comandos de `truncate`
    pub async fn truncate_data(&self, vars: &TemplateVars) -> Result<PhaseReport> {
        let section = self.config.truncate.as_ref().ok_or_else(|| missing_phase(Phase::Truncate))?;
        self.run_statements(Phase::Truncate, &section.entries, vars, "Truncando").await
    }

    async fn run_statements(
        &self,
        phase: Phase,
        entries: &BTreeMap<String, StatementEntry>,
        vars: &TemplateVars,
        action: &str,
    ) -> Result<PhaseReport> {
        let started = self.start_phase(phase, entries.len()).await?;
        let mut report = PhaseReport::new(phase);

        for (key, entry) in entries {
            let outcome = self.statement_entry(phase, key, entry, vars, action).await;
            self.record(&mut report, key, outcome).await?;
        }

        self.finish_phase(report, started).await
    }

    async fn statement_entry(
        &self,
        phase: Phase,
        key: &str,
        entry: &StatementEntry,
        vars: &TemplateVars,
        action: &str,
    ) -> Result<EntryOutcome> {
        let info = self.resolver.resolve(phase, key)?;
        if !info.kind.is_sql() {
            return Ok(EntryOutcome::Skipped(format!(
                "backend {} não executa comandos SQL",
                info.kind
            )));
        }

        let ctx = self.entry_context(vars, entry.start_date.as_deref(), entry.end_date.as_deref())?;
        info!(phase = %phase, key = %key, "{}", range_message(action, key, &ctx));

        let statement = ctx.render(&entry.sql)?;
        let conn = self.sql_connection(info, entry.custom_conn_str.as_ref(), &entry.connect_args);
        let affected = self.sql.execute(&conn, &statement).await?;
        Ok(EntryOutcome::Rows(affected))
    }

    // -----------------------------------------------------------------------
    // upload
    // -----------------------------------------------------------------------

    /// Carrega as tabelas de `data` (indexadas pela chave da entrada)
    pub async fn upload_data(&self, data: &HashMap<String, DataTable>) -> Result<PhaseReport> {
        let section = self.config.upload.as_ref().ok_or_else(|| missing_phase(Phase::Upload))?;
        let started = self.start_phase(Phase::Upload, section.entries.len()).await?;
        let mut report = PhaseReport::new(Phase::Upload);

        for (key, entry) in &section.entries {
            let outcome = self.upload_entry(key, entry, data).await;
            self.record(&mut report, key, outcome).await?;
        }

        self.finish_phase(report, started).await
    }

    async fn upload_entry(
        &self,
        key: &str,
        entry: &UploadEntry,
        data: &HashMap<String, DataTable>,
    ) -> Result<EntryOutcome> {
        let info = self.resolver.resolve(Phase::Upload, key)?;
        if !info.kind.is_sql() {
            return Ok(EntryOutcome::Skipped(format!("upload para {} não suportado", info.kind)));
        }

        let table = data
            .get(key)
            .ok_or_else(|| ETLError::Load(LoadError::MissingData(key.to_string())))?;
        let columns = resolve_columns(&entry.columns, &self.config.sql_type_aliases);
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let selected = table.select(&names)?;
        let conn = self.sql_connection(info, entry.custom_conn_str.as_ref(), &entry.connect_args);

        info!(key = %key, table = %entry.table, rows = selected.len(), "Carregando dados");

        if info.kind.uses_staging() {
            return self.upload_via_staging(key, entry, info, &conn, selected).await;
        }

        let target = UploadTarget {
            schema: entry.schema.clone(),
            table: entry.table.clone(),
            columns,
            chunk_size: entry.chunk_size.unwrap_or(self.chunk_size).max(1),
            method: entry.method,
            n_parallel: self.n_parallel,
        };
        let inserted = self.sql.upload(&conn, &selected, &target).await?;
        Ok(EntryOutcome::Rows(inserted))
    }

    /// CSV no S3 com as credenciais `aws_*_{sufixo}`, depois COPY com `aws_*_aws_{sufixo}`
    async fn upload_via_staging(
        &self,
        key: &str,
        entry: &UploadEntry,
        info: &ConnectionInfo,
        conn: &SqlConnection,
        data: DataTable,
    ) -> Result<EntryOutcome> {
        let path = entry.staging_path.as_deref().ok_or_else(|| {
            ETLError::Config(ConfigError::MissingRequiredParameter(format!(
                "upload.entries.{}.staging_path",
                key
            )))
        })?;
        let staging_uri = self.entry_context(&TemplateVars::new(), None, None)?.render(path)?;
        // COPY do Redshift só lê do S3
        let staging_uri =
            ObjectUri::parse_with_scheme(&staging_uri, StorageScheme::S3, FileFormat::Csv.placeholder_name())?
                .to_string();
        let csv = CsvOptions::from_config(entry.csv_separator.as_deref(), entry.csv_encoding.as_deref())?;

        let upload_credentials = AwsCredentials::from_connections(&self.connections, &info.suffix)?;
        let copy_credentials = AwsCredentials::for_copy(&self.connections, &info.suffix)?;

        let storage = match &self.staging {
            Some(storage) => storage.clone(),
            None => ObjectStorage::new(Arc::new(
                CloudStoreProvider::new().with_aws_credentials(upload_credentials),
            )),
        };
        let transfer = storage
            .upload_table(&data, &staging_uri, Some(FileFormat::Csv), &csv)
            .await?;

        let copy = StagingCopy {
            schema: entry.schema.clone(),
            table: entry.table.clone(),
            columns: data.columns.clone(),
            staging_uri: transfer.uri.clone(),
            credentials: copy_credentials,
            delimiter: csv.delimiter as char,
            has_headers: csv.has_headers,
        };
        self.sql.copy_from_staging(conn, &copy).await?;

        info!(key = %key, uri = %transfer.uri, bytes = transfer.bytes, "COPY a partir do staging concluído");
        Ok(EntryOutcome::Rows(data.len() as u64))
    }
}

/// Builder do orquestrador
#[derive(Default)]
pub struct ExtractDeleteAndLoadBuilder {
    config: Option<EdlConfig>,
    connections: Option<Connections>,
    etl_config: Option<ETLConfig>,
    sql: Option<Arc<dyn SqlClient>>,
    kv: Option<Arc<dyn KeyValueReader>>,
    staging: Option<ObjectStorage>,
    event_emitter: Option<Arc<dyn EventEmitter>>,
    today: Option<NaiveDate>,
}

impl ExtractDeleteAndLoadBuilder {
    pub fn config(mut self, config: EdlConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn connections(mut self, connections: Connections) -> Self {
        self.connections = Some(connections);
        self
    }

    /// Configuração de runtime (retry, paralelismo, chunk padrão, pool)
    pub fn etl_config(mut self, config: ETLConfig) -> Self {
        self.etl_config = Some(config);
        self
    }

    pub fn sql_client(mut self, client: Arc<dyn SqlClient>) -> Self {
        self.sql = Some(client);
        self
    }

    pub fn kv_reader(mut self, reader: Arc<dyn KeyValueReader>) -> Self {
        self.kv = Some(reader);
        self
    }

    /// Storage usado no staging do Redshift no lugar do S3 real
    pub fn staging_storage(mut self, storage: ObjectStorage) -> Self {
        self.staging = Some(storage);
        self
    }

    pub fn event_emitter<E: EventEmitter + 'static>(mut self, emitter: E) -> Self {
        self.event_emitter = Some(Arc::new(emitter));
        self
    }

    /// Data de referência das expressões de data (padrão: hoje, horário local)
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn build(self) -> Result<ExtractDeleteAndLoad> {
        let config = self.config.unwrap_or_default();
        let connections = self.connections.unwrap_or_default();
        let etl_config = self.etl_config.unwrap_or_default();
        etl_config.validate()?;

        let resolver = ConnectionResolver::new(&config, &connections);
        let max_n_try = config.max_n_try(etl_config.pipeline.retry_attempts);
        let n_parallel = config.n_parallel(etl_config.pipeline.parallel_workers);

        Ok(ExtractDeleteAndLoad {
            resolver,
            sql: self
                .sql
                .unwrap_or_else(|| Arc::new(SqlxClient::new(&etl_config.pipeline))),
            kv: self.kv.unwrap_or_else(|| Arc::new(DynamoDbReader::new())),
            staging: self.staging,
            event_emitter: self
                .event_emitter
                .unwrap_or_else(|| Arc::new(LoggingEventEmitter::new())),
            today: self.today.unwrap_or_else(|| Local::now().date_naive()),
            max_n_try,
            n_parallel,
            chunk_size: etl_config.pipeline.upload_chunk_size,
            raw_data: HashMap::new(),
            config,
            connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventEmitter;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Cliente SQL que só registra os comandos
    #[derive(Default)]
    struct RecordingSql {
        statements: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqlClient for RecordingSql {
        async fn execute(&self, _conn: &SqlConnection, statement: &str) -> Result<u64> {
            self.statements.lock().unwrap().push(statement.to_string());
            Ok(1)
        }

        async fn read(&self, _conn: &SqlConnection, _query: &str) -> Result<DataTable> {
            Ok(DataTable::default())
        }

        async fn upload(&self, _conn: &SqlConnection, data: &DataTable, _target: &UploadTarget) -> Result<u64> {
            Ok(data.len() as u64)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_range_message() {
        let ctx = TemplateContext::new(today())
            .with("start_date", today())
            .with("end_date", "2024-03-20");
        assert_eq!(
            range_message("Lendo", "vendas", &ctx),
            "Lendo dados de vendas, de 2024-03-15 até 2024-03-20"
        );
        let ctx = TemplateContext::new(today()).with("end_date", today());
        assert_eq!(range_message("Removendo", "x", &ctx), "Removendo dados de x, até 2024-03-15");
        assert_eq!(range_message("Lendo", "x", &TemplateContext::new(today())), "Lendo dados de x");
    }

    #[tokio::test]
    async fn test_missing_phase_is_fatal() {
        let edl = ExtractDeleteAndLoad::builder()
            .sql_client(Arc::new(RecordingSql::default()))
            .build()
            .unwrap();

        let err = edl.delete_data(&TemplateVars::new()).await.unwrap_err();
        assert!(matches!(err, ETLError::Config(ConfigError::MissingRequiredParameter(_))));
    }

    #[tokio::test]
    async fn test_delete_renders_dates_and_vars() {
        let config = EdlConfig::from_toml(
            r#"
            [delete.entries.vendas]
            connection = "postgresql_dw_prod"
            sql = "DELETE FROM vendas WHERE dia >= '{start_date}' AND loja = {loja}"
            start_date = "today-1d"
            "#,
        )
        .unwrap();

        let sql = Arc::new(RecordingSql::default());
        let events = InMemoryEventEmitter::new();
        let edl = ExtractDeleteAndLoad::builder()
            .config(config)
            .sql_client(sql.clone())
            .event_emitter(events.clone())
            .today(today())
            .build()
            .unwrap();

        let vars = TemplateVars::from([("loja".to_string(), "42".to_string())]);
        let report = edl.delete_data(&vars).await.unwrap();

        assert_eq!(report.entries_successful, 1);
        assert_eq!(
            sql.statements.lock().unwrap().as_slice(),
            ["DELETE FROM vendas WHERE dia >= '2024-03-14' AND loja = 42"]
        );
        assert_eq!(events.event_count(), 3);
    }

    #[tokio::test]
    async fn test_upload_skips_dynamodb_and_requires_data() {
        let config = EdlConfig::from_toml(
            r#"
            [upload.entries.eventos]
            connection = "dynamodb_prod"
            table = "eventos"

            [upload.entries.resumo]
            connection = "mysql_app_dev"
            table = "resumo"
            schema = "app"
            columns = [{ name = "id", dtype = "BIGINT" }]
            "#,
        )
        .unwrap();

        let edl = ExtractDeleteAndLoad::builder()
            .config(config)
            .sql_client(Arc::new(RecordingSql::default()))
            .event_emitter(InMemoryEventEmitter::new())
            .build()
            .unwrap();

        let report = edl.upload_data(&HashMap::new()).await.unwrap();
        assert_eq!(report.entries_skipped, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "resumo");
    }
}
