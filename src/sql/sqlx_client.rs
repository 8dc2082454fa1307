//! [`SqlClient`] sobre o driver `Any` do sqlx (Postgres, Redshift, MySQL, SQLite)
//!
//! O driver `Any` não decodifica tipos de data; consultas de leitura devem
//! convertê-los para texto (`CAST(dia AS VARCHAR)`).

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{InsertMethod, PipelineConfig};
use crate::error::{ETLError, ExtractError, LoadError, Result};
use crate::resolver::BackendKind;
use crate::retry::{with_retry, RetryConfig};
use crate::traits::SqlClient;
use crate::types::{DataRow, DataTable, DataValue};

use super::{connection_url, placeholder, qualified_table, quote_ident, SqlConnection, UploadTarget};

/// Tipo usado no bind de uma coluna inteira, inclusive para nulos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl BindKind {
    fn infer(table: &DataTable, column: &str) -> Self {
        let mut kind: Option<BindKind> = None;
        for row in 0..table.len() {
            let candidate = match table.value(row, column) {
                DataValue::Null => continue,
                DataValue::Integer(_) => BindKind::Integer,
                DataValue::Float(_) => BindKind::Float,
                DataValue::Boolean(_) => BindKind::Boolean,
                _ => return BindKind::Text,
            };
            kind = match (kind, candidate) {
                (None, c) => Some(c),
                (Some(a), b) if a == b => Some(a),
                (Some(BindKind::Integer), BindKind::Float) | (Some(BindKind::Float), BindKind::Integer) => {
                    Some(BindKind::Float)
                }
                _ => return BindKind::Text,
            };
        }
        kind.unwrap_or(BindKind::Text)
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &DataValue,
    kind: BindKind,
) -> Query<'q, Any, AnyArguments<'q>> {
    match kind {
        BindKind::Integer => query.bind(value.as_integer()),
        BindKind::Float => query.bind(value.as_float()),
        BindKind::Boolean => query.bind(value.as_boolean()),
        BindKind::Text => query.bind(value.as_string()),
    }
}

/// Converte uma célula do `AnyRow` testando os tipos suportados pelo driver
fn row_value(row: &AnyRow, index: usize) -> DataValue {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(DataValue::Integer).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map(|i| DataValue::Integer(i as i64)).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return v.map(|i| DataValue::Integer(i as i64)).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(DataValue::Float).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return v.map(|f| DataValue::Float(f as f64)).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(DataValue::Boolean).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(DataValue::String).unwrap_or(DataValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|b| DataValue::String(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(DataValue::Null);
    }
    DataValue::Null
}

/// Falha de conexão durante o upload é atribuída ao destino
fn destination_error(err: ETLError) -> ETLError {
    match err {
        ETLError::Extract(ExtractError::Connection(msg)) => {
            ETLError::Load(LoadError::DestinationConnection(msg))
        }
        other => other,
    }
}

/// Insere um lote; no modo `Single` cada linha tem o próprio retry,
/// de modo que uma falha não repete as linhas já gravadas
async fn insert_chunk<'c, F, Fut>(
    chunk: &'c [DataRow],
    method: InsertMethod,
    retry: &RetryConfig,
    table: &str,
    insert: F,
) -> Result<u64>
where
    F: Fn(&'c [DataRow]) -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    match method {
        InsertMethod::Multi => with_retry(retry, table, || insert(chunk)).await,
        InsertMethod::Single => {
            let mut total = 0;
            for row in chunk {
                total += with_retry(retry, table, || insert(std::slice::from_ref(row))).await?;
            }
            Ok(total)
        }
    }
}

/// Cliente SQL com pool por URL
pub struct SqlxClient {
    pools: Mutex<HashMap<String, AnyPool>>,
    pool_size: u32,
    connect_timeout: Duration,
    retry_delay_ms: u64,
}

impl Default for SqlxClient {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl SqlxClient {
    pub fn new(config: &PipelineConfig) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            pools: Mutex::new(HashMap::new()),
            pool_size: config.connection_pool_size.max(1),
            connect_timeout: Duration::from_secs(config.connection_timeout_seconds),
            retry_delay_ms: config.retry_delay_ms,
        }
    }

    fn retry_config(&self, conn: &SqlConnection) -> RetryConfig {
        RetryConfig::new(conn.max_n_try).with_delay_ms(self.retry_delay_ms)
    }

    async fn pool(&self, conn: &SqlConnection) -> Result<AnyPool> {
        let url = connection_url(conn)?;
        let mut pools = self.pools.lock().await;

        if let Some(pool) = pools.get(&url) {
            return Ok(pool.clone());
        }

        debug!(connection = %conn.info.name, kind = %conn.kind(), "Abrindo pool de conexões");
        let pool = AnyPoolOptions::new()
            .max_connections(self.pool_size)
            .acquire_timeout(self.connect_timeout)
            .connect(&url)
            .await?;

        pools.insert(url, pool.clone());
        Ok(pool)
    }

    /// Fecha todos os pools abertos
    pub async fn close(&self) {
        let mut pools = self.pools.lock().await;
        for (_, pool) in pools.drain() {
            pool.close().await;
        }
    }

    fn create_table_statement(kind: BackendKind, target: &UploadTarget) -> String {
        let columns: Vec<String> = target
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(kind, &c.name), c.sql_type))
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            qualified_table(kind, &target.schema, &target.table),
            columns.join(", ")
        )
    }

    /// INSERT com `rows` linhas de valores
    fn insert_statement(kind: BackendKind, target: &UploadTarget, rows: usize) -> String {
        let names: Vec<String> = target.columns.iter().map(|c| quote_ident(kind, &c.name)).collect();
        let width = target.columns.len();

        let values: Vec<String> = (0..rows)
            .map(|r| {
                let params: Vec<String> = target
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(c, column)| placeholder(kind, r * width + c + 1, &column.sql_type))
                    .collect();
                format!("({})", params.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            qualified_table(kind, &target.schema, &target.table),
            names.join(", "),
            values.join(", ")
        )
    }

    async fn insert_rows(
        pool: &AnyPool,
        kind: BackendKind,
        target: &UploadTarget,
        columns: &[(String, BindKind)],
        rows: &[DataRow],
    ) -> Result<u64> {
        let statement = Self::insert_statement(kind, target, rows.len());
        let mut query = sqlx::query(&statement);
        for row in rows {
            for (name, bind) in columns {
                let value = row.get(name).unwrap_or(&DataValue::Null);
                query = bind_value(query, value, *bind);
            }
        }
        Ok(query.execute(pool).await?.rows_affected())
    }
}

#[async_trait]
impl SqlClient for SqlxClient {
    async fn execute(&self, conn: &SqlConnection, statement: &str) -> Result<u64> {
        let pool = self.pool(conn).await?;

        let affected = with_retry(&self.retry_config(conn), &conn.info.name, || async {
            Ok(sqlx::query(statement).execute(&pool).await?.rows_affected())
        })
        .await?;

        debug!(connection = %conn.info.name, rows_affected = affected, "Comando executado");
        Ok(affected)
    }

    async fn read(&self, conn: &SqlConnection, query: &str) -> Result<DataTable> {
        let pool = self.pool(conn).await?;

        let rows = with_retry(&self.retry_config(conn), &conn.info.name, || async {
            Ok(sqlx::query(query).fetch_all(&pool).await?)
        })
        .await?;

        let mut table = match rows.first() {
            Some(first) => DataTable::new(first.columns().iter().map(|c| c.name().to_string())),
            None => DataTable::default(),
        };

        for row in &rows {
            table.push_values((0..row.len()).map(|i| row_value(row, i)));
        }

        info!(connection = %conn.info.name, rows = table.len(), "Consulta materializada");
        Ok(table)
    }

    async fn upload(&self, conn: &SqlConnection, data: &DataTable, target: &UploadTarget) -> Result<u64> {
        let kind = conn.kind();
        let data = data.select(&target.column_names())?;
        let pool = self.pool(conn).await.map_err(destination_error)?;
        let retry = self.retry_config(conn);

        let create = Self::create_table_statement(kind, target);
        with_retry(&retry, &target.table, || async {
            sqlx::query(&create).execute(&pool).await?;
            Ok(())
        })
        .await?;

        let columns: Vec<(String, BindKind)> = target
            .columns
            .iter()
            .map(|c| (c.name.clone(), BindKind::infer(&data, &c.name)))
            .collect();

        let chunk_size = target.chunk_size.max(1);
        let (pool, retry, columns) = (&pool, &retry, &columns);
        let tasks: Vec<_> = data
            .rows
            .chunks(chunk_size)
            .map(move |chunk| {
                insert_chunk(chunk, target.method, retry, &target.table, move |rows| {
                    Self::insert_rows(pool, kind, target, columns, rows)
                })
            })
            .collect();

        let inserted: Vec<u64> = stream::iter(tasks)
            .buffer_unordered(target.n_parallel.max(1))
            .try_collect()
            .await?;

        let total: u64 = inserted.iter().sum();
        info!(
            table = %target.table,
            rows = total,
            chunks = inserted.len(),
            "Upload concluído"
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlColumn;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn target() -> UploadTarget {
        UploadTarget {
            schema: "public".into(),
            table: "resumo".into(),
            columns: vec![
                SqlColumn { name: "id".into(), sql_type: "BIGINT".into() },
                SqlColumn { name: "nome".into(), sql_type: "VARCHAR(50)".into() },
            ],
            chunk_size: 100,
            method: InsertMethod::Multi,
            n_parallel: 2,
        }
    }

    #[test]
    fn test_create_table_statement() {
        assert_eq!(
            SqlxClient::create_table_statement(BackendKind::Postgres, &target()),
            "CREATE TABLE IF NOT EXISTS \"public\".\"resumo\" (\"id\" BIGINT, \"nome\" VARCHAR(50))"
        );
    }

    #[test]
    fn test_insert_statement_multi_row() {
        assert_eq!(
            SqlxClient::insert_statement(BackendKind::MySql, &target(), 2),
            "INSERT INTO `public`.`resumo` (`id`, `nome`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(
            SqlxClient::insert_statement(BackendKind::Postgres, &target(), 1),
            "INSERT INTO \"public\".\"resumo\" (\"id\", \"nome\") VALUES (CAST($1 AS BIGINT), CAST($2 AS VARCHAR(50)))"
        );
    }

    fn ids(ids: &[i64]) -> Vec<DataRow> {
        ids.iter()
            .map(|id| DataRow::from([("id".to_string(), DataValue::Integer(*id))]))
            .collect()
    }

    /// Tabela em memória cuja primeira gravação do id 2 falha de forma transitória
    struct FlakyTable {
        stored: std::sync::Mutex<Vec<i64>>,
        failed: AtomicBool,
    }

    impl FlakyTable {
        fn new() -> Self {
            Self {
                stored: std::sync::Mutex::new(Vec::new()),
                failed: AtomicBool::new(false),
            }
        }

        /// Grava o lote inteiro ou nada, como um único INSERT
        fn insert(&self, rows: &[DataRow]) -> std::future::Ready<Result<u64>> {
            let ids: Vec<i64> = rows.iter().filter_map(|r| r["id"].as_integer()).collect();
            if ids.contains(&2) && !self.failed.swap(true, Ordering::SeqCst) {
                return std::future::ready(Err(ETLError::Extract(ExtractError::Transient(
                    "database is locked".into(),
                ))));
            }
            self.stored.lock().unwrap().extend(&ids);
            std::future::ready(Ok(ids.len() as u64))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_insert_retry_does_not_duplicate_rows() {
        let table = FlakyTable::new();
        let rows = ids(&[1, 2, 3]);
        let retry = RetryConfig::new(3).with_delay_ms(10);

        let inserted = insert_chunk(&rows, InsertMethod::Single, &retry, "t", |r| table.insert(r))
            .await
            .unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(*table.stored.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_insert_retries_whole_statement() {
        let table = FlakyTable::new();
        let rows = ids(&[1, 2, 3]);
        let retry = RetryConfig::new(3).with_delay_ms(10);

        let inserted = insert_chunk(&rows, InsertMethod::Multi, &retry, "t", |r| table.insert(r))
            .await
            .unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(*table.stored.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let rows = ids(&[1]);
        let retry = RetryConfig::new(3).with_delay_ms(10);

        let result = insert_chunk(&rows, InsertMethod::Single, &retry, "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err(ETLError::Extract(ExtractError::Query("syntax error".into()))))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_destination_error() {
        let err = destination_error(ETLError::Extract(ExtractError::Connection("recusada".into())));
        assert!(matches!(err, ETLError::Load(LoadError::DestinationConnection(_))));
        assert!(err.is_recoverable());

        let err = destination_error(ETLError::Extract(ExtractError::Query("x".into())));
        assert!(matches!(err, ETLError::Extract(ExtractError::Query(_))));
    }

    #[test]
    fn test_bind_kind_inference() {
        let mut table = DataTable::new(["a", "b", "c"]);
        table.push_values([DataValue::Integer(1), DataValue::Null, DataValue::from("x")]);
        table.push_values([DataValue::Float(1.5), DataValue::Null, DataValue::Integer(2)]);

        assert_eq!(BindKind::infer(&table, "a"), BindKind::Float);
        assert_eq!(BindKind::infer(&table, "b"), BindKind::Text);
        assert_eq!(BindKind::infer(&table, "c"), BindKind::Text);
    }
}
