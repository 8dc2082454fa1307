use async_trait::async_trait;

use crate::error::Result;
use crate::kv::ScanOptions;
use crate::resolver::AwsCredentials;
use crate::sql::{redshift_copy_statement, SqlConnection, StagingCopy, UploadTarget};
use crate::types::{DataTable, EdlEvent};

/// Trait para componentes que decodificam um arquivo em tabela
pub trait TableDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DataTable>;
}

/// Trait para componentes que serializam uma tabela em arquivo
pub trait TableEncoder: Send + Sync {
    fn encode(&self, table: &DataTable) -> Result<Vec<u8>>;
}

/// Trait para backends relacionais usados pelo orquestrador
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Executa um comando (DELETE, TRUNCATE, DDL) e retorna as linhas afetadas
    async fn execute(&self, conn: &SqlConnection, statement: &str) -> Result<u64>;

    /// Executa uma consulta e materializa o resultado
    async fn read(&self, conn: &SqlConnection, query: &str) -> Result<DataTable>;

    /// Cria a tabela se necessário e insere os dados em lotes
    async fn upload(&self, conn: &SqlConnection, data: &DataTable, target: &UploadTarget) -> Result<u64>;

    /// Carrega um arquivo de staging já enviado ao object storage
    async fn copy_from_staging(&self, conn: &SqlConnection, copy: &StagingCopy) -> Result<()> {
        let statement = redshift_copy_statement(copy);
        self.execute(conn, &statement).await?;
        Ok(())
    }
}

/// Trait para leitura em massa de um key-value store
#[async_trait]
pub trait KeyValueReader: Send + Sync {
    /// Lê a tabela inteira (paginando) aplicando filtros opcionais
    async fn scan(
        &self,
        table: &str,
        credentials: &AwsCredentials,
        options: &ScanOptions,
    ) -> Result<DataTable>;
}

/// Trait para emissão de eventos do orquestrador
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emite um evento
    async fn emit(&self, event: EdlEvent) -> Result<()>;
}
