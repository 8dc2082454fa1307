//! # I/O relacional
//!
//! Tipos trocados entre o orquestrador e o [`SqlClient`](crate::traits::SqlClient),
//! montagem de URL de conexão e a implementação padrão sobre `sqlx`.

pub mod connection;
pub mod redshift;
pub mod sqlx_client;

pub use connection::connection_url;
pub use redshift::{redshift_copy_statement, StagingCopy};
pub use sqlx_client::SqlxClient;

use std::collections::BTreeMap;

use crate::config::{ColumnSpec, InsertMethod};
use crate::resolver::{BackendKind, ConnectionInfo};

/// Tudo o que uma chamada SQL precisa para abrir a conexão
#[derive(Debug, Clone)]
pub struct SqlConnection {
    pub info: ConnectionInfo,
    /// Substitui a URL montada a partir de `info`
    pub custom_conn_str: Option<String>,
    pub connect_args: BTreeMap<String, String>,
    pub max_n_try: usize,
}

impl SqlConnection {
    pub fn new(info: ConnectionInfo) -> Self {
        Self {
            info,
            custom_conn_str: None,
            connect_args: BTreeMap::new(),
            max_n_try: 3,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.info.kind
    }
}

/// Coluna de destino com o tipo SQL já resolvido
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlColumn {
    pub name: String,
    pub sql_type: String,
}

/// Destino de um upload
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub schema: String,
    pub table: String,
    pub columns: Vec<SqlColumn>,
    pub chunk_size: usize,
    pub method: InsertMethod,
    pub n_parallel: usize,
}

impl UploadTarget {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Resolve o tipo lógico (`String(50)`) em tipo SQL (`VARCHAR(50)`)
///
/// O nome base é procurado em `aliases` sem distinção de caixa; os argumentos
/// entre parênteses são preservados. Sem alias, o tipo é usado como está.
pub fn resolve_sql_type(dtype: &str, aliases: &BTreeMap<String, String>) -> String {
    let dtype = dtype.trim();
    let (base, args) = match dtype.find('(') {
        Some(pos) => (dtype[..pos].trim(), &dtype[pos..]),
        None => (dtype, ""),
    };

    let resolved = aliases
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(base))
        .map(|(_, sql)| sql.as_str())
        .unwrap_or(base);

    format!("{}{}", resolved, args)
}

/// Resolve as colunas na ordem configurada
pub fn resolve_columns(columns: &[ColumnSpec], aliases: &BTreeMap<String, String>) -> Vec<SqlColumn> {
    columns
        .iter()
        .map(|c| SqlColumn {
            name: c.name.clone(),
            sql_type: resolve_sql_type(&c.dtype, aliases),
        })
        .collect()
}

/// Identificador entre aspas conforme o dialeto
pub fn quote_ident(kind: BackendKind, ident: &str) -> String {
    match kind {
        BackendKind::MySql => format!("`{}`", ident.replace('`', "``")),
        _ => format!("\"{}\"", ident.replace('"', "\"\"")),
    }
}

/// `schema.tabela` entre aspas; schema vazio é omitido
pub fn qualified_table(kind: BackendKind, schema: &str, table: &str) -> String {
    if schema.is_empty() {
        quote_ident(kind, table)
    } else {
        format!("{}.{}", quote_ident(kind, schema), quote_ident(kind, table))
    }
}

/// Marcador do parâmetro `index` (1-based)
pub fn placeholder(kind: BackendKind, index: usize, sql_type: &str) -> String {
    match kind {
        BackendKind::Postgres | BackendKind::Redshift => format!("CAST(${} AS {})", index, sql_type),
        _ => "?".to_string(),
    }
}
