use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{ConfigError, ETLError, LoadError, Result, StorageError};

/// Representa uma linha de dados genérica
pub type DataRow = HashMap<String, DataValue>;

/// Valores de dados suportados
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    Array(Vec<DataValue>),
    Object(HashMap<String, DataValue>),
    /// Data sem horário (YYYY-MM-DD)
    Date(NaiveDate),
    /// Data e horário sem timezone (YYYY-MM-DD HH:MM:SS)
    DateTime(NaiveDateTime),
    /// Timestamp com timezone UTC
    Timestamp(DateTime<Utc>),
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Float(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Boolean(value)
    }
}

impl From<NaiveDate> for DataValue {
    fn from(value: NaiveDate) -> Self {
        DataValue::Date(value)
    }
}

impl From<NaiveDateTime> for DataValue {
    fn from(value: NaiveDateTime) -> Self {
        DataValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::Timestamp(value)
    }
}

impl DataValue {
    /// Converte para string se possível
    pub fn as_string(&self) -> Option<String> {
        match self {
            DataValue::String(s) => Some(s.clone()),
            DataValue::Integer(i) => Some(i.to_string()),
            DataValue::Float(f) => Some(format!("{:?}", f)),
            DataValue::Boolean(b) => Some(b.to_string()),
            DataValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            DataValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            DataValue::Timestamp(ts) => Some(ts.to_rfc3339()),
            DataValue::Array(_) | DataValue::Object(_) => {
                serde_json::to_string(&self.to_json()).ok()
            }
            DataValue::Null => None,
        }
    }

    /// Converte para inteiro se possível
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            DataValue::String(s) => s.parse().ok(),
            DataValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Converte para float se possível
    pub fn as_float(&self) -> Option<f64> {
        match self {
            DataValue::Float(f) => Some(*f),
            DataValue::Integer(i) => Some(*i as f64),
            DataValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Converte para boolean se possível
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            DataValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Some(true),
                "false" | "0" | "no" | "n" => Some(false),
                _ => None,
            },
            DataValue::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Verifica se é nulo
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Interpreta um campo textual (CSV, planilha) inferindo o tipo
    pub fn infer(value: &str) -> DataValue {
        if value.is_empty() || value.eq_ignore_ascii_case("null") {
            return DataValue::Null;
        }

        if let Ok(int_val) = value.parse::<i64>() {
            return DataValue::Integer(int_val);
        }

        if let Ok(float_val) = value.parse::<f64>() {
            return DataValue::Float(float_val);
        }

        match value.to_lowercase().as_str() {
            "true" => return DataValue::Boolean(true),
            "false" => return DataValue::Boolean(false),
            _ => {}
        }

        // Mesmos formatos que `as_string` escreve
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return DataValue::Date(date);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
            return DataValue::DateTime(dt);
        }

        DataValue::String(value.to_string())
    }

    /// Converte DataValue para serde_json::Value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DataValue::String(s) => serde_json::Value::String(s.clone()),
            DataValue::Integer(i) => serde_json::Value::Number(serde_json::Number::from(*i)),
            DataValue::Float(f) => {
                serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
            DataValue::Boolean(b) => serde_json::Value::Bool(*b),
            DataValue::Null => serde_json::Value::Null,
            DataValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(|v| v.to_json()).collect())
            }
            DataValue::Object(obj) => {
                let mut map = serde_json::Map::new();
                for (key, value) in obj {
                    map.insert(key.clone(), value.to_json());
                }
                serde_json::Value::Object(map)
            }
            DataValue::Date(date) => serde_json::Value::String(date.format("%Y-%m-%d").to_string()),
            DataValue::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            DataValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        }
    }

    /// Converte serde_json::Value para DataValue
    ///
    /// Strings não são reinterpretadas: datas gravadas em JSON voltam como
    /// `DataValue::String`.
    pub fn from_json(value: &serde_json::Value) -> DataValue {
        match value {
            serde_json::Value::String(s) => DataValue::String(s.clone()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DataValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    DataValue::Float(f)
                } else {
                    DataValue::String(n.to_string())
                }
            }
            serde_json::Value::Bool(b) => DataValue::Boolean(*b),
            serde_json::Value::Null => DataValue::Null,
            serde_json::Value::Array(arr) => {
                DataValue::Array(arr.iter().map(DataValue::from_json).collect())
            }
            serde_json::Value::Object(obj) => {
                let mut map = HashMap::new();
                for (key, value) in obj {
                    map.insert(key.clone(), DataValue::from_json(value));
                }
                DataValue::Object(map)
            }
        }
    }
}

/// Tabela em memória: colunas ordenadas + linhas
///
/// É o objeto tabular trocado entre leitores, codecs e loaders. A ordem de
/// `columns` é preservada na serialização (CSV, Parquet, planilha) e no upload SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<DataRow>,
}

impl DataTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Monta a tabela a partir de linhas, com colunas na ordem de primeira aparição
    pub fn from_rows(rows: Vec<DataRow>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            let mut keys: Vec<&String> = row.keys().filter(|k| !columns.contains(k)).collect();
            keys.sort();
            columns.extend(keys.into_iter().cloned());
        }
        Self { columns, rows }
    }

    /// Adiciona uma linha na ordem das colunas
    pub fn push_values<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = DataValue>,
    {
        let row = self.columns.iter().cloned().zip(values).collect();
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Valor de uma célula; ausente equivale a Null
    pub fn value<'a>(&'a self, row: usize, column: &str) -> &'a DataValue {
        static NULL: DataValue = DataValue::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// Projeta e reordena as colunas. Coluna inexistente é erro.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<DataTable> {
        for column in columns {
            if !self.columns.iter().any(|c| c == column.as_ref()) {
                return Err(ETLError::Load(LoadError::MissingColumn(
                    column.as_ref().to_string(),
                )));
            }
        }

        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(DataValue::Null)))
                    .collect()
            })
            .collect();

        Ok(DataTable { columns, rows })
    }

    /// Copia a tabela adicionando uma coluna de índice (0..n) na primeira posição
    pub fn with_index(&self, name: &str) -> DataTable {
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(name.to_string());
        columns.extend(self.columns.iter().cloned());

        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut row = row.clone();
                row.insert(name.to_string(), DataValue::Integer(i as i64));
                row
            })
            .collect();

        DataTable { columns, rows }
    }
}

/// Formatos de arquivo suportados no object storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
    Parquet,
    Excel,
    /// Bytes sem interpretação
    Bytes,
}

impl FileFormat {
    /// Infere pela última extensão do caminho
    pub fn from_path(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        let extension = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => return FileFormat::Bytes,
        };

        match extension.as_str() {
            "csv" | "txt" | "tsv" => FileFormat::Csv,
            "json" => FileFormat::Json,
            "parquet" | "pq" => FileFormat::Parquet,
            "xlsx" | "xls" => FileFormat::Excel,
            _ => FileFormat::Bytes,
        }
    }

    /// Nome de objeto usado quando o caminho só tem o bucket
    pub fn placeholder_name(&self) -> &'static str {
        match self {
            FileFormat::Csv => "file.csv",
            FileFormat::Json => "file.json",
            FileFormat::Parquet => "file.parquet",
            FileFormat::Excel => "file.xlsx",
            FileFormat::Bytes => "file.bin",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Json => "application/json",
            FileFormat::Parquet => "application/vnd.apache.parquet",
            FileFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            FileFormat::Bytes => "application/octet-stream",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Parquet => "parquet",
            FileFormat::Excel => "excel",
            FileFormat::Bytes => "bytes",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opções de leitura/escrita CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    /// Escreve (ou descarta na leitura) uma coluna `index` na primeira posição
    pub include_index: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            include_index: false,
        }
    }
}

impl CsvOptions {
    /// Valida separador (um byte) e encoding (somente UTF-8)
    pub fn from_config(separator: Option<&str>, encoding: Option<&str>) -> Result<Self> {
        let delimiter = match separator {
            None => b',',
            Some(sep) if sep.len() == 1 => sep.as_bytes()[0],
            Some(sep) => {
                return Err(ETLError::Config(ConfigError::InvalidValue {
                    param: "csv_separator".to_string(),
                    value: sep.to_string(),
                }))
            }
        };

        if let Some(encoding) = encoding {
            let normalized = encoding.to_lowercase().replace(['-', '_'], "");
            if normalized != "utf8" {
                return Err(ETLError::Storage(StorageError::UnsupportedEncoding(
                    encoding.to_string(),
                )));
            }
        }

        Ok(Self {
            delimiter,
            ..Self::default()
        })
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_index(mut self, include_index: bool) -> Self {
        self.include_index = include_index;
        self
    }
}

/// Fases do processo extract/delete/load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Download,
    Delete,
    Truncate,
    Upload,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Download, Phase::Delete, Phase::Truncate, Phase::Upload];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Download => "download",
            Phase::Delete => "delete",
            Phase::Truncate => "truncate",
            Phase::Upload => "upload",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Falha de uma entrada da configuração
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryFailure {
    pub key: String,
    pub error: String,
}

/// Resultado de uma fase do orquestrador
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub entries_processed: usize,
    pub entries_successful: usize,
    pub entries_skipped: usize,
    pub rows: usize,
    pub execution_time_ms: u64,
    pub failures: Vec<EntryFailure>,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            entries_processed: 0,
            entries_successful: 0,
            entries_skipped: 0,
            rows: 0,
            execution_time_ms: 0,
            failures: Vec::new(),
        }
    }

    pub fn entries_failed(&self) -> usize {
        self.failures.len()
    }

    pub fn success_rate(&self) -> f64 {
        if self.entries_processed == 0 {
            0.0
        } else {
            self.entries_successful as f64 / self.entries_processed as f64
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Converte falhas registradas em erro, para quem prefere abortar
    pub fn into_result(self) -> Result<PhaseReport> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let summary = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.key, f.error))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ETLError::Generic(anyhow::anyhow!(
            "{} entrada(s) falharam na fase {}: {}",
            self.failures.len(),
            self.phase,
            summary
        )))
    }
}

/// Eventos do orquestrador para monitoramento externo
#[derive(Debug, Clone)]
pub enum EdlEvent {
    /// Fase iniciada
    PhaseStarted {
        phase: Phase,
        entries: usize,
        timestamp: std::time::SystemTime,
    },
    /// Entrada concluída
    EntryCompleted {
        phase: Phase,
        key: String,
        rows: Option<u64>,
        timestamp: std::time::SystemTime,
    },
    /// Entrada ignorada (backend sem suporte à operação)
    EntrySkipped {
        phase: Phase,
        key: String,
        reason: String,
        timestamp: std::time::SystemTime,
    },
    /// Erro em uma entrada; a fase continua
    EntryFailed {
        phase: Phase,
        key: String,
        error: String,
        timestamp: std::time::SystemTime,
    },
    /// Fase concluída
    PhaseCompleted {
        report: PhaseReport,
        timestamp: std::time::SystemTime,
    },
}
