//! Arquivos de log de execução, tempo e erro
//!
//! Cada arquivo recebe um cabeçalho (régua de `#`, título, régua) apenas na
//! criação; as chamadas seguintes só acrescentam o corpo.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{ExecutionError, Result};

const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const SEPARATOR: &str = "------------------------------------------------------\n\n";

pub const EXEC_TITLE: &str = "#                    Process output                    #";
pub const TIME_TITLE: &str =
    "# Time variable          Time value          Date          Observations          #";
pub const ERROR_SUMMARY_TITLE: &str =
    "# Error variable          Error description          Date          #";
pub const ERROR_DETAILED_TITLE: &str =
    "#                    Detailed error description                    #";

/// Destino do log: arquivo, stdout ou ambos
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOptions {
    pub show_output: bool,
    pub save_logs: bool,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_show_output(mut self, show: bool) -> Self {
        self.show_output = show;
        self
    }

    pub fn with_save_logs(mut self, save: bool) -> Self {
        self.save_logs = save;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLogMode {
    #[default]
    Summary,
    Detailed,
}

impl ErrorLogMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLogMode::Summary => "summary",
            ErrorLogMode::Detailed => "detailed",
        }
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ExecutionError::EmptyArgument { name: name.to_string() }.into());
    }
    Ok(())
}

fn header(title: &str) -> String {
    let rule = "#".repeat(title.chars().count());
    format!("{rule}\n{title}\n{rule}\n\n")
}

fn now() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

async fn emit(dir: &Path, file_name: &str, header: &str, body: &str, opts: &LogOptions) -> Result<PathBuf> {
    let path = dir.join(file_name);

    if opts.save_logs {
        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        if file.metadata().await?.len() == 0 {
            file.write_all(header.as_bytes()).await?;
        }
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
    }

    if opts.show_output {
        println!("{}{}", header, body);
    }

    Ok(path)
}

/// Registra a saída de um processo em `<name>.log`
pub async fn write_exec_log(
    dir: impl AsRef<Path>,
    name: &str,
    process_name: &str,
    output: &str,
    opts: &LogOptions,
) -> Result<PathBuf> {
    require_non_empty("dir", &dir.as_ref().to_string_lossy())?;
    require_non_empty("name", name)?;
    require_non_empty("process_name", process_name)?;

    let body = format!(
        "Date:\n\n {}\n\nProcess name:\n\n {}\n\nOutput:\n\n {}\n\n{}",
        now(),
        process_name,
        output,
        SEPARATOR
    );
    emit(dir.as_ref(), &format!("{}.log", name), &header(EXEC_TITLE), &body, opts).await
}

/// Registra uma medida de tempo em `<name>.log`
pub async fn write_time_log(
    dir: impl AsRef<Path>,
    name: &str,
    time_var: &str,
    time_val: &str,
    obs: Option<&str>,
    opts: &LogOptions,
) -> Result<PathBuf> {
    require_non_empty("dir", &dir.as_ref().to_string_lossy())?;
    require_non_empty("name", name)?;
    require_non_empty("time_var", time_var)?;

    let body = format!(
        "{}          {}          {}          {}\n",
        time_var,
        time_val,
        now(),
        obs.unwrap_or("")
    );
    emit(dir.as_ref(), &format!("{}.log", name), &header(TIME_TITLE), &body, opts).await
}

/// Registra um erro em `<name>_summary.log` ou `<name>_detailed.log`
pub async fn write_error_log(
    dir: impl AsRef<Path>,
    name: &str,
    err_var: &str,
    err_desc: &str,
    mode: ErrorLogMode,
    opts: &LogOptions,
) -> Result<PathBuf> {
    require_non_empty("dir", &dir.as_ref().to_string_lossy())?;
    require_non_empty("name", name)?;
    require_non_empty("err_var", err_var)?;
    require_non_empty("err_desc", err_desc)?;

    let (title, body) = match mode {
        ErrorLogMode::Summary => (
            ERROR_SUMMARY_TITLE,
            format!("{}          {}          {}\n", err_var, err_desc, now()),
        ),
        ErrorLogMode::Detailed => (
            ERROR_DETAILED_TITLE,
            format!(
                "Date:\n\n {}\n\nError variable:\n\n {}\n\nError description:\n\n {}\n\n{}",
                now(),
                err_var,
                err_desc,
                SEPARATOR
            ),
        ),
    };

    let file_name = format!("{}_{}.log", name, mode.as_str());
    emit(dir.as_ref(), &file_name, &header(title), &body, opts).await
}
