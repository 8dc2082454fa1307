//! Execução de comandos de shell com logs de saída e duração

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ExecutionError, Result};

use super::logs::{write_exec_log, write_time_log, LogOptions};

#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub log_dir: PathBuf,
    pub exec_log_name: String,
    pub time_log_name: String,
    pub log: LogOptions,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            exec_log_name: "exec".to_string(),
            time_log_name: "texec".to_string(),
            log: LogOptions::default(),
        }
    }
}

impl ScriptOptions {
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_log(mut self, log: LogOptions) -> Self {
        self.log = log;
        self
    }
}

/// Resultado de [`execute_script`]
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub command: String,
    pub output: String,
    pub duration: Duration,
}

/// Formata como `H:MM:SS.ffffff`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        duration.subsec_micros()
    )
}

/// Executa `command` via `sh -c`, captura stdout e stderr e grava os logs
pub async fn execute_script(command: &str, opts: &ScriptOptions) -> Result<ScriptReport> {
    debug!(command = %command, "Executando processo");

    let started = Instant::now();
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    let duration = started.elapsed();

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(ExecutionError::NonZeroExit {
            command: command.to_string(),
            code: output.status.code(),
            output: text,
        }
        .into());
    }

    info!(
        command = %command,
        duration = %format_duration(duration),
        "Duração da execução do processo"
    );

    tokio::fs::create_dir_all(&opts.log_dir).await?;
    let quoted = format!("'{}'", command);
    write_exec_log(&opts.log_dir, &opts.exec_log_name, &quoted, &text, &opts.log).await?;
    write_time_log(
        &opts.log_dir,
        &opts.time_log_name,
        &quoted,
        &format_duration(duration),
        None,
        &opts.log,
    )
    .await?;

    Ok(ScriptReport {
        command: command.to_string(),
        output: text,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ETLError;
    use tempfile::TempDir;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "0:00:01.500000");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05.000000");
    }

    #[tokio::test]
    async fn test_execute_script_writes_logs() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        let opts = ScriptOptions::default()
            .with_log_dir(&log_dir)
            .with_log(LogOptions::new().with_save_logs(true));

        let report = execute_script("echo ola; echo erro 1>&2", &opts).await.unwrap();

        assert!(report.output.contains("ola"));
        assert!(report.output.contains("erro"));
        let exec = std::fs::read_to_string(log_dir.join("exec.log")).unwrap();
        assert!(exec.contains("Process name:\n\n 'echo ola; echo erro 1>&2'"));
        assert!(log_dir.join("texec.log").exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_scripts_append_to_same_logs() {
        let dir = TempDir::new().unwrap();
        let opts = ScriptOptions::default()
            .with_log_dir(dir.path())
            .with_log(LogOptions::new().with_save_logs(true));

        execute_script("echo um", &opts).await.unwrap();
        execute_script("echo dois", &opts).await.unwrap();

        let exec = tokio::fs::read_to_string(dir.path().join("exec.log")).await.unwrap();
        assert_eq!(exec.matches(crate::execution::logs::EXEC_TITLE).count(), 1);
        assert!(exec.contains("'echo um'"));
        assert!(exec.contains("'echo dois'"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let opts = ScriptOptions::default().with_log_dir(dir.path());

        let err = execute_script("echo falhou; exit 3", &opts).await.unwrap_err();
        match err {
            ETLError::Execution(ExecutionError::NonZeroExit { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert!(output.contains("falhou"));
            }
            other => panic!("erro inesperado: {other}"),
        }
    }
}
