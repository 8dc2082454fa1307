//! # Pontes GCP
//!
//! Jobs de export/load no BigQuery e import/export no Cloud SQL. Nos dois
//! casos a chamada submete o job e consulta o status em intervalo fixo até o
//! estado `DONE`. As APIs ficam atrás de traits ([`WarehouseApi`],
//! [`SqlAdminApi`]) com implementações REST sobre reqwest.

pub mod bigquery;
pub mod cloudsql;

pub use bigquery::{
    export_table, load_table, BigQueryRestClient, JobHandle, JobReport, TableRef, WarehouseApi,
    WriteDisposition,
};
pub use cloudsql::{
    export_data, import_data, CloudSqlRestClient, ExportRequest, ImportRequest, OperationHandle,
    OperationReport, OperationStatus, SqlAdminApi, SqlFileType,
};

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::GcpConfig;
use crate::error::{ConfigError, ETLError, GcpError, Result};

/// Variável de ambiente com o token OAuth usado quando a configuração não traz um
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Intervalo e limite opcional do polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` espera indefinidamente
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

impl PollSettings {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Chama `check` até devolver `Some`, dormindo `interval` entre as chamadas
pub(crate) async fn poll_until<T, F, Fut>(name: &str, settings: &PollSettings, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        if let Some(done) = check().await? {
            debug!(name = %name, polls = polls, "Polling concluído");
            return Ok(done);
        }

        if let Some(timeout) = settings.timeout {
            if started.elapsed() + settings.interval > timeout {
                return Err(GcpError::Timeout {
                    name: name.to_string(),
                    seconds: timeout.as_secs(),
                }
                .into());
            }
        }

        tokio::time::sleep(settings.interval).await;
    }
}

/// Token da configuração ou de [`ACCESS_TOKEN_ENV`]
pub(crate) fn access_token(config: &GcpConfig) -> Result<String> {
    config
        .access_token
        .clone()
        .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ETLError::Config(ConfigError::MissingRequiredParameter(format!(
                "gcp.access_token ou {}",
                ACCESS_TOKEN_ENV
            )))
        })
}

/// Converte a resposta HTTP em JSON, levando o corpo para a mensagem de erro
pub(crate) async fn json_response(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GcpError::UnexpectedResponse(format!("HTTP {}: {}", status, body)).into());
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_done() {
        let calls = AtomicU32::new(0);
        let settings = PollSettings::default().with_interval(Duration::from_secs(2));
        let started = Instant::now();

        let value = poll_until("job", &settings, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((n == 3).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout() {
        let settings = PollSettings::default()
            .with_interval(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(12));

        let err = poll_until("job", &settings, || async { Ok(None::<()>) })
            .await
            .unwrap_err();
        assert!(matches!(err, ETLError::Gcp(GcpError::Timeout { seconds: 12, .. })));
    }

    #[test]
    fn test_access_token_from_config() {
        let config = GcpConfig {
            access_token: Some("abc".into()),
            ..GcpConfig::default()
        };
        assert_eq!(access_token(&config).unwrap(), "abc");
    }
}
