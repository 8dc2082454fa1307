//! Retry limitado para chamadas a bibliotecas externas.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

/// Configuração de retry
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let factor = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.delay_ms as f64 * factor) as u64)
    }
}

/// Executa `operation` até `max_attempts` vezes, devolvendo o último erro
///
/// Só erros recuperáveis ([`crate::error::ETLError::is_recoverable`]) são repetidos;
/// os demais retornam na primeira tentativa.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_attempts && e.is_recoverable() => {
                let delay = config.delay_for(attempt);
                warn!(
                    operation = %name,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    error = %e,
                    "Tentativa falhou, repetindo em {:?}", delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ETLError, ExtractError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicUsize::new(0);
        let config = RetryConfig::new(3).with_delay_ms(10);

        let value = with_retry(&config, "teste", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ETLError::Extract(ExtractError::Connection("recusada".into())))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let calls = AtomicUsize::new(0);
        let config = RetryConfig::new(2).with_delay_ms(10);

        let result: Result<()> = with_retry(&config, "teste", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ETLError::Extract(ExtractError::Connection("recusada".into())))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_recoverable_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let config = RetryConfig::new(5).with_delay_ms(10);

        let result: Result<()> = with_retry(&config, "teste", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ETLError::Extract(ExtractError::Query("syntax error at or near".into())))
        })
        .await;

        assert!(matches!(result, Err(ETLError::Extract(ExtractError::Query(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_delay() {
        let config = RetryConfig::new(3).with_delay_ms(100);
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
    }
}
