//! Inicialização do tracing-subscriber

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::error::{ConfigError, ETLError, Result};

/// Instala o subscriber global. `RUST_LOG` tem precedência sobre `log_level`.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            ETLError::Config(ConfigError::InvalidValue {
                param: "log_level".to_string(),
                value: format!("{} ({})", config.log_level, e),
            })
        })?;

    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    result.map_err(|e| ETLError::Generic(anyhow::anyhow!("Falha ao inicializar logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_fails_gracefully() {
        let config = ObservabilityConfig::default();
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
