//! Sistema de eventos para observabilidade do orquestrador

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::traits::EventEmitter;
use crate::types::EdlEvent;

/// Implementação simples de EventEmitter que logga eventos
#[derive(Debug, Clone, Default)]
pub struct LoggingEventEmitter;

impl LoggingEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventEmitter for LoggingEventEmitter {
    async fn emit(&self, event: EdlEvent) -> Result<()> {
        match event {
            EdlEvent::PhaseStarted { phase, entries, timestamp } => {
                info!(
                    phase = %phase,
                    entries = entries,
                    timestamp = ?timestamp,
                    "Fase iniciada"
                );
            }
            EdlEvent::EntryCompleted { phase, key, rows, timestamp } => {
                info!(
                    phase = %phase,
                    key = %key,
                    rows = ?rows,
                    timestamp = ?timestamp,
                    "Entrada concluída"
                );
            }
            EdlEvent::EntrySkipped { phase, key, reason, timestamp } => {
                warn!(
                    phase = %phase,
                    key = %key,
                    reason = %reason,
                    timestamp = ?timestamp,
                    "Entrada ignorada"
                );
            }
            EdlEvent::EntryFailed { phase, key, error, timestamp } => {
                error!(
                    phase = %phase,
                    key = %key,
                    error = %error,
                    timestamp = ?timestamp,
                    "Erro na entrada"
                );
            }
            EdlEvent::PhaseCompleted { report, timestamp } => {
                info!(
                    phase = %report.phase,
                    entries_processed = report.entries_processed,
                    entries_successful = report.entries_successful,
                    entries_failed = report.entries_failed(),
                    entries_skipped = report.entries_skipped,
                    rows = report.rows,
                    execution_time_ms = report.execution_time_ms,
                    success_rate = report.success_rate(),
                    timestamp = ?timestamp,
                    "Fase concluída"
                );
            }
        }

        Ok(())
    }
}

/// EventEmitter que armazena eventos em memória para testes
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventEmitter {
    events: Arc<Mutex<Vec<EdlEvent>>>,
}

impl InMemoryEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retorna todos os eventos capturados
    pub fn get_events(&self) -> Vec<EdlEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Chaves das entradas que falharam, na ordem dos eventos
    pub fn failed_keys(&self) -> Vec<String> {
        self.get_events()
            .into_iter()
            .filter_map(|event| match event {
                EdlEvent::EntryFailed { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Limpa todos os eventos armazenados
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Retorna o número de eventos capturados
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }
}

#[async_trait]
impl EventEmitter for InMemoryEventEmitter {
    async fn emit(&self, event: EdlEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
