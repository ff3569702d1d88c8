//! Eventos do pipeline: emissor que registra no log e emissor em memória

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::Result;
use crate::traits::EventEmitter;
use crate::types::PipelineEvent;
use tracing::{error, info};

/// Emissor padrão: cada evento vira uma linha de log estruturada
#[derive(Debug, Clone, Default)]
pub struct LoggingEventEmitter;

impl LoggingEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventEmitter for LoggingEventEmitter {
    async fn emit(&self, event: PipelineEvent) -> Result<()> {
        match event {
            PipelineEvent::Started { pipeline_id, timestamp } => {
                info!(pipeline_id = %pipeline_id, timestamp = ?timestamp, "Pipeline iniciado");
            }
            PipelineEvent::StateChanged { pipeline_id, old_state, new_state, .. } => {
                info!(
                    pipeline_id = %pipeline_id,
                    old_state = %old_state,
                    new_state = %new_state,
                    "Estado do pipeline alterado"
                );
            }
            PipelineEvent::PhaseCompleted { pipeline_id, phase, rows_count, elapsed_ms, .. } => {
                info!(
                    pipeline_id = %pipeline_id,
                    phase = %phase,
                    rows_count,
                    elapsed_ms,
                    "Fase concluída"
                );
            }
            PipelineEvent::Error { pipeline_id, error, timestamp } => {
                error!(
                    pipeline_id = %pipeline_id,
                    error = %error,
                    timestamp = ?timestamp,
                    "Erro no pipeline"
                );
            }
            PipelineEvent::Completed { pipeline_id, result, .. } => {
                for (table, rows) in &result.table_counts {
                    info!(pipeline_id = %pipeline_id, table = %table, rows, "Contagem final");
                }
                info!(
                    pipeline_id = %pipeline_id,
                    rows_processed = result.rows_processed,
                    rows_successful = result.rows_successful,
                    rows_failed = result.rows_failed,
                    execution_time_ms = result.execution_time_ms,
                    "Pipeline concluído"
                );
            }
        }

        Ok(())
    }
}

/// Emissor que guarda os eventos em memória, para testes e inspeção
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventEmitter {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl InMemoryEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PipelineEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Retorna todos os eventos capturados
    pub fn get_events(&self) -> Vec<PipelineEvent> {
        self.lock().clone()
    }

    /// Nomes das fases concluídas, na ordem em que terminaram
    pub fn completed_phases(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::PhaseCompleted { phase, .. } => Some(phase.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn event_count(&self) -> usize {
        self.lock().len()
    }
}

#[async_trait]
impl EventEmitter for InMemoryEventEmitter {
    async fn emit(&self, event: PipelineEvent) -> Result<()> {
        self.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PipelineResult, PipelineState};
    use std::time::SystemTime;

    #[tokio::test]
    async fn test_logging_event_emitter() {
        let emitter = LoggingEventEmitter::new();

        let mut result = PipelineResult::new();
        result.table_counts.insert("fact_sales".to_string(), 3);
        let event = PipelineEvent::Completed {
            pipeline_id: "sales".to_string(),
            result,
            timestamp: SystemTime::now(),
        };

        assert!(emitter.emit(event).await.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_event_emitter() {
        let emitter = InMemoryEventEmitter::new();
        assert_eq!(emitter.event_count(), 0);

        emitter
            .emit(PipelineEvent::StateChanged {
                pipeline_id: "sales".to_string(),
                old_state: PipelineState::Idle,
                new_state: PipelineState::Extracting,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();
        emitter
            .emit(PipelineEvent::PhaseCompleted {
                pipeline_id: "sales".to_string(),
                phase: "extract".to_string(),
                rows_count: 4,
                elapsed_ms: 1,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        assert_eq!(emitter.event_count(), 2);
        assert_eq!(emitter.completed_phases(), vec!["extract".to_string()]);

        emitter.clear();
        assert_eq!(emitter.event_count(), 0);
    }
}
