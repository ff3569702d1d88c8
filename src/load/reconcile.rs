use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use crate::error::{LoadError, Result};
use crate::load::database::table_counts;
use crate::load::schema::FACT_TABLE;

/// Resultado da conferência da carga
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub table_counts: BTreeMap<String, u64>,
    pub expected_facts: u64,
    pub actual_facts: u64,
}

/// Confere se a tabela fato tem exatamente uma linha por registro validado
///
/// Roda depois do commit: uma divergência indica defeito na carga e exige
/// reconstruir o destino; não há rollback.
#[derive(Debug, Clone)]
pub struct LoadReconciler {
    pool: SqlitePool,
}

impl LoadReconciler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Conta as linhas de todas as tabelas do destino
    pub async fn table_counts(&self) -> Result<BTreeMap<String, u64>> {
        let mut conn = self.pool.acquire().await?;
        table_counts(&mut conn).await
    }

    pub async fn reconcile(&self, expected_facts: u64) -> Result<ReconciliationReport> {
        let counts = self.table_counts().await?;
        for (table, rows) in &counts {
            tracing::info!(table = %table, rows, "Linhas na tabela");
        }

        let actual_facts = counts.get(FACT_TABLE).copied().unwrap_or(0);
        if actual_facts != expected_facts {
            tracing::error!(
                expected = expected_facts,
                actual = actual_facts,
                "Divergência entre registros validados e tabela fato"
            );
            return Err(LoadError::RowCountMismatch {
                expected: expected_facts,
                actual: actual_facts,
            }
            .into());
        }

        tracing::info!(rows = actual_facts, "Reconciliação OK: contagem da tabela fato confere");
        Ok(ReconciliationReport {
            table_counts: counts,
            expected_facts,
            actual_facts,
        })
    }
}
