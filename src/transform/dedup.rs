use async_trait::async_trait;
use std::collections::HashSet;
use crate::error::Result;
use crate::types::{DataRow, DataValue};
use crate::traits::Transformer;

/// Remove linhas duplicadas por igualdade da linha inteira
///
/// Mantém a primeira ocorrência e a ordem original. Não existe chave primária
/// declarada: duas transações distintas com todos os campos iguais são
/// fundidas numa só.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Chave de identidade da linha, independente da ordem do HashMap
    fn row_key(row: &DataRow) -> Vec<(String, DataValue)> {
        let mut fields: Vec<(String, DataValue)> = row
            .iter()
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        fields.sort();
        fields
    }

    /// Conta quantas linhas seriam removidas, sem alterar o lote
    pub fn count_duplicates(data: &[DataRow]) -> usize {
        let mut seen = HashSet::with_capacity(data.len());
        data.iter().filter(|row| !seen.insert(Self::row_key(row))).count()
    }
}

#[async_trait]
impl Transformer for Deduplicator {
    async fn transform(&self, data: Vec<DataRow>) -> Result<Vec<DataRow>> {
        let before = data.len();
        let mut seen = HashSet::with_capacity(before);

        let unique: Vec<DataRow> = data
            .into_iter()
            .filter(|row| seen.insert(Self::row_key(row)))
            .collect();

        let removed = before - unique.len();
        if removed > 0 {
            tracing::warn!(removed, rows_before = before, rows_after = unique.len(), "Linhas duplicadas removidas");
        } else {
            tracing::info!(rows = before, "Nenhuma duplicata encontrada");
        }

        Ok(unique)
    }

    fn name(&self) -> &str {
        "dedup"
    }
}
