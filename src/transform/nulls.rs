use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::schema::{column_type, ColumnType, UNKNOWN_TEXT};
use crate::summary::TransformStats;
use crate::types::{DataRow, DataValue};
use crate::traits::Transformer;

/// Quantidade de valores preenchidos por coluna
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    fills: BTreeMap<String, usize>,
}

impl FillReport {
    pub fn filled(&self, column: &str) -> usize {
        self.fills.get(column).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.fills.values().sum()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, usize)> {
        self.fills.iter().map(|(column, count)| (column.as_str(), *count))
    }
}

/// Preenche os valores ausentes restantes conforme o tipo declarado da coluna
///
/// Colunas numéricas (incluindo a flag de fim de semana) recebem zero; as
/// demais, inclusive datas, recebem o texto `"Unknown"`. Não há imputação.
#[derive(Debug, Clone, Default)]
pub struct NullReconciler {
    last_report: Arc<Mutex<FillReport>>,
}

impl NullReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valor de preenchimento para um tipo de coluna
    pub fn fill_value(column_type: ColumnType) -> DataValue {
        match column_type {
            ColumnType::Float => DataValue::Float(0.0),
            ColumnType::Integer => DataValue::Integer(0),
            ColumnType::Boolean => DataValue::Boolean(false),
            ColumnType::Text | ColumnType::Date => DataValue::from(UNKNOWN_TEXT),
        }
    }

    pub fn reconcile(&self, data: Vec<DataRow>) -> (Vec<DataRow>, FillReport) {
        let mut report = FillReport::default();

        let rows = data
            .into_iter()
            .map(|mut row| {
                for (column, value) in row.iter_mut() {
                    if value.is_null() {
                        *value = Self::fill_value(column_type(column));
                        *report.fills.entry(column.clone()).or_insert(0) += 1;
                    }
                }
                row
            })
            .collect();

        (rows, report)
    }
}

#[async_trait]
impl Transformer for NullReconciler {
    async fn transform(&self, data: Vec<DataRow>) -> Result<Vec<DataRow>> {
        let (rows, report) = self.reconcile(data);

        for (column, count) in report.columns() {
            tracing::info!(column, count, "Valores ausentes preenchidos");
        }
        if report.total() == 0 {
            tracing::debug!("Nenhum valor ausente para preencher");
        }
        *self.last_report.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = report;

        Ok(rows)
    }

    fn name(&self) -> &str {
        "nulls"
    }

    fn stats(&self) -> TransformStats {
        let report = self.last_report.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        TransformStats {
            null_fills: report.fills.clone(),
            ..TransformStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_raw_rows, with_field};
    use crate::schema::{CITY, DISCOUNT, IS_WEEKEND, PROFIT_MARGIN, QUANTITY, SHIP_DATE};
    use crate::transform::{DerivationEngine, TypeNormalizer};

    #[test]
    fn test_handle_missing_values() {
        let rows = sample_raw_rows();
        let data = vec![
            with_field(rows[0].clone(), CITY, DataValue::Null),
            with_field(rows[1].clone(), DISCOUNT, DataValue::Null),
            with_field(rows[2].clone(), QUANTITY, DataValue::from("abc")),
        ];
        let (normalized, _) = TypeNormalizer::new().normalize(data);

        let (filled, report) = NullReconciler::new().reconcile(normalized);

        assert_eq!(filled[0][CITY], DataValue::from("Unknown"));
        assert_eq!(filled[1][DISCOUNT], DataValue::Float(0.0));
        assert_eq!(filled[2][QUANTITY], DataValue::Integer(0));
        assert_eq!(report.filled(CITY), 1);
        assert_eq!(report.filled(DISCOUNT), 1);
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn test_no_missing_values_remain() {
        let rows = sample_raw_rows();
        let data = vec![
            with_field(rows[0].clone(), SHIP_DATE, DataValue::from("not a date")),
            with_field(rows[1].clone(), "order_date", DataValue::Null),
        ];
        let (normalized, _) = TypeNormalizer::new().normalize(data);
        let (derived, _) = DerivationEngine::new().derive(normalized);

        let (filled, _) = NullReconciler::new().reconcile(derived);

        assert!(filled.iter().flat_map(|row| row.values()).all(|v| !v.is_null()));
        assert_eq!(filled[0][SHIP_DATE], DataValue::from("Unknown"));
        assert_eq!(filled[1][IS_WEEKEND], DataValue::Boolean(false));
        assert_eq!(filled[1][PROFIT_MARGIN], DataValue::Float(20.0));
    }
}
