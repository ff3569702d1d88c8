use async_trait::async_trait;
use crate::error::{Result, TransformError};
use crate::schema::{column_type, CRITICAL_COLUMNS, DELIVERY_DAYS, DISCOUNT, QUANTITY, SALES};
use crate::types::{DataRow, DataValue};
use crate::traits::{Transformer, Validator};

/// Quantas posições de linha citar em cada mensagem de violação
const SAMPLE_ROWS: usize = 5;

/// Quality gate executado antes de qualquer escrita no banco
///
/// Todas as regras são avaliadas sobre o lote inteiro e as violações de todas
/// as linhas são agregadas numa única falha. Prazo de entrega negativo gera
/// apenas aviso.
#[derive(Debug, Clone, Default)]
pub struct RowValidator;

impl RowValidator {
    pub fn new() -> Self {
        Self
    }

    /// Valor ausente é `Null` ou qualquer valor fora do tipo declarado da coluna
    fn is_missing(column: &str, value: Option<&DataValue>) -> bool {
        match value {
            None | Some(DataValue::Null) => true,
            Some(value) => !column_type(column).accepts(value),
        }
    }

    fn violation(rule: &str, offending: &[usize]) -> Option<String> {
        if offending.is_empty() {
            return None;
        }
        let sample: Vec<String> = offending.iter().take(SAMPLE_ROWS).map(|i| i.to_string()).collect();
        Some(format!(
            "{}: {} linha(s) (posições {})",
            rule,
            offending.len(),
            sample.join(", ")
        ))
    }

    fn rows_where<F>(data: &[DataRow], predicate: F) -> Vec<usize>
    where
        F: Fn(&DataRow) -> bool,
    {
        data.iter()
            .enumerate()
            .filter(|(_, row)| predicate(row))
            .map(|(i, _)| i)
            .collect()
    }

    /// Linhas cujo prazo de entrega é negativo
    pub fn negative_delivery_rows(data: &[DataRow]) -> usize {
        data.iter()
            .filter_map(|row| row.get(DELIVERY_DAYS).and_then(DataValue::as_integer))
            .filter(|days| *days < 0)
            .count()
    }

    fn check(data: &[DataRow]) -> Vec<String> {
        let mut violations = Vec::new();

        for column in CRITICAL_COLUMNS {
            let offending = Self::rows_where(data, |row| Self::is_missing(column, row.get(*column)));
            violations.extend(Self::violation(&format!("{} com valor ausente", column), &offending));
        }

        let float = |row: &DataRow, column: &str| row.get(column).and_then(DataValue::as_float);

        let negative_quantity = Self::rows_where(data, |row| {
            row.get(QUANTITY).and_then(DataValue::as_integer).is_some_and(|q| q < 0)
        });
        violations.extend(Self::violation("quantity negativa", &negative_quantity));

        let negative_sales = Self::rows_where(data, |row| float(row, SALES).is_some_and(|s| s < 0.0));
        violations.extend(Self::violation("sales negativo", &negative_sales));

        let discount_out_of_range = Self::rows_where(data, |row| {
            float(row, DISCOUNT).is_some_and(|d| !(0.0..=1.0).contains(&d))
        });
        violations.extend(Self::violation("discount fora do intervalo [0, 1]", &discount_out_of_range));

        violations
    }
}

#[async_trait]
impl Validator for RowValidator {
    async fn validate(&self, data: &[DataRow]) -> Result<Vec<String>> {
        Ok(Self::check(data))
    }
}

#[async_trait]
impl Transformer for RowValidator {
    async fn transform(&self, data: Vec<DataRow>) -> Result<Vec<DataRow>> {
        let negative_delivery = Self::negative_delivery_rows(&data);
        if negative_delivery > 0 {
            tracing::warn!(rows = negative_delivery, "delivery_days negativo (não bloqueia a carga)");
        }

        let violations = self.validate(&data).await?;
        if !violations.is_empty() {
            for violation in &violations {
                tracing::error!(%violation, "Violação de qualidade");
            }
            return Err(TransformError::ValidationFailed(violations).into());
        }

        tracing::info!(rows = data.len(), "Validação de qualidade aprovada");
        Ok(data)
    }

    fn name(&self) -> &str {
        "validate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ETLError;
    use crate::fixtures::{sample_raw_rows, with_field};
    use crate::schema::{ORDER_DATE, PROFIT};
    use crate::transform::{DerivationEngine, NullReconciler, TypeNormalizer};

    fn prepared(rows: Vec<DataRow>) -> Vec<DataRow> {
        let (rows, _) = TypeNormalizer::new().normalize(rows);
        let (rows, _) = DerivationEngine::new().derive(rows);
        NullReconciler::new().reconcile(rows).0
    }

    #[tokio::test]
    async fn test_valid_batch_passes() {
        let data = prepared(sample_raw_rows());

        let violations = RowValidator::new().validate(&data).await.unwrap();
        assert!(violations.is_empty());

        let passed = RowValidator::new().transform(data).await.unwrap();
        assert_eq!(passed.len(), 4);
    }

    #[tokio::test]
    async fn test_discount_out_of_range_fails() {
        let rows = sample_raw_rows();
        let data = prepared(vec![
            rows[0].clone(),
            with_field(rows[1].clone(), DISCOUNT, DataValue::from("1.5")),
            with_field(rows[2].clone(), DISCOUNT, DataValue::from("-0.1")),
        ]);

        let err = RowValidator::new().transform(data).await.unwrap_err();
        match err {
            ETLError::Transform(TransformError::ValidationFailed(messages)) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].contains("discount"));
                assert!(messages[0].contains("2 linha(s)"));
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_violations_are_aggregated() {
        let rows = sample_raw_rows();
        let data = prepared(vec![
            with_field(rows[0].clone(), QUANTITY, DataValue::from("-1")),
            with_field(rows[1].clone(), SALES, DataValue::from("-5.0")),
            with_field(rows[2].clone(), ORDER_DATE, DataValue::from("garbage")),
        ]);

        let violations = RowValidator::new().validate(&data).await.unwrap();

        assert_eq!(violations.len(), 3);
        assert!(violations.iter().any(|v| v.starts_with("order_date com valor ausente")));
        assert!(violations.iter().any(|v| v.starts_with("quantity negativa")));
        assert!(violations.iter().any(|v| v.starts_with("sales negativo")));
    }

    #[tokio::test]
    async fn test_unreconciled_null_is_missing() {
        let row = with_field(prepared(sample_raw_rows()).remove(0), PROFIT, DataValue::Null);

        let violations = RowValidator::new().validate(&[row]).await.unwrap();
        assert_eq!(violations, vec!["profit com valor ausente: 1 linha(s) (posições 0)".to_string()]);
    }

    #[tokio::test]
    async fn test_negative_delivery_days_only_warn() {
        let row = with_field(sample_raw_rows().remove(0), "ship_date", DataValue::from("2019-01-01"));
        let data = prepared(vec![row]);

        assert_eq!(RowValidator::negative_delivery_rows(&data), 1);
        assert!(RowValidator::new().transform(data).await.is_ok());
    }
}
