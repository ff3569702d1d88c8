use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::schema::{ColumnType, DEFAULT_DATE_FORMAT, SOURCE_COLUMNS};
use crate::summary::TransformStats;
use crate::types::{DataRow, DataValue};
use crate::traits::Transformer;

/// Contagem de valores que falharam na conversão, por coluna
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    failures: BTreeMap<String, usize>,
}

impl CoercionReport {
    fn record(&mut self, column: &str) {
        *self.failures.entry(column.to_string()).or_insert(0) += 1;
    }

    /// Falhas de uma coluna (zero se não houve)
    pub fn failures(&self, column: &str) -> usize {
        self.failures.get(column).copied().unwrap_or(0)
    }

    /// Total de falhas em todas as colunas
    pub fn total(&self) -> usize {
        self.failures.values().sum()
    }

    /// Colunas com pelo menos uma falha
    pub fn columns(&self) -> impl Iterator<Item = (&str, usize)> {
        self.failures.iter().map(|(column, count)| (column.as_str(), *count))
    }
}

/// Converte os campos textuais de origem para os tipos declarados
///
/// Datas usam um formato fixo; números que não convertem viram `Null` e são
/// contados no [`CoercionReport`]. Nenhuma falha de conversão aborta o lote.
#[derive(Debug, Clone)]
pub struct TypeNormalizer {
    date_format: String,
    last_report: Arc<Mutex<CoercionReport>>,
}

impl TypeNormalizer {
    pub fn new() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            last_report: Arc::default(),
        }
    }

    /// Define o formato de data (sintaxe `strftime` do chrono)
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Normaliza o lote e devolve o relatório de falhas por coluna
    pub fn normalize(&self, data: Vec<DataRow>) -> (Vec<DataRow>, CoercionReport) {
        let mut report = CoercionReport::default();

        let rows = data
            .into_iter()
            .map(|mut row| {
                for (column, column_type) in SOURCE_COLUMNS {
                    if *column_type == ColumnType::Text {
                        continue;
                    }
                    if let Some(value) = row.get_mut(*column) {
                        let converted = self.coerce(value, *column_type);
                        if converted.is_null() && !value.is_null() {
                            report.record(column);
                        }
                        *value = converted;
                    }
                }
                row
            })
            .collect();

        (rows, report)
    }

    fn coerce(&self, value: &DataValue, target: ColumnType) -> DataValue {
        if target.accepts(value) {
            return value.clone();
        }

        match (target, value) {
            (ColumnType::Date, DataValue::String(s)) => self.parse_date(s).into(),
            (ColumnType::Float, DataValue::String(s)) => parse_float(s).into(),
            (ColumnType::Float, DataValue::Integer(i)) => DataValue::Float(*i as f64),
            (ColumnType::Integer, DataValue::String(s)) => parse_integer(s).into(),
            (ColumnType::Integer, DataValue::Float(f)) => float_to_integer(*f).into(),
            _ => DataValue::Null,
        }
    }

    fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), &self.date_format).ok()
    }
}

impl Default for TypeNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| parse_float(trimmed).and_then(float_to_integer))
}

/// Aceita apenas floats sem parte fracionária ("3.0" vira 3)
fn float_to_integer(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

#[async_trait]
impl Transformer for TypeNormalizer {
    async fn transform(&self, data: Vec<DataRow>) -> Result<Vec<DataRow>> {
        let (rows, report) = self.normalize(data);

        if report.total() == 0 {
            tracing::info!(rows = rows.len(), "Todos os campos convertidos com sucesso");
        } else {
            for (column, failures) in report.columns() {
                tracing::warn!(column, failures, "Valores que falharam na conversão de tipo");
            }
        }
        *self.last_report.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = report;

        Ok(rows)
    }

    fn name(&self) -> &str {
        "normalize"
    }

    fn stats(&self) -> TransformStats {
        let report = self.last_report.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        TransformStats {
            coercion_failures: report.failures.clone(),
            ..TransformStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_raw_rows, with_field};

    #[test]
    fn test_fix_data_types() {
        let (rows, report) = TypeNormalizer::new().normalize(sample_raw_rows());

        assert_eq!(report.total(), 0);
        assert_eq!(rows[0]["order_date"], DataValue::Date(NaiveDate::from_ymd_opt(2019, 1, 3).unwrap()));
        assert_eq!(rows[0]["ship_date"], DataValue::Date(NaiveDate::from_ymd_opt(2019, 1, 7).unwrap()));
        assert_eq!(rows[1]["sales"], DataValue::Float(200.0));
        assert_eq!(rows[1]["discount"], DataValue::Float(0.1));
        assert_eq!(rows[2]["quantity"], DataValue::Integer(3));
        assert_eq!(rows[0]["customer_id"], DataValue::from("CUST-001"));
    }

    #[test]
    fn test_unparsable_values_become_null_and_are_counted() {
        let rows = sample_raw_rows();
        let data = vec![
            with_field(rows[0].clone(), "order_date", DataValue::from("03/01/2019")),
            with_field(rows[1].clone(), "sales", DataValue::from("n/a")),
            with_field(rows[2].clone(), "quantity", DataValue::from("2.5")),
            with_field(rows[2].clone(), "profit", DataValue::from("NaN")),
        ];

        let (normalized, report) = TypeNormalizer::new().normalize(data);

        assert!(normalized[0]["order_date"].is_null());
        assert!(normalized[1]["sales"].is_null());
        assert!(normalized[2]["quantity"].is_null());
        assert!(normalized[3]["profit"].is_null());
        assert_eq!(report.failures("order_date"), 1);
        assert_eq!(report.failures("sales"), 1);
        assert_eq!(report.failures("quantity"), 1);
        assert_eq!(report.failures("profit"), 1);
        assert_eq!(report.total(), 4);
    }

    #[test]
    fn test_existing_nulls_are_not_failures() {
        let row = with_field(sample_raw_rows().remove(0), "discount", DataValue::Null);

        let (normalized, report) = TypeNormalizer::new().normalize(vec![row]);

        assert!(normalized[0]["discount"].is_null());
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_whole_float_quantity_is_accepted() {
        let row = with_field(sample_raw_rows().remove(0), "quantity", DataValue::from(" 4.0 "));

        let (normalized, _) = TypeNormalizer::new().normalize(vec![row]);
        assert_eq!(normalized[0]["quantity"], DataValue::Integer(4));
    }

    #[test]
    fn test_custom_date_format() {
        let row = with_field(sample_raw_rows().remove(0), "order_date", DataValue::from("1/3/2019"));

        let (normalized, report) = TypeNormalizer::new()
            .with_date_format("%m/%d/%Y")
            .normalize(vec![row]);

        assert_eq!(normalized[0]["order_date"], DataValue::Date(NaiveDate::from_ymd_opt(2019, 1, 3).unwrap()));
        // ship_date continua no formato ISO e falha com o formato americano
        assert_eq!(report.failures("ship_date"), 1);
    }
}
