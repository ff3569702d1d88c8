//! Resumos do lote após a extração e após a transformação

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use crate::schema::{CUSTOMER_ID, DELIVERY_DAYS, ORDER_DATE, ORDER_ID, PRODUCT_ID, PROFIT, PROFIT_MARGIN, SALES};
use crate::transform::Deduplicator;
use crate::types::{DataRow, DataValue};

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn column_count(data: &[DataRow]) -> usize {
    data.iter()
        .flat_map(|row| row.keys())
        .collect::<HashSet<_>>()
        .len()
}

fn null_values(data: &[DataRow]) -> usize {
    data.iter().flat_map(|row| row.values()).filter(|v| v.is_null()).count()
}

fn unique(data: &[DataRow], column: &str) -> usize {
    data.iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.is_null())
        .collect::<HashSet<_>>()
        .len()
}

/// Valor numérico de uma coluna; texto é interpretado quando possível
fn numeric(value: &DataValue) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|f| f.is_finite())
}

fn total(data: &[DataRow], column: &str) -> f64 {
    let sum: f64 = data.iter().filter_map(|row| row.get(column).and_then(numeric)).sum();
    round_to(sum, 2)
}

fn average(data: &[DataRow], column: &str, decimals: i32) -> Option<f64> {
    let values: Vec<f64> = data.iter().filter_map(|row| row.get(column).and_then(numeric)).collect();
    if values.is_empty() {
        None
    } else {
        Some(round_to(values.iter().sum::<f64>() / values.len() as f64, decimals))
    }
}

/// Menor e maior data de pedido; texto para o lote bruto, datas para o transformado
fn order_date_range(data: &[DataRow]) -> (Option<String>, Option<String>) {
    let dates: Vec<String> = data
        .iter()
        .filter_map(|row| match row.get(ORDER_DATE) {
            Some(DataValue::Date(d)) => Some(d.format("%Y-%m-%d").to_string()),
            Some(DataValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect();

    (dates.iter().min().cloned(), dates.iter().max().cloned())
}

/// Resumo do lote bruto, logo após a extração
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractSummary {
    pub total_rows: usize,
    pub total_columns: usize,
    pub null_values: usize,
    pub duplicate_rows: usize,
    pub min_order_date: Option<String>,
    pub max_order_date: Option<String>,
    pub unique_orders: usize,
    pub unique_customers: usize,
    pub unique_products: usize,
    pub total_sales: f64,
    pub total_profit: f64,
}

impl ExtractSummary {
    pub fn from_rows(data: &[DataRow]) -> Self {
        let (min_order_date, max_order_date) = order_date_range(data);
        Self {
            total_rows: data.len(),
            total_columns: column_count(data),
            null_values: null_values(data),
            duplicate_rows: Deduplicator::count_duplicates(data),
            min_order_date,
            max_order_date,
            unique_orders: unique(data, ORDER_ID),
            unique_customers: unique(data, CUSTOMER_ID),
            unique_products: unique(data, PRODUCT_ID),
            total_sales: total(data, SALES),
            total_profit: total(data, PROFIT),
        }
    }
}

/// Contadores registrados pelas etapas de transformação, por coluna
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    /// Valores que falharam na conversão de tipo e viraram nulos
    pub coercion_failures: BTreeMap<String, usize>,
    /// Valores ausentes preenchidos pela reconciliação de nulos
    pub null_fills: BTreeMap<String, usize>,
}

impl TransformStats {
    /// Soma os contadores de outra etapa
    pub fn merge(&mut self, other: TransformStats) {
        for (column, count) in other.coercion_failures {
            *self.coercion_failures.entry(column).or_insert(0) += count;
        }
        for (column, count) in other.null_fills {
            *self.null_fills.entry(column).or_insert(0) += count;
        }
    }
}

/// Resumo do lote transformado e validado
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformSummary {
    pub total_rows: usize,
    pub total_columns: usize,
    pub null_values: usize,
    pub unique_orders: usize,
    pub unique_customers: usize,
    pub unique_products: usize,
    pub min_order_date: Option<String>,
    pub max_order_date: Option<String>,
    pub avg_delivery_days: Option<f64>,
    pub avg_profit_margin: Option<f64>,
    pub total_sales: f64,
    pub total_profit: f64,
    pub coercion_failures: BTreeMap<String, usize>,
    pub null_fills: BTreeMap<String, usize>,
}

impl TransformSummary {
    pub fn from_rows(data: &[DataRow]) -> Self {
        let (min_order_date, max_order_date) = order_date_range(data);
        Self {
            total_rows: data.len(),
            total_columns: column_count(data),
            null_values: null_values(data),
            unique_orders: unique(data, ORDER_ID),
            unique_customers: unique(data, CUSTOMER_ID),
            unique_products: unique(data, PRODUCT_ID),
            min_order_date,
            max_order_date,
            avg_delivery_days: average(data, DELIVERY_DAYS, 1),
            avg_profit_margin: average(data, PROFIT_MARGIN, 2),
            total_sales: total(data, SALES),
            total_profit: total(data, PROFIT),
            coercion_failures: BTreeMap::new(),
            null_fills: BTreeMap::new(),
        }
    }

    /// Anexa os contadores das etapas ao resumo
    pub fn with_stats(mut self, stats: TransformStats) -> Self {
        self.coercion_failures = stats.coercion_failures;
        self.null_fills = stats.null_fills;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_raw_rows, with_field};
    use crate::transform::sales_transformer;
    use crate::traits::Transformer;
    use crate::ETLConfig;

    #[test]
    fn test_extract_summary() {
        let summary = ExtractSummary::from_rows(&sample_raw_rows());

        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.total_columns, 20);
        assert_eq!(summary.null_values, 0);
        assert_eq!(summary.duplicate_rows, 1);
        assert_eq!(summary.unique_orders, 3);
        assert_eq!(summary.min_order_date.as_deref(), Some("2019-01-03"));
        assert_eq!(summary.max_order_date.as_deref(), Some("2019-01-05"));
        assert_eq!(summary.total_sales, 450.0);
        assert_eq!(summary.total_profit, 90.0);
    }

    #[tokio::test]
    async fn test_transform_summary() {
        let data = sales_transformer(&ETLConfig::default())
            .transform(sample_raw_rows())
            .await
            .unwrap();

        let summary = TransformSummary::from_rows(&data);

        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.total_columns, 29);
        assert_eq!(summary.null_values, 0);
        assert_eq!(summary.avg_delivery_days, Some(4.0));
        assert_eq!(summary.avg_profit_margin, Some(20.0));
        assert_eq!(summary.total_sales, 350.0);
        assert_eq!(summary.total_profit, 70.0);
    }

    #[tokio::test]
    async fn test_transform_summary_records_stage_counters() {
        let mut rows = sample_raw_rows();
        rows[1] = with_field(rows[1].clone(), "discount", DataValue::from("n/a"));
        rows[2] = with_field(rows[2].clone(), "city", DataValue::Null);
        let transformer = sales_transformer(&ETLConfig::default());

        let data = transformer.transform(rows).await.unwrap();
        let summary = TransformSummary::from_rows(&data).with_stats(transformer.stats());

        assert_eq!(summary.coercion_failures.get("discount"), Some(&1));
        assert_eq!(summary.coercion_failures.len(), 1);
        assert_eq!(summary.null_fills.get("discount"), Some(&1));
        assert_eq!(summary.null_fills.get("city"), Some(&1));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["coercion_failures"]["discount"], 1);
        assert_eq!(json["null_fills"]["city"], 1);
    }
}
