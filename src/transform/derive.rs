use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use crate::error::Result;
use crate::schema::{
    DELIVERY_DAYS, IS_WEEKEND, ORDER_DATE, ORDER_DAY_NAME, ORDER_MONTH, ORDER_MONTH_NAME,
    ORDER_QUARTER, ORDER_WEEK, ORDER_YEAR, PROFIT, PROFIT_MARGIN, SALES, SHIP_DATE,
};
use crate::types::{DataRow, DataValue};
use crate::traits::Transformer;

/// Decomposição de calendário de uma data
///
/// Compartilhada pelo motor de derivação (data do pedido) e pela dimensão de
/// datas do star schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarParts {
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub month_name: String,
    pub day: u32,
    /// 0 = segunda-feira, 6 = domingo
    pub day_of_week: u32,
    pub day_name: String,
    /// Semana ISO 8601
    pub week_of_year: u32,
    pub is_weekend: bool,
}

impl CalendarParts {
    pub fn from_date(date: NaiveDate) -> Self {
        let weekday = date.weekday();
        Self {
            year: date.year(),
            month: date.month(),
            quarter: (date.month() - 1) / 3 + 1,
            month_name: date.format("%B").to_string(),
            day: date.day(),
            day_of_week: weekday.num_days_from_monday(),
            day_name: date.format("%A").to_string(),
            week_of_year: date.iso_week().week(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

/// Margem de lucro em percentual, arredondada em duas casas (empates para o par)
///
/// Vendas zeradas produzem `None` em vez de divisão por zero.
pub fn profit_margin(profit: f64, sales: f64) -> Option<f64> {
    if sales == 0.0 {
        return None;
    }
    let margin = profit / sales * 100.0;
    margin.is_finite().then(|| (margin * 100.0).round_ties_even() / 100.0)
}

/// Calcula os campos analíticos derivados
///
/// Cada campo derivado fica `Null` quando algum de seus insumos está ausente.
/// Prazos de entrega negativos são mantidos e apenas contados.
#[derive(Debug, Clone, Default)]
pub struct DerivationEngine;

impl DerivationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Deriva os campos de todo o lote; devolve também quantas linhas têm prazo negativo
    pub fn derive(&self, data: Vec<DataRow>) -> (Vec<DataRow>, usize) {
        let mut negative_delivery = 0;

        let rows = data
            .into_iter()
            .map(|mut row| {
                if Self::derive_row(&mut row) {
                    negative_delivery += 1;
                }
                row
            })
            .collect();

        (rows, negative_delivery)
    }

    fn derive_row(row: &mut DataRow) -> bool {
        let float = |row: &DataRow, column: &str| row.get(column).and_then(DataValue::as_float);
        let date = |row: &DataRow, column: &str| row.get(column).and_then(DataValue::as_date);

        let margin = match (float(row, PROFIT), float(row, SALES)) {
            (Some(profit), Some(sales)) => profit_margin(profit, sales),
            _ => None,
        };

        let order_date = date(row, ORDER_DATE);
        let delivery_days = match (order_date, date(row, SHIP_DATE)) {
            (Some(order), Some(ship)) => Some((ship - order).num_days()),
            _ => None,
        };
        let calendar = order_date.map(CalendarParts::from_date);

        row.insert(PROFIT_MARGIN.to_string(), margin.into());
        row.insert(DELIVERY_DAYS.to_string(), delivery_days.into());

        let part = |f: fn(&CalendarParts) -> DataValue| {
            calendar.as_ref().map(f).unwrap_or(DataValue::Null)
        };
        row.insert(ORDER_YEAR.to_string(), part(|c| DataValue::Integer(i64::from(c.year))));
        row.insert(ORDER_MONTH.to_string(), part(|c| DataValue::Integer(i64::from(c.month))));
        row.insert(ORDER_QUARTER.to_string(), part(|c| DataValue::Integer(i64::from(c.quarter))));
        row.insert(ORDER_MONTH_NAME.to_string(), part(|c| DataValue::from(c.month_name.as_str())));
        row.insert(ORDER_DAY_NAME.to_string(), part(|c| DataValue::from(c.day_name.as_str())));
        row.insert(ORDER_WEEK.to_string(), part(|c| DataValue::Integer(i64::from(c.week_of_year))));
        row.insert(IS_WEEKEND.to_string(), part(|c| DataValue::Boolean(c.is_weekend)));

        delivery_days.is_some_and(|days| days < 0)
    }
}

#[async_trait]
impl Transformer for DerivationEngine {
    async fn transform(&self, data: Vec<DataRow>) -> Result<Vec<DataRow>> {
        let (rows, negative_delivery) = self.derive(data);

        if negative_delivery > 0 {
            tracing::warn!(rows = negative_delivery, "Linhas com prazo de entrega negativo");
        }
        tracing::info!(rows = rows.len(), "Campos derivados calculados");

        Ok(rows)
    }

    fn name(&self) -> &str {
        "derive"
    }
}
