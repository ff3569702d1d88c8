//! # Modelo dimensional
//!
//! Registros tipados do star schema e a montagem das dimensões e fatos a
//! partir do lote validado. Nada aqui toca o banco: a ordem e as chaves
//! substitutas são decididas em memória e apenas gravadas pelo loader.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use crate::error::{LoadError, Result};
use crate::schema::*;
use crate::transform::derive::CalendarParts;
use crate::types::{DataRow, DataValue};

/// Chave substituta reservada para o membro "desconhecido" de cada dimensão
pub const UNKNOWN_MEMBER_KEY: i64 = 0;

/// Chave natural do membro "desconhecido"
pub const UNKNOWN_MEMBER_ID: &str = "#UNKNOWN";

/// Codifica uma data como inteiro YYYYMMDD
pub fn date_key(date: NaiveDate) -> i64 {
    let parts = CalendarParts::from_date(date);
    i64::from(parts.year) * 10_000 + i64::from(parts.month) * 100 + i64::from(parts.day)
}

/// Contador de chaves substitutas de uma tabela, começando em 1
#[derive(Debug, Clone)]
pub struct KeySequence {
    next: i64,
}

impl KeySequence {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_key(&mut self) -> i64 {
        let key = self.next;
        self.next += 1;
        key
    }
}

impl Default for KeySequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Registro de venda validado, com os tipos que o star schema exige
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub order_id: String,
    pub order_date: NaiveDate,
    /// `None` quando a data de envio não pôde ser interpretada
    pub ship_date: Option<NaiveDate>,
    pub ship_mode: String,
    pub customer_id: String,
    pub customer_name: String,
    pub segment: String,
    pub country: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub region: String,
    pub product_id: String,
    pub category: String,
    pub sub_category: String,
    pub product_name: String,
    pub sales: f64,
    pub quantity: i64,
    pub discount: f64,
    pub profit: f64,
}

fn invalid(column: &str, row: &DataRow) -> LoadError {
    let order = row
        .get(ORDER_ID)
        .and_then(DataValue::as_string)
        .unwrap_or_else(|| UNKNOWN_TEXT.to_string());
    LoadError::InvalidRecord(format!("coluna {} inválida no pedido {}", column, order))
}

fn text(row: &DataRow, column: &str) -> std::result::Result<String, LoadError> {
    row.get(column)
        .and_then(DataValue::as_string)
        .ok_or_else(|| invalid(column, row))
}

fn float(row: &DataRow, column: &str) -> std::result::Result<f64, LoadError> {
    row.get(column)
        .and_then(DataValue::as_float)
        .ok_or_else(|| invalid(column, row))
}

impl TryFrom<&DataRow> for SalesRecord {
    type Error = LoadError;

    fn try_from(row: &DataRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            order_id: text(row, ORDER_ID)?,
            order_date: row
                .get(ORDER_DATE)
                .and_then(DataValue::as_date)
                .ok_or_else(|| invalid(ORDER_DATE, row))?,
            ship_date: row.get(SHIP_DATE).and_then(DataValue::as_date),
            ship_mode: text(row, SHIP_MODE)?,
            customer_id: text(row, CUSTOMER_ID)?,
            customer_name: text(row, CUSTOMER_NAME)?,
            segment: text(row, SEGMENT)?,
            country: text(row, COUNTRY)?,
            city: text(row, CITY)?,
            state: text(row, STATE)?,
            postal_code: text(row, POSTAL_CODE)?,
            region: text(row, REGION)?,
            product_id: text(row, PRODUCT_ID)?,
            category: text(row, CATEGORY)?,
            sub_category: text(row, SUB_CATEGORY)?,
            product_name: text(row, PRODUCT_NAME)?,
            sales: float(row, SALES)?,
            quantity: row
                .get(QUANTITY)
                .and_then(DataValue::as_integer)
                .ok_or_else(|| invalid(QUANTITY, row))?,
            discount: float(row, DISCOUNT)?,
            profit: float(row, PROFIT)?,
        })
    }
}

/// Converte o lote validado em registros tipados
pub fn to_records(data: &[DataRow]) -> Result<Vec<SalesRecord>> {
    data.iter()
        .map(|row| SalesRecord::try_from(row).map_err(Into::into))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateDimRow {
    pub date_key: i64,
    pub full_date: NaiveDate,
    pub calendar: CalendarParts,
}

impl DateDimRow {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            date_key: date_key(date),
            full_date: date,
            calendar: CalendarParts::from_date(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerDimRow {
    pub customer_key: i64,
    pub customer_id: String,
    pub customer_name: String,
    pub segment: String,
    pub country: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub region: String,
    pub first_order_date: NaiveDate,
    pub last_order_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDimRow {
    pub product_key: i64,
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub sub_category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingDimRow {
    pub shipping_key: i64,
    pub ship_mode: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub sales_key: i64,
    pub order_id: String,
    pub order_date_key: i64,
    pub ship_date_key: i64,
    pub customer_key: i64,
    pub product_key: i64,
    pub shipping_key: i64,
    pub quantity: i64,
    pub sales_amount: f64,
    pub discount: f64,
    pub profit: f64,
}

/// Uma linha por data distinta (pedido ou envio), em ordem crescente
pub fn build_date_dim(records: &[SalesRecord]) -> Vec<DateDimRow> {
    let dates: BTreeSet<NaiveDate> = records
        .iter()
        .flat_map(|r| std::iter::once(r.order_date).chain(r.ship_date))
        .collect();

    dates.into_iter().map(DateDimRow::from_date).collect()
}

/// Uma linha por cliente; atributos da primeira ocorrência e datas do lote inteiro
pub fn build_customer_dim(records: &[SalesRecord]) -> Vec<CustomerDimRow> {
    let mut keys = KeySequence::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut customers: Vec<CustomerDimRow> = Vec::new();

    for record in records {
        match position.get(record.customer_id.as_str()) {
            Some(&i) => {
                let customer = &mut customers[i];
                customer.first_order_date = customer.first_order_date.min(record.order_date);
                customer.last_order_date = customer.last_order_date.max(record.order_date);
            }
            None => {
                position.insert(&record.customer_id, customers.len());
                customers.push(CustomerDimRow {
                    customer_key: keys.next_key(),
                    customer_id: record.customer_id.clone(),
                    customer_name: record.customer_name.clone(),
                    segment: record.segment.clone(),
                    country: record.country.clone(),
                    city: record.city.clone(),
                    state: record.state.clone(),
                    postal_code: record.postal_code.clone(),
                    region: record.region.clone(),
                    first_order_date: record.order_date,
                    last_order_date: record.order_date,
                });
            }
        }
    }

    customers
}

pub fn build_product_dim(records: &[SalesRecord]) -> Vec<ProductDimRow> {
    let mut keys = KeySequence::new();
    let mut seen = HashSet::new();

    records
        .iter()
        .filter(|r| seen.insert(r.product_id.as_str()))
        .map(|r| ProductDimRow {
            product_key: keys.next_key(),
            product_id: r.product_id.clone(),
            product_name: r.product_name.clone(),
            category: r.category.clone(),
            sub_category: r.sub_category.clone(),
        })
        .collect()
}

pub fn build_shipping_dim(records: &[SalesRecord]) -> Vec<ShippingDimRow> {
    let mut keys = KeySequence::new();
    let mut seen = HashSet::new();

    records
        .iter()
        .filter(|r| seen.insert(r.ship_mode.as_str()))
        .map(|r| ShippingDimRow {
            shipping_key: keys.next_key(),
            ship_mode: r.ship_mode.clone(),
        })
        .collect()
}

/// Dimensões do star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Date,
    Customer,
    Product,
    Shipping,
}

impl Dimension {
    pub fn table(self) -> &'static str {
        match self {
            Dimension::Date => "dim_date",
            Dimension::Customer => "dim_customer",
            Dimension::Product => "dim_product",
            Dimension::Shipping => "dim_shipping",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Mapeamentos chave natural → chave substituta lidos das dimensões gravadas
#[derive(Debug, Clone, Default)]
pub struct KeyMaps {
    pub dates: HashSet<i64>,
    pub customers: HashMap<String, i64>,
    pub products: HashMap<String, i64>,
    pub shipping: HashMap<String, i64>,
}

/// Quantidade de referências não resolvidas por dimensão
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnresolvedKeys {
    pub dates: usize,
    pub customers: usize,
    pub products: usize,
    pub shipping: usize,
}

impl UnresolvedKeys {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.dates + self.customers + self.products + self.shipping
    }

    /// Dimensões com pelo menos uma referência não resolvida
    pub fn dimensions(&self) -> Vec<Dimension> {
        [
            (Dimension::Date, self.dates),
            (Dimension::Customer, self.customers),
            (Dimension::Product, self.products),
            (Dimension::Shipping, self.shipping),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(dimension, _)| dimension)
        .collect()
    }
}

impl fmt::Display for UnresolvedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dim_date: {}, dim_customer: {}, dim_product: {}, dim_shipping: {}",
            self.dates, self.customers, self.products, self.shipping
        )
    }
}

/// Projeta os registros na tabela fato usando as chaves das dimensões
///
/// Referências que não casam recebem [`UNKNOWN_MEMBER_KEY`] e são contadas;
/// cabe ao loader decidir entre abortar e gravar o membro desconhecido.
pub fn resolve_facts(records: &[SalesRecord], keys: &KeyMaps) -> (Vec<FactRow>, UnresolvedKeys) {
    let mut unresolved = UnresolvedKeys::default();
    let mut sequence = KeySequence::new();

    let lookup = |map: &HashMap<String, i64>, natural: &str, counter: &mut usize| {
        map.get(natural).copied().unwrap_or_else(|| {
            *counter += 1;
            UNKNOWN_MEMBER_KEY
        })
    };

    let facts = records
        .iter()
        .map(|record| {
            let mut date = |value: Option<NaiveDate>| match value.map(date_key) {
                Some(key) if keys.dates.contains(&key) => key,
                _ => {
                    unresolved.dates += 1;
                    UNKNOWN_MEMBER_KEY
                }
            };
            let order_date_key = date(Some(record.order_date));
            let ship_date_key = date(record.ship_date);

            FactRow {
                sales_key: sequence.next_key(),
                order_id: record.order_id.clone(),
                order_date_key,
                ship_date_key,
                customer_key: lookup(&keys.customers, &record.customer_id, &mut unresolved.customers),
                product_key: lookup(&keys.products, &record.product_id, &mut unresolved.products),
                shipping_key: lookup(&keys.shipping, &record.ship_mode, &mut unresolved.shipping),
                quantity: record.quantity,
                sales_amount: record.sales,
                discount: record.discount,
                profit: record.profit,
            }
        })
        .collect();

    (facts, unresolved)
}
