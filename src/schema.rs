//! # Catálogo de colunas
//!
//! Declara as colunas do arquivo de vendas e as colunas derivadas, cada uma com
//! seu tipo. Normalização, reconciliação de nulos e validação despacham pelo
//! tipo declarado aqui.

use crate::types::DataValue;

/// Tipo declarado de uma coluna
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Date,
    Float,
    Integer,
    /// Flag armazenada como 0/1; tratada como numérica no preenchimento de nulos
    Boolean,
}

impl ColumnType {
    /// Tipos preenchidos com zero pela reconciliação de nulos
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Float | ColumnType::Integer | ColumnType::Boolean)
    }

    /// Verifica se o valor já está no tipo declarado
    pub fn accepts(self, value: &DataValue) -> bool {
        match (self, value) {
            (ColumnType::Text, DataValue::String(_)) => true,
            (ColumnType::Date, DataValue::Date(_)) => true,
            (ColumnType::Float, DataValue::Float(_)) => true,
            (ColumnType::Integer, DataValue::Integer(_)) => true,
            (ColumnType::Boolean, DataValue::Boolean(_)) => true,
            _ => false,
        }
    }
}

pub const ORDER_ID: &str = "order_id";
pub const ORDER_DATE: &str = "order_date";
pub const SHIP_DATE: &str = "ship_date";
pub const SHIP_MODE: &str = "ship_mode";
pub const CUSTOMER_ID: &str = "customer_id";
pub const CUSTOMER_NAME: &str = "customer_name";
pub const SEGMENT: &str = "segment";
pub const COUNTRY: &str = "country";
pub const CITY: &str = "city";
pub const STATE: &str = "state";
pub const POSTAL_CODE: &str = "postal_code";
pub const REGION: &str = "region";
pub const PRODUCT_ID: &str = "product_id";
pub const CATEGORY: &str = "category";
pub const SUB_CATEGORY: &str = "sub_category";
pub const PRODUCT_NAME: &str = "product_name";
pub const SALES: &str = "sales";
pub const QUANTITY: &str = "quantity";
pub const DISCOUNT: &str = "discount";
pub const PROFIT: &str = "profit";

pub const PROFIT_MARGIN: &str = "profit_margin";
pub const DELIVERY_DAYS: &str = "delivery_days";
pub const ORDER_YEAR: &str = "order_year";
pub const ORDER_MONTH: &str = "order_month";
pub const ORDER_QUARTER: &str = "order_quarter";
pub const ORDER_MONTH_NAME: &str = "order_month_name";
pub const ORDER_DAY_NAME: &str = "order_day_name";
pub const ORDER_WEEK: &str = "order_week";
pub const IS_WEEKEND: &str = "is_weekend";

/// Colunas obrigatórias do arquivo de origem, na ordem do arquivo
pub const SOURCE_COLUMNS: &[(&str, ColumnType)] = &[
    (ORDER_ID, ColumnType::Text),
    (ORDER_DATE, ColumnType::Date),
    (SHIP_DATE, ColumnType::Date),
    (SHIP_MODE, ColumnType::Text),
    (CUSTOMER_ID, ColumnType::Text),
    (CUSTOMER_NAME, ColumnType::Text),
    (SEGMENT, ColumnType::Text),
    (COUNTRY, ColumnType::Text),
    (CITY, ColumnType::Text),
    (STATE, ColumnType::Text),
    (POSTAL_CODE, ColumnType::Text),
    (REGION, ColumnType::Text),
    (PRODUCT_ID, ColumnType::Text),
    (CATEGORY, ColumnType::Text),
    (SUB_CATEGORY, ColumnType::Text),
    (PRODUCT_NAME, ColumnType::Text),
    (SALES, ColumnType::Float),
    (QUANTITY, ColumnType::Integer),
    (DISCOUNT, ColumnType::Float),
    (PROFIT, ColumnType::Float),
];

/// Colunas calculadas pelo motor de derivação
pub const DERIVED_COLUMNS: &[(&str, ColumnType)] = &[
    (PROFIT_MARGIN, ColumnType::Float),
    (DELIVERY_DAYS, ColumnType::Integer),
    (ORDER_YEAR, ColumnType::Integer),
    (ORDER_MONTH, ColumnType::Integer),
    (ORDER_QUARTER, ColumnType::Integer),
    (ORDER_MONTH_NAME, ColumnType::Text),
    (ORDER_DAY_NAME, ColumnType::Text),
    (ORDER_WEEK, ColumnType::Integer),
    (IS_WEEKEND, ColumnType::Boolean),
];

/// Colunas que não podem ter valores ausentes no quality gate
pub const CRITICAL_COLUMNS: &[&str] = &[
    ORDER_ID,
    ORDER_DATE,
    CUSTOMER_ID,
    PRODUCT_ID,
    SALES,
    QUANTITY,
    PROFIT,
];

/// Texto usado para preencher colunas não numéricas sem valor
pub const UNKNOWN_TEXT: &str = "Unknown";

/// Formato de data fixo do arquivo de origem
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Todas as colunas conhecidas, origem seguida das derivadas
pub fn all_columns() -> impl Iterator<Item = &'static (&'static str, ColumnType)> {
    SOURCE_COLUMNS.iter().chain(DERIVED_COLUMNS.iter())
}

/// Tipo declarado de uma coluna; colunas extras da origem são texto
pub fn column_type(name: &str) -> ColumnType {
    all_columns()
        .find(|(column, _)| *column == name)
        .map(|(_, column_type)| *column_type)
        .unwrap_or(ColumnType::Text)
}

/// Padroniza o nome de uma coluna: minúsculas, espaços, `-` e `/` viram `_`
///
/// `"Sub-Category"` vira `sub_category`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '/' => '_',
            other => other,
        })
        .collect()
}

/// Ordena colunas: primeiro a ordem do catálogo, depois extras por nome
pub fn ordered_columns<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut extras: Vec<String> = Vec::new();
    let mut known: Vec<(usize, String)> = Vec::new();

    for name in names {
        match all_columns().position(|(column, _)| column == name) {
            Some(position) => known.push((position, name.clone())),
            None => extras.push(name.clone()),
        }
    }

    known.sort();
    known.dedup();
    extras.sort();
    extras.dedup();

    known.into_iter().map(|(_, name)| name).chain(extras).collect()
}
