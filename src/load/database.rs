//! # Acesso ao SQLite
//!
//! Conexão, inserções em lote e leituras usadas pelo loader dimensional.
//! Todas as funções recebem uma conexão (ou transação) já aberta; quem
//! orquestra decide os limites de transação.

use sqlx::query_builder::Separated;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use crate::error::Result;
use crate::load::model::{
    CustomerDimRow, DateDimRow, Dimension, FactRow, KeyMaps, ProductDimRow, ShippingDimRow,
    UNKNOWN_MEMBER_ID, UNKNOWN_MEMBER_KEY,
};
use crate::load::schema::{STAGING_TABLE, TABLES};
use crate::schema::{all_columns, UNKNOWN_TEXT};
use crate::types::{DataRow, DataValue};

/// Limite de parâmetros por instrução do SQLite
const SQLITE_MAX_VARIABLES: usize = 32_766;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Caminho do arquivo de banco de uma URL `sqlite:`; `None` para banco em memória
fn database_file(database_url: &str) -> Option<&Path> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(Path::new(path))
    }
}

/// Abre o pool do banco de destino
///
/// Uma única conexão: a execução é dona exclusiva do destino e bancos em
/// memória só existem enquanto a conexão vive. Chaves estrangeiras ativadas.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    if let Some(parent) = database_file(database_url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    tracing::debug!(database_url, "Conexão com o banco de destino aberta");
    Ok(pool)
}

/// Banco em memória, usado em testes e benchmarks
pub async fn connect_memory() -> Result<SqlitePool> {
    connect("sqlite::memory:").await
}

/// Linhas por INSERT: sugestão do usuário limitada pelo máximo de parâmetros
pub fn rows_per_statement(batch_size: usize, columns: usize) -> usize {
    batch_size.min(SQLITE_MAX_VARIABLES / columns.max(1)).max(1)
}

async fn insert_rows<'a, T, F>(
    conn: &mut SqliteConnection,
    insert: &str,
    rows: &'a [T],
    chunk_size: usize,
    mut bind: F,
) -> Result<u64>
where
    T: Sync,
    F: FnMut(&mut Separated<'_, 'a, Sqlite, &'static str>, &'a T) + Send,
{
    let mut inserted = 0;
    for chunk in rows.chunks(chunk_size.max(1)) {
        let mut builder: QueryBuilder<'a, Sqlite> = QueryBuilder::new(insert);
        builder.push_values(chunk, |mut values, row| bind(&mut values, row));
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(inserted)
}

fn bind_value<'a>(values: &mut Separated<'_, 'a, Sqlite, &'static str>, value: Option<&'a DataValue>) {
    match value {
        Some(DataValue::String(s)) => values.push_bind(s.as_str()),
        Some(DataValue::Integer(i)) => values.push_bind(*i),
        Some(DataValue::Float(f)) => values.push_bind(*f),
        Some(DataValue::Boolean(b)) => values.push_bind(*b),
        Some(DataValue::Date(d)) => values.push_bind(d.format(DATE_FORMAT).to_string()),
        Some(DataValue::Null) | None => values.push_bind(None::<String>),
    };
}

/// Grava o lote transformado na staging, colunas do catálogo
pub async fn insert_staging(conn: &mut SqliteConnection, rows: &[DataRow], batch_size: usize) -> Result<u64> {
    let columns: Vec<&str> = all_columns().map(|(name, _)| *name).collect();
    let insert = format!("INSERT INTO {} ({}) ", STAGING_TABLE, columns.join(", "));

    insert_rows(
        conn,
        &insert,
        rows,
        rows_per_statement(batch_size, columns.len()),
        |values, row| {
            for column in &columns {
                bind_value(values, row.get(*column));
            }
        },
    )
    .await
}

pub async fn insert_dates(conn: &mut SqliteConnection, rows: &[DateDimRow], batch_size: usize) -> Result<u64> {
    insert_rows(
        conn,
        "INSERT INTO dim_date (date_key, full_date, year, quarter, month, month_name, day, \
         day_of_week, day_name, week_of_year, is_weekend) ",
        rows,
        rows_per_statement(batch_size, 11),
        |values, row| {
            let calendar = &row.calendar;
            values
                .push_bind(row.date_key)
                .push_bind(row.full_date.format(DATE_FORMAT).to_string())
                .push_bind(calendar.year)
                .push_bind(i64::from(calendar.quarter))
                .push_bind(i64::from(calendar.month))
                .push_bind(calendar.month_name.as_str())
                .push_bind(i64::from(calendar.day))
                .push_bind(i64::from(calendar.day_of_week))
                .push_bind(calendar.day_name.as_str())
                .push_bind(i64::from(calendar.week_of_year))
                .push_bind(calendar.is_weekend);
        },
    )
    .await
}

pub async fn insert_customers(conn: &mut SqliteConnection, rows: &[CustomerDimRow], batch_size: usize) -> Result<u64> {
    insert_rows(
        conn,
        "INSERT INTO dim_customer (customer_key, customer_id, customer_name, segment, country, \
         city, state, postal_code, region, first_order_date, last_order_date) ",
        rows,
        rows_per_statement(batch_size, 11),
        |values, row| {
            values
                .push_bind(row.customer_key)
                .push_bind(row.customer_id.as_str())
                .push_bind(row.customer_name.as_str())
                .push_bind(row.segment.as_str())
                .push_bind(row.country.as_str())
                .push_bind(row.city.as_str())
                .push_bind(row.state.as_str())
                .push_bind(row.postal_code.as_str())
                .push_bind(row.region.as_str())
                .push_bind(row.first_order_date.format(DATE_FORMAT).to_string())
                .push_bind(row.last_order_date.format(DATE_FORMAT).to_string());
        },
    )
    .await
}

pub async fn insert_products(conn: &mut SqliteConnection, rows: &[ProductDimRow], batch_size: usize) -> Result<u64> {
    insert_rows(
        conn,
        "INSERT INTO dim_product (product_key, product_id, product_name, category, sub_category) ",
        rows,
        rows_per_statement(batch_size, 5),
        |values, row| {
            values
                .push_bind(row.product_key)
                .push_bind(row.product_id.as_str())
                .push_bind(row.product_name.as_str())
                .push_bind(row.category.as_str())
                .push_bind(row.sub_category.as_str());
        },
    )
    .await
}

pub async fn insert_shipping(conn: &mut SqliteConnection, rows: &[ShippingDimRow], batch_size: usize) -> Result<u64> {
    insert_rows(
        conn,
        "INSERT INTO dim_shipping (shipping_key, ship_mode) ",
        rows,
        rows_per_statement(batch_size, 2),
        |values, row| {
            values.push_bind(row.shipping_key).push_bind(row.ship_mode.as_str());
        },
    )
    .await
}

pub async fn insert_facts(conn: &mut SqliteConnection, rows: &[FactRow], batch_size: usize) -> Result<u64> {
    insert_rows(
        conn,
        "INSERT INTO fact_sales (sales_key, order_id, order_date_key, ship_date_key, customer_key, \
         product_key, shipping_key, quantity, sales_amount, discount, profit) ",
        rows,
        rows_per_statement(batch_size, 11),
        |values, row| {
            values
                .push_bind(row.sales_key)
                .push_bind(row.order_id.as_str())
                .push_bind(row.order_date_key)
                .push_bind(row.ship_date_key)
                .push_bind(row.customer_key)
                .push_bind(row.product_key)
                .push_bind(row.shipping_key)
                .push_bind(row.quantity)
                .push_bind(row.sales_amount)
                .push_bind(row.discount)
                .push_bind(row.profit);
        },
    )
    .await
}

/// Insere o membro "desconhecido" de uma dimensão, se ainda não existir
pub async fn insert_unknown_member(conn: &mut SqliteConnection, dimension: Dimension) -> Result<()> {
    let query = match dimension {
        Dimension::Date => sqlx::query(
            "INSERT OR IGNORE INTO dim_date (date_key, month_name, day_name) VALUES (?, ?, ?)",
        )
        .bind(UNKNOWN_MEMBER_KEY)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT),
        Dimension::Customer => sqlx::query(
            "INSERT OR IGNORE INTO dim_customer (customer_key, customer_id, customer_name, segment, \
             country, city, state, postal_code, region) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(UNKNOWN_MEMBER_KEY)
        .bind(UNKNOWN_MEMBER_ID)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT),
        Dimension::Product => sqlx::query(
            "INSERT OR IGNORE INTO dim_product (product_key, product_id, product_name, category, \
             sub_category) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(UNKNOWN_MEMBER_KEY)
        .bind(UNKNOWN_MEMBER_ID)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT)
        .bind(UNKNOWN_TEXT),
        Dimension::Shipping => sqlx::query(
            "INSERT OR IGNORE INTO dim_shipping (shipping_key, ship_mode) VALUES (?, ?)",
        )
        .bind(UNKNOWN_MEMBER_KEY)
        .bind(UNKNOWN_MEMBER_ID),
    };

    query.execute(&mut *conn).await?;
    Ok(())
}

async fn natural_keys(
    conn: &mut SqliteConnection,
    table: &str,
    natural: &str,
    surrogate: &str,
) -> Result<HashMap<String, i64>> {
    let pairs = sqlx::query_as::<_, (String, i64)>(&format!(
        "SELECT {}, {} FROM {}",
        natural, surrogate, table
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(pairs.into_iter().collect())
}

/// Relê as dimensões gravadas para obter os mapeamentos de chave
pub async fn read_key_maps(conn: &mut SqliteConnection) -> Result<KeyMaps> {
    let dates: HashSet<i64> = sqlx::query_scalar::<_, i64>("SELECT date_key FROM dim_date")
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();

    Ok(KeyMaps {
        dates,
        customers: natural_keys(conn, "dim_customer", "customer_id", "customer_key").await?,
        products: natural_keys(conn, "dim_product", "product_id", "product_key").await?,
        shipping: natural_keys(conn, "dim_shipping", "ship_mode", "shipping_key").await?,
    })
}

pub async fn count_rows(conn: &mut SqliteConnection, table: &str) -> Result<u64> {
    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&mut *conn)
        .await?;
    Ok(count.max(0) as u64)
}

/// Contagem de linhas de cada tabela do star schema
pub async fn table_counts(conn: &mut SqliteConnection) -> Result<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for table in TABLES {
        counts.insert(table.to_string(), count_rows(conn, table).await?);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::schema::reset_schema;

    #[test]
    fn test_database_file() {
        assert_eq!(database_file("sqlite://data/sales.db"), Some(Path::new("data/sales.db")));
        assert_eq!(database_file("sqlite:out.db?mode=rwc"), Some(Path::new("out.db")));
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://localhost/db"), None);
    }

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(1000, 11), 1000);
        assert_eq!(rows_per_statement(5000, 29), 32_766 / 29);
        assert_eq!(rows_per_statement(0, 2), 1);
    }

    #[tokio::test]
    async fn test_insert_in_chunks_and_read_keys() {
        let pool = connect_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        reset_schema(&mut conn).await.unwrap();

        let shipping: Vec<ShippingDimRow> = ["Standard Class", "First Class", "Same Day"]
            .iter()
            .enumerate()
            .map(|(i, mode)| ShippingDimRow {
                shipping_key: i as i64 + 1,
                ship_mode: mode.to_string(),
            })
            .collect();

        // Lotes de duas linhas forçam duas instruções INSERT
        let inserted = insert_shipping(&mut conn, &shipping, 2).await.unwrap();
        assert_eq!(inserted, 3);

        let keys = read_key_maps(&mut conn).await.unwrap();
        assert_eq!(keys.shipping.get("Same Day"), Some(&3));
        assert!(keys.customers.is_empty());

        let counts = table_counts(&mut conn).await.unwrap();
        assert_eq!(counts["dim_shipping"], 3);
        assert_eq!(counts["fact_sales"], 0);
        assert_eq!(counts.len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_member_is_inserted_once() {
        let pool = connect_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        reset_schema(&mut conn).await.unwrap();

        insert_unknown_member(&mut conn, Dimension::Date).await.unwrap();
        insert_unknown_member(&mut conn, Dimension::Date).await.unwrap();
        insert_unknown_member(&mut conn, Dimension::Customer).await.unwrap();

        assert_eq!(count_rows(&mut conn, "dim_date").await.unwrap(), 1);
        let keys = read_key_maps(&mut conn).await.unwrap();
        assert!(keys.dates.contains(&UNKNOWN_MEMBER_KEY));
        assert_eq!(keys.customers.get(UNKNOWN_MEMBER_ID), Some(&UNKNOWN_MEMBER_KEY));
    }
}
