//! # DDL do star schema
//!
//! Seis tabelas: staging, quatro dimensões e a tabela fato, com chaves
//! estrangeiras da fato para cada dimensão, unicidade das chaves naturais e
//! os índices das colunas de filtro e junção mais usadas.

use sqlx::SqliteConnection;
use crate::config::SchemaStrategy;
use crate::error::Result;
use crate::schema::{all_columns, ColumnType};

pub const STAGING_TABLE: &str = "staging_raw_sales";
pub const FACT_TABLE: &str = "fact_sales";

/// Tabelas na ordem de criação (dimensões antes da fato)
pub const TABLES: &[&str] = &[
    STAGING_TABLE,
    "dim_date",
    "dim_customer",
    "dim_product",
    "dim_shipping",
    FACT_TABLE,
];

const CREATE_DIMENSIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS dim_date (
        date_key INTEGER PRIMARY KEY,
        full_date DATE UNIQUE,
        year INTEGER,
        quarter INTEGER,
        month INTEGER,
        month_name TEXT,
        day INTEGER,
        day_of_week INTEGER,
        day_name TEXT,
        week_of_year INTEGER,
        is_weekend INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS dim_customer (
        customer_key INTEGER PRIMARY KEY,
        customer_id TEXT UNIQUE NOT NULL,
        customer_name TEXT,
        segment TEXT,
        country TEXT,
        city TEXT,
        state TEXT,
        postal_code TEXT,
        region TEXT,
        first_order_date DATE,
        last_order_date DATE
    )",
    "CREATE TABLE IF NOT EXISTS dim_product (
        product_key INTEGER PRIMARY KEY,
        product_id TEXT UNIQUE NOT NULL,
        product_name TEXT,
        category TEXT,
        sub_category TEXT
    )",
    "CREATE TABLE IF NOT EXISTS dim_shipping (
        shipping_key INTEGER PRIMARY KEY,
        ship_mode TEXT UNIQUE NOT NULL
    )",
];

const CREATE_FACT: &str = "CREATE TABLE IF NOT EXISTS fact_sales (
        sales_key INTEGER PRIMARY KEY,
        order_id TEXT NOT NULL,
        order_date_key INTEGER NOT NULL,
        ship_date_key INTEGER NOT NULL,
        customer_key INTEGER NOT NULL,
        product_key INTEGER NOT NULL,
        shipping_key INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        sales_amount REAL NOT NULL,
        discount REAL,
        profit REAL NOT NULL,
        FOREIGN KEY (order_date_key) REFERENCES dim_date(date_key),
        FOREIGN KEY (ship_date_key) REFERENCES dim_date(date_key),
        FOREIGN KEY (customer_key) REFERENCES dim_customer(customer_key),
        FOREIGN KEY (product_key) REFERENCES dim_product(product_key),
        FOREIGN KEY (shipping_key) REFERENCES dim_shipping(shipping_key)
    )";

/// Índices de apoio às consultas analíticas
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_fact_order_date ON fact_sales(order_date_key)",
    "CREATE INDEX IF NOT EXISTS idx_fact_customer ON fact_sales(customer_key)",
    "CREATE INDEX IF NOT EXISTS idx_fact_product ON fact_sales(product_key)",
    "CREATE INDEX IF NOT EXISTS idx_fact_order_id ON fact_sales(order_id)",
    "CREATE INDEX IF NOT EXISTS idx_customer_segment ON dim_customer(segment)",
    "CREATE INDEX IF NOT EXISTS idx_customer_region ON dim_customer(region)",
    "CREATE INDEX IF NOT EXISTS idx_product_category ON dim_product(category)",
    "CREATE INDEX IF NOT EXISTS idx_product_subcat ON dim_product(sub_category)",
    "CREATE INDEX IF NOT EXISTS idx_date_year_month ON dim_date(year, month)",
];

fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Text => "TEXT",
        ColumnType::Date => "DATE",
        ColumnType::Float => "REAL",
        ColumnType::Integer | ColumnType::Boolean => "INTEGER",
    }
}

/// DDL da staging: todas as colunas do catálogo, sem índices
pub fn staging_ddl() -> String {
    let columns: Vec<String> = all_columns()
        .map(|(name, column_type)| format!("{} {}", name, sql_type(*column_type)))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}, load_timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
        STAGING_TABLE,
        columns.join(", ")
    )
}

async fn create_all(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(&staging_ddl()).execute(&mut *conn).await?;
    for ddl in CREATE_DIMENSIONS.iter().chain(std::iter::once(&CREATE_FACT)) {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    for ddl in CREATE_INDEXES {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Remove e recria as seis tabelas com restrições e índices
///
/// Destrutivo: todos os dados anteriores do destino são perdidos.
pub async fn reset_schema(conn: &mut SqliteConnection) -> Result<()> {
    for table in TABLES.iter().rev() {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *conn)
            .await?;
    }
    create_all(conn).await?;

    tracing::info!(tables = TABLES.len(), indexes = CREATE_INDEXES.len(), "Schema recriado");
    Ok(())
}

/// Cria apenas tabelas e índices ausentes e esvazia as tabelas (fato primeiro)
pub async fn migrate(conn: &mut SqliteConnection) -> Result<()> {
    create_all(conn).await?;
    for table in TABLES.iter().rev() {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *conn)
            .await?;
    }

    tracing::info!(tables = TABLES.len(), "Schema migrado e tabelas esvaziadas");
    Ok(())
}

/// Prepara o destino conforme a estratégia configurada
pub async fn prepare(conn: &mut SqliteConnection, strategy: SchemaStrategy) -> Result<()> {
    match strategy {
        SchemaStrategy::Recreate => reset_schema(conn).await,
        SchemaStrategy::Additive => migrate(conn).await,
    }
}

/// Forma do schema: (tipo, nome, sql) de tabelas e índices, em ordem estável
pub async fn schema_shape(conn: &mut SqliteConnection) -> Result<Vec<(String, String, Option<String>)>> {
    let shape = sqlx::query_as::<_, (String, String, Option<String>)>(
        "SELECT type, name, sql FROM sqlite_master
         WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%'
         ORDER BY type, name",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(shape)
}
