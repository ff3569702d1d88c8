//! # Exportação para o dashboard
//!
//! Achata o star schema numa tabela larga (fato + quatro dimensões) e grava
//! em CSV para ferramentas de BI.

use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use crate::error::Result;

const EXPORT_QUERY: &str = "SELECT
        f.order_id,
        f.sales_amount,
        f.profit,
        f.quantity,
        f.discount,
        d.full_date,
        d.year AS order_year,
        d.month AS order_month,
        d.month_name AS order_month_name,
        d.quarter AS order_quarter,
        d.day_name AS order_day_name,
        d.is_weekend,
        c.customer_id,
        c.customer_name,
        c.segment,
        c.city,
        c.state,
        c.region,
        c.country,
        p.product_id,
        p.product_name,
        p.category,
        p.sub_category,
        s.ship_mode
    FROM fact_sales f
    LEFT JOIN dim_date d ON f.order_date_key = d.date_key
    LEFT JOIN dim_customer c ON f.customer_key = c.customer_key
    LEFT JOIN dim_product p ON f.product_key = p.product_key
    LEFT JOIN dim_shipping s ON f.shipping_key = s.shipping_key
    ORDER BY f.sales_key";

/// Linha da tabela exportada; a ordem dos campos é a ordem das colunas
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardRow {
    pub order_id: String,
    pub sales_amount: Option<f64>,
    pub profit: Option<f64>,
    pub quantity: Option<i64>,
    pub discount: Option<f64>,
    pub full_date: Option<String>,
    pub order_year: Option<i64>,
    pub order_month: Option<i64>,
    pub order_month_name: Option<String>,
    pub order_quarter: Option<i64>,
    pub order_day_name: Option<String>,
    pub is_weekend: Option<i64>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub segment: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub ship_mode: Option<String>,
}

pub const EXPORT_COLUMNS: &[&str] = &[
    "order_id",
    "sales_amount",
    "profit",
    "quantity",
    "discount",
    "full_date",
    "order_year",
    "order_month",
    "order_month_name",
    "order_quarter",
    "order_day_name",
    "is_weekend",
    "customer_id",
    "customer_name",
    "segment",
    "city",
    "state",
    "region",
    "country",
    "product_id",
    "product_name",
    "category",
    "sub_category",
    "ship_mode",
];

/// Lê a tabela achatada, na ordem das linhas de fato
pub async fn dashboard_rows(pool: &SqlitePool) -> Result<Vec<DashboardRow>> {
    let rows = sqlx::query_as::<_, DashboardRow>(EXPORT_QUERY)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Grava a tabela do dashboard em CSV e retorna o número de linhas exportadas
pub async fn export_dashboard<P: AsRef<Path>>(pool: &SqlitePool, output: P) -> Result<usize> {
    let output = output.as_ref();
    let rows = dashboard_rows(pool).await?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Cabeçalho explícito: um lote vazio ainda gera um arquivo com colunas
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(output)?;
    writer.write_record(EXPORT_COLUMNS)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::info!(path = %output.display(), rows = rows.len(), "Dados exportados para o dashboard");
    Ok(rows.len())
}
