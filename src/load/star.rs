//! # Star Schema Loader
//!
//! Carrega o lote validado no modelo dimensional, numa sequência fixa:
//! preparação do schema, staging, dimensões (data → cliente → produto →
//! envio) e, por fim, a tabela fato. A população roda numa única transação;
//! a reconciliação roda após o commit.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Instant;
use crate::config::{ETLConfig, SchemaStrategy, UnresolvedKeyPolicy};
use crate::error::{LoadError, Result};
use crate::load::database;
use crate::load::model::{self, SalesRecord};
use crate::load::reconcile::LoadReconciler;
use crate::load::schema;
use crate::types::{DataRow, PipelineResult};
use crate::traits::Loader;

/// Linhas gravadas em cada etapa da população
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub staging: u64,
    pub dates: u64,
    pub customers: u64,
    pub products: u64,
    pub shipping: u64,
    pub facts: u64,
    /// Membros "desconhecidos" inseridos para chaves não resolvidas
    pub unknown_members: u64,
}

/// Loader do star schema em SQLite
///
/// # Exemplos
///
/// ```rust,no_run
/// use sales_etl::config::ETLConfig;
/// use sales_etl::load::star::StarSchemaLoader;
///
/// async fn exemplo(config: &ETLConfig) -> sales_etl::Result<()> {
///     let loader = StarSchemaLoader::connect(config).await?;
///     loader.reset_schema().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StarSchemaLoader {
    pool: SqlitePool,
    schema_strategy: SchemaStrategy,
    unresolved_keys: UnresolvedKeyPolicy,
    batch_size: usize,
}

impl StarSchemaLoader {
    /// Cria o loader sobre um pool já aberto, com as opções padrão
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema_strategy: SchemaStrategy::default(),
            unresolved_keys: UnresolvedKeyPolicy::default(),
            batch_size: 1000,
        }
    }

    /// Abre o banco de destino e aplica as opções da configuração
    pub async fn connect(config: &ETLConfig) -> Result<Self> {
        let pool = database::connect(&config.target.database_url).await?;
        Ok(Self::new(pool)
            .with_schema_strategy(config.target.schema_strategy)
            .with_unresolved_keys(config.target.unresolved_keys)
            .with_batch_size(config.pipeline.batch_size))
    }

    pub fn with_schema_strategy(mut self, strategy: SchemaStrategy) -> Self {
        self.schema_strategy = strategy;
        self
    }

    pub fn with_unresolved_keys(mut self, policy: UnresolvedKeyPolicy) -> Self {
        self.unresolved_keys = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Remove e recria todas as tabelas do destino
    pub async fn reset_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        schema::reset_schema(&mut conn).await
    }

    /// Prepara o destino conforme a estratégia configurada
    pub async fn prepare_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        schema::prepare(&mut conn, self.schema_strategy).await
    }

    /// Popula staging, dimensões e fato numa única transação
    ///
    /// Espera o schema já preparado. Chaves não resolvidas abortam a
    /// transação, a menos que a política seja `UnknownMember`.
    pub async fn populate(&self, data: &[DataRow], records: &[SalesRecord]) -> Result<LoadStats> {
        let mut stats = LoadStats::default();
        let mut tx = self.pool.begin().await?;

        stats.staging = database::insert_staging(&mut tx, data, self.batch_size).await?;
        tracing::info!(rows = stats.staging, "Staging carregada");

        let dates = model::build_date_dim(records);
        stats.dates = database::insert_dates(&mut tx, &dates, self.batch_size).await?;
        tracing::info!(rows = stats.dates, "dim_date carregada");

        let customers = model::build_customer_dim(records);
        stats.customers = database::insert_customers(&mut tx, &customers, self.batch_size).await?;
        tracing::info!(rows = stats.customers, "dim_customer carregada");

        let products = model::build_product_dim(records);
        stats.products = database::insert_products(&mut tx, &products, self.batch_size).await?;
        tracing::info!(rows = stats.products, "dim_product carregada");

        let shipping = model::build_shipping_dim(records);
        stats.shipping = database::insert_shipping(&mut tx, &shipping, self.batch_size).await?;
        tracing::info!(rows = stats.shipping, "dim_shipping carregada");

        let keys = database::read_key_maps(&mut tx).await?;
        let (facts, unresolved) = model::resolve_facts(records, &keys);

        if !unresolved.is_empty() {
            match self.unresolved_keys {
                UnresolvedKeyPolicy::Fail => {
                    tracing::error!(%unresolved, "Chaves de dimensão não resolvidas; carga abortada");
                    return Err(LoadError::UnresolvedKeys(unresolved.to_string()).into());
                }
                UnresolvedKeyPolicy::UnknownMember => {
                    tracing::warn!(%unresolved, "Chaves não resolvidas apontadas para o membro desconhecido");
                    for dimension in unresolved.dimensions() {
                        database::insert_unknown_member(&mut tx, dimension).await?;
                        stats.unknown_members += 1;
                    }
                }
            }
        }

        stats.facts = database::insert_facts(&mut tx, &facts, self.batch_size).await?;
        tracing::info!(rows = stats.facts, "fact_sales carregada");

        tx.commit().await?;
        Ok(stats)
    }
}

#[async_trait]
impl Loader for StarSchemaLoader {
    async fn load(&self, data: Vec<DataRow>) -> Result<PipelineResult> {
        let start_time = Instant::now();

        // Registros inválidos falham antes de qualquer alteração no destino
        let records = model::to_records(&data)?;

        self.prepare_schema().await?;
        let stats = self.populate(&data, &records).await?;

        let report = LoadReconciler::new(self.pool.clone())
            .reconcile(records.len() as u64)
            .await?;

        Ok(PipelineResult {
            rows_processed: data.len(),
            rows_successful: stats.facts as usize,
            rows_failed: data.len().saturating_sub(stats.facts as usize),
            execution_time_ms: start_time.elapsed().as_millis() as u64,
            errors: Vec::new(),
            table_counts: report.table_counts,
        })
    }

    async fn finalize(&self) -> Result<()> {
        sqlx::query("PRAGMA optimize").execute(&self.pool).await?;
        tracing::debug!("Estatísticas do destino atualizadas");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let alive = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(alive == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ETLError, TransformError};
    use crate::fixtures::{sample_raw_rows, with_field};
    use crate::load::database::{connect_memory, count_rows};
    use crate::schema::{DISCOUNT, SHIP_DATE};
    use crate::transform::{
        CompositeTransformer, DerivationEngine, NullReconciler, RowValidator, TypeNormalizer,
    };
    use crate::traits::Transformer;
    use crate::types::DataValue;

    async fn transformed(rows: Vec<DataRow>) -> Result<Vec<DataRow>> {
        CompositeTransformer::new()
            .add(crate::transform::Deduplicator::new())
            .add(TypeNormalizer::new())
            .add(DerivationEngine::new())
            .add(NullReconciler::new())
            .add(RowValidator::new())
            .transform(rows)
            .await
    }

    async fn loader() -> StarSchemaLoader {
        StarSchemaLoader::new(connect_memory().await.unwrap())
    }

    async fn scalar(loader: &StarSchemaLoader, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(loader.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_star_schema() {
        let loader = loader().await;
        let data = transformed(sample_raw_rows()).await.unwrap();

        let result = loader.load(data).await.unwrap();

        assert_eq!(result.rows_processed, 3);
        assert_eq!(result.rows_successful, 3);
        assert_eq!(result.table_counts["fact_sales"], 3);
        assert_eq!(result.table_counts["staging_raw_sales"], 3);
        assert_eq!(result.table_counts["dim_customer"], 3);
        assert_eq!(result.table_counts["dim_product"], 3);
        assert_eq!(result.table_counts["dim_shipping"], 3);
        assert_eq!(result.table_counts["dim_date"], 6);
    }

    #[tokio::test]
    async fn test_date_key_has_single_dimension_row() {
        let loader = loader().await;
        let rows = sample_raw_rows();
        // Dois pedidos distintos no mesmo dia
        let same_day = with_field(rows[1].clone(), "order_date", DataValue::from("2019-01-03"));
        let data = transformed(vec![rows[0].clone(), same_day]).await.unwrap();

        loader.load(data).await.unwrap();

        assert_eq!(scalar(&loader, "SELECT COUNT(*) FROM dim_date WHERE date_key = 20190103").await, 1);
        assert_eq!(
            scalar(&loader, "SELECT COUNT(*) FROM fact_sales WHERE order_date_key = 20190103").await,
            2
        );
    }

    #[tokio::test]
    async fn test_fact_keys_resolve_to_one_dimension_row() {
        let loader = loader().await;
        let data = transformed(sample_raw_rows()).await.unwrap();
        loader.load(data).await.unwrap();

        let orphans = scalar(
            &loader,
            "SELECT COUNT(*) FROM fact_sales f
             LEFT JOIN dim_date od ON f.order_date_key = od.date_key
             LEFT JOIN dim_date sd ON f.ship_date_key = sd.date_key
             LEFT JOIN dim_customer c ON f.customer_key = c.customer_key
             LEFT JOIN dim_product p ON f.product_key = p.product_key
             LEFT JOIN dim_shipping s ON f.shipping_key = s.shipping_key
             WHERE od.date_key IS NULL OR sd.date_key IS NULL OR c.customer_key IS NULL
                OR p.product_key IS NULL OR s.shipping_key IS NULL",
        )
        .await;

        assert_eq!(orphans, 0);
        assert_eq!(
            scalar(&loader, "SELECT shipping_key FROM fact_sales WHERE order_id = 'CA-2019-002'").await,
            2
        );
    }

    #[tokio::test]
    async fn test_discount_out_of_range_writes_no_facts() {
        let loader = loader().await;
        loader.reset_schema().await.unwrap();

        let row = with_field(sample_raw_rows().remove(0), DISCOUNT, DataValue::from("1.2"));
        let err = transformed(vec![row]).await.unwrap_err();

        assert!(matches!(err, ETLError::Transform(TransformError::ValidationFailed(_))));
        let mut conn = loader.pool().acquire().await.unwrap();
        assert_eq!(count_rows(&mut conn, "fact_sales").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_run_replaces_previous_load() {
        let loader = loader().await;

        loader.load(transformed(sample_raw_rows()).await.unwrap()).await.unwrap();
        let rows = sample_raw_rows();
        let result = loader
            .load(transformed(vec![rows[2].clone()]).await.unwrap())
            .await
            .unwrap();

        assert_eq!(result.table_counts["fact_sales"], 1);
        assert_eq!(result.table_counts["dim_customer"], 1);
    }

    #[tokio::test]
    async fn test_additive_strategy_keeps_schema_and_clears_rows() {
        let loader = loader().await.with_schema_strategy(SchemaStrategy::Additive);

        loader.load(transformed(sample_raw_rows()).await.unwrap()).await.unwrap();
        let result = loader.load(transformed(sample_raw_rows()).await.unwrap()).await.unwrap();

        assert_eq!(result.table_counts["fact_sales"], 3);
        assert_eq!(result.table_counts["dim_date"], 6);
    }

    #[tokio::test]
    async fn test_unresolved_ship_date_fails_by_default() {
        let loader = loader().await;
        let row = with_field(sample_raw_rows().remove(0), SHIP_DATE, DataValue::from("not a date"));
        let data = transformed(vec![row]).await.unwrap();

        let err = loader.load(data).await.unwrap_err();

        match err {
            ETLError::Load(LoadError::UnresolvedKeys(message)) => {
                assert!(message.contains("dim_date: 1"));
            }
            other => panic!("erro inesperado: {other:?}"),
        }
        let mut conn = loader.pool().acquire().await.unwrap();
        assert_eq!(count_rows(&mut conn, "fact_sales").await.unwrap(), 0);
        assert_eq!(count_rows(&mut conn, "dim_date").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_ship_date_points_to_unknown_member() {
        let loader = loader()
            .await
            .with_unresolved_keys(UnresolvedKeyPolicy::UnknownMember);
        let row = with_field(sample_raw_rows().remove(0), SHIP_DATE, DataValue::from("not a date"));
        let data = transformed(vec![row]).await.unwrap();

        let result = loader.load(data).await.unwrap();

        assert_eq!(result.table_counts["fact_sales"], 1);
        assert_eq!(result.table_counts["dim_date"], 2);
        assert_eq!(scalar(&loader, "SELECT ship_date_key FROM fact_sales").await, 0);
    }

    #[tokio::test]
    async fn test_customer_dimension_dates() {
        let loader = loader().await;
        let rows = sample_raw_rows();
        let later = with_field(rows[0].clone(), "order_date", DataValue::from("2019-02-10"));
        let later = with_field(later, SHIP_DATE, DataValue::from("2019-02-12"));
        let data = transformed(vec![rows[0].clone(), later]).await.unwrap();

        loader.load(data).await.unwrap();

        let (first, last) = sqlx::query_as::<_, (String, String)>(
            "SELECT first_order_date, last_order_date FROM dim_customer WHERE customer_id = 'CUST-001'",
        )
        .fetch_one(loader.pool())
        .await
        .unwrap();
        assert_eq!(first, "2019-01-03");
        assert_eq!(last, "2019-02-10");
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(loader().await.health_check().await.unwrap());
    }
}
