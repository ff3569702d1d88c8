//! # sales-etl - Pipeline ETL de vendas
//!
//! Lê um arquivo CSV de pedidos, limpa e enriquece os registros e carrega um
//! modelo dimensional (star schema) em SQLite, conferindo ao final que a tabela
//! fato recebeu exatamente as linhas do lote.
//!
//! ## Exemplo Rápido
//!
//! ```rust,no_run
//! use sales_etl::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ETLConfig::builder()
//!         .source_path("data/raw/sales_data.csv")
//!         .database_url("sqlite://data/sales_analytics.db")
//!         .build()?;
//!     config.preflight()?;
//!
//!     let report = sales_pipeline(&config).await?.execute().await?;
//!     println!("{} linhas na tabela fato", report.load.rows_successful);
//!     Ok(())
//! }
//! ```
//!
//! ## Arquitetura
//!
//! ### Extract
//! `SalesCsvExtractor` lê o arquivo de origem como texto e padroniza os nomes
//! das colunas.
//!
//! ### Transform
//! Duplicatas, normalização de tipos, campos derivados, reconciliação de nulos
//! e o quality gate, encadeados num `CompositeTransformer`.
//!
//! ### Load
//! `StarSchemaLoader` recria o schema, popula staging, dimensões e fato numa
//! única transação e reconcilia as contagens.

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod extract;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod summary;
pub mod traits;
pub mod transform;
pub mod types;

#[cfg(test)]
mod fixtures;

// Re-exports para facilitar o uso
pub use config::ETLConfig;
pub use error::{ETLError, Result};
pub use types::{DataRow, DataValue, PipelineEvent, PipelineResult, PipelineState};
pub use traits::*;
pub use pipeline::{sales_pipeline, Pipeline, PipelineReport};
pub use events::{InMemoryEventEmitter, LoggingEventEmitter};

/// Prelude com imports mais comuns
pub mod prelude {
    pub use crate::config::{ETLConfig, SchemaStrategy, UnresolvedKeyPolicy};
    pub use crate::error::{ETLError, Result};
    pub use crate::types::{DataRow, DataValue, PipelineEvent, PipelineResult, PipelineState};
    pub use crate::traits::{EventEmitter, Extractor, Loader, Transformer, Validator};
    pub use crate::pipeline::{sales_pipeline, Pipeline, PipelineReport};
    pub use crate::events::{InMemoryEventEmitter, LoggingEventEmitter};

    // Extractors
    pub use crate::extract::SalesCsvExtractor;

    // Transformers
    pub use crate::transform::{
        sales_transformer, CompositeTransformer, DerivationEngine, Deduplicator, NullReconciler,
        RowValidator, TypeNormalizer,
    };

    // Loaders
    pub use crate::load::{CsvLoader, LoadReconciler, StarSchemaLoader};
    pub use crate::export::export_dashboard;
}

/// Informações sobre a versão da biblioteca
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Informações sobre a biblioteca
pub fn about() -> &'static str {
    env!("CARGO_PKG_DESCRIPTION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_about() {
        assert!(!about().is_empty());
    }
}
