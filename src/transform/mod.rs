//! Etapas de transformação do lote de vendas
//!
//! A cadeia padrão roda, nesta ordem: remoção de duplicatas, normalização de
//! tipos, derivação de campos, reconciliação de nulos e o quality gate.

pub mod common;
pub mod dedup;
pub mod normalize;
pub mod derive;
pub mod nulls;
pub mod validate;

pub use common::CompositeTransformer;
pub use dedup::Deduplicator;
pub use derive::DerivationEngine;
pub use normalize::{CoercionReport, TypeNormalizer};
pub use nulls::{FillReport, NullReconciler};
pub use validate::RowValidator;

use crate::config::ETLConfig;

/// Monta a cadeia de transformação padrão do pipeline de vendas
pub fn sales_transformer(config: &ETLConfig) -> CompositeTransformer {
    CompositeTransformer::new()
        .add(Deduplicator::new())
        .add(TypeNormalizer::new().with_date_format(config.source.date_format.clone()))
        .add(DerivationEngine::new())
        .add(NullReconciler::new())
        .add(RowValidator::new())
}
