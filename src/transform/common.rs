use async_trait::async_trait;
use std::time::Instant;
use crate::error::Result;
use crate::summary::TransformStats;
use crate::types::DataRow;
use crate::traits::Transformer;

/// Transformador que combina múltiplas transformações em sequência
///
/// Cada etapa recebe o lote completo produzido pela anterior; o primeiro erro
/// interrompe a cadeia.
pub struct CompositeTransformer {
    transformers: Vec<Box<dyn Transformer + Send + Sync>>,
}

impl CompositeTransformer {
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    pub fn add<T: Transformer + Send + Sync + 'static>(mut self, transformer: T) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    /// Nomes das etapas na ordem de execução
    pub fn stages(&self) -> Vec<&str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }
}

impl Default for CompositeTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transformer for CompositeTransformer {
    async fn transform(&self, mut data: Vec<DataRow>) -> Result<Vec<DataRow>> {
        for transformer in &self.transformers {
            let start = Instant::now();
            let rows_in = data.len();
            data = transformer.transform(data).await?;
            tracing::debug!(
                stage = transformer.name(),
                rows_in,
                rows_out = data.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Etapa de transformação concluída"
            );
        }
        Ok(data)
    }

    fn name(&self) -> &str {
        "composite"
    }

    fn stats(&self) -> TransformStats {
        self.transformers.iter().fold(TransformStats::default(), |mut acc, t| {
            acc.merge(t.stats());
            acc
        })
    }
}
