use async_trait::async_trait;
use crate::error::Result;
use crate::summary::TransformStats;
use crate::types::{DataRow, PipelineEvent, PipelineResult};

/// Trait para componentes que extraem dados
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extrai o lote completo da fonte
    async fn extract(&self) -> Result<Vec<DataRow>>;
}

/// Trait para componentes que transformam dados
///
/// Cada transformação consome o lote inteiro da etapa anterior.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transforma um lote de dados
    async fn transform(&self, data: Vec<DataRow>) -> Result<Vec<DataRow>>;

    /// Nome da etapa, usado nos logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Contadores da última execução
    fn stats(&self) -> TransformStats {
        TransformStats::default()
    }
}

/// Trait para componentes que carregam dados
#[async_trait]
pub trait Loader: Send + Sync {
    /// Carrega dados para o destino
    async fn load(&self, data: Vec<DataRow>) -> Result<PipelineResult>;

    /// Finaliza o carregamento (flush, commit, etc.)
    async fn finalize(&self) -> Result<()> {
        Ok(()) // Implementação padrão
    }

    /// Verifica se o destino está disponível
    async fn health_check(&self) -> Result<bool> {
        Ok(true) // Implementação padrão
    }
}

/// Trait para componentes que validam dados
#[async_trait]
pub trait Validator: Send + Sync {
    /// Valida um lote de dados e retorna as violações fatais encontradas
    async fn validate(&self, data: &[DataRow]) -> Result<Vec<String>>;
}

/// Trait para emissão de eventos do pipeline
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emite um evento do pipeline
    async fn emit(&self, event: PipelineEvent) -> Result<()>;
}
