use thiserror::Error;

/// Tipo Result principal da biblioteca
pub type Result<T> = std::result::Result<T, ETLError>;

/// Erro principal do pipeline de vendas
#[derive(Error, Debug)]
pub enum ETLError {
    #[error("Erro de extração: {0}")]
    Extract(#[from] ExtractError),

    #[error("Erro de transformação: {0}")]
    Transform(#[from] TransformError),

    #[error("Erro de carga: {0}")]
    Load(#[from] LoadError),

    #[error("Erro de configuração: {0}")]
    Config(#[from] ConfigError),

    #[error("Erro de pipeline: {0}")]
    Pipeline(String),

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Erro genérico: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Erros relacionados à extração de dados
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Arquivo não encontrado: {0}")]
    FileNotFound(String),

    #[error("Arquivo de dados vazio: {0}")]
    EmptySource(String),

    #[error("Colunas obrigatórias ausentes: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Formato inválido: {0}")]
    InvalidFormat(String),

    #[error("Erro de parsing: {0}")]
    ParseError(String),
}

/// Erros relacionados à transformação de dados
#[derive(Error, Debug)]
pub enum TransformError {
    /// Todas as violações do quality gate, agregadas numa única falha
    #[error("Validação dos dados falhou: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}

/// Erros relacionados ao carregamento de dados
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Erro de banco de dados: {0}")]
    Database(String),

    #[error("Registro inválido para carga: {0}")]
    InvalidRecord(String),

    #[error("Chaves de dimensão não resolvidas: {0}")]
    UnresolvedKeys(String),

    #[error("Divergência de contagem! Origem: {expected}, fact_sales: {actual}")]
    RowCountMismatch { expected: u64, actual: u64 },
}

/// Erros relacionados à configuração
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuração inválida: {0}")]
    InvalidConfig(String),

    #[error("Valor inválido para {param}: {value}")]
    InvalidValue { param: String, value: String },

    #[error("Erro de parsing de configuração: {0}")]
    ParseError(String),
}

impl ETLError {
    /// Verifica se o erro é recuperável
    ///
    /// Nenhuma das falhas fatais do pipeline é recuperável: a próxima execução
    /// reconstrói o destino do zero.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ETLError::Io(e) if e.kind() == std::io::ErrorKind::Interrupted)
    }

    /// Retorna o código de erro
    pub fn error_code(&self) -> &'static str {
        match self {
            ETLError::Extract(ExtractError::FileNotFound(_)) => "INPUT_MISSING",
            ETLError::Extract(ExtractError::MissingColumns(_)) => "SCHEMA_MISSING",
            ETLError::Extract(_) => "EXTRACT_ERROR",
            ETLError::Transform(TransformError::ValidationFailed(_)) => "QUALITY_GATE",
            ETLError::Load(LoadError::RowCountMismatch { .. }) => "LOAD_INTEGRITY",
            ETLError::Load(LoadError::UnresolvedKeys(_)) => "LOAD_INTEGRITY",
            ETLError::Load(_) => "LOAD_ERROR",
            ETLError::Config(_) => "CONFIG_ERROR",
            ETLError::Pipeline(_) => "PIPELINE_ERROR",
            ETLError::Io(_) => "IO_ERROR",
            ETLError::Serialization(_) => "SERIALIZATION_ERROR",
            ETLError::Generic(_) => "GENERIC_ERROR",
        }
    }
}

impl From<config::ConfigError> for ETLError {
    fn from(err: config::ConfigError) -> Self {
        ETLError::Config(ConfigError::ParseError(err.to_string()))
    }
}

impl From<sqlx::Error> for ETLError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => ETLError::Io(io_err),
            other => ETLError::Load(LoadError::Database(other.to_string())),
        }
    }
}

impl From<csv::Error> for ETLError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(io_err) => ETLError::Io(std::io::Error::new(io_err.kind(), io_err.to_string())),
            csv::ErrorKind::Utf8 { .. } => {
                ETLError::Extract(ExtractError::InvalidFormat("UTF-8 inválido".to_string()))
            }
            _ => ETLError::Extract(ExtractError::ParseError(err.to_string())),
        }
    }
}
