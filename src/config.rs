use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ETLError, ExtractError};
use crate::schema::DEFAULT_DATE_FORMAT;

/// Configuração principal do ETL
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ETLConfig {
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub pipeline: PipelineConfig,
    pub observability: ObservabilityConfig,
}

/// Configuração do arquivo de origem
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub delimiter: char,
    pub date_format: String,
}

/// Configuração do banco de destino
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    pub database_url: String,
    pub schema_strategy: SchemaStrategy,
    pub unresolved_keys: UnresolvedKeyPolicy,
}

/// Configuração do pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sugestão de linhas por INSERT; não altera o resultado da carga
    pub batch_size: usize,
    pub processed_dir: PathBuf,
    pub write_snapshots: bool,
    pub export_path: PathBuf,
}

/// Configuração de observabilidade
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
}

/// Formato de log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Como o esquema de destino é preparado antes de cada carga
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaStrategy {
    /// Remove e recria as seis tabelas a cada execução
    #[default]
    Recreate,
    /// Cria apenas o que falta e esvazia as tabelas existentes
    Additive,
}

/// O que fazer com linhas de fato cuja chave não resolve numa dimensão
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedKeyPolicy {
    /// Aborta a carga antes de inserir a tabela fato
    #[default]
    Fail,
    /// Aponta a linha para um membro "desconhecido" da dimensão
    UnknownMember,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/raw/sales_data.csv"),
            delimiter: ',',
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/sales_analytics.db".to_string(),
            schema_strategy: SchemaStrategy::default(),
            unresolved_keys: UnresolvedKeyPolicy::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            processed_dir: PathBuf::from("data/processed"),
            write_snapshots: true,
            export_path: PathBuf::from("data/tableau_export/sales_dashboard_data.csv"),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_file: Some(PathBuf::from("logs/pipeline.log")),
        }
    }
}

impl ETLConfig {
    /// Cria um novo builder para configuração
    pub fn builder() -> ETLConfigBuilder {
        ETLConfigBuilder::default()
    }

    /// Carrega configuração do ambiente (variáveis `ETL_*`)
    pub fn from_env() -> Result<Self, ETLError> {
        let mut builder = Self::builder();

        if let Ok(path) = std::env::var("ETL_SOURCE_PATH") {
            builder = builder.source_path(path);
        }

        if let Ok(url) = std::env::var("ETL_DATABASE_URL") {
            builder = builder.database_url(url);
        }

        if let Ok(batch_size) = std::env::var("ETL_BATCH_SIZE") {
            let size = batch_size.parse::<usize>().map_err(|_| {
                ETLError::Config(ConfigError::InvalidValue {
                    param: "ETL_BATCH_SIZE".to_string(),
                    value: batch_size.clone(),
                })
            })?;
            builder = builder.batch_size(size);
        }

        if let Ok(dir) = std::env::var("ETL_PROCESSED_DIR") {
            builder = builder.processed_dir(dir);
        }

        if let Ok(format) = std::env::var("ETL_DATE_FORMAT") {
            builder = builder.date_format(format);
        }

        if let Ok(level) = std::env::var("ETL_LOG_LEVEL") {
            builder = builder.log_level(level);
        }

        if let Ok(file) = std::env::var("ETL_LOG_FILE") {
            builder = builder.log_file(Some(PathBuf::from(file)));
        }

        builder.build()
    }

    /// Carrega configuração de arquivo
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ETLError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Carrega configuração de string TOML
    pub fn from_toml(toml_str: &str) -> Result<Self, ETLError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml_str, config::FileFormat::Toml))
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Valida a configuração
    pub fn validate(&self) -> Result<(), ETLError> {
        if self.pipeline.batch_size == 0 {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "batch_size".to_string(),
                value: "0".to_string(),
            }));
        }

        if self.target.database_url.trim().is_empty() {
            return Err(ETLError::Config(ConfigError::InvalidConfig(
                "database_url não pode ser vazio".to_string(),
            )));
        }

        if !self.target.database_url.starts_with("sqlite:") {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "database_url".to_string(),
                value: self.target.database_url.clone(),
            }));
        }

        if !self.source.delimiter.is_ascii() {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "delimiter".to_string(),
                value: self.source.delimiter.to_string(),
            }));
        }

        if self.source.date_format.trim().is_empty() {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "date_format".to_string(),
                value: String::new(),
            }));
        }

        Ok(())
    }

    /// Delimitador como byte; `validate` garante que é ASCII
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.source.delimiter).unwrap_or(b',')
    }

    /// Verificações anteriores à execução
    ///
    /// O arquivo de origem precisa existir; os diretórios de saída são criados.
    pub fn preflight(&self) -> Result<(), ETLError> {
        self.validate()?;

        if !self.source.path.exists() {
            return Err(ETLError::Extract(ExtractError::FileNotFound(
                self.source.path.display().to_string(),
            )));
        }

        std::fs::create_dir_all(&self.pipeline.processed_dir)?;

        if let Some(parent) = self.observability.log_file.as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(
            database_url = %self.target.database_url,
            source = %self.source.path.display(),
            batch_size = self.pipeline.batch_size,
            "Configuração validada"
        );

        Ok(())
    }
}

/// Builder para configuração ETL
#[derive(Default)]
pub struct ETLConfigBuilder {
    config: ETLConfig,
}

impl ETLConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source.path = path.into();
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.source.delimiter = delimiter;
        self
    }

    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.config.source.date_format = format.into();
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.target.database_url = url.into();
        self
    }

    pub fn schema_strategy(mut self, strategy: SchemaStrategy) -> Self {
        self.config.target.schema_strategy = strategy;
        self
    }

    pub fn unresolved_keys(mut self, policy: UnresolvedKeyPolicy) -> Self {
        self.config.target.unresolved_keys = policy;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.pipeline.batch_size = size;
        self
    }

    pub fn processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pipeline.processed_dir = dir.into();
        self
    }

    pub fn write_snapshots(mut self, enable: bool) -> Self {
        self.config.pipeline.write_snapshots = enable;
        self
    }

    pub fn export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pipeline.export_path = path.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.observability.log_level = level.into();
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.observability.log_format = format;
        self
    }

    pub fn log_file(mut self, file: Option<PathBuf>) -> Self {
        self.config.observability.log_file = file;
        self
    }

    pub fn build(self) -> Result<ETLConfig, ETLError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
