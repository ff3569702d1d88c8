//! Inicialização do tracing: saída legível no stderr e JSON em arquivo

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use crate::config::{LogFormat, ObservabilityConfig};
use crate::error::{ConfigError, Result};

/// `RUST_LOG` tem precedência sobre o nível configurado
fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            ConfigError::InvalidValue {
                param: "log_level".to_string(),
                value: format!("{} ({})", level, e),
            }
            .into()
        }),
    }
}

/// Separa o caminho do log em diretório e nome de arquivo
fn log_file_parts(path: &Path) -> Result<(PathBuf, OsString)> {
    let file_name = path.file_name().ok_or_else(|| ConfigError::InvalidValue {
        param: "log_file".to_string(),
        value: path.display().to_string(),
    })?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok((dir.to_path_buf(), file_name.to_os_string()))
}

/// Instala o subscriber global
///
/// O guard devolvido mantém o writer do arquivo ativo; descartá-lo encerra a
/// escrita em arquivo.
pub fn init_logging(config: &ObservabilityConfig) -> Result<Option<WorkerGuard>> {
    let stderr_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.log_level)?)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.log_level)?)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&config.log_level)?)
            .boxed(),
    };

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let (dir, file_name) = log_file_parts(path)?;
            std::fs::create_dir_all(&dir)?;

            let appender = tracing_appender::rolling::never(&dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(env_filter(&config.log_level)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::InvalidConfig(format!("logging já inicializado: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_parts() {
        let (dir, name) = log_file_parts(Path::new("logs/pipeline.log")).unwrap();
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(name, OsString::from("pipeline.log"));

        let (dir, _) = log_file_parts(Path::new("pipeline.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
    }

    #[test]
    fn test_log_file_without_name_is_rejected() {
        assert!(log_file_parts(Path::new("/")).is_err());
    }
}
