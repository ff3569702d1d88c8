//! # CSV Loader
//!
//! Grava um lote em CSV. Usado para os snapshots de auditoria
//! (`raw_backup.csv` após a extração e `transformed_sales.csv` após a
//! transformação).

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use crate::error::Result;
use crate::schema::ordered_columns;
use crate::types::{DataRow, DataValue, PipelineResult};
use crate::traits::Loader;

/// Carregador para arquivos CSV
///
/// As colunas seguem a ordem do catálogo; colunas extras vêm depois, em ordem
/// alfabética. Datas saem como `%Y-%m-%d`, booleanos como `1`/`0` e nulos como
/// campo vazio.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    file_path: PathBuf,
    delimiter: u8,
}

impl CsvLoader {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Formata um valor como campo CSV
    pub fn format_value(value: &DataValue) -> String {
        match value {
            DataValue::String(s) => s.clone(),
            DataValue::Integer(i) => i.to_string(),
            DataValue::Float(f) => f.to_string(),
            DataValue::Boolean(b) => String::from(if *b { "1" } else { "0" }),
            DataValue::Null => String::new(),
            DataValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Escreve o lote sem consumi-lo; retorna o número de linhas gravadas
    pub fn write(&self, data: &[DataRow]) -> Result<usize> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let names: BTreeSet<&String> = data.iter().flat_map(|row| row.keys()).collect();
        let columns = ordered_columns(names);

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&self.file_path)?;

        writer.write_record(&columns)?;
        for row in data {
            let record = columns
                .iter()
                .map(|column| row.get(column).map(Self::format_value).unwrap_or_default());
            writer.write_record(record)?;
        }
        writer.flush()?;

        tracing::info!(
            path = %self.file_path.display(),
            rows = data.len(),
            columns = columns.len(),
            "Snapshot CSV gravado"
        );
        Ok(data.len())
    }
}

#[async_trait]
impl Loader for CsvLoader {
    async fn load(&self, data: Vec<DataRow>) -> Result<PipelineResult> {
        let start_time = std::time::Instant::now();

        let written = self.write(&data)?;

        Ok(PipelineResult {
            rows_processed: data.len(),
            rows_successful: written,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
            ..PipelineResult::default()
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self
            .file_path
            .parent()
            .map(|parent| parent.as_os_str().is_empty() || parent.exists())
            .unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_raw_rows;
    use crate::transform::{DerivationEngine, TypeNormalizer};
    use tempfile::tempdir;

    #[test]
    fn test_format_value() {
        assert_eq!(CsvLoader::format_value(&DataValue::Boolean(true)), "1");
        assert_eq!(CsvLoader::format_value(&DataValue::Null), "");
        assert_eq!(CsvLoader::format_value(&DataValue::Float(20.5)), "20.5");
        let date = chrono::NaiveDate::from_ymd_opt(2019, 1, 3).unwrap();
        assert_eq!(CsvLoader::format_value(&DataValue::Date(date)), "2019-01-03");
    }

    #[tokio::test]
    async fn test_snapshot_column_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed").join("transformed_sales.csv");

        let (rows, _) = TypeNormalizer::new().normalize(sample_raw_rows());
        let (mut rows, _) = DerivationEngine::new().derive(rows);
        rows[0].insert("row_id".to_string(), DataValue::from("1"));

        let result = CsvLoader::new(&path).load(rows).await.unwrap();
        assert_eq!(result.rows_successful, 4);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();

        assert_eq!(header.len(), 30);
        assert_eq!(header[0], "order_id");
        assert_eq!(header[19], "profit");
        assert_eq!(header[28], "is_weekend");
        assert_eq!(header[29], "row_id");

        let first: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(first[1], "2019-01-03");
        assert_eq!(first[28], "0");
        assert_eq!(first[29], "1");

        let second: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(second[29], "");
    }
}
