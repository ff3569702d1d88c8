use async_trait::async_trait;
use std::path::{Path, PathBuf};
use crate::error::{ExtractError, Result};
use crate::schema::{normalize_column_name, SOURCE_COLUMNS};
use crate::types::{DataRow, DataValue};
use crate::traits::Extractor;

/// Extrator para o arquivo CSV de vendas
///
/// Todos os campos são lidos como texto: a conversão de tipos é feita pelo
/// normalizador, que registra as falhas por coluna. Campos vazios viram
/// `DataValue::Null`. Os cabeçalhos são padronizados para snake_case
/// (`"Sub-Category"` → `sub_category`).
#[derive(Debug, Clone)]
pub struct SalesCsvExtractor {
    file_path: PathBuf,
    delimiter: u8,
}

impl SalesCsvExtractor {
    /// Cria um novo extrator CSV
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    /// Define o delimitador
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn parse_value(value: &str) -> DataValue {
        if value.trim().is_empty() {
            DataValue::Null
        } else {
            DataValue::String(value.to_string())
        }
    }

    fn check_required_columns(headers: &[String]) -> Result<()> {
        let missing: Vec<String> = SOURCE_COLUMNS
            .iter()
            .filter(|(column, _)| !headers.iter().any(|h| h == column))
            .map(|(column, _)| column.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExtractError::MissingColumns(missing).into())
        }
    }
}

#[async_trait]
impl Extractor for SalesCsvExtractor {
    async fn extract(&self) -> Result<Vec<DataRow>> {
        use std::fs::File;
        use std::io::BufReader;

        tracing::info!(source = %self.file_path.display(), "Lendo dados de origem");

        if !self.file_path.exists() {
            return Err(ExtractError::FileNotFound(self.file_path.display().to_string()).into());
        }

        let file = File::open(&self.file_path)?;
        let reader = BufReader::new(file);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(normalize_column_name)
            .collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let mut row = DataRow::with_capacity(headers.len());

            for (i, field) in record.iter().enumerate() {
                if let Some(header) = headers.get(i) {
                    row.insert(header.clone(), Self::parse_value(field));
                }
            }

            rows.push(row);
        }

        if rows.is_empty() {
            return Err(ExtractError::EmptySource(self.file_path.display().to_string()).into());
        }

        Self::check_required_columns(&headers)?;

        let null_values = rows
            .iter()
            .flat_map(|row| row.values())
            .filter(|value| value.is_null())
            .count();

        tracing::info!(
            rows = rows.len(),
            columns = headers.len(),
            "Dados extraídos com sucesso"
        );
        if null_values > 0 {
            tracing::warn!(null_values, "Valores nulos encontrados na origem");
        }

        Ok(rows)
    }
}
