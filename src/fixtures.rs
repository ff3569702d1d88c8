//! Lotes de exemplo compartilhados pelos testes

use crate::schema::SOURCE_COLUMNS;
use crate::types::{DataRow, DataValue};

/// Quatro pedidos no formato bruto do extrator; o quarto repete o primeiro
pub(crate) fn sample_raw_rows() -> Vec<DataRow> {
    vec![
        raw_row(&[
            "CA-2019-001", "2019-01-03", "2019-01-07", "Standard Class", "CUST-001", "John Doe",
            "Consumer", "United States", "New York", "New York", "10001", "East", "PROD-001",
            "Technology", "Phones", "Phone A", "100.0", "1", "0.0", "20.0",
        ]),
        raw_row(&[
            "CA-2019-002", "2019-01-04", "2019-01-08", "First Class", "CUST-002", "Jane Smith",
            "Corporate", "United States", "Los Angeles", "California", "90001", "West", "PROD-002",
            "Furniture", "Chairs", "Chair B", "200.0", "2", "0.1", "40.0",
        ]),
        raw_row(&[
            "CA-2019-003", "2019-01-05", "2019-01-09", "Second Class", "CUST-003", "Bob Johnson",
            "Home Office", "United States", "Chicago", "Illinois", "60601", "Central", "PROD-003",
            "Office Supplies", "Paper", "Paper C", "50.0", "3", "0.2", "10.0",
        ]),
        raw_row(&[
            "CA-2019-001", "2019-01-03", "2019-01-07", "Standard Class", "CUST-001", "John Doe",
            "Consumer", "United States", "New York", "New York", "10001", "East", "PROD-001",
            "Technology", "Phones", "Phone A", "100.0", "1", "0.0", "20.0",
        ]),
    ]
}

/// Monta uma linha bruta a partir dos valores na ordem das colunas de origem
pub(crate) fn raw_row(values: &[&str]) -> DataRow {
    SOURCE_COLUMNS
        .iter()
        .zip(values.iter())
        .map(|((column, _), value)| {
            let value = if value.is_empty() {
                DataValue::Null
            } else {
                DataValue::from(*value)
            };
            (column.to_string(), value)
        })
        .collect()
}

/// Substitui um campo de uma linha
pub(crate) fn with_field(mut row: DataRow, column: &str, value: DataValue) -> DataRow {
    row.insert(column.to_string(), value);
    row
}
