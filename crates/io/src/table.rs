// Header-keyed string tables, the common shape behind CSV and Excel input

use std::collections::HashMap;

use comaudit_engine::AuditError;

/// An input table reduced to strings: the header row plus one map per data
/// row. Cell typing (codes, dates, prices) happens in the loading layer so
/// CSV and Excel feed the exact same row-mapping code.
#[derive(Debug, Default, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl Table {
    pub fn from_rows(headers: Vec<String>, cells: Vec<Vec<String>>) -> Self {
        let rows = cells
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
            .map(|row| {
                headers
                    .iter()
                    .zip(row)
                    .filter(|(h, _)| !h.is_empty())
                    .map(|(h, c)| (h.clone(), c))
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    /// Fail fast when a configured column is absent from the header row;
    /// a silently missing column would turn every row into a parse error.
    pub fn require_columns(&self, table: &str, columns: &[&str]) -> Result<(), AuditError> {
        for column in columns {
            if !self.headers.iter().any(|h| h == column) {
                return Err(AuditError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn cell<'a>(&self, row: &'a HashMap<String, String>, column: &str) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
}
