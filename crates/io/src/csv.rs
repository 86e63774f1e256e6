// CSV import with delimiter sniffing

use std::path::Path;

use comaudit_engine::AuditError;

use crate::table::Table;

pub fn read_table(path: &Path) -> Result<Table, AuditError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AuditError::Io(format!("cannot read '{}': {e}", path.display())))?;
    read_table_from_str(&content)
}

pub fn read_table_from_str(content: &str) -> Result<Table, AuditError> {
    let delimiter = sniff_delimiter(content);
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AuditError::Io(format!("cannot read CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut cells = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AuditError::Io(format!("cannot read CSV row: {e}")))?;
        cells.push(record.iter().map(|c| c.to_string()).collect());
    }

    Ok(Table::from_rows(headers, cells))
}

/// Detect the field delimiter by checking consistency across the first few
/// lines. Exported tables in this domain arrive comma- or
/// semicolon-delimited depending on the producing locale.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                ::csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}
