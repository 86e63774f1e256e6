// Row mapping: string tables into typed engine inputs
//
// Per-row faults never abort a load. A row that cannot be typed becomes an
// error entry carrying its original identifying fields, so the audit still
// accounts for every input line.

use std::path::Path;

use chrono::NaiveDate;

use comaudit_engine::config::{AuditConfig, SourceConfig, TransactionInput};
use comaudit_engine::model::{ErrorEntry, OfferRecord, TierPrice, TransactionKind};
use comaudit_engine::{AuditError, AuditInput, Transaction};

use crate::table::Table;
use crate::xlsx::serial_to_date;

pub struct LoadedInputs {
    pub input: AuditInput,
    pub offers: Vec<OfferRecord>,
    pub warnings: Vec<String>,
}

/// Load everything the engine needs, resolving file paths relative to
/// `base` (the config file's directory).
pub fn load_inputs(config: &AuditConfig, base: &Path) -> Result<LoadedInputs, AuditError> {
    let inputs = config
        .inputs
        .as_ref()
        .ok_or_else(|| AuditError::MissingInput("inputs.transactions".into()))?;

    let txn_cfg = &inputs.transactions;
    let table = read_input_table(
        &base.join(&txn_cfg.file),
        txn_cfg.sheet.as_deref(),
        txn_cfg.header_row,
    )?;
    let (transactions, rejected) = transactions_from_table(&table, txn_cfg)?;

    let mut offers = Vec::new();
    let mut warnings = Vec::new();
    for source in &config.offers.sources {
        let file = source.file.as_ref().ok_or_else(|| {
            AuditError::MissingInput(format!("offers.sources.{}.file", source.name))
        })?;
        let table = read_input_table(&base.join(file), source.sheet.as_deref(), 0)?;
        let (records, source_warnings) = offers_from_table(&table, source)?;
        offers.extend(records);
        warnings.extend(source_warnings);
    }

    Ok(LoadedInputs {
        input: AuditInput {
            transactions,
            rejected,
        },
        offers,
        warnings,
    })
}

/// Format dispatch by extension. CSV carries its header on the first line,
/// so `header_row` only applies to spreadsheet formats.
pub fn read_input_table(
    path: &Path,
    sheet: Option<&str>,
    header_row: usize,
) -> Result<Table, AuditError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("csv") | Some("tsv") | Some("txt") => crate::csv::read_table(path),
        Some("xlsx") | Some("xls") | Some("xlsb") | Some("ods") => {
            crate::xlsx::read_table(path, sheet, header_row)
        }
        other => Err(AuditError::Io(format!(
            "unsupported input format '{}' for '{}'",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

/// Map the sales table into transactions. Text keys are trimmed and
/// uppercased; the engine matches catalog entries exactly against them.
pub fn transactions_from_table(
    table: &Table,
    cfg: &TransactionInput,
) -> Result<(Vec<Transaction>, Vec<ErrorEntry>), AuditError> {
    let c = &cfg.columns;
    table.require_columns(
        "transactions",
        &[
            &c.invoice,
            &c.group,
            &c.entity,
            &c.seller,
            &c.code,
            &c.category,
            &c.description,
            &c.date,
            &c.unit_price,
            &c.declared_rate,
            &c.kind,
        ],
    )?;

    let return_prefix = cfg.return_prefix.trim().to_uppercase();
    let mut transactions = Vec::with_capacity(table.rows.len());
    let mut rejected = Vec::new();

    for row in &table.rows {
        let invoice = table.cell(row, &c.invoice).trim().to_string();
        let group = normalize_key(table.cell(row, &c.group));
        let entity = normalize_key(table.cell(row, &c.entity));
        let code_raw = table.cell(row, &c.code);
        let date_raw = table.cell(row, &c.date);

        let reject = |message: String| ErrorEntry {
            invoice: invoice.clone(),
            group: group.clone(),
            entity: entity.clone(),
            code: code_raw.trim().to_string(),
            date: date_raw.trim().to_string(),
            message,
        };

        let Some(code) = parse_code(code_raw) else {
            rejected.push(reject(format!("cannot parse product code '{}'", code_raw.trim())));
            continue;
        };
        let Some(date) = parse_date(date_raw) else {
            rejected.push(reject(format!("cannot parse date '{}'", date_raw.trim())));
            continue;
        };
        let price_raw = table.cell(row, &c.unit_price);
        let Some(unit_price) = parse_number(price_raw) else {
            rejected.push(reject(format!("cannot parse sale price '{}'", price_raw.trim())));
            continue;
        };
        let rate_raw = table.cell(row, &c.declared_rate);
        let declared_rate = if rate_raw.trim().is_empty() {
            0.0
        } else {
            match parse_rate(rate_raw) {
                Some(r) => r,
                None => {
                    rejected.push(reject(format!(
                        "cannot parse declared rate '{}'",
                        rate_raw.trim()
                    )));
                    continue;
                }
            }
        };

        let kind_value = normalize_key(table.cell(row, &c.kind));
        let kind = if !return_prefix.is_empty() && kind_value.starts_with(&return_prefix) {
            TransactionKind::Return
        } else {
            TransactionKind::Sale
        };

        // Columns outside the mapping ride along untyped
        let mapped = [
            c.invoice.as_str(),
            c.group.as_str(),
            c.entity.as_str(),
            c.seller.as_str(),
            c.code.as_str(),
            c.category.as_str(),
            c.description.as_str(),
            c.date.as_str(),
            c.unit_price.as_str(),
            c.declared_rate.as_str(),
            c.kind.as_str(),
        ];
        let raw_fields = row
            .iter()
            .filter(|(k, _)| !mapped.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        transactions.push(Transaction {
            invoice,
            group,
            entity,
            seller: normalize_key(table.cell(row, &c.seller)),
            code,
            category: normalize_key(table.cell(row, &c.category)),
            description: normalize_key(table.cell(row, &c.description)),
            date,
            unit_price,
            declared_rate,
            kind,
            raw_fields,
        });
    }

    Ok((transactions, rejected))
}

/// Map one offer source's table. Rows without a usable code or date are
/// dropped with a warning; an unparseable tier price makes that tier
/// absent for the row, never zero.
pub fn offers_from_table(
    table: &Table,
    source: &SourceConfig,
) -> Result<(Vec<OfferRecord>, Vec<String>), AuditError> {
    let mut required: Vec<&str> = vec![&source.columns.code, &source.columns.date];
    for tier in &source.tiers {
        if let Some(column) = &tier.column {
            required.push(column);
        }
    }
    table.require_columns(&format!("offers:{}", source.name), &required)?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut warnings = Vec::new();

    for (i, row) in table.rows.iter().enumerate() {
        let line = i + 2; // 1-based, after the header
        let code_raw = table.cell(row, &source.columns.code);
        let Some(code) = parse_code(code_raw) else {
            warnings.push(format!(
                "source '{}' line {line}: unparseable product code '{}'; row dropped",
                source.name,
                code_raw.trim()
            ));
            continue;
        };
        let date_raw = table.cell(row, &source.columns.date);
        let Some(date) = parse_date(date_raw) else {
            warnings.push(format!(
                "source '{}' line {line}: unparseable date '{}'; row dropped",
                source.name,
                date_raw.trim()
            ));
            continue;
        };

        let tiers = source
            .tiers
            .iter()
            .map(|tier| TierPrice {
                rate: tier.rate,
                price: tier
                    .column
                    .as_deref()
                    .and_then(|column| parse_number(table.cell(row, column)))
                    .filter(|p| p.is_finite() && *p > 0.0),
            })
            .collect();

        records.push(OfferRecord {
            code,
            date,
            source: source.name.clone(),
            tiers,
        });
    }

    Ok((records, warnings))
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

fn normalize_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Product codes come through float-typed cells as "812" or "812.0".
fn parse_code(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < 9e15 => Some(f as i64),
        _ => None,
    }
}

/// ISO and Brazilian day-first forms, datetime prefixes, and raw Excel
/// serials all appear in exported tables.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let head = s.split_whitespace().next().unwrap_or(s);
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
            return Some(d);
        }
    }
    head.parse::<f64>().ok().and_then(serial_to_date)
}

/// Accepts currency prefixes and both decimal conventions
/// ("1.234,56" and "1234.56").
fn parse_number(raw: &str) -> Option<f64> {
    let mut s = raw
        .trim()
        .trim_start_matches("R$")
        .trim()
        .replace(' ', "");
    if s.is_empty() {
        return None;
    }
    if s.contains(',') {
        s = s.replace('.', "").replace(',', ".");
    }
    s.parse().ok()
}

/// A declared rate may carry a percent sign; numeric conventions are
/// reconciled downstream at comparison time.
fn parse_rate(raw: &str) -> Option<f64> {
    parse_number(raw.trim().trim_end_matches('%'))
}
