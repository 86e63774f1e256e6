// Excel table import (xlsx, xls, ods) and result workbook export
//
// Import: one-way reduction to header-keyed string rows; typing happens in
// the loading layer. Export: presentation snapshot of an audit result, one
// sheet per populated bucket plus the error log. Not a round-trip format.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};

use comaudit_engine::model::{
    AuditBucket, AuditResult, ClassifiedTransaction, Resolution,
};
use comaudit_engine::AuditError;

use crate::table::Table;

/// Read one sheet into a string table. `sheet = None` takes the first
/// sheet; `header_row` is the 0-based index of the header line, rows above
/// it (report titles, filter banners) are discarded.
pub fn read_table(
    path: &Path,
    sheet: Option<&str>,
    header_row: usize,
) -> Result<Table, AuditError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AuditError::Io(format!("cannot open '{}': {e}", path.display())))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AuditError::Io(format!("'{}' contains no sheets", path.display())))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AuditError::Io(format!("cannot read sheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows().skip(header_row);
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| {
            AuditError::Io(format!(
                "sheet '{sheet_name}' has no header row at index {header_row}"
            ))
        })?
        .iter()
        .map(|c| cell_to_string(c).trim().to_string())
        .collect();

    let cells: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(Table::from_rows(headers, cells))
}

/// Days between the Excel epoch (1899-12-30) and a serial value's date.
pub(crate) fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .map(|base| base + Duration::days(serial.trunc() as i64))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Integers without a decimal point, so product codes survive the
        // float round-trip ("812", not "812.0")
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        Data::Int(n) => format!("{n}"),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match serial_to_date(serial) {
                Some(d) => d.format("%Y-%m-%d").to_string(),
                None => format!("{serial}"),
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

// ---------------------------------------------------------------------------
// Result workbook export
// ---------------------------------------------------------------------------

const BUCKET_ORDER: [AuditBucket; 6] = [
    AuditBucket::ByWeight,
    AuditBucket::FixedCorrect,
    AuditBucket::FixedIncorrect,
    AuditBucket::OfferCorrect,
    AuditBucket::OfferIncorrect,
    AuditBucket::Unresolved,
];

const TXN_HEADERS: [&str; 13] = [
    "invoice",
    "group",
    "entity",
    "seller",
    "code",
    "category",
    "description",
    "date",
    "unit price",
    "declared rate",
    "expected rate",
    "basis",
    "outcome",
];

const ERROR_HEADERS: [&str; 6] = ["invoice", "group", "entity", "code", "date", "message"];

/// Write the reviewer-facing workbook: one sheet per populated bucket in
/// fixed order, then the error log. Buckets with no rows get no sheet.
pub fn write_result_workbook(result: &AuditResult, path: &Path) -> Result<(), AuditError> {
    let mut workbook = XlsxWorkbook::new();
    let header_format = Format::new().set_bold();

    for bucket in BUCKET_ORDER {
        let rows: Vec<&ClassifiedTransaction> = result
            .transactions
            .iter()
            .filter(|t| t.bucket == bucket)
            .collect();
        if rows.is_empty() {
            continue;
        }

        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(bucket.to_string())
            .map_err(|e| AuditError::Io(format!("cannot create sheet '{bucket}': {e}")))?;

        write_headers(worksheet, &TXN_HEADERS, &header_format)?;
        let mut widths = seed_widths(&TXN_HEADERS);

        for (i, t) in rows.iter().enumerate() {
            let row = (i + 1) as u32;
            let cells = transaction_cells(t);
            for (col, value) in cells.iter().enumerate() {
                widths[col] = widths[col].max(value.chars().count());
                write_cell(worksheet, row, col as u16, value)?;
            }
        }
        apply_widths(worksheet, &widths)?;
    }

    if !result.errors.is_empty() {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name("errors")
            .map_err(|e| AuditError::Io(format!("cannot create error sheet: {e}")))?;

        write_headers(worksheet, &ERROR_HEADERS, &header_format)?;
        let mut widths = seed_widths(&ERROR_HEADERS);

        for (i, entry) in result.errors.iter().enumerate() {
            let row = (i + 1) as u32;
            let cells = [
                entry.invoice.as_str(),
                entry.group.as_str(),
                entry.entity.as_str(),
                entry.code.as_str(),
                entry.date.as_str(),
                entry.message.as_str(),
            ];
            for (col, value) in cells.iter().enumerate() {
                widths[col] = widths[col].max(value.chars().count());
                write_cell(worksheet, row, col as u16, value)?;
            }
        }
        apply_widths(worksheet, &widths)?;
    }

    workbook
        .save(path)
        .map_err(|e| AuditError::Io(format!("cannot save '{}': {e}", path.display())))?;
    Ok(())
}

fn transaction_cells(t: &ClassifiedTransaction) -> [String; 13] {
    let txn = &t.transaction;
    let (expected, basis) = match &t.resolution {
        Resolution::Weight => (String::new(), "by weight".to_string()),
        Resolution::Fixed { rate, rule } => (rate.to_string(), format!("fixed rule: {rule}")),
        Resolution::Offer {
            rate,
            offer_date,
            source,
            quality,
            ..
        } => (
            rate.to_string(),
            format!("offer {source} {offer_date} ({quality})"),
        ),
        Resolution::Unresolved { deferred } => (
            String::new(),
            if *deferred {
                "no offer found (deferred)".to_string()
            } else {
                "no offer found".to_string()
            },
        ),
    };
    let outcome = t
        .outcome
        .map(|o| format!("{o:?}").to_lowercase())
        .unwrap_or_default();

    [
        txn.invoice.clone(),
        txn.group.clone(),
        txn.entity.clone(),
        txn.seller.clone(),
        txn.code.to_string(),
        txn.category.clone(),
        txn.description.clone(),
        txn.date.to_string(),
        format!("{}", txn.unit_price),
        format!("{}", txn.declared_rate),
        expected,
        basis,
        outcome,
    ]
}

fn write_headers(
    worksheet: &mut Worksheet,
    headers: &[&str],
    format: &Format,
) -> Result<(), AuditError> {
    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, format)
            .map_err(|e| AuditError::Io(format!("cannot write header '{header}': {e}")))?;
    }
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
) -> Result<(), AuditError> {
    // Numeric cells go out as numbers so reviewers can filter and sum
    if let Ok(n) = value.parse::<f64>() {
        worksheet
            .write_number(row, col, n)
            .map_err(|e| AuditError::Io(format!("cannot write cell: {e}")))?;
    } else {
        worksheet
            .write_string(row, col, value)
            .map_err(|e| AuditError::Io(format!("cannot write cell: {e}")))?;
    }
    Ok(())
}

fn seed_widths(headers: &[&str]) -> Vec<usize> {
    headers.iter().map(|h| h.chars().count()).collect()
}

fn apply_widths(worksheet: &mut Worksheet, widths: &[usize]) -> Result<(), AuditError> {
    for (col, width) in widths.iter().enumerate() {
        let clamped = (*width + 2).min(60) as f64;
        worksheet
            .set_column_width(col as u16, clamped)
            .map_err(|e| AuditError::Io(format!("cannot size column {col}: {e}")))?;
    }
    Ok(())
}
