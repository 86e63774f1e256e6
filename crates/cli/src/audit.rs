//! `comaudit run` / `comaudit validate` — config-driven commission audit.

use std::path::{Path, PathBuf};

use comaudit_engine::model::{AuditBucket, MatchQuality, Resolution};
use comaudit_engine::{AuditConfig, AuditResult, OfferIndex};
use comaudit_io::{load_inputs, write_result_workbook};

use crate::exit_codes::{
    EXIT_ERROR, EXIT_INCORRECT, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_UNRESOLVED, EXIT_USAGE,
};
use crate::CliError;

fn audit_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError {
        code,
        message: msg.into(),
        hint: None,
    }
}

fn read_config(config_path: &Path) -> Result<AuditConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| audit_err(EXIT_RUNTIME, format!("cannot read config: {e}")))?;
    AuditConfig::from_toml(&config_str)
        .map_err(|e| audit_err(EXIT_INVALID_CONFIG, e.to_string()))
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    workbook_file: Option<PathBuf>,
    quiet: bool,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;

    // Input and output paths resolve relative to the config file's directory
    let base_dir = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."));

    let workbook_path = workbook_file.or_else(|| {
        config
            .output
            .workbook
            .as_ref()
            .map(|p| base_dir.join(p))
    });
    if let Some(ref path) = workbook_path {
        let ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        if !ok {
            return Err(CliError {
                code: EXIT_USAGE,
                message: format!("workbook path '{}' must end in .xlsx", path.display()),
                hint: Some("the result workbook is only written as xlsx".into()),
            });
        }
    }
    let json_path = output_file.or_else(|| {
        config.output.json.as_ref().map(|p| base_dir.join(p))
    });

    if !quiet {
        eprintln!("[1/3] loading inputs");
    }
    let loaded = load_inputs(&config, base_dir)
        .map_err(|e| audit_err(EXIT_RUNTIME, e.to_string()))?;
    if !quiet {
        eprintln!(
            "      {} transactions ({} rejected), {} offer records",
            loaded.input.transactions.len(),
            loaded.input.rejected.len(),
            loaded.offers.len(),
        );
        eprintln!("[2/3] classifying");
    }

    let index = OfferIndex::from_records(loaded.offers, &config.offers);
    let mut result = comaudit_engine::run(&config, &loaded.input, &index);
    // Load-time warnings come first; they explain rows the index never saw
    let mut warnings = loaded.warnings;
    warnings.append(&mut result.warnings);
    result.warnings = warnings;

    if !quiet {
        eprintln!("[3/3] writing output");
    }

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| audit_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = json_path {
        std::fs::write(path, &json_str)
            .map_err(|e| audit_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        if !quiet {
            eprintln!("wrote {}", path.display());
        }
    }
    if let Some(ref path) = workbook_path {
        write_result_workbook(&result, path)
            .map_err(|e| audit_err(EXIT_RUNTIME, e.to_string()))?;
        if !quiet {
            eprintln!("wrote {}", path.display());
        }
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    if !quiet {
        for line in report_lines(&result, &index) {
            eprintln!("{line}");
        }
    }

    let s = &result.summary;
    if s.fixed_incorrect + s.offer_incorrect > 0 {
        return Err(audit_err(EXIT_INCORRECT, "incorrect commissions found"));
    }
    if s.unresolved + s.errored > 0 {
        return Err(audit_err(
            EXIT_UNRESOLVED,
            "some rows could not be audited (unresolved or errored)",
        ));
    }

    Ok(())
}

/// The per-run stderr report: summary counts, match-quality breakdown, a
/// note for unresolved codes the offer index actually knows, and warnings.
fn report_lines(result: &AuditResult, index: &OfferIndex) -> Vec<String> {
    let s = &result.summary;
    let mut lines = vec![format!(
        "audit '{}': {} rows — {} by weight, {} fixed correct, {} fixed incorrect, \
         {} offer correct, {} offer incorrect, {} unresolved, {} errored",
        result.meta.catalog_name,
        s.total,
        s.by_weight,
        s.fixed_correct,
        s.fixed_incorrect,
        s.offer_correct,
        s.offer_incorrect,
        s.unresolved,
        s.errored,
    )];

    let (exact, prior, posterior) = quality_breakdown(result);
    if exact + prior + posterior > 0 {
        lines.push(format!(
            "offer matches: {exact} exact, {prior} nearest prior, {posterior} nearest posterior"
        ));
    }

    let known = unresolved_known_codes(result, index);
    if !known.is_empty() {
        let list = known
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "note: {} unresolved product code(s) have offers on file but none \
             selectable for the sale date: {list}",
            known.len()
        ));
    }

    for warning in &result.warnings {
        lines.push(format!("warning: {warning}"));
    }
    lines
}

/// Codes of unresolved rows that the index does carry offers for. These
/// usually mean every offer postdates the sale with the posterior fallback
/// off, which reads very differently from a code with no offers at all.
fn unresolved_known_codes(result: &AuditResult, index: &OfferIndex) -> Vec<i64> {
    let mut codes: Vec<i64> = result
        .transactions
        .iter()
        .filter(|t| t.bucket == AuditBucket::Unresolved)
        .map(|t| t.transaction.code)
        .filter(|&code| index.knows_code(code))
        .collect();
    codes.sort_unstable();
    codes.dedup();
    codes
}

fn quality_breakdown(result: &AuditResult) -> (usize, usize, usize) {
    let mut exact = 0;
    let mut prior = 0;
    let mut posterior = 0;
    for t in &result.transactions {
        if let Resolution::Offer { quality, .. } = &t.resolution {
            match quality {
                MatchQuality::Exact => exact += 1,
                MatchQuality::NearestPrior => prior += 1,
                MatchQuality::NearestPosterior => posterior += 1,
            }
        }
    }
    (exact, prior, posterior)
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;

    println!("config ok: {}", config.name);
    println!(
        "  weight: {} global groups, {} seller rules",
        config.weight.global_groups.len(),
        config.weight.sellers.len(),
    );
    println!(
        "  fixed: {} point overrides, {} zero groups, {} group catalogs, \
         {} entity catalogs, {} generic rules",
        config.fixed.point_overrides.len(),
        config.fixed.zero_groups.len(),
        config.fixed.group_catalogs.len(),
        config.fixed.entity_catalogs.len(),
        config.fixed.generic.len(),
    );
    println!(
        "  offers: {} sources, {} discount groups, posterior fallback {}",
        config.offers.sources.len(),
        config.offers.discount_groups.len(),
        if config.offers.posterior_fallback { "on" } else { "off" },
    );
    Ok(())
}
