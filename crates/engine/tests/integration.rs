//! End-to-end engine runs driven by inline TOML catalogs.

use std::collections::HashMap;

use chrono::NaiveDate;
use comaudit_engine::config::AuditConfig;
use comaudit_engine::engine::run;
use comaudit_engine::model::{
    AuditBucket, AuditInput, MatchQuality, OfferRecord, Resolution, TierPrice, Transaction,
    TransactionKind,
};
use comaudit_engine::offers::OfferIndex;
use comaudit_engine::rate::Rate;

const CATALOG: &str = r#"
name = "Month Close"

[weight]
global_groups = ["LOURENCINI"]

[[weight.sellers]]
seller = "LUIZ FERNANDO VOLTERO BARBOSA"
[[weight.sellers.group_codes]]
group = "REDE PLUS"
codes = [812]

[fixed]
house_sellers = ["CASA"]
zero_groups = ["REDE RICOY", "AKKI ATACADISTA"]

[[fixed.point_overrides]]
invoice = "NF-777"
code = 937
rate = 2

[[fixed.group_catalogs]]
group = "ROSSI"
[[fixed.group_catalogs.rules]]
rate = 3
codes = [937]
[[fixed.group_catalogs.rules]]
rate = 1
codes = [812]

[[fixed.generic]]
rate = 3
groups = ["CALVO", "TENDA"]

[offers]
posterior_fallback = true

[[offers.discount_groups]]
group = "SEMAR VAREJO"

[[offers.sources]]
name = "vog"
rank = 1
[[offers.sources.tiers]]
rate = 3
column = "3%"
[[offers.sources.tiers]]
rate = 1
"#;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn txn(group: &str, code: i64, price: f64, day: &str, declared: f64) -> Transaction {
    Transaction {
        invoice: format!("NF-{code}"),
        group: group.into(),
        entity: format!("{group} LTDA"),
        seller: "VENDEDOR".into(),
        code,
        category: "GERAL".into(),
        description: "PRODUTO".into(),
        date: date(day),
        unit_price: price,
        declared_rate: declared,
        kind: TransactionKind::Sale,
        raw_fields: HashMap::new(),
    }
}

fn offer(code: i64, day: &str, threshold: f64) -> OfferRecord {
    OfferRecord {
        code,
        date: date(day),
        source: "vog".into(),
        tiers: vec![
            TierPrice {
                rate: Rate::from_percent(3.0),
                price: Some(threshold),
            },
            TierPrice {
                rate: Rate::from_percent(1.0),
                price: None,
            },
        ],
    }
}

fn catalog() -> AuditConfig {
    AuditConfig::from_toml(CATALOG).unwrap()
}

#[test]
fn rede_ricoy_zero_rate_end_to_end() {
    let config = catalog();
    let index = OfferIndex::from_records(vec![], &config.offers);
    let input = AuditInput {
        transactions: vec![txn("REDE RICOY", 812, 50.0, "2024-05-01", 0.0)],
        rejected: vec![],
    };

    let result = run(&config, &input, &index);
    assert_eq!(result.summary.fixed_correct, 1);
    let c = &result.transactions[0];
    assert_eq!(c.bucket, AuditBucket::FixedCorrect);
    match &c.resolution {
        Resolution::Fixed { rate, .. } => assert_eq!(*rate, Rate::ZERO),
        other => panic!("expected fixed resolution, got {other:?}"),
    }
}

#[test]
fn point_override_beats_group_catalog() {
    let config = catalog();
    let index = OfferIndex::from_records(vec![], &config.offers);
    // ROSSI + code 937 would be 3% by catalog; the override pins NF-777 to 2%.
    let mut t = txn("ROSSI", 937, 80.0, "2024-05-01", 2.0);
    t.invoice = "NF-777".into();
    let input = AuditInput {
        transactions: vec![t],
        rejected: vec![],
    };

    let result = run(&config, &input, &index);
    assert_eq!(result.summary.fixed_correct, 1);
    match &result.transactions[0].resolution {
        Resolution::Fixed { rate, .. } => assert_eq!(*rate, Rate::from_bps(200)),
        other => panic!("expected fixed resolution, got {other:?}"),
    }
}

#[test]
fn weight_based_rows_are_never_scored() {
    let config = catalog();
    let index = OfferIndex::from_records(vec![offer(812, "2024-05-01", 10.0)], &config.offers);
    let mut t = txn("REDE PLUS", 812, 50.0, "2024-05-01", 0.03);
    t.seller = "LUIZ FERNANDO VOLTERO BARBOSA".into();
    let input = AuditInput {
        transactions: vec![t],
        rejected: vec![],
    };

    let result = run(&config, &input, &index);
    assert_eq!(result.summary.by_weight, 1);
    let c = &result.transactions[0];
    assert!(c.outcome.is_none());
    assert!(matches!(c.resolution, Resolution::Weight));
}

#[test]
fn nearest_date_examples_across_generations() {
    // Offers only on 2024-01-01 and 2024-01-10.
    let records = vec![offer(700, "2024-01-01", 30.0), offer(700, "2024-01-10", 30.0)];

    let config = catalog();
    let index = OfferIndex::from_records(records.clone(), &config.offers);

    // 2024-01-05 → nearest prior, the 01-01 offer.
    let input = AuditInput {
        transactions: vec![txn("SEM REGRA", 700, 35.0, "2024-01-05", 0.03)],
        rejected: vec![],
    };
    let result = run(&config, &input, &index);
    match &result.transactions[0].resolution {
        Resolution::Offer {
            offer_date,
            quality,
            ..
        } => {
            assert_eq!(*offer_date, date("2024-01-01"));
            assert_eq!(*quality, MatchQuality::NearestPrior);
        }
        other => panic!("expected offer resolution, got {other:?}"),
    }

    // 2023-12-20 with the posterior generation → the earliest later
    // offer, 01-01.
    let input = AuditInput {
        transactions: vec![txn("SEM REGRA", 700, 35.0, "2023-12-20", 0.03)],
        rejected: vec![],
    };
    let result = run(&config, &input, &index);
    match &result.transactions[0].resolution {
        Resolution::Offer {
            offer_date,
            quality,
            ..
        } => {
            assert_eq!(*offer_date, date("2024-01-01"));
            assert_eq!(*quality, MatchQuality::NearestPosterior);
        }
        other => panic!("expected offer resolution, got {other:?}"),
    }

    // Same transaction under the legacy generation → unresolved.
    let mut legacy = AuditConfig::from_toml(CATALOG).unwrap();
    legacy.offers.posterior_fallback = false;
    let legacy_index = OfferIndex::from_records(records, &legacy.offers);
    let input = AuditInput {
        transactions: vec![txn("SEM REGRA", 700, 35.0, "2023-12-20", 0.03)],
        rejected: vec![],
    };
    let result = run(&legacy, &input, &legacy_index);
    assert_eq!(result.summary.unresolved, 1);
}

#[test]
fn discount_group_uses_adjusted_comparison_price() {
    let config = catalog();
    // Threshold exactly 95: the discounted price of 100 lands on the 3%
    // tier, the raw price of a non-discount group would too — so use a
    // threshold between 95 and 100 to tell them apart.
    let index = OfferIndex::from_records(vec![offer(555, "2024-05-01", 97.0)], &config.offers);

    let discounted = txn("SEMAR VAREJO", 555, 100.0, "2024-05-01", 0.01);
    let plain = txn("OUTRO GRUPO", 555, 100.0, "2024-05-01", 0.03);
    let input = AuditInput {
        transactions: vec![discounted, plain],
        rejected: vec![],
    };

    let result = run(&config, &input, &index);
    // 100 * 0.95 = 95.00 < 97 → 1% for the discount group.
    match &result.transactions[0].resolution {
        Resolution::Offer {
            rate,
            comparison_price,
            ..
        } => {
            assert_eq!(*comparison_price, 95.0);
            assert_eq!(*rate, Rate::from_bps(100));
        }
        other => panic!("expected offer resolution, got {other:?}"),
    }
    // 100 >= 97 → 3% for everyone else.
    match &result.transactions[1].resolution {
        Resolution::Offer { rate, .. } => assert_eq!(*rate, Rate::from_bps(300)),
        other => panic!("expected offer resolution, got {other:?}"),
    }
    assert_eq!(result.summary.offer_correct, 2);
}

#[test]
fn returns_flip_expected_sign_everywhere() {
    let config = catalog();
    let index = OfferIndex::from_records(vec![offer(812, "2024-05-01", 40.0)], &config.offers);

    let mut fixed_return = txn("CALVO", 1, 10.0, "2024-05-01", -3.0);
    fixed_return.kind = TransactionKind::Return;
    let mut offer_return = txn("SEM REGRA", 812, 45.0, "2024-05-02", -0.03);
    offer_return.kind = TransactionKind::Return;
    let input = AuditInput {
        transactions: vec![fixed_return, offer_return],
        rejected: vec![],
    };

    let result = run(&config, &input, &index);
    assert_eq!(result.summary.fixed_correct, 1);
    assert_eq!(result.summary.offer_correct, 1);
    match &result.transactions[0].resolution {
        Resolution::Fixed { rate, .. } => assert_eq!(*rate, Rate::from_bps(-300)),
        other => panic!("expected fixed resolution, got {other:?}"),
    }
    match &result.transactions[1].resolution {
        Resolution::Offer { rate, .. } => assert_eq!(*rate, Rate::from_bps(-300)),
        other => panic!("expected offer resolution, got {other:?}"),
    }
}

#[test]
fn declared_rate_conventions_reconcile() {
    let config = catalog();
    let index = OfferIndex::from_records(vec![], &config.offers);
    // Declared as whole percent on one row, fraction on the other; both
    // audit against the 3% generic rule for CALVO.
    let input = AuditInput {
        transactions: vec![
            txn("CALVO", 10, 5.0, "2024-05-01", 3.0),
            txn("CALVO", 11, 5.0, "2024-05-01", 0.03),
            txn("CALVO", 12, 5.0, "2024-05-01", 0.01),
        ],
        rejected: vec![],
    };

    let result = run(&config, &input, &index);
    assert_eq!(result.summary.fixed_correct, 2);
    assert_eq!(result.summary.fixed_incorrect, 1);
}

#[test]
fn full_run_partitions_and_reports() {
    let config = catalog();
    let index = OfferIndex::from_records(vec![offer(812, "2024-05-01", 40.0)], &config.offers);

    let mut weight_row = txn("LOURENCINI", 1, 10.0, "2024-05-01", 0.0);
    weight_row.seller = "QUALQUER".into();
    let mut error_row = txn("GRUPO X", 2, 10.0, "2024-05-01", 0.0);
    error_row.code = -5;

    let input = AuditInput {
        transactions: vec![
            weight_row,
            txn("AKKI ATACADISTA", 3, 10.0, "2024-05-01", 0.0), // fixed correct
            txn("TENDA", 4, 10.0, "2024-05-01", 0.02),          // fixed incorrect
            txn("SEM REGRA", 812, 45.0, "2024-05-03", 0.03),    // offer correct
            txn("SEM REGRA", 812, 20.0, "2024-05-03", 0.03),    // offer incorrect (1%)
            txn("SEM REGRA", 999, 20.0, "2024-05-03", 0.03),    // unresolved
            error_row,
        ],
        rejected: vec![],
    };

    let result = run(&config, &input, &index);
    let s = &result.summary;
    assert_eq!(s.total, 7);
    assert_eq!(s.by_weight, 1);
    assert_eq!(s.fixed_correct, 1);
    assert_eq!(s.fixed_incorrect, 1);
    assert_eq!(s.offer_correct, 1);
    assert_eq!(s.offer_incorrect, 1);
    assert_eq!(s.unresolved, 1);
    assert_eq!(s.errored, 1);

    let counted: usize = s.bucket_counts.values().sum();
    assert_eq!(counted, s.total);

    assert_eq!(result.meta.catalog_name, "Month Close");
    assert!(result.meta.posterior_fallback);

    // The whole result serializes (the CLI ships it as JSON).
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"fixed_correct\""));
}
