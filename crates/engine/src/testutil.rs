//! Shared test constructors.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{OfferRecord, TierPrice, Transaction, TransactionKind};
use crate::rate::Rate;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A neutral sale that matches no catalog rule until fields are overridden.
pub fn txn() -> Transaction {
    Transaction {
        invoice: "NF-1000".into(),
        group: "GRUPO TESTE".into(),
        entity: "COMERCIO TESTE LTDA".into(),
        seller: "VENDEDOR TESTE".into(),
        code: 500,
        category: "CATEGORIA TESTE".into(),
        description: "PRODUTO TESTE".into(),
        date: date("2024-06-15"),
        unit_price: 10.0,
        declared_rate: 0.03,
        kind: TransactionKind::Sale,
        raw_fields: HashMap::new(),
    }
}

/// Two-tier offer (3% threshold, 1% fallback), the common source shape.
pub fn offer(code: i64, day: &str, threshold: f64) -> OfferRecord {
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
