use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config::OfferPolicy;
use crate::model::{MatchQuality, OfferRecord, Transaction};
use crate::rate::Rate;

/// The offer selected for a transaction, before tier classification.
#[derive(Debug, Clone, Copy)]
pub struct OfferMatch<'a> {
    pub offer: &'a OfferRecord,
    pub source: &'a str,
    pub quality: MatchQuality,
}

/// The tier a comparison price landed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierMatch {
    pub rate: Rate,
    /// The threshold price that admitted this tier; None for the fallback.
    pub threshold: Option<f64>,
}

struct SourceIndex {
    name: String,
    by_code: HashMap<i64, Vec<OfferRecord>>,
}

/// Offer records grouped by product code per ranked source, sorted by date
/// at build time. Selection therefore never depends on input order.
pub struct OfferIndex {
    sources: Vec<SourceIndex>,
    warnings: Vec<String>,
}

impl OfferIndex {
    /// Build the index from loaded records.
    ///
    /// Sources are ordered by their configured rank (config order breaks
    /// rank ties); records naming an undeclared source are dropped with a
    /// warning. Duplicate dates for one product within a source are a
    /// data-quality defect: the first record in deterministic sort order is
    /// kept and the rest are dropped, with a warning — never a silent pick.
    pub fn from_records(records: Vec<OfferRecord>, policy: &OfferPolicy) -> Self {
        let mut warnings = Vec::new();

        let mut source_order: Vec<&str> = policy.sources.iter().map(|s| s.name.as_str()).collect();
        source_order.sort_by_key(|name| {
            policy
                .sources
                .iter()
                .position(|s| s.name == *name)
                .map(|i| (policy.sources[i].rank, i))
        });

        let mut by_source: HashMap<&str, Vec<OfferRecord>> = HashMap::new();
        for record in records {
            match source_order.iter().copied().find(|n| *n == record.source) {
                Some(name) => by_source.entry(name).or_default().push(record),
                None => warnings.push(format!(
                    "offer for product {} references undeclared source '{}'; dropped",
                    record.code, record.source
                )),
            }
        }

        let mut sources = Vec::with_capacity(source_order.len());
        for name in source_order {
            let mut by_code: HashMap<i64, Vec<OfferRecord>> = HashMap::new();
            for record in by_source.remove(name).unwrap_or_default() {
                if record
                    .tiers
                    .last()
                    .is_some_and(|fallback| fallback.price.is_some())
                {
                    warnings.push(format!(
                        "source '{name}': product {} on {} carries a price on the fallback tier; \
                         treated as threshold-free fallback",
                        record.code, record.date
                    ));
                }
                by_code.entry(record.code).or_default().push(record);
            }

            for (code, records) in by_code.iter_mut() {
                records.sort_by(|a, b| {
                    a.date
                        .cmp(&b.date)
                        .then_with(|| first_threshold(a).total_cmp(&first_threshold(b)))
                });
                let before = records.len();
                records.dedup_by(|a, b| a.date == b.date);
                if records.len() < before {
                    warnings.push(format!(
                        "source '{name}': {} duplicate offer date(s) for product {code}; \
                         kept first in sort order",
                        before - records.len()
                    ));
                }
            }

            sources.push(SourceIndex {
                name: name.to_string(),
                by_code,
            });
        }

        Self { sources, warnings }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether any source carries at least one offer for this product code.
    ///
    /// A row can stay unresolved even though its code is indexed — every
    /// offer posterior to the sale date with the fallback off, for example.
    /// Those cases deserve a different report than a code with no offers
    /// anywhere.
    pub fn knows_code(&self, code: i64) -> bool {
        self.sources.iter().any(|s| s.by_code.contains_key(&code))
    }

    /// Nearest-date resolution across ranked sources.
    ///
    /// Per source: exact date, else latest date strictly before, else —
    /// only when `posterior_fallback` — earliest date strictly after. A
    /// source with nothing selectable for the code yields to the next one.
    pub fn resolve(
        &self,
        code: i64,
        date: NaiveDate,
        posterior_fallback: bool,
    ) -> Option<OfferMatch<'_>> {
        for source in &self.sources {
            let Some(records) = source.by_code.get(&code) else {
                continue;
            };

            if let Some(offer) = records.iter().find(|r| r.date == date) {
                return Some(OfferMatch {
                    offer,
                    source: &source.name,
                    quality: MatchQuality::Exact,
                });
            }
            // Sorted ascending, so the last record before the date is the
            // latest prior one.
            if let Some(offer) = records.iter().rev().find(|r| r.date < date) {
                return Some(OfferMatch {
                    offer,
                    source: &source.name,
                    quality: MatchQuality::NearestPrior,
                });
            }
            if posterior_fallback {
                if let Some(offer) = records.iter().find(|r| r.date > date) {
                    return Some(OfferMatch {
                        offer,
                        source: &source.name,
                        quality: MatchQuality::NearestPosterior,
                    });
                }
            }
        }
        None
    }
}

fn first_threshold(record: &OfferRecord) -> f64 {
    record
        .tiers
        .iter()
        .find_map(|t| t.price)
        .unwrap_or(f64::INFINITY)
}

/// The price compared against tier thresholds: the raw sale price, or the
/// discounted price (rounded to 2 decimals) for discount-adjusted groups.
pub fn comparison_price(txn: &Transaction, policy: &OfferPolicy) -> f64 {
    for d in &policy.discount_groups {
        if d.group == txn.group
            && (d.categories.is_empty() || d.categories.iter().any(|c| c == &txn.category))
        {
            return round2(txn.unit_price * d.factor);
        }
    }
    txn.unit_price
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Classify a comparison price against an offer's tiers, highest rate
/// first. A tier whose price is missing, non-positive, or non-finite is
/// absent, not zero. The last tier is the unconditional fallback.
pub fn classify_tiers(offer: &OfferRecord, comparison_price: f64) -> Option<TierMatch> {
    let (thresholds, fallback) = offer.tiers.split_at(offer.tiers.len().checked_sub(1)?);
    for tier in thresholds {
        match tier.price {
            Some(p) if p.is_finite() && p > 0.0 => {
                if comparison_price >= p {
                    return Some(TierMatch {
                        rate: tier.rate,
                        threshold: Some(p),
                    });
                }
            }
            _ => {} // absent tier
        }
    }
    Some(TierMatch {
        rate: fallback[0].rate,
        threshold: None,
    })
}
