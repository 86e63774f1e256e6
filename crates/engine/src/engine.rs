use crate::config::AuditConfig;
use crate::fixed::{self, FixedOutcome};
use crate::model::{
    AuditBucket, AuditInput, AuditMeta, AuditResult, ClassifiedTransaction, ErrorEntry, Outcome,
    Resolution, Transaction,
};
use crate::offers::{self, OfferIndex};
use crate::outcome;
use crate::summary::compute_summary;
use crate::weight;

/// Classify one transaction: weight → fixed rules → offers → outcome.
///
/// Pure: reads only the immutable catalog and offer index. Per-transaction
/// faults come back as `Err(ErrorEntry)` with the row's identifying fields;
/// they never abort the batch.
pub fn classify_transaction(
    txn: &Transaction,
    config: &AuditConfig,
    offers: &OfferIndex,
) -> Result<ClassifiedTransaction, ErrorEntry> {
    let convention = config
        .inputs
        .as_ref()
        .map(|i| i.transactions.rate_convention)
        .unwrap_or_default();

    // Weight-based billing is terminal: no expected rate exists, so no
    // comparison is attempted.
    if weight::is_weight_based(txn, &config.weight) {
        return Ok(ClassifiedTransaction {
            transaction: txn.clone(),
            bucket: AuditBucket::ByWeight,
            resolution: Resolution::Weight,
            outcome: None,
        });
    }

    let deferred = match fixed::resolve_fixed_rate(txn, &config.fixed) {
        FixedOutcome::Rate { rate, rule } => {
            let outcome = outcome::classify(txn.declared_rate, rate, convention);
            let bucket = match outcome {
                Outcome::Correct => AuditBucket::FixedCorrect,
                Outcome::Incorrect => AuditBucket::FixedIncorrect,
            };
            return Ok(ClassifiedTransaction {
                transaction: txn.clone(),
                bucket,
                resolution: Resolution::Fixed { rate, rule },
                outcome: Some(outcome),
            });
        }
        FixedOutcome::Defer => true,
        FixedOutcome::NoMatch => false,
    };

    // Offer resolution needs a usable code and price.
    if txn.code <= 0 {
        return Err(ErrorEntry::for_transaction(txn, "non-positive product code"));
    }
    if !txn.unit_price.is_finite() {
        return Err(ErrorEntry::for_transaction(txn, "non-numeric sale price"));
    }

    let Some(m) = offers.resolve(txn.code, txn.date, config.offers.posterior_fallback) else {
        return Ok(ClassifiedTransaction {
            transaction: txn.clone(),
            bucket: AuditBucket::Unresolved,
            resolution: Resolution::Unresolved { deferred },
            outcome: None,
        });
    };

    let comparison_price = offers::comparison_price(txn, &config.offers);
    let Some(tier) = offers::classify_tiers(m.offer, comparison_price) else {
        // An offer with no tiers at all cannot produce a rate.
        return Ok(ClassifiedTransaction {
            transaction: txn.clone(),
            bucket: AuditBucket::Unresolved,
            resolution: Resolution::Unresolved { deferred },
            outcome: None,
        });
    };

    let rate = tier.rate.signed_for(txn.kind);
    let outcome = outcome::classify(txn.declared_rate, rate, convention);
    let bucket = match outcome {
        Outcome::Correct => AuditBucket::OfferCorrect,
        Outcome::Incorrect => AuditBucket::OfferIncorrect,
    };

    Ok(ClassifiedTransaction {
        transaction: txn.clone(),
        bucket,
        resolution: Resolution::Offer {
            rate,
            tier_rate: tier.rate,
            offer_date: m.offer.date,
            threshold: tier.threshold,
            comparison_price,
            source: m.source.to_string(),
            quality: m.quality,
            deferred,
        },
        outcome: Some(outcome),
    })
}

/// Run the audit over a full batch. Every input row lands in exactly one
/// bucket; rows rejected by the loading layer join the error log.
pub fn run(config: &AuditConfig, input: &AuditInput, offers: &OfferIndex) -> AuditResult {
    let mut transactions = Vec::with_capacity(input.transactions.len());
    let mut errors: Vec<ErrorEntry> = input.rejected.clone();

    for txn in &input.transactions {
        match classify_transaction(txn, config, offers) {
            Ok(classified) => transactions.push(classified),
            Err(entry) => errors.push(entry),
        }
    }

    let summary = compute_summary(&transactions, errors.len());

    AuditResult {
        meta: AuditMeta {
            catalog_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            posterior_fallback: config.offers.posterior_fallback,
        },
        summary,
        transactions,
        errors,
        warnings: offers.warnings().to_vec(),
    }
}
