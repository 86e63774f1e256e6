use crate::config::WeightRules;
use crate::model::Transaction;

/// Whether a transaction is billed by weight rather than by percentage
/// commission. Terminal: weight-based transactions are excluded from all
/// rate computation and reported in their own bucket.
///
/// Order: the global group rule first (applies to every seller), then the
/// seller-scoped rules. First match wins.
pub fn is_weight_based(txn: &Transaction, rules: &WeightRules) -> bool {
    if rules.global_groups.iter().any(|g| g == &txn.group) {
        return true;
    }

    for seller in &rules.sellers {
        if seller.seller != txn.seller {
            continue;
        }
        for gc in &seller.group_codes {
            if gc.group == txn.group && (gc.codes.is_empty() || gc.codes.contains(&txn.code)) {
                return true;
            }
        }
        for ec in &seller.entity_codes {
            if ec.entity != txn.entity {
                continue;
            }
            match &ec.description_term {
                Some(term) => {
                    if txn.description.contains(term.as_str()) {
                        return true;
                    }
                }
                None => {
                    if ec.codes.contains(&txn.code) {
                        return true;
                    }
                }
            }
        }
    }

    false
}
