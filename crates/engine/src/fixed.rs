use crate::config::{CatalogRule, FixedRules};
use crate::model::{RuleRef, Transaction};
use crate::rate::Rate;

/// Result of fixed-rate resolution.
///
/// `Defer` and `NoMatch` both hand the transaction to offer resolution,
/// but they are distinct on purpose: `Defer` is a rule that recognized the
/// transaction and explicitly declined, `NoMatch` is silence from the whole
/// catalog. Collapsing them would let a future rule edit swallow rows.
#[derive(Debug, Clone, PartialEq)]
pub enum FixedOutcome {
    Rate { rate: Rate, rule: RuleRef },
    Defer,
    NoMatch,
}

/// Resolve the expected commission rate from the fixed rule catalog.
///
/// Evaluation order is a hard contract — first match wins, later rule
/// classes are unreachable once an earlier one matches:
///
/// 1. point overrides (invoice, code)
/// 2. global product-code overrides
/// 3. house-account sellers (rate zero)
/// 4. terminal zero-rate groups
/// 5. group/category tiering (including "all except" complements)
/// 6. explicit deferrals to offer resolution
/// 7. group catalogs, rates checked 0%, 2%, 1%, 3%
/// 8. entity catalogs
/// 9. generic group/entity rate table
///
/// The produced rate is sign-adjusted: returns carry the negated rate.
pub fn resolve_fixed_rate(txn: &Transaction, rules: &FixedRules) -> FixedOutcome {
    let hit = |rate: Rate, rule: RuleRef| FixedOutcome::Rate {
        rate: rate.signed_for(txn.kind),
        rule,
    };

    // 1. Manual corrections for known misclassifications.
    for o in &rules.point_overrides {
        if o.invoice == txn.invoice && o.code == txn.code {
            return hit(o.rate, RuleRef::PointOverride);
        }
    }

    // 2. Codes that carry one rate regardless of any other attribute.
    for o in &rules.code_overrides {
        if o.codes.contains(&txn.code) {
            return hit(o.rate, RuleRef::CodeOverride);
        }
    }

    // 3.
    if rules.house_sellers.iter().any(|s| s == &txn.seller) {
        return hit(Rate::ZERO, RuleRef::HouseAccount);
    }

    // 4.
    if rules.zero_groups.iter().any(|g| g == &txn.group) {
        return hit(Rate::ZERO, RuleRef::ZeroGroup);
    }

    // 5.
    for gc in &rules.group_categories {
        if gc.group != txn.group {
            continue;
        }
        for tier in &gc.tiers {
            let listed = tier.categories.iter().any(|c| c == &txn.category);
            if listed != tier.complement {
                return hit(tier.rate, RuleRef::GroupCategory);
            }
        }
    }

    // 6.
    for d in &rules.deferrals {
        if d.group == txn.group
            && (d.categories.is_empty() || d.categories.iter().any(|c| c == &txn.category))
        {
            return FixedOutcome::Defer;
        }
    }

    // 7. Lower rates first so discount/override conditions win over broad ones.
    for catalog in &rules.group_catalogs {
        if catalog.group != txn.group {
            continue;
        }
        for rule in ordered_rules(&catalog.rules) {
            if rule_matches(rule, txn) {
                return hit(rule.rate, RuleRef::GroupCatalog);
            }
        }
    }

    // 8.
    for catalog in &rules.entity_catalogs {
        if catalog.entity != txn.entity {
            continue;
        }
        for rule in ordered_rules(&catalog.rules) {
            if rule_matches(rule, txn) {
                return hit(rule.rate, RuleRef::EntityCatalog);
            }
        }
    }

    // 9.
    for g in &rules.generic {
        if g.groups.iter().any(|x| x == &txn.group)
            || g.entities.iter().any(|x| x == &txn.entity)
        {
            return hit(g.rate, RuleRef::Generic);
        }
    }

    FixedOutcome::NoMatch
}

/// Catalog dispatch order: 0%, 2%, 1%, 3%, then anything else in config
/// order. Stable sort keeps config order within a rate class.
fn ordered_rules(rules: &[CatalogRule]) -> Vec<&CatalogRule> {
    const ORDER: [i32; 4] = [0, 200, 100, 300];
    let mut out: Vec<&CatalogRule> = rules.iter().collect();
    out.sort_by_key(|r| {
        ORDER
            .iter()
            .position(|&bps| bps == r.rate.bps())
            .unwrap_or(ORDER.len())
    });
    out
}

fn rule_matches(rule: &CatalogRule, txn: &Transaction) -> bool {
    if !rule.codes.is_empty() && !rule.codes.contains(&txn.code) {
        return false;
    }
    if !rule.categories.is_empty() && !rule.categories.iter().any(|c| c == &txn.category) {
        return false;
    }
    true
}
