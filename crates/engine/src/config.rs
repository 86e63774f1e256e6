use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::error::AuditError;
use crate::rate::{Rate, RateConvention};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// The full audit configuration: the versioned rule catalog, offer-source
/// declarations, and the input/output mappings consumed by the IO layer.
/// The engine itself only reads `weight`, `fixed`, and `offers`.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    pub name: String,
    #[serde(default)]
    pub weight: WeightRules,
    #[serde(default)]
    pub fixed: FixedRules,
    #[serde(default)]
    pub offers: OfferPolicy,
    #[serde(default)]
    pub inputs: Option<InputsConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Weight-basis rules
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct WeightRules {
    /// Company-groups billed by weight for every seller.
    #[serde(default)]
    pub global_groups: Vec<String>,
    #[serde(default)]
    pub sellers: Vec<SellerWeightRule>,
}

#[derive(Debug, Deserialize)]
pub struct SellerWeightRule {
    pub seller: String,
    #[serde(default)]
    pub group_codes: Vec<GroupCodes>,
    #[serde(default)]
    pub entity_codes: Vec<EntityCodes>,
}

/// `codes = []` means every product of that group.
#[derive(Debug, Deserialize)]
pub struct GroupCodes {
    pub group: String,
    #[serde(default)]
    pub codes: Vec<i64>,
}

/// When `description_term` is present the rule matches on the free-text
/// description instead of the code set.
#[derive(Debug, Deserialize)]
pub struct EntityCodes {
    pub entity: String,
    #[serde(default)]
    pub codes: Vec<i64>,
    #[serde(default)]
    pub description_term: Option<String>,
}

// ---------------------------------------------------------------------------
// Fixed-rate rules
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct FixedRules {
    /// Manual corrections keyed by (invoice, product code). Highest priority.
    #[serde(default)]
    pub point_overrides: Vec<PointOverride>,
    /// Product codes that carry one rate regardless of any other attribute.
    #[serde(default)]
    pub code_overrides: Vec<CodeOverride>,
    /// Reserved seller identities, always rate zero.
    #[serde(default)]
    pub house_sellers: Vec<String>,
    /// Company-groups terminally at rate zero.
    #[serde(default)]
    pub zero_groups: Vec<String>,
    #[serde(default)]
    pub group_categories: Vec<GroupCategoryRule>,
    /// Groups excluded from fixed resolution for listed categories; these
    /// fall through to offer resolution explicitly.
    #[serde(default)]
    pub deferrals: Vec<DeferRule>,
    #[serde(default)]
    pub group_catalogs: Vec<GroupCatalog>,
    #[serde(default)]
    pub entity_catalogs: Vec<EntityCatalog>,
    /// Flat rate table by group/entity membership, product-independent.
    #[serde(default)]
    pub generic: Vec<GenericRule>,
}

#[derive(Debug, Deserialize)]
pub struct PointOverride {
    pub invoice: String,
    pub code: i64,
    #[serde(deserialize_with = "de_percent_rate")]
    pub rate: Rate,
}

#[derive(Debug, Deserialize)]
pub struct CodeOverride {
    #[serde(deserialize_with = "de_percent_rate")]
    pub rate: Rate,
    pub codes: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GroupCategoryRule {
    pub group: String,
    #[serde(default)]
    pub tiers: Vec<CategoryTier>,
}

/// `complement = true` inverts the category test ("all except listed").
/// A complement tier with an empty list matches every category, which is
/// how a group-wide default rate is written.
#[derive(Debug, Deserialize)]
pub struct CategoryTier {
    #[serde(deserialize_with = "de_percent_rate")]
    pub rate: Rate,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub complement: bool,
}

/// `categories = []` defers the whole group.
#[derive(Debug, Deserialize)]
pub struct DeferRule {
    pub group: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupCatalog {
    pub group: String,
    pub rules: Vec<CatalogRule>,
}

#[derive(Debug, Deserialize)]
pub struct EntityCatalog {
    pub entity: String,
    pub rules: Vec<CatalogRule>,
}

/// A condition may test code membership, category membership, or both;
/// when both are present both must hold. Neither is a validation error.
#[derive(Debug, Deserialize)]
pub struct CatalogRule {
    #[serde(deserialize_with = "de_percent_rate")]
    pub rate: Rate,
    #[serde(default)]
    pub codes: Vec<i64>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenericRule {
    #[serde(deserialize_with = "de_percent_rate")]
    pub rate: Rate,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
}

// ---------------------------------------------------------------------------
// Offer policy
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct OfferPolicy {
    /// Match into the future (earliest offer after the sale date) when no
    /// prior offer exists. Off = the legacy generation's behavior (no
    /// match at all). This is a generation toggle, not an implementation
    /// knob, so it lives in config.
    #[serde(default)]
    pub posterior_fallback: bool,
    #[serde(default)]
    pub discount_groups: Vec<DiscountGroup>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Sale prices of these groups are discounted before tier comparison.
#[derive(Debug, Deserialize)]
pub struct DiscountGroup {
    pub group: String,
    /// Empty = every category of the group.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_discount_factor")]
    pub factor: f64,
}

fn default_discount_factor() -> f64 {
    0.95
}

/// One ranked offer source. Lower `rank` is checked first. `file`, `sheet`
/// and `columns` are consumed by the IO layer.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub columns: OfferColumns,
    /// High-to-low rate order. Every tier except the last names the column
    /// holding its threshold price; the last tier is the unconditional
    /// fallback.
    pub tiers: Vec<TierConfig>,
}

#[derive(Debug, Deserialize)]
pub struct OfferColumns {
    pub code: String,
    pub date: String,
}

impl Default for OfferColumns {
    fn default() -> Self {
        Self {
            code: "code".into(),
            date: "date".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TierConfig {
    #[serde(deserialize_with = "de_percent_rate")]
    pub rate: Rate,
    #[serde(default)]
    pub column: Option<String>,
}

// ---------------------------------------------------------------------------
// Inputs + Output (IO layer contract)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InputsConfig {
    pub transactions: TransactionInput,
}

#[derive(Debug, Deserialize)]
pub struct TransactionInput {
    pub file: String,
    #[serde(default)]
    pub sheet: Option<String>,
    /// 0-based row of the header line inside the sheet.
    #[serde(default)]
    pub header_row: usize,
    pub columns: TransactionColumns,
    /// Transaction-type values starting with this prefix are returns.
    #[serde(default = "default_return_prefix")]
    pub return_prefix: String,
    /// How the declared-rate column is written: `auto`, `percent` or `fraction`.
    #[serde(default)]
    pub rate_convention: RateConvention,
}

fn default_return_prefix() -> String {
    "DEV".into()
}

#[derive(Debug, Deserialize)]
pub struct TransactionColumns {
    pub invoice: String,
    pub group: String,
    pub entity: String,
    pub seller: String,
    pub code: String,
    pub category: String,
    pub description: String,
    pub date: String,
    pub unit_price: String,
    pub declared_rate: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub workbook: Option<String>,
}

// ---------------------------------------------------------------------------
// Percent-rate deserialization
// ---------------------------------------------------------------------------

/// Catalog rates are written in percent (`rate = 3` means 3%). Accepts
/// integers and floats so `3` and `0.5` both work in TOML.
fn de_percent_rate<'de, D>(d: D) -> Result<Rate, D::Error>
where
    D: Deserializer<'de>,
{
    struct PercentVisitor;

    impl Visitor<'_> for PercentVisitor {
        type Value = Rate;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a commission rate in percent")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Rate, E> {
            Ok(Rate::from_percent(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Rate, E> {
            Ok(Rate::from_percent(v as f64))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Rate, E> {
            Ok(Rate::from_percent(v))
        }
    }

    d.deserialize_any(PercentVisitor)
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AuditConfig {
    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let config: AuditConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        // A point override that applies two rates to the same (invoice, code)
        // would break the one-rate-per-input invariant.
        for (i, a) in self.fixed.point_overrides.iter().enumerate() {
            for b in &self.fixed.point_overrides[i + 1..] {
                if a.invoice == b.invoice && a.code == b.code && a.rate != b.rate {
                    return Err(AuditError::ConfigValidation(format!(
                        "conflicting point overrides for invoice '{}' code {}",
                        a.invoice, a.code
                    )));
                }
            }
        }

        for catalog in &self.fixed.group_catalogs {
            validate_catalog_rules("group", &catalog.group, &catalog.rules)?;
        }
        for catalog in &self.fixed.entity_catalogs {
            validate_catalog_rules("entity", &catalog.entity, &catalog.rules)?;
        }

        for g in &self.fixed.generic {
            if g.groups.is_empty() && g.entities.is_empty() {
                return Err(AuditError::ConfigValidation(format!(
                    "generic rule at {} lists no groups and no entities",
                    g.rate
                )));
            }
        }

        for d in &self.offers.discount_groups {
            if !(d.factor > 0.0 && d.factor <= 1.0) {
                return Err(AuditError::ConfigValidation(format!(
                    "discount factor for group '{}' must be in (0, 1], got {}",
                    d.group, d.factor
                )));
            }
        }

        let mut seen_sources: Vec<&str> = Vec::new();
        for source in &self.offers.sources {
            if seen_sources.contains(&source.name.as_str()) {
                return Err(AuditError::ConfigValidation(format!(
                    "duplicate offer source '{}'",
                    source.name
                )));
            }
            seen_sources.push(&source.name);

            if source.tiers.is_empty() {
                return Err(AuditError::ConfigValidation(format!(
                    "offer source '{}' declares no tiers",
                    source.name
                )));
            }
            // Strictly decreasing rates, dispatch is highest tier first.
            for pair in source.tiers.windows(2) {
                if pair[0].rate <= pair[1].rate {
                    return Err(AuditError::ConfigValidation(format!(
                        "offer source '{}': tiers must be in strictly decreasing rate order",
                        source.name
                    )));
                }
            }
            // Every tier except the last needs a threshold column.
            let threshold_count = source.tiers.len() - 1;
            for tier in &source.tiers[..threshold_count] {
                if tier.column.is_none() {
                    return Err(AuditError::ConfigValidation(format!(
                        "offer source '{}': tier {} has no threshold column",
                        source.name, tier.rate
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_catalog_rules(
    kind: &str,
    name: &str,
    rules: &[CatalogRule],
) -> Result<(), AuditError> {
    for rule in rules {
        if rule.codes.is_empty() && rule.categories.is_empty() {
            return Err(AuditError::ConfigValidation(format!(
                "{kind} catalog '{name}': rule at {} tests neither codes nor categories",
                rule.rate
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CATALOG: &str = r#"
name = "August Close"

[weight]
global_groups = ["LOURENCINI"]

[[weight.sellers]]
seller = "VERA LUCIA MUNIZ"
[[weight.sellers.group_codes]]
group = "MOTA NOVO"
codes = [812]
[[weight.sellers.entity_codes]]
entity = "SUPERMERCADO FEDERZONI LTDA"
codes = [812]

[fixed]
house_sellers = ["CASA"]
zero_groups = ["AKKI ATACADISTA", "BERGAMINI"]

[[fixed.point_overrides]]
invoice = "NF-901"
code = 812
rate = 1

[[fixed.group_catalogs]]
group = "ROSSI"
[[fixed.group_catalogs.rules]]
rate = 3
codes = [1288, 1289]
[[fixed.group_catalogs.rules]]
rate = 0
categories = ["EMBUTIDOS"]

[[fixed.generic]]
rate = 3
groups = ["CALVO", "TENDA"]

[offers]
posterior_fallback = true

[[offers.discount_groups]]
group = "CALVO"

[[offers.sources]]
name = "vog"
rank = 1
[offers.sources.columns]
code = "COD"
date = "Data"
[[offers.sources.tiers]]
rate = 3
column = "3%"
[[offers.sources.tiers]]
rate = 1
"#;

    #[test]
    fn parse_valid_catalog() {
        let config = AuditConfig::from_toml(VALID_CATALOG).unwrap();
        assert_eq!(config.name, "August Close");
        assert_eq!(config.weight.global_groups, vec!["LOURENCINI"]);
        assert_eq!(config.fixed.zero_groups.len(), 2);
        assert_eq!(config.fixed.point_overrides[0].rate, Rate::from_bps(100));
        assert!(config.offers.posterior_fallback);
        let source = &config.offers.sources[0];
        assert_eq!(source.tiers[0].rate, Rate::from_bps(300));
        assert_eq!(source.tiers[1].column, None);
        assert_eq!(config.offers.discount_groups[0].factor, 0.95);
    }

    #[test]
    fn rates_accept_integer_and_float_percent() {
        let toml = r#"
name = "t"
[[fixed.generic]]
rate = 0.5
groups = ["X"]
"#;
        let config = AuditConfig::from_toml(toml).unwrap();
        assert_eq!(config.fixed.generic[0].rate, Rate::from_bps(50));
    }

    #[test]
    fn rate_convention_parses_and_defaults_to_auto() {
        let toml = r#"
name = "t"
[inputs.transactions]
file = "vendas.csv"
rate_convention = "percent"
[inputs.transactions.columns]
invoice = "NF"
group = "Rede"
entity = "Cliente"
seller = "Vendedor"
code = "Codigo"
category = "Categoria"
description = "Descricao"
date = "Data"
kind = "Tipo"
unit_price = "Preco"
declared_rate = "Comissao"
"#;
        let config = AuditConfig::from_toml(toml).unwrap();
        let inputs = config.inputs.unwrap();
        assert_eq!(inputs.transactions.rate_convention, RateConvention::Percent);

        let config = AuditConfig::from_toml(VALID_CATALOG).unwrap();
        assert!(config.inputs.is_none());
        assert_eq!(RateConvention::default(), RateConvention::Auto);
    }

    #[test]
    fn reject_conflicting_point_overrides() {
        let toml = r#"
name = "t"
[[fixed.point_overrides]]
invoice = "NF-1"
code = 812
rate = 1
[[fixed.point_overrides]]
invoice = "NF-1"
code = 812
rate = 2
"#;
        let err = AuditConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("conflicting point overrides"));
    }

    #[test]
    fn reject_empty_catalog_rule() {
        let toml = r#"
name = "t"
[[fixed.group_catalogs]]
group = "ROSSI"
[[fixed.group_catalogs.rules]]
rate = 2
"#;
        let err = AuditConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("neither codes nor categories"));
    }

    #[test]
    fn reject_unordered_tiers() {
        let toml = r#"
name = "t"
[[offers.sources]]
name = "vog"
[[offers.sources.tiers]]
rate = 1
column = "1%"
[[offers.sources.tiers]]
rate = 3
"#;
        let err = AuditConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("strictly decreasing"));
    }

    #[test]
    fn reject_threshold_tier_without_column() {
        let toml = r#"
name = "t"
[[offers.sources]]
name = "vog"
[[offers.sources.tiers]]
rate = 3
[[offers.sources.tiers]]
rate = 1
"#;
        let err = AuditConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("no threshold column"));
    }

    #[test]
    fn reject_bad_discount_factor() {
        let toml = r#"
name = "t"
[[offers.discount_groups]]
group = "CALVO"
factor = 1.5
"#;
        let err = AuditConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("discount factor"));
    }

    #[test]
    fn duplicate_point_override_same_rate_is_allowed() {
        let toml = r#"
name = "t"
[[fixed.point_overrides]]
invoice = "NF-1"
code = 812
rate = 1
[[fixed.point_overrides]]
invoice = "NF-1"
code = 812
rate = 1
"#;
        assert!(AuditConfig::from_toml(toml).is_ok());
    }
}
