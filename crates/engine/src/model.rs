use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::rate::Rate;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Return,
}

/// A single normalized sales line from the input table.
///
/// Text keys (group, entity, seller, category, description) are trimmed and
/// uppercased by the loading layer; the engine matches them exactly.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub invoice: String,
    pub group: String,
    pub entity: String,
    pub seller: String,
    pub code: i64,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub unit_price: f64,
    /// Declared commission rate as it appeared in the source, convention
    /// unknown (whole percent or fraction). Normalized at comparison time.
    pub declared_rate: f64,
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub raw_fields: HashMap<String, String>,
}

/// One tier of a promotional offer. Ordered high-to-low rate within a
/// record; the last tier carries no threshold and acts as the fallback.
#[derive(Debug, Clone, Serialize)]
pub struct TierPrice {
    pub rate: Rate,
    pub price: Option<f64>,
}

/// A historical promotional price point for one product on one date.
#[derive(Debug, Clone, Serialize)]
pub struct OfferRecord {
    pub code: i64,
    pub date: NaiveDate,
    pub source: String,
    pub tiers: Vec<TierPrice>,
}

/// Pre-loaded batch input. `rejected` rows failed parsing in the loading
/// layer; they are folded into the error log so the run still partitions
/// every input row.
#[derive(Debug, Default)]
pub struct AuditInput {
    pub transactions: Vec<Transaction>,
    pub rejected: Vec<ErrorEntry>,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// How close the selected offer's reference date was to the sale date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    Exact,
    NearestPrior,
    NearestPosterior,
}

impl std::fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::NearestPrior => write!(f, "nearest_prior"),
            Self::NearestPosterior => write!(f, "nearest_posterior"),
        }
    }
}

/// Which fixed rule class produced the expected rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRef {
    PointOverride,
    CodeOverride,
    HouseAccount,
    ZeroGroup,
    GroupCategory,
    GroupCatalog,
    EntityCatalog,
    Generic,
}

impl std::fmt::Display for RuleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PointOverride => write!(f, "point_override"),
            Self::CodeOverride => write!(f, "code_override"),
            Self::HouseAccount => write!(f, "house_account"),
            Self::ZeroGroup => write!(f, "zero_group"),
            Self::GroupCategory => write!(f, "group_category"),
            Self::GroupCatalog => write!(f, "group_catalog"),
            Self::EntityCatalog => write!(f, "entity_catalog"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// The resolution path for one transaction.
///
/// `deferred` distinguishes "a fixed rule explicitly handed this off to
/// offer resolution" from "no fixed rule applied at all" — collapsing the
/// two was a standing source of swallowed rows.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum Resolution {
    Weight,
    Fixed {
        rate: Rate,
        rule: RuleRef,
    },
    Offer {
        rate: Rate,
        tier_rate: Rate,
        offer_date: NaiveDate,
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
        comparison_price: f64,
        source: String,
        quality: MatchQuality,
        deferred: bool,
    },
    Unresolved {
        deferred: bool,
    },
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditBucket {
    ByWeight,
    FixedCorrect,
    FixedIncorrect,
    OfferCorrect,
    OfferIncorrect,
    Unresolved,
    Errored,
}

impl std::fmt::Display for AuditBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByWeight => write!(f, "by_weight"),
            Self::FixedCorrect => write!(f, "fixed_correct"),
            Self::FixedIncorrect => write!(f, "fixed_incorrect"),
            Self::OfferCorrect => write!(f, "offer_correct"),
            Self::OfferIncorrect => write!(f, "offer_incorrect"),
            Self::Unresolved => write!(f, "unresolved"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedTransaction {
    pub transaction: Transaction,
    pub bucket: AuditBucket,
    pub resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

/// One entry in the per-run error log: the transaction's identifying
/// fields as they appeared in the source, plus the cause.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub invoice: String,
    pub group: String,
    pub entity: String,
    pub code: String,
    pub date: String,
    pub message: String,
}

impl ErrorEntry {
    pub fn for_transaction(txn: &Transaction, message: impl Into<String>) -> Self {
        Self {
            invoice: txn.invoice.clone(),
            group: txn.group.clone(),
            entity: txn.entity.clone(),
            code: txn.code.to_string(),
            date: txn.date.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    pub by_weight: usize,
    pub fixed_correct: usize,
    pub fixed_incorrect: usize,
    pub offer_correct: usize,
    pub offer_incorrect: usize,
    pub unresolved: usize,
    pub errored: usize,
    pub bucket_counts: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditMeta {
    pub catalog_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub posterior_fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub meta: AuditMeta,
    pub summary: AuditSummary,
    pub transactions: Vec<ClassifiedTransaction>,
    pub errors: Vec<ErrorEntry>,
    pub warnings: Vec<String>,
}
