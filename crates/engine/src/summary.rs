use std::collections::HashMap;

use crate::model::{AuditBucket, AuditSummary, ClassifiedTransaction};

/// Compute summary statistics from classified transactions plus the error
/// log length. The sum over buckets always equals the input row count.
pub fn compute_summary(transactions: &[ClassifiedTransaction], errored: usize) -> AuditSummary {
    let mut bucket_counts: HashMap<String, usize> = HashMap::new();
    let mut by_weight = 0;
    let mut fixed_correct = 0;
    let mut fixed_incorrect = 0;
    let mut offer_correct = 0;
    let mut offer_incorrect = 0;
    let mut unresolved = 0;

    for t in transactions {
        *bucket_counts.entry(t.bucket.to_string()).or_insert(0) += 1;

        match t.bucket {
            AuditBucket::ByWeight => by_weight += 1,
            AuditBucket::FixedCorrect => fixed_correct += 1,
            AuditBucket::FixedIncorrect => fixed_incorrect += 1,
            AuditBucket::OfferCorrect => offer_correct += 1,
            AuditBucket::OfferIncorrect => offer_incorrect += 1,
            AuditBucket::Unresolved => unresolved += 1,
            AuditBucket::Errored => {}
        }
    }

    if errored > 0 {
        *bucket_counts
            .entry(AuditBucket::Errored.to_string())
            .or_insert(0) += errored;
    }

    AuditSummary {
        total: transactions.len() + errored,
        by_weight,
        fixed_correct,
        fixed_incorrect,
        offer_correct,
        offer_incorrect,
        unresolved,
        errored,
        bucket_counts,
    }
}
