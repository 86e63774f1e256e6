//! `comaudit-engine` — Commission audit engine.
//!
//! Pure engine crate: receives pre-loaded transactions and offer records,
//! returns classified results. No CLI or IO dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod model;
pub mod offers;
pub mod outcome;
pub mod rate;
pub mod summary;
pub mod weight;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::AuditConfig;
pub use engine::run;
pub use error::AuditError;
pub use model::{AuditInput, AuditResult, OfferRecord, Transaction};
pub use offers::OfferIndex;
pub use rate::{Rate, RateConvention};
