use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TransactionKind;

/// How declared rates in the source table are written.
///
/// `auto` decides per value by magnitude; the explicit conventions exist
/// for sources known to use one form throughout, where a whole-percent
/// `0.5` (0.5%) would otherwise be read as a fraction (50%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateConvention {
    #[default]
    Auto,
    /// Always whole percent (`0.5` = 0.5%).
    Percent,
    /// Always fraction of one (`0.005` = 0.5%).
    Fraction,
}

/// A signed commission rate in basis points (1 bp = 0.01%).
///
/// Spreadsheet-sourced rates arrive in two conventions: whole percent
/// (`3` = 3%) and fraction of one (`0.03` = 3%). Everything past the input
/// boundary is basis points, so "compare after rounding the fraction to
/// 4 decimal places" is plain integer equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Rate(i32);

impl Rate {
    pub const ZERO: Rate = Rate(0);

    pub fn from_bps(bps: i32) -> Self {
        Rate(bps)
    }

    /// `3.0` → 3% → 300 bps.
    pub fn from_percent(pct: f64) -> Self {
        Rate((pct * 100.0).round() as i32)
    }

    /// `0.03` → 3% → 300 bps.
    pub fn from_fraction(frac: f64) -> Self {
        Rate((frac * 10_000.0).round() as i32)
    }

    /// Normalize a declared rate of unknown convention.
    ///
    /// Commission rates sit far below 100%, so any magnitude of 1.0 or
    /// more is the whole-percent convention; below that it is a fraction.
    pub fn normalize(raw: f64) -> Self {
        if raw.abs() >= 1.0 {
            Self::from_percent(raw)
        } else {
            Self::from_fraction(raw)
        }
    }

    /// Read a declared rate under the configured convention.
    pub fn from_declared(raw: f64, convention: RateConvention) -> Self {
        match convention {
            RateConvention::Auto => Self::normalize(raw),
            RateConvention::Percent => Self::from_percent(raw),
            RateConvention::Fraction => Self::from_fraction(raw),
        }
    }

    pub fn bps(self) -> i32 {
        self.0
    }

    pub fn as_fraction(self) -> f64 {
        f64::from(self.0) / 10_000.0
    }

    pub fn as_percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    pub fn negated(self) -> Self {
        Rate(-self.0)
    }

    /// Sign-adjust for the transaction kind: returns carry the negated rate.
    pub fn signed_for(self, kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Sale => self,
            TransactionKind::Return => self.negated(),
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_both_conventions() {
        assert_eq!(Rate::normalize(3.0), Rate::from_bps(300));
        assert_eq!(Rate::normalize(0.03), Rate::from_bps(300));
        assert_eq!(Rate::normalize(-3.0), Rate::from_bps(-300));
        assert_eq!(Rate::normalize(-0.03), Rate::from_bps(-300));
        assert_eq!(Rate::normalize(0.005), Rate::from_bps(50));
        assert_eq!(Rate::normalize(0.0), Rate::ZERO);
    }

    #[test]
    fn explicit_conventions_skip_the_magnitude_heuristic() {
        // Under auto, 0.5 reads as a 50% fraction; a percent-convention
        // source means 0.5%.
        assert_eq!(Rate::normalize(0.5), Rate::from_bps(5000));
        assert_eq!(
            Rate::from_declared(0.5, RateConvention::Percent),
            Rate::from_bps(50)
        );
        assert_eq!(
            Rate::from_declared(3.0, RateConvention::Fraction),
            Rate::from_bps(30_000)
        );
        assert_eq!(
            Rate::from_declared(0.03, RateConvention::Auto),
            Rate::from_bps(300)
        );
    }

    #[test]
    fn fraction_rounding_absorbs_float_noise() {
        // 0.03 is not exactly representable; rounding to bps must still land on 300
        assert_eq!(Rate::from_fraction(0.1 + 0.2 - 0.27), Rate::from_bps(300));
        assert_eq!(Rate::from_fraction(0.029999999999), Rate::from_bps(300));
    }

    #[test]
    fn sign_adjustment_is_an_involution() {
        let r = Rate::from_percent(3.0);
        assert_eq!(r.signed_for(TransactionKind::Return), Rate::from_bps(-300));
        assert_eq!(
            r.signed_for(TransactionKind::Return)
                .signed_for(TransactionKind::Return),
            r
        );
        assert_eq!(r.signed_for(TransactionKind::Sale), r);
    }

    #[test]
    fn display_is_percent() {
        assert_eq!(Rate::from_bps(300).to_string(), "3%");
        assert_eq!(Rate::from_bps(50).to_string(), "0.5%");
        assert_eq!(Rate::from_bps(-100).to_string(), "-1%");
    }
}
