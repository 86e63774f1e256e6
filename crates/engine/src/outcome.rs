use crate::model::Outcome;
use crate::rate::{Rate, RateConvention};

/// Compare the declared rate against the expected one.
///
/// Under the default `auto` convention the declared side is read by
/// magnitude (`3` and `0.03` are the same rate); an explicit convention
/// pins it to percent or fraction form. Both sides meet at basis-point
/// precision, which is the same as rounding fractions to 4 decimal places.
pub fn classify(declared_raw: f64, expected: Rate, convention: RateConvention) -> Outcome {
    if Rate::from_declared(declared_raw, convention) == expected {
        Outcome::Correct
    } else {
        Outcome::Incorrect
    }
}
