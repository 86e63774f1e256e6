//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — month-close scripts gate on
//! them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success, every audited commission correct            |
//! | 1    | General error (unspecified)                          |
//! | 2    | CLI usage error (bad args, bad output path)          |
//! | 3    | Invalid audit config (parse or validation failure)   |
//! | 4    | Runtime failure (unreadable input, write failure)    |
//! | 5    | Incorrect commissions found                          |
//! | 6    | No incorrect rows, but unresolved or errored rows    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it in the table above
//! 3. Wire it into the relevant command's error handling

/// Success - audit ran and found nothing wrong.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unusable output paths.
pub const EXIT_USAGE: u8 = 2;

/// The audit config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Runtime failure - input tables unreadable, output unwritable.
pub const EXIT_RUNTIME: u8 = 4;

/// The audit found commissions declared at the wrong rate.
pub const EXIT_INCORRECT: u8 = 5;

/// Nothing incorrect, but some rows could not be resolved or errored.
/// Warn-level: the audit is incomplete, not failed.
pub const EXIT_UNRESOLVED: u8 = 6;
