use std::fmt;

#[derive(Debug)]
pub enum AuditError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad tier order, empty rule, duplicate override, etc.).
    ConfigValidation(String),
    /// A required input source is missing from the config.
    MissingInput(String),
    /// Missing required column in input data.
    MissingColumn { table: String, column: String },
    /// IO error (file read, workbook write, etc.).
    Io(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingInput(name) => write!(f, "missing input source: {name}"),
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AuditError {}
