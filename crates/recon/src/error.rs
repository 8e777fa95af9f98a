use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty name, missing file, etc.).
    ConfigValidation(String),
    /// Missing required column in input data.
    MissingColumn { column: String },
    /// Timestamp parse error. `row` is the 0-based data row.
    TimestampParse { row: usize, value: String },
    /// Quantity parse error.
    QuantityParse { row: usize, value: String },
    /// Cancellation flag parse error.
    FlagParse { row: usize, value: String },
    /// IO error (file read, malformed CSV record, etc.).
    Io(String),
    /// Post-pass scan found purchases with more units canceled than bought.
    /// Indicates a double-booked allocation; never recoverable, never clamped.
    IntegrityViolation { offenders: Vec<usize> },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::TimestampParse { row, value } => {
                write!(f, "row {row}: cannot parse timestamp '{value}'")
            }
            Self::QuantityParse { row, value } => {
                write!(f, "row {row}: cannot parse quantity '{value}'")
            }
            Self::FlagParse { row, value } => {
                write!(f, "row {row}: cannot parse cancellation flag '{value}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::IntegrityViolation { offenders } => {
                write!(
                    f,
                    "integrity violation: {} purchase record(s) with canceled quantity above bought quantity: {:?}",
                    offenders.len(),
                    offenders
                )
            }
        }
    }
}

impl std::error::Error for ReconError {}
