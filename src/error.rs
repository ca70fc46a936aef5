use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Errors raised while reading price rows or report frames at the tabular boundary.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Column '{column}' has an unsupported type: {msg}")]
    InvalidColumnType { column: String, msg: String },

    #[error("Failed to parse date '{value}' in column '{column}'")]
    DateParse { column: String, value: String },

    #[error("Null value in column '{column}' at row {row}")]
    NullValue { column: String, row: usize },

    #[error("Invalid price for '{key}' on {date}: {msg}")]
    InvalidPrice {
        key: String,
        date: String,
        msg: String,
    },

    #[error("Expected a {expected} table, found a {found} table")]
    PeriodMismatch { expected: String, found: String },

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

/// Errors raised by the numerical pipeline itself.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Capacity exceeded for {what}: {count} exceeds the supported maximum of {max}")]
    CapacityExceeded {
        what: String,
        count: usize,
        max: usize,
    },

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Unknown series: '{0}'")]
    UnknownSeries(String),
}

/// Errors related to file I/O and serialization of reports and configuration.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),
}
