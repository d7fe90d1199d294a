use std::fmt;

/// A raw record could not be turned into its canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// A required canonical field is absent (or null).
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },
    /// The field is present but holds the wrong JSON type.
    #[error("field '{field}' has the wrong type: expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    /// The field has the right type but an unusable value.
    #[error("field '{field}' has an invalid value '{value}'")]
    InvalidValue { field: &'static str, value: String },
    /// Another record in the same batch already uses this id.
    #[error("duplicate id (first seen at record #{first_index})")]
    DuplicateId { first_index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// TOML / JSON parse or deserialization failure (includes unknown keys).
    #[error("config parse error: {0}")]
    Parse(String),
    /// A recognized option holds a value outside its allowed range.
    #[error("config option '{option}' out of range: {message}")]
    OutOfRange {
        option: &'static str,
        message: String,
    },
}

/// Which input collection a malformed record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSide {
    StatementLine,
    Invoice,
}

impl fmt::Display for RecordSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatementLine => write!(f, "statement line"),
            Self::Invoice => write!(f, "invoice"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// A raw record failed canonicalization. Raised before any pass runs.
    #[error("{side} #{index}{}: {source}", record_label(.record_id))]
    Shape {
        side: RecordSide,
        index: usize,
        record_id: Option<String>,
        #[source]
        source: ShapeError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raw input could not be read (bad JSON, bad CSV).
    #[error("cannot load records: {0}")]
    Load(String),
}

fn record_label(record_id: &Option<String>) -> String {
    match record_id {
        Some(id) => format!(" ('{id}')"),
        None => String::new(),
    }
}

/// A persisted enum string that is not one of the fixed values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
