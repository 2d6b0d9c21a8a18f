use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid columns in {origin}: expected {expected:?}, found {found:?}")]
    Schema {
        origin: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Found duplicate ID(s): {}", .0.join(", "))]
    DuplicateId(Vec<String>),

    #[error("Pattern '{pattern}' maps to more than one category: {}", .categories.join(", "))]
    AmbiguousPattern {
        pattern: String,
        categories: Vec<String>,
    },

    #[error("{}", mismatch_message(.pattern, .text.as_deref()))]
    PatternMismatch {
        pattern: String,
        /// `None` when the note was hidden from the message.
        text: Option<String>,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid category: {0}")]
    CategoryType(String),

    #[error(
        "{} confirmed transaction(s) missing from processed data:\n{}",
        .0.len(),
        .0.join("\n")
    )]
    MissingTransactions(Vec<String>),

    #[error("Cannot parse {file}: {reason}")]
    Adapter { file: String, reason: String },

    #[error("Malformed record in {origin} (line {line}): {reason}")]
    Record {
        origin: String,
        line: u64,
        reason: String,
    },

    #[error("Raw file error: {0}")]
    RawFileName(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Exiting without saving.")]
    Aborted,
}

fn mismatch_message(pattern: &str, text: Option<&str>) -> String {
    match text {
        Some(text) => format!("Pattern doesn't match text. Pattern: {pattern} --- Text: {text}"),
        None => "Pattern doesn't match text.".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
