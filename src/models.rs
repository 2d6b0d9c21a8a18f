use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Textual date-time format used by the processed files and the history file.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const PROCESSED_COLUMNS: [&str; 6] = [
    "id",
    "datetime",
    "amount",
    "account",
    "third_party_category",
    "note",
];

pub const HISTORY_COLUMNS: [&str; 8] = [
    "id",
    "datetime",
    "amount",
    "account",
    "third_party_category",
    "note",
    "pattern",
    "category",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub datetime: NaiveDateTime,
    /// Positive is money in, negative is money out.
    pub amount: Decimal,
    pub account: String,
    pub third_party_category: Option<String>,
    pub note: String,
    pub pattern: Option<String>,
    pub category: Option<String>,
    /// True when the category came from a confirmed session.
    pub seen: bool,
}

/// Intermediate representation from an adapter before the id is assigned.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub datetime: NaiveDateTime,
    pub amount: Decimal,
    pub third_party_category: Option<String>,
    pub description: String,
}

/// Records read from one tabular source along with the header they were read under.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub columns: Vec<String>,
    pub records: Vec<Transaction>,
}

impl Batch {
    pub fn new(columns: &[&str], records: Vec<Transaction>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            records,
        }
    }
}
