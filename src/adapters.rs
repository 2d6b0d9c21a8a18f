use std::io::Read;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::error::{Result, TallyError};
use crate::models::{ParsedRow, Transaction, DATETIME_FORMAT};

/// Length of the hex content id.
pub const ID_LENGTH: usize = 30;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Decimal::from_str(inner.trim()).ok().map(|d| -d);
    }
    Decimal::from_str(s).ok()
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in [DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    // Two-digit years first: %Y would read "25" as the year 25.
    for fmt in ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Deterministic id over the normalized pre-categorization fields.
pub fn content_id(
    datetime: &NaiveDateTime,
    amount: &Decimal,
    account: &str,
    third_party_category: Option<&str>,
    note: &str,
) -> String {
    let mut hasher = Sha256::new();
    let fields = [
        datetime.format(DATETIME_FORMAT).to_string(),
        amount.normalize().to_string(),
        account.to_string(),
        third_party_category.unwrap_or_default().to_string(),
        note.to_string(),
    ];
    hasher.update(fields.join("\u{1f}").as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(ID_LENGTH);
    id
}

impl Transaction {
    /// Turn an adapter row into a canonical, not yet categorized record.
    pub fn from_parsed(row: ParsedRow, account: &str) -> Self {
        let note = format!("{account}_{}", row.description);
        let id = content_id(
            &row.datetime,
            &row.amount,
            account,
            row.third_party_category.as_deref(),
            &note,
        );
        Self {
            id,
            datetime: row.datetime,
            amount: row.amount,
            account: account.to_string(),
            third_party_category: row.third_party_category,
            note,
            pattern: None,
            category: None,
            seen: false,
        }
    }
}

/// Header positions of a raw export, looked up by column name.
struct Columns<'a> {
    file: &'a str,
    headers: Vec<String>,
}

impl Columns<'_> {
    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Result<&'r str> {
        let idx = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| self.error(format!("missing column '{name}'")))?;
        Ok(record.get(idx).unwrap_or("").trim())
    }

    fn optional<'r>(&self, record: &'r StringRecord, name: &str) -> Result<Option<&'r str>> {
        let value = self.get(record, name)?;
        Ok((!value.is_empty()).then_some(value))
    }

    fn date(&self, record: &StringRecord, name: &str) -> Result<NaiveDateTime> {
        let raw = self.get(record, name)?;
        parse_datetime(raw).ok_or_else(|| self.error(format!("unrecognized date '{raw}' in '{name}'")))
    }

    fn amount(&self, record: &StringRecord, name: &str) -> Result<Decimal> {
        let raw = self.get(record, name)?;
        parse_amount(raw).ok_or_else(|| self.error(format!("unrecognized amount '{raw}' in '{name}'")))
    }

    fn error(&self, reason: String) -> TallyError {
        TallyError::Adapter {
            file: self.file.to_string(),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter kinds: an explicit registry keyed by account identifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    AmexBlueCashPreferred,
    CitiDoubleCash,
    CitiCustomCash,
    AmazonItems,
    AmazonRefunds,
    ChaseFreedomUnlimited,
    ChaseDebit,
}

impl AdapterKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::AmexBlueCashPreferred => "american_express_blue_cash_preferred_2022_1",
            Self::CitiDoubleCash => "citi_double_cash_2022_1",
            Self::CitiCustomCash => "citi_custom_cash_2022_1",
            Self::AmazonItems => "amazon_items_2022_1",
            Self::AmazonRefunds => "amazon_refunds_2022_1",
            Self::ChaseFreedomUnlimited => "chase_freedom_unlimited_2022_1",
            Self::ChaseDebit => "chase_debit_2022_1",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AmexBlueCashPreferred => "American Express Blue Cash Preferred",
            Self::CitiDoubleCash => "Citi Double Cash",
            Self::CitiCustomCash => "Citi Custom Cash",
            Self::AmazonItems => "Amazon Order Items",
            Self::AmazonRefunds => "Amazon Refunds",
            Self::ChaseFreedomUnlimited => "Chase Freedom Unlimited",
            Self::ChaseDebit => "Chase Debit",
        }
    }

    pub fn expected_columns(&self) -> &'static [&'static str] {
        match self {
            Self::AmexBlueCashPreferred => &["Date", "Description", "Amount"],
            Self::CitiDoubleCash | Self::CitiCustomCash => {
                &["Status", "Date", "Description", "Debit", "Credit"]
            }
            Self::AmazonItems => &["Order Date", "Order ID", "Title", "Category", "Item Total"],
            Self::AmazonRefunds => &[
                "Order Date",
                "Order ID",
                "Title",
                "Category",
                "Refund Date",
                "Refund Amount",
                "Refund Tax Amount",
            ],
            Self::ChaseFreedomUnlimited => &[
                "Transaction Date",
                "Post Date",
                "Description",
                "Category",
                "Type",
                "Amount",
                "Memo",
            ],
            Self::ChaseDebit => &[
                "Details",
                "Posting Date",
                "Description",
                "Amount",
                "Type",
                "Balance",
                "Check or Slip #",
            ],
        }
    }

    /// Parse a raw export whose header has already been checked.
    pub fn parse<R: Read>(&self, reader: R, file: &str) -> Result<Vec<Transaction>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let columns = Columns {
            file,
            headers: rdr.headers()?.iter().map(str::to_string).collect(),
        };
        let mut out = Vec::new();
        for result in rdr.records() {
            let record = result?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let row = self.parse_row(&columns, &record)?;
            out.push(Transaction::from_parsed(row, self.key()));
        }
        Ok(out)
    }

    fn parse_row(&self, cols: &Columns, rec: &StringRecord) -> Result<ParsedRow> {
        match self {
            Self::AmexBlueCashPreferred => Ok(ParsedRow {
                datetime: cols.date(rec, "Date")?,
                amount: -cols.amount(rec, "Amount")?,
                third_party_category: None,
                description: cols.get(rec, "Description")?.to_string(),
            }),
            Self::CitiDoubleCash | Self::CitiCustomCash => {
                let value = match (cols.optional(rec, "Debit")?, cols.optional(rec, "Credit")?) {
                    (Some(_), None) => cols.amount(rec, "Debit")?,
                    (None, Some(_)) => cols.amount(rec, "Credit")?,
                    _ => return Err(cols.error("failed to parse debit/credit columns".to_string())),
                };
                Ok(ParsedRow {
                    datetime: cols.date(rec, "Date")?,
                    amount: -value,
                    third_party_category: None,
                    description: cols.get(rec, "Description")?.to_string(),
                })
            }
            Self::AmazonItems => Ok(ParsedRow {
                datetime: cols.date(rec, "Order Date")?,
                amount: -cols.amount(rec, "Item Total")?,
                third_party_category: cols.optional(rec, "Category")?.map(str::to_string),
                description: cols.get(rec, "Title")?.to_string(),
            }),
            Self::AmazonRefunds => Ok(ParsedRow {
                datetime: cols.date(rec, "Order Date")?,
                amount: cols.amount(rec, "Refund Amount")? + cols.amount(rec, "Refund Tax Amount")?,
                third_party_category: cols.optional(rec, "Category")?.map(str::to_string),
                description: cols.get(rec, "Title")?.to_string(),
            }),
            // Post date is what the institution's own search filters on.
            Self::ChaseFreedomUnlimited => Ok(ParsedRow {
                datetime: cols.date(rec, "Post Date")?,
                amount: cols.amount(rec, "Amount")?,
                third_party_category: cols.optional(rec, "Category")?.map(str::to_string),
                description: cols.get(rec, "Description")?.to_string(),
            }),
            Self::ChaseDebit => Ok(ParsedRow {
                datetime: cols.date(rec, "Posting Date")?,
                amount: cols.amount(rec, "Amount")?,
                third_party_category: None,
                description: cols.get(rec, "Description")?.to_string(),
            }),
        }
    }
}

pub const ALL_ADAPTERS: &[AdapterKind] = &[
    AdapterKind::AmexBlueCashPreferred,
    AdapterKind::CitiDoubleCash,
    AdapterKind::CitiCustomCash,
    AdapterKind::AmazonItems,
    AdapterKind::AmazonRefunds,
    AdapterKind::ChaseFreedomUnlimited,
    AdapterKind::ChaseDebit,
];

pub fn get_by_key(key: &str) -> Option<AdapterKind> {
    ALL_ADAPTERS.iter().find(|a| a.key() == key).copied()
}

pub fn all_keys() -> Vec<&'static str> {
    ALL_ADAPTERS.iter().map(|a| a.key()).collect()
}

/// The adapter whose key appears in a raw export's file name.
pub fn detect(file_name: &str) -> Option<AdapterKind> {
    let lower = file_name.to_lowercase();
    ALL_ADAPTERS.iter().find(|a| lower.contains(a.key())).copied()
}
