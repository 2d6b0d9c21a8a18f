//! Stateless checks over records, patterns and raw export names.
//!
//! Every check fails with a named [`TallyError`] and never repairs its input.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;

use crate::error::{Result, TallyError};
use crate::models::Transaction;

pub fn verify_schema(origin: &str, columns: &[String], expected: &[&str]) -> Result<()> {
    let found: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
    let wanted: BTreeSet<&str> = expected.iter().copied().collect();
    if found != wanted || columns.len() != expected.len() {
        return Err(TallyError::Schema {
            origin: origin.to_string(),
            expected: expected.iter().map(|c| c.to_string()).collect(),
            found: columns.to_vec(),
        });
    }
    Ok(())
}

pub fn verify_no_duplicate_ids(records: &[Transaction]) -> Result<()> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.id.as_str()).or_default() += 1;
    }
    let duplicates: Vec<String> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(TallyError::DuplicateId(duplicates))
    }
}

/// Compile a pattern for case-insensitive search.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| TallyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// `hide_text` keeps the note out of the error message.
pub fn verify_pattern_matches_text(pattern: Option<&str>, note: &str, hide_text: bool) -> Result<()> {
    let Some(pattern) = pattern else {
        return Ok(());
    };
    if compile_pattern(pattern)?.is_match(note) {
        return Ok(());
    }
    Err(TallyError::PatternMismatch {
        pattern: pattern.to_string(),
        text: (!hide_text).then(|| note.to_lowercase()),
    })
}

/// A category must be a non-empty text label. Plain decimal labels such as
/// `42` are rejected since the session reads digits as ordinals.
pub fn verify_category_type(category: Option<&str>) -> Result<()> {
    let Some(category) = category else {
        return Ok(());
    };
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(TallyError::CategoryType("category must not be empty".to_string()));
    }
    let numeric_chars = trimmed.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
    if numeric_chars && Decimal::from_str(trimmed).is_ok() {
        return Err(TallyError::CategoryType(format!(
            "category must be text, got number '{trimmed}'"
        )));
    }
    Ok(())
}

pub fn verify_no_pattern_maps_to_more_than_one_category<'a, I>(pairs: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut mapped: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (pattern, category) in pairs {
        mapped.entry(pattern).or_default().insert(category);
    }
    match mapped.into_iter().find(|(_, categories)| categories.len() != 1) {
        Some((pattern, categories)) => Err(TallyError::AmbiguousPattern {
            pattern: pattern.to_string(),
            categories: categories.into_iter().map(str::to_string).collect(),
        }),
        None => Ok(()),
    }
}

pub fn verify_history_subset_of_processed(history: &[Transaction], processed: &[Transaction]) -> Result<()> {
    let processed_ids: HashSet<&str> = processed.iter().map(|r| r.id.as_str()).collect();
    let missing: Vec<String> = history
        .iter()
        .filter(|r| !processed_ids.contains(r.id.as_str()))
        .map(|r| format!("  {} {} {} {}", r.id, r.datetime, r.amount, r.account))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TallyError::MissingTransactions(missing))
    }
}

// ---------------------------------------------------------------------------
// Data directory and raw export names
// ---------------------------------------------------------------------------

pub fn verify_path_not_file(path: &Path) -> Result<()> {
    if path.is_file() {
        return Err(TallyError::RawFileName(format!(
            "data folder path {} is a file, must be a folder",
            path.display()
        )));
    }
    Ok(())
}

/// Inclusive date range encoded at the start of a raw export name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Parse `YYYY-MM-DD_to_YYYY-MM-DD` from the start of a file name.
pub fn parse_date_range(file_name: &str) -> Option<DateRange> {
    let from = file_name.get(0..10)?;
    let sep = file_name.get(10..14)?;
    let to = file_name.get(14..24)?;
    if sep != "_to_" {
        return None;
    }
    Some(DateRange {
        from: NaiveDate::parse_from_str(from, "%Y-%m-%d").ok()?,
        to: NaiveDate::parse_from_str(to, "%Y-%m-%d").ok()?,
    })
}

/// Every name must carry a date range and exactly one account key.
pub fn verify_raw_file_names(file_names: &[String], account_keys: &[&str]) -> Result<()> {
    for name in file_names {
        if parse_date_range(name).is_none() {
            return Err(TallyError::RawFileName(format!(
                "no date range detected in {name}, expected YYYY-MM-DD_to_YYYY-MM-DD_*"
            )));
        }
        let lower = name.to_lowercase();
        let found: Vec<&str> = account_keys
            .iter()
            .copied()
            .filter(|key| lower.contains(key))
            .collect();
        match found.len() {
            0 => {
                return Err(TallyError::RawFileName(format!(
                    "{name} does not name any supported account: {}",
                    account_keys.join(", ")
                )))
            }
            1 => {}
            _ => {
                return Err(TallyError::RawFileName(format!(
                    "{name} names more than one account: {}",
                    found.join(", ")
                )))
            }
        }
    }
    Ok(())
}

/// Files of one account must each span forward in time and must not overlap.
pub fn verify_account_date_ranges(file_names: &[String]) -> Result<()> {
    let mut ranges: Vec<(&str, DateRange)> = Vec::new();
    for name in file_names {
        let range = parse_date_range(name).ok_or_else(|| {
            TallyError::RawFileName(format!("no date range detected in {name}"))
        })?;
        if range.to <= range.from {
            return Err(TallyError::RawFileName(format!(
                "{name} ends on or before it starts"
            )));
        }
        ranges.push((name.as_str(), range));
    }
    ranges.sort_by_key(|(_, range)| range.from);
    for pair in ranges.windows(2) {
        let (prev_name, prev) = pair[0];
        let (next_name, next) = pair[1];
        if (next.from - prev.to).num_days() < 1 {
            return Err(TallyError::RawFileName(format!(
                "overlapping date ranges in {prev_name} and {next_name}"
            )));
        }
    }
    Ok(())
}

pub fn verify_bound_by_date_range(file_name: &str, range: DateRange, records: &[Transaction]) -> Result<()> {
    if let Some(outside) = records.iter().find(|r| !range.contains(r.datetime.date())) {
        return Err(TallyError::RawFileName(format!(
            "transaction dated {} falls outside the date range of {file_name}",
            outside.datetime.date()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn txn(id: &str, note: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            datetime: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            amount: Decimal::new(-1250, 2),
            account: "chase_debit_2022_1".to_string(),
            third_party_category: None,
            note: note.to_string(),
            pattern: None,
            category: None,
            seen: false,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_schema_accepts_any_column_order() {
        let cols = names(&["note", "id"]);
        assert!(verify_schema("x", &cols, &["id", "note"]).is_ok());
    }

    #[test]
    fn test_schema_rejects_missing_and_repeated_columns() {
        let missing = names(&["id"]);
        assert!(matches!(
            verify_schema("x", &missing, &["id", "note"]),
            Err(TallyError::Schema { .. })
        ));
        let repeated = names(&["id", "note", "note"]);
        assert!(verify_schema("x", &repeated, &["id", "note"]).is_err());
    }

    #[test]
    fn test_duplicate_ids_named() {
        let records = vec![txn("a", "x"), txn("b", "y"), txn("a", "z"), txn("c", "w"), txn("c", "v")];
        match verify_no_duplicate_ids(&records) {
            Err(TallyError::DuplicateId(ids)) => assert_eq!(ids, vec!["a", "c"]),
            other => panic!("expected duplicate id error, got {other:?}"),
        }
        assert!(verify_no_duplicate_ids(&records[..2]).is_ok());
    }

    #[test]
    fn test_pattern_matches_case_insensitively() {
        assert!(verify_pattern_matches_text(Some("STARBUCKS"), "chase_debit_starbucks #12", false).is_ok());
        assert!(verify_pattern_matches_text(Some("star.*12"), "Starbucks #12", false).is_ok());
        assert!(verify_pattern_matches_text(None, "anything", false).is_ok());
    }

    #[test]
    fn test_pattern_mismatch_can_hide_text() {
        let shown = verify_pattern_matches_text(Some("uber"), "Rent Payment", false).unwrap_err();
        assert!(shown.to_string().contains("rent payment"));
        let hidden = verify_pattern_matches_text(Some("uber"), "Rent Payment", true).unwrap_err();
        assert!(matches!(hidden, TallyError::PatternMismatch { text: None, .. }));
        assert!(!hidden.to_string().to_lowercase().contains("rent"));
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let err = verify_pattern_matches_text(Some("(unclosed"), "x", false).unwrap_err();
        assert!(matches!(err, TallyError::InvalidPattern { .. }));
    }

    #[test]
    fn test_category_type() {
        assert!(verify_category_type(None).is_ok());
        assert!(verify_category_type(Some("groceries")).is_ok());
        assert!(verify_category_type(Some("food/takeout")).is_ok());
        assert!(verify_category_type(Some("  ")).is_err());
        assert!(verify_category_type(Some("42")).is_err());
        assert!(verify_category_type(Some("3.5")).is_err());
        assert!(verify_category_type(Some("-12")).is_err());
        assert!(verify_category_type(Some("nan")).is_ok());
        assert!(verify_category_type(Some("inf")).is_ok());
        assert!(verify_category_type(Some("infinity")).is_ok());
        assert!(verify_category_type(Some("1e5")).is_ok());
    }

    #[test]
    fn test_ambiguous_pattern_detected() {
        let ok = [("uber", "transport"), ("uber", "transport"), ("rent", "housing")];
        assert!(verify_no_pattern_maps_to_more_than_one_category(ok).is_ok());
        let bad = [("uber", "transport"), ("rent", "housing"), ("uber", "food")];
        match verify_no_pattern_maps_to_more_than_one_category(bad) {
            Err(TallyError::AmbiguousPattern { pattern, categories }) => {
                assert_eq!(pattern, "uber");
                assert_eq!(categories, vec!["food", "transport"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_history_subset_of_processed() {
        let processed = vec![txn("a", "x"), txn("b", "y")];
        assert!(verify_history_subset_of_processed(&[txn("a", "x")], &processed).is_ok());
        let err = verify_history_subset_of_processed(&[txn("a", "x"), txn("z", "q")], &processed).unwrap_err();
        match err {
            TallyError::MissingTransactions(missing) => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].contains('z'));
            }
            other => panic!("expected missing transactions, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_date_range() {
        let range = parse_date_range("2024-01-01_to_2024-01-31_chase_debit_2022_1.csv").unwrap();
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.to, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert!(parse_date_range("chase_debit.csv").is_none());
        assert!(parse_date_range("2024-01-01-to-2024-01-31.csv").is_none());
        assert!(parse_date_range("2024-13-01_to_2024-01-31.csv").is_none());
    }

    #[test]
    fn test_raw_file_names_need_one_account() {
        let keys = ["chase_debit_2022_1", "citi_double_cash_2022_1"];
        assert!(verify_raw_file_names(&names(&["2024-01-01_to_2024-01-31_Chase_Debit_2022_1.csv"]), &keys).is_ok());
        assert!(verify_raw_file_names(&names(&["2024-01-01_to_2024-01-31_bank.csv"]), &keys).is_err());
        assert!(verify_raw_file_names(
            &names(&["2024-01-01_to_2024-01-31_chase_debit_2022_1_citi_double_cash_2022_1.csv"]),
            &keys
        )
        .is_err());
        assert!(verify_raw_file_names(&names(&["chase_debit_2022_1.csv"]), &keys).is_err());
    }

    #[test]
    fn test_account_date_ranges() {
        let ok = names(&[
            "2024-02-01_to_2024-02-29_chase_debit_2022_1.csv",
            "2024-01-01_to_2024-01-31_chase_debit_2022_1.csv",
        ]);
        assert!(verify_account_date_ranges(&ok).is_ok());
        let overlapping = names(&[
            "2024-01-01_to_2024-01-31_chase_debit_2022_1.csv",
            "2024-01-31_to_2024-02-29_chase_debit_2022_1.csv",
        ]);
        assert!(verify_account_date_ranges(&overlapping).is_err());
        let backwards = names(&["2024-01-31_to_2024-01-01_chase_debit_2022_1.csv"]);
        assert!(verify_account_date_ranges(&backwards).is_err());
    }

    #[test]
    fn test_bound_by_date_range() {
        let range = parse_date_range("2024-03-01_to_2024-03-31_x").unwrap();
        assert!(verify_bound_by_date_range("f", range, &[txn("a", "x")]).is_ok());
        let narrow = parse_date_range("2024-03-06_to_2024-03-31_x").unwrap();
        assert!(verify_bound_by_date_range("f", narrow, &[txn("a", "x")]).is_err());
    }

    #[test]
    fn test_path_not_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verify_path_not_file(dir.path()).is_ok());
        let file = dir.path().join("data");
        std::fs::write(&file, "").unwrap();
        assert!(verify_path_not_file(&file).is_err());
    }
}
