//! Merging a freshly processed batch with the persisted history.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::error::{Result, TallyError};
use crate::models::{Batch, Transaction, HISTORY_COLUMNS, PROCESSED_COLUMNS};
use crate::validation::{
    verify_category_type, verify_history_subset_of_processed, verify_no_duplicate_ids,
    verify_pattern_matches_text, verify_schema,
};

/// The merged, sorted set of records a session works on.
///
/// Records are ordered by datetime descending, then id ascending. A record's
/// display index is its position, so index 0 is the most recent transaction.
/// Display indices are only meaningful within one ledger; `id` is the stable
/// identity.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<Transaction>,
}

impl Ledger {
    pub fn from_records(mut records: Vec<Transaction>) -> Result<Self> {
        sort_records(&mut records);
        verify_no_duplicate_ids(&records)?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[Transaction] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Transaction> {
        self.records.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Transaction> {
        self.records.get_mut(index)
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Transaction] {
        &mut self.records
    }

    pub fn seen_count(&self) -> usize {
        self.records.iter().filter(|r| r.seen).count()
    }
}

fn sort_records(records: &mut [Transaction]) {
    records.sort_by(|a, b| {
        Reverse(a.datetime)
            .cmp(&Reverse(b.datetime))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Checks a loaded history must pass before it can be merged.
pub fn verify_history(history: &Batch) -> Result<()> {
    verify_schema("history", &history.columns, &HISTORY_COLUMNS)?;
    verify_no_duplicate_ids(&history.records)?;
    for record in &history.records {
        verify_category_type(record.category.as_deref())?;
        if record.pattern.is_some() && record.category.is_none() {
            return Err(TallyError::CategoryType(format!(
                "transaction {} has a pattern but no category",
                record.id
            )));
        }
        verify_pattern_matches_text(record.pattern.as_deref(), &record.note, false)?;
    }
    Ok(())
}

/// Merge `processed` with `history`.
///
/// History records keep their categories and come out seen. Processed
/// records not yet in history come out unseen and uncategorized. Fails
/// before touching anything if a confirmed record is missing from the
/// processed batch.
pub fn merge(processed: Batch, history: Batch) -> Result<Ledger> {
    verify_schema("processed data", &processed.columns, &PROCESSED_COLUMNS)?;
    verify_no_duplicate_ids(&processed.records)?;
    verify_history(&history)?;
    verify_history_subset_of_processed(&history.records, &processed.records)?;

    let confirmed: HashSet<&str> = history.records.iter().map(|r| r.id.as_str()).collect();
    let fresh: Vec<Transaction> = processed
        .records
        .into_iter()
        .filter(|r| !confirmed.contains(r.id.as_str()))
        .map(|mut r| {
            r.seen = false;
            r.pattern = None;
            r.category = None;
            r
        })
        .collect();

    let new_count = fresh.len();
    let mut records = fresh;
    records.extend(history.records.into_iter().map(|mut r| {
        r.seen = true;
        r
    }));
    let ledger = Ledger::from_records(records)?;
    tracing::info!(total = ledger.len(), new = new_count, "ledger merged");
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn txn(id: &str, day: u32, category: Option<&str>) -> Transaction {
        Transaction {
            id: id.to_string(),
            datetime: NaiveDate::from_ymd_opt(2024, 2, day).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            amount: Decimal::new(-300, 2),
            account: "amex".to_string(),
            third_party_category: None,
            note: format!("amex_purchase {id}"),
            pattern: None,
            category: category.map(str::to_string),
            seen: false,
        }
    }

    fn processed(records: Vec<Transaction>) -> Batch {
        Batch::new(&PROCESSED_COLUMNS, records)
    }

    fn history(records: Vec<Transaction>) -> Batch {
        Batch::new(&HISTORY_COLUMNS, records)
    }

    #[test]
    fn test_merge_keeps_confirmed_and_adds_new() {
        let ledger = merge(
            processed(vec![txn("id1", 1, None), txn("id2", 2, None)]),
            history(vec![txn("id1", 1, Some("x"))]),
        )
        .unwrap();
        assert_eq!(ledger.len(), 2);
        let id1 = ledger.records().iter().find(|r| r.id == "id1").unwrap();
        let id2 = ledger.records().iter().find(|r| r.id == "id2").unwrap();
        assert!(id1.seen);
        assert_eq!(id1.category.as_deref(), Some("x"));
        assert!(!id2.seen);
        assert_eq!(id2.category, None);
        assert_eq!(ledger.seen_count(), 1);
    }

    #[test]
    fn test_merge_orders_most_recent_first() {
        let ledger = merge(
            processed(vec![txn("b", 1, None), txn("c", 9, None), txn("a", 1, None)]),
            history(Vec::new()),
        )
        .unwrap();
        let ids: Vec<&str> = ledger.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_missing_history_record_fails() {
        let err = merge(
            processed(vec![txn("id2", 2, None)]),
            history(vec![txn("id1", 1, Some("x"))]),
        )
        .unwrap_err();
        match err {
            TallyError::MissingTransactions(missing) => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].contains("id1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_processed_ids_fail() {
        let err = merge(
            processed(vec![txn("id1", 1, None), txn("id1", 1, None)]),
            history(Vec::new()),
        )
        .unwrap_err();
        assert!(matches!(err, TallyError::DuplicateId(ids) if ids == vec!["id1".to_string()]));
    }

    #[test]
    fn test_history_pattern_must_match_note() {
        let mut bad = txn("id1", 1, Some("x"));
        bad.pattern = Some("walmart".to_string());
        let err = merge(processed(vec![txn("id1", 1, None)]), history(vec![bad])).unwrap_err();
        assert!(matches!(err, TallyError::PatternMismatch { text: Some(_), .. }));
    }

    #[test]
    fn test_history_pattern_needs_category() {
        let mut bad = txn("id1", 1, None);
        bad.pattern = Some("purchase".to_string());
        let err = merge(processed(vec![txn("id1", 1, None)]), history(vec![bad])).unwrap_err();
        assert!(matches!(err, TallyError::CategoryType(_)));
    }

    #[test]
    fn test_processed_schema_checked() {
        let batch = Batch::new(&["id", "datetime"], vec![]);
        assert!(matches!(merge(batch, history(Vec::new())), Err(TallyError::Schema { .. })));
    }
}
