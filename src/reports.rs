use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::Transaction;

// ---------------------------------------------------------------------------
// Spending by category
// ---------------------------------------------------------------------------

pub struct SpendingItem {
    pub category: String,
    pub count: usize,
    pub total: Decimal,
}

pub struct SpendingReport {
    pub items: Vec<SpendingItem>,
    pub uncategorized_count: usize,
    pub uncategorized_total: Decimal,
    pub net: Decimal,
}

/// Signed totals per category, ordered by category name.
pub fn spending_by_category(records: &[Transaction]) -> SpendingReport {
    let mut totals: BTreeMap<&str, (usize, Decimal)> = BTreeMap::new();
    let mut uncategorized_count = 0;
    let mut uncategorized_total = Decimal::ZERO;
    let mut net = Decimal::ZERO;
    for record in records {
        net += record.amount;
        match &record.category {
            Some(category) => {
                let entry = totals.entry(category.as_str()).or_insert((0, Decimal::ZERO));
                entry.0 += 1;
                entry.1 += record.amount;
            }
            None => {
                uncategorized_count += 1;
                uncategorized_total += record.amount;
            }
        }
    }
    SpendingReport {
        items: totals
            .into_iter()
            .map(|(category, (count, total))| SpendingItem {
                category: category.to_string(),
                count,
                total,
            })
            .collect(),
        uncategorized_count,
        uncategorized_total,
        net,
    }
}
