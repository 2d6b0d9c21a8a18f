use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::fmt::money;
use crate::reconcile::verify_history;
use crate::reports::spending_by_category;
use crate::settings::Settings;
use crate::store::load_history;

fn colored_money(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        money(amount).red().to_string()
    } else {
        money(amount).green().to_string()
    }
}

/// Spending per category from the saved history. Raw exports are not read.
pub fn run(root: &Path, settings: &Settings) -> Result<()> {
    let history = load_history(&settings.history_path(root))?;
    verify_history(&history)?;
    if history.records.is_empty() {
        println!("No saved transactions yet. Run `tally categorize` first.");
        return Ok(());
    }
    let report = spending_by_category(&history.records);

    let mut table = Table::new();
    table.set_header(vec!["Category", "Transactions", "Total"]);
    for item in &report.items {
        table.add_row(vec![
            Cell::new(&item.category),
            Cell::new(item.count),
            Cell::new(colored_money(item.total)),
        ]);
    }
    if report.uncategorized_count > 0 {
        table.add_row(vec![
            Cell::new("(uncategorized)".yellow()),
            Cell::new(report.uncategorized_count),
            Cell::new(colored_money(report.uncategorized_total)),
        ]);
    }
    table.add_row(vec![
        Cell::new("NET".bold()),
        Cell::new(history.records.len()),
        Cell::new(colored_money(report.net)),
    ]);
    println!("Spending by Category\n{table}");

    if report.uncategorized_count > 0 {
        println!(
            "{}",
            format!(
                "{} transaction(s) have no category.",
                report.uncategorized_count
            )
            .yellow()
        );
    }
    Ok(())
}
