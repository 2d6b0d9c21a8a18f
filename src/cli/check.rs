use std::path::Path;

use colored::Colorize;

use crate::error::Result;
use crate::processing::prepare_ledger;
use crate::session::Session;
use crate::settings::Settings;

/// Run the startup pipeline and report what a session would start with.
pub fn run(root: &Path, settings: &Settings) -> Result<()> {
    let ledger = prepare_ledger(root, settings)?;
    let session = Session::new(ledger)?;
    let ledger = session.ledger();
    if ledger.is_empty() {
        println!("{}", "No transactions found in the raw exports.".yellow());
        return Ok(());
    }
    let confirmed = ledger.seen_count();

    println!("{}", "All checks passed.".green());
    println!("Transactions:  {}", ledger.len());
    println!("Confirmed:     {confirmed}");
    println!("New:           {}", ledger.len() - confirmed);
    println!("Auto-matched:  {}", session.auto_matched_count());
    println!("Patterns:      {}", session.index().patterns().len());
    Ok(())
}
