use std::io::{BufRead, Write};
use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{Result, TallyError};
use crate::fmt::money;
use crate::models::{Transaction, DATETIME_FORMAT};
use crate::processing::prepare_ledger;
use crate::session::{Input, Reply, Session, State, CLEAR, SAVE};
use crate::settings::Settings;
use crate::store::save_history;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Saved,
    Aborted,
}

fn ledger_table(session: &Session) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "#",
        "note",
        "category",
        "pattern",
        "amount",
        "datetime",
        "account",
        "third_party_category",
    ]);
    for (i, txn) in session.ledger().records().iter().enumerate() {
        let category = match (&txn.category, txn.seen) {
            (Some(c), true) => c.clone(),
            (Some(c), false) => format!("{c} (auto)"),
            (None, _) => String::new(),
        };
        table.add_row(vec![
            Cell::new(i),
            Cell::new(&txn.note),
            Cell::new(category),
            Cell::new(txn.pattern.as_deref().unwrap_or("")),
            Cell::new(money(txn.amount)),
            Cell::new(txn.datetime.format(DATETIME_FORMAT)),
            Cell::new(&txn.account),
            Cell::new(txn.third_party_category.as_deref().unwrap_or("")),
        ]);
    }
    table
}

fn detail(txn: &Transaction) -> String {
    let rows = [
        ("datetime", txn.datetime.format(DATETIME_FORMAT).to_string()),
        ("amount", money(txn.amount)),
        ("account", txn.account.clone()),
        ("third_party_category", txn.third_party_category.clone().unwrap_or_default()),
        ("pattern", txn.pattern.clone().unwrap_or_default()),
        ("category", txn.category.clone().unwrap_or_default()),
        ("note", txn.note.clone()),
    ];
    rows.iter()
        .map(|(label, value)| format!("  {:<22}{value}", format!("{label}:")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn ordinal_table(header: &str, items: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", header]);
    for (i, item) in items.iter().enumerate() {
        table.add_row(vec![Cell::new(i), Cell::new(item)]);
    }
    table
}

fn pattern_table(session: &Session) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "pattern", "category"]);
    for (i, (pattern, category)) in session.index().category_map().iter().enumerate() {
        table.add_row(vec![Cell::new(i), Cell::new(pattern), Cell::new(category)]);
    }
    table
}

fn render_reply<W: Write>(out: &mut W, reply: &Reply) -> Result<()> {
    match reply {
        Reply::Advanced => {}
        Reply::Rejected(msg) => writeln!(out, "{}", msg.red())?,
        Reply::Notice(msg) => writeln!(out, "{}", msg.yellow())?,
    }
    Ok(())
}

/// Run the session against line-oriented input until it saves or aborts.
/// End of input counts as an interrupt.
pub fn drive<R: BufRead, W: Write>(session: &mut Session, input: &mut R, out: &mut W) -> Result<SessionEnd> {
    let mut redraw = true;
    let mut line = String::new();
    loop {
        let prompt = match session.state().clone() {
            State::Saved => return Ok(SessionEnd::Saved),
            State::Aborted => return Ok(SessionEnd::Aborted),
            State::Selecting(index) => {
                if let Some(txn) = session.ledger().get(index) {
                    writeln!(out, "\n{}\n{}", format!("Transaction {index}").bold(), detail(txn))?;
                }
                if !session.index().categories().is_empty() {
                    writeln!(out, "{}", ordinal_table("category", &session.index().categories()))?;
                }
                session.begin_editing();
                continue;
            }
            State::Browsing => {
                if redraw {
                    writeln!(out, "{}", ledger_table(session))?;
                    redraw = false;
                }
                format!("Transaction # (enter = next, {SAVE} = save): ")
            }
            State::EditingCategory(_) => {
                format!("Category # or new name ({CLEAR} = clear, enter = skip): ")
            }
            State::EditingPattern { .. } => {
                if redraw && !session.index().patterns().is_empty() {
                    writeln!(out, "{}", pattern_table(session))?;
                }
                redraw = false;
                "Pattern # or new pattern (enter = none): ".to_string()
            }
        };
        write!(out, "{prompt}")?;
        out.flush()?;

        line.clear();
        let input_value = if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            Input::Interrupt
        } else {
            Input::Line(line.trim_end_matches(['\n', '\r']))
        };
        let before = session.state().clone();
        let reply = session.handle(input_value);
        render_reply(out, &reply)?;
        if *session.state() != before {
            redraw = true;
        }
    }
}

pub fn run(root: &Path, settings: &Settings) -> Result<()> {
    let ledger = prepare_ledger(root, settings)?;
    let mut session = Session::new(ledger)?;
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();

    match drive(&mut session, &mut input, &mut out)? {
        SessionEnd::Saved => {
            let history = settings.history_path(root);
            save_history(&history, session.ledger().records())?;
            println!(
                "{}",
                format!("Saved {} transactions to {}", session.ledger().len(), history.display()).green()
            );
            Ok(())
        }
        SessionEnd::Aborted => Err(TallyError::Aborted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Ledger;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn session() -> Session {
        let txn = |id: &str, day: u32, note: &str| Transaction {
            id: id.to_string(),
            datetime: NaiveDate::from_ymd_opt(2024, 6, day).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            amount: Decimal::new(-2500, 2),
            account: "amex".to_string(),
            third_party_category: None,
            note: note.to_string(),
            pattern: None,
            category: None,
            seen: false,
        };
        let ledger = Ledger::from_records(vec![
            txn("a", 1, "amex_GREEN GROCER"),
            txn("b", 2, "amex_GREEN GROCER #2"),
        ])
        .unwrap();
        Session::new(ledger).unwrap()
    }

    fn run_script(session: &mut Session, script: &str) -> (SessionEnd, String) {
        let mut input = script.as_bytes();
        let mut out = Vec::new();
        let end = drive(session, &mut input, &mut out).unwrap();
        (end, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_save_immediately() {
        let mut s = session();
        let (end, out) = run_script(&mut s, "s\n");
        assert_eq!(end, SessionEnd::Saved);
        assert!(out.contains("GREEN GROCER"));
    }

    #[test]
    fn test_end_of_input_aborts() {
        let mut s = session();
        let (end, _) = run_script(&mut s, "0\ngroceries\n");
        assert_eq!(end, SessionEnd::Aborted);
    }

    #[test]
    fn test_pattern_flow_auto_matches_rest() {
        let mut s = session();
        let (end, out) = run_script(&mut s, "\ngroceries\ngreen grocer\ns\n");
        assert_eq!(end, SessionEnd::Saved);
        assert!(out.contains("Transaction 0"));
        let records = s.ledger().records();
        assert!(records[0].seen);
        assert_eq!(records[0].pattern.as_deref(), Some("green grocer"));
        assert!(!records[1].seen);
        assert_eq!(records[1].category.as_deref(), Some("groceries"));
    }

    #[test]
    fn test_rejection_is_shown_and_reprompted() {
        let mut s = session();
        let (end, out) = run_script(&mut s, "9\n0\nfood\nbakery\n\ns\n");
        assert_eq!(end, SessionEnd::Saved);
        assert!(out.contains("No transaction at index 9."));
        assert!(out.contains("Pattern doesn't match text."));
        assert_eq!(s.ledger().records()[0].category.as_deref(), Some("food"));
        assert_eq!(s.ledger().records()[0].pattern, None);
    }

    #[test]
    fn test_detail_lists_fields() {
        let s = session();
        let text = detail(s.ledger().get(0).unwrap());
        assert!(text.contains("note:"));
        assert!(text.contains("-$25.00"));
    }
}
