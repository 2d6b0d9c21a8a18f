//! Reading and writing the processed files and the history ledger.

use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::{Result, TallyError};
use crate::models::{Batch, Transaction, DATETIME_FORMAT, HISTORY_COLUMNS, PROCESSED_COLUMNS};
use crate::validation::verify_schema;

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn record_to_row(txn: &Transaction, with_categories: bool) -> Vec<String> {
    let mut row = vec![
        txn.id.clone(),
        txn.datetime.format(DATETIME_FORMAT).to_string(),
        txn.amount.to_string(),
        txn.account.clone(),
        txn.third_party_category.clone().unwrap_or_default(),
        txn.note.clone(),
    ];
    if with_categories {
        row.push(txn.pattern.clone().unwrap_or_default());
        row.push(txn.category.clone().unwrap_or_default());
    }
    row
}

/// Read a file written by [`write_records`]. Every record is returned unseen.
fn read_records<R: Read>(reader: R, origin: &str, expected: &[&str]) -> Result<Batch> {
    let mut rdr = csv::Reader::from_reader(reader);
    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    verify_schema(origin, &columns, expected)?;

    // Column order is free; only the set of names is checked.
    let indices: Vec<Option<usize>> = HISTORY_COLUMNS
        .iter()
        .map(|name| columns.iter().position(|c| c == name))
        .collect();
    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let cells: Vec<&str> = indices
            .iter()
            .map(|i| i.and_then(|i| record.get(i)).unwrap_or(""))
            .collect();
        let malformed = |reason: String| TallyError::Record {
            origin: origin.to_string(),
            line,
            reason,
        };

        let [id, raw_datetime, raw_amount, account, third_party_category, note, pattern, category] = cells[..]
        else {
            return Err(malformed("unexpected field count".to_string()));
        };
        let datetime = NaiveDateTime::parse_from_str(raw_datetime, DATETIME_FORMAT)
            .map_err(|_| malformed(format!("bad datetime '{raw_datetime}'")))?;
        let amount = Decimal::from_str(raw_amount).map_err(|_| malformed(format!("bad amount '{raw_amount}'")))?;
        if id.is_empty() {
            return Err(malformed("empty id".to_string()));
        }

        records.push(Transaction {
            id: id.to_string(),
            datetime,
            amount,
            account: account.to_string(),
            third_party_category: optional(third_party_category),
            note: note.to_string(),
            pattern: optional(pattern),
            category: optional(category),
            seen: false,
        });
    }
    Ok(Batch { columns, records })
}

fn write_records<W: Write>(writer: W, records: &[Transaction], columns: &[&str]) -> Result<()> {
    let with_categories = columns.len() == HISTORY_COLUMNS.len();
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(columns)?;
    for txn in records {
        wtr.write_record(record_to_row(txn, with_categories))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_processed(path: &Path, records: &[Transaction]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_records(std::io::BufWriter::new(file), records, &PROCESSED_COLUMNS)
}

pub fn read_processed(path: &Path) -> Result<Batch> {
    let file = std::fs::File::open(path)?;
    read_records(std::io::BufReader::new(file), &path.display().to_string(), &PROCESSED_COLUMNS)
}

/// Load the history ledger. A missing file is an empty history.
pub fn load_history(path: &Path) -> Result<Batch> {
    if !path.exists() {
        return Ok(Batch::new(&HISTORY_COLUMNS, Vec::new()));
    }
    let file = std::fs::File::open(path)?;
    let mut batch = read_records(std::io::BufReader::new(file), &path.display().to_string(), &HISTORY_COLUMNS)?;
    for record in &mut batch.records {
        record.seen = true;
    }
    Ok(batch)
}

/// Overwrite the history ledger in full. The new content is written to a
/// sibling file first and renamed over the old one.
pub fn save_history(path: &Path, records: &[Transaction]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TallyError::Settings(format!("invalid history path {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    {
        let file = std::fs::File::create(&tmp_path)?;
        let mut buffered = std::io::BufWriter::new(file);
        write_records(&mut buffered, records, &HISTORY_COLUMNS)?;
        buffered.flush()?;
        buffered.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    tracing::info!(path = %path.display(), records = records.len(), "history saved");
    Ok(())
}
