//! Raw exports -> processed files -> merged ledger.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::adapters::{self, AdapterKind};
use crate::error::{Result, TallyError};
use crate::models::{Batch, PROCESSED_COLUMNS};
use crate::reconcile::{merge, Ledger};
use crate::settings::Settings;
use crate::store;
use crate::validation::{
    parse_date_range, verify_account_date_ranges, verify_bound_by_date_range, verify_path_not_file,
    verify_raw_file_names, verify_schema,
};

pub struct DataDir {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub processed: PathBuf,
}

impl DataDir {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            raw: root.join("raw"),
            processed: root.join("processed"),
        }
    }

    /// Create `raw/` if needed and start `processed/` from scratch.
    pub fn prepare(root: &Path) -> Result<Self> {
        verify_path_not_file(root)?;
        let dir = Self::new(root);
        std::fs::create_dir_all(&dir.raw)?;
        if dir.processed.exists() {
            std::fs::remove_dir_all(&dir.processed)?;
        }
        std::fs::create_dir_all(&dir.processed)?;
        Ok(dir)
    }
}

/// Visible file names in `dir`, sorted.
fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)?;
    Ok(rdr.headers()?.iter().map(str::to_string).collect())
}

/// Parse every raw export into `processed/`. Any bad file stops the run.
pub fn process_raw_files(dir: &DataDir, settings: &Settings) -> Result<usize> {
    for key in settings.column_layouts.keys() {
        if adapters::get_by_key(key).is_none() {
            tracing::warn!(key = %key, "column layout configured for an unknown account");
        }
    }
    let names = file_names(&dir.raw)?;
    verify_raw_file_names(&names, &adapters::all_keys())?;

    let mut by_account: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    let mut kinds: Vec<(String, AdapterKind)> = Vec::new();
    for name in &names {
        let kind = adapters::detect(name)
            .ok_or_else(|| TallyError::RawFileName(format!("no adapter for {name}")))?;
        by_account.entry(kind.key()).or_default().push(name.clone());
        kinds.push((name.clone(), kind));
    }
    for files in by_account.values() {
        verify_account_date_ranges(files)?;
    }

    let mut total = 0;
    for (name, kind) in kinds {
        let path = dir.raw.join(&name);
        let expected = settings
            .layout_for(kind.key())
            .unwrap_or_else(|| kind.expected_columns().to_vec());
        verify_schema(&name, &read_header(&path)?, &expected)?;

        let file = std::fs::File::open(&path)?;
        let records = kind.parse(std::io::BufReader::new(file), &name)?;
        let range = parse_date_range(&name)
            .ok_or_else(|| TallyError::RawFileName(format!("no date range detected in {name}")))?;
        verify_bound_by_date_range(&name, range, &records)?;

        store::write_processed(&dir.processed.join(&name), &records)?;
        tracing::debug!(file = %name, adapter = kind.key(), records = records.len(), "processed raw file");
        total += records.len();
    }
    tracing::info!(root = %dir.root.display(), files = names.len(), records = total, "raw files processed");
    Ok(total)
}

/// Read every processed file back into one batch.
pub fn load_processed(dir: &DataDir) -> Result<Batch> {
    let names = file_names(&dir.processed)?;
    if names.is_empty() {
        return Err(TallyError::RawFileName(format!(
            "no raw files to process, add exports to {}",
            dir.raw.display()
        )));
    }
    let mut batch = Batch::new(&PROCESSED_COLUMNS, Vec::new());
    for name in names {
        let part = store::read_processed(&dir.processed.join(name))?;
        batch.records.extend(part.records);
    }
    Ok(batch)
}

/// Run the whole startup pipeline and return the validated, merged ledger.
pub fn prepare_ledger(root: &Path, settings: &Settings) -> Result<Ledger> {
    let dir = DataDir::prepare(root)?;
    process_raw_files(&dir, settings)?;
    let processed = load_processed(&dir)?;
    let history = store::load_history(&settings.history_path(root))?;
    merge(processed, history)
}
