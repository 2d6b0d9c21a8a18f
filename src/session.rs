//! The interactive categorization state machine.
//!
//! A [`Session`] owns the merged ledger and the pattern index. It never reads
//! or writes the terminal itself: the caller feeds one [`Input`] at a time and
//! renders the returned [`Reply`] and the new [`State`].

use crate::error::Result;
use crate::patterns::PatternIndex;
use crate::reconcile::Ledger;
use crate::validation::{verify_category_type, verify_pattern_matches_text};

/// Saves the ledger while browsing.
pub const SAVE: &str = "s";
/// Unsets category and pattern while editing a category.
pub const CLEAR: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Browsing,
    Selecting(usize),
    EditingCategory(usize),
    EditingPattern { index: usize, category: String },
    Saved,
    Aborted,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Saved | State::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Line(&'a str),
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Advanced,
    /// The input was not accepted; the state is unchanged.
    Rejected(String),
    Notice(String),
}

pub struct Session {
    ledger: Ledger,
    index: PatternIndex,
    state: State,
    last_index: Option<usize>,
}

/// Strip a leading separator and lowercase a typed category.
pub fn normalize_category(raw: &str) -> String {
    raw.trim().trim_start_matches('/').trim().to_lowercase()
}

impl Session {
    /// Start a session over a merged ledger. The index is built from seen
    /// records only, then applied to every unseen record.
    pub fn new(ledger: Ledger) -> Result<Self> {
        let index = PatternIndex::from_confirmed(ledger.records().iter().filter(|r| r.seen))?;
        let mut session = Self {
            ledger,
            index,
            state: State::Browsing,
            last_index: None,
        };
        let matched = session.auto_match();
        tracing::debug!(matched, "initial auto-match");
        Ok(session)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn index(&self) -> &PatternIndex {
        &self.index
    }

    /// Number of unseen records that currently carry an auto-matched category.
    pub fn auto_matched_count(&self) -> usize {
        self.ledger
            .records()
            .iter()
            .filter(|r| !r.seen && r.category.is_some())
            .count()
    }

    /// Move from the detail view into category editing.
    pub fn begin_editing(&mut self) {
        if let State::Selecting(index) = self.state {
            self.state = State::EditingCategory(index);
        }
    }

    pub fn handle(&mut self, input: Input) -> Reply {
        if self.state.is_terminal() {
            return Reply::Rejected("The session has ended.".to_string());
        }
        let line = match input {
            Input::Interrupt => {
                self.state = State::Aborted;
                return Reply::Advanced;
            }
            Input::Line(line) => line,
        };
        match self.state.clone() {
            State::Browsing => self.browse(line),
            State::Selecting(_) => {
                self.begin_editing();
                self.handle(Input::Line(line))
            }
            State::EditingCategory(index) => self.edit_category(index, line),
            State::EditingPattern { index, category } => self.edit_pattern(index, category, line),
            State::Saved | State::Aborted => Reply::Advanced,
        }
    }

    fn browse(&mut self, line: &str) -> Reply {
        let line = line.trim();
        if line == SAVE {
            self.state = State::Saved;
            return Reply::Advanced;
        }
        if line.is_empty() {
            let next = self.last_index.map_or(0, |i| i + 1);
            if next >= self.ledger.len() {
                return Reply::Notice("Reached the end of the list.".to_string());
            }
            return self.select(next);
        }
        match line.parse::<usize>() {
            Ok(index) if index < self.ledger.len() => self.select(index),
            Ok(index) => Reply::Rejected(format!("No transaction at index {index}.")),
            Err(_) => Reply::Rejected(format!(
                "Enter a transaction number, press enter for the next one, or '{SAVE}' to save."
            )),
        }
    }

    fn select(&mut self, index: usize) -> Reply {
        self.last_index = Some(index);
        self.state = State::Selecting(index);
        Reply::Advanced
    }

    fn edit_category(&mut self, index: usize, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            self.state = State::Browsing;
            return Reply::Notice("Left unchanged.".to_string());
        }
        if line == CLEAR {
            if let Some(record) = self.ledger.get_mut(index) {
                record.category = None;
                record.pattern = None;
                record.seen = true;
            }
            self.state = State::Browsing;
            return Reply::Notice("Category and pattern cleared.".to_string());
        }
        let category = match line.parse::<usize>() {
            Ok(ordinal) => match self.index.categories().get(ordinal) {
                Some(category) => category.to_string(),
                None => return Reply::Rejected(format!("No category number {ordinal}.")),
            },
            Err(_) => normalize_category(line),
        };
        if let Err(e) = verify_category_type(Some(&category)) {
            return Reply::Rejected(e.to_string());
        }
        self.state = State::EditingPattern { index, category };
        Reply::Advanced
    }

    fn edit_pattern(&mut self, index: usize, category: String, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            if let Some(record) = self.ledger.get_mut(index) {
                record.category = Some(category.clone());
                record.pattern = None;
                record.seen = true;
            }
            self.index.add_category(&category);
            self.state = State::Browsing;
            return Reply::Notice(format!("Category set to '{category}'."));
        }
        let pattern = match line.parse::<usize>() {
            Ok(ordinal) => match self.index.patterns().get(ordinal) {
                Some(pattern) => pattern.to_string(),
                None => return Reply::Rejected(format!("No pattern number {ordinal}.")),
            },
            Err(_) => line.to_string(),
        };
        let Some(note) = self.ledger.get(index).map(|r| r.note.clone()) else {
            self.state = State::Browsing;
            return Reply::Rejected(format!("No transaction at index {index}."));
        };
        if let Err(e) = verify_pattern_matches_text(Some(&pattern), &note, true) {
            return Reply::Rejected(e.to_string());
        }
        if self.index.would_violate(&pattern, &category) {
            let existing = self.index.category_for(Some(&pattern)).unwrap_or_default();
            return Reply::Rejected(format!(
                "Pattern '{pattern}' already maps to category '{existing}'."
            ));
        }
        if let Err(e) = self.index.insert(&pattern, &category) {
            return Reply::Rejected(e.to_string());
        }
        if let Some(record) = self.ledger.get_mut(index) {
            record.category = Some(category.clone());
            record.pattern = Some(pattern.clone());
            record.seen = true;
        }
        self.state = State::Browsing;
        let matched = self.auto_match();
        tracing::debug!(matched, "auto-match after new pattern");
        Reply::Notice(format!(
            "Category set to '{category}' with pattern '{pattern}'. {matched} unconfirmed transaction(s) auto-matched."
        ))
    }

    /// Re-derive pattern and category for every unseen record. Seen records
    /// are never touched. Returns how many unseen records now have a match.
    fn auto_match(&mut self) -> usize {
        let index = &self.index;
        let mut matched = 0;
        for record in self.ledger.records_mut().iter_mut().filter(|r| !r.seen) {
            let pattern = index.match_note(&record.note);
            record.category = index.category_for(pattern).map(str::to_string);
            record.pattern = pattern.map(str::to_string);
            if record.pattern.is_some() {
                matched += 1;
            }
        }
        matched
    }
}
