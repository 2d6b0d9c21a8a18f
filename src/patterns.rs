//! The pattern -> category index derived from confirmed history.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::error::{Result, TallyError};
use crate::models::Transaction;
use crate::validation::{compile_pattern, verify_category_type, verify_no_pattern_maps_to_more_than_one_category};

pub struct PatternIndex {
    pairs: BTreeSet<(String, String)>,
    by_pattern: BTreeMap<String, String>,
    categories: BTreeSet<String>,
    compiled: BTreeMap<String, Regex>,
}

impl PatternIndex {
    pub fn empty() -> Self {
        Self {
            pairs: BTreeSet::new(),
            by_pattern: BTreeMap::new(),
            categories: BTreeSet::new(),
            compiled: BTreeMap::new(),
        }
    }

    /// Build the index from confirmed records. Fails if a pattern is paired
    /// with more than one category.
    pub fn from_confirmed<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut index = Self::empty();
        for record in records {
            if let Some(category) = &record.category {
                index.categories.insert(category.clone());
            }
            if let (Some(pattern), Some(category)) = (&record.pattern, &record.category) {
                index.pairs.insert((pattern.clone(), category.clone()));
            }
        }
        verify_no_pattern_maps_to_more_than_one_category(
            index.pairs.iter().map(|(p, c)| (p.as_str(), c.as_str())),
        )?;
        for (pattern, category) in &index.pairs {
            index.compiled.insert(pattern.clone(), compile_pattern(pattern)?);
            index.by_pattern.insert(pattern.clone(), category.clone());
        }
        Ok(index)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn category_map(&self) -> &BTreeMap<String, String> {
        &self.by_pattern
    }

    /// Distinct categories in display order.
    pub fn categories(&self) -> Vec<&str> {
        self.categories.iter().map(String::as_str).collect()
    }

    /// Distinct patterns in display order.
    pub fn patterns(&self) -> Vec<&str> {
        self.by_pattern.keys().map(String::as_str).collect()
    }

    /// The longest pattern that matches `note`. Equal lengths resolve to the
    /// lexicographically smallest pattern.
    pub fn match_note(&self, note: &str) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (pattern, re) in &self.compiled {
            if !re.is_match(note) {
                continue;
            }
            let len = pattern.chars().count();
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((pattern.as_str(), len));
            }
        }
        best.map(|(pattern, _)| pattern)
    }

    pub fn category_for(&self, pattern: Option<&str>) -> Option<&str> {
        self.by_pattern.get(pattern?).map(String::as_str)
    }

    pub fn would_violate(&self, pattern: &str, category: &str) -> bool {
        would_violate(self.pairs(), (pattern, category))
    }

    pub fn add_category(&mut self, category: &str) {
        if !self.categories.contains(category) {
            self.categories.insert(category.to_string());
        }
    }

    /// Commit a confirmed pair. Returns `false` if the pair was already known.
    pub fn insert(&mut self, pattern: &str, category: &str) -> Result<bool> {
        if self.pairs.contains(&(pattern.to_string(), category.to_string())) {
            return Ok(false);
        }
        verify_category_type(Some(category))?;
        if let Some(existing) = self.by_pattern.get(pattern) {
            return Err(TallyError::AmbiguousPattern {
                pattern: pattern.to_string(),
                categories: vec![existing.clone(), category.to_string()],
            });
        }
        let re = compile_pattern(pattern)?;
        self.compiled.insert(pattern.to_string(), re);
        self.by_pattern.insert(pattern.to_string(), category.to_string());
        self.pairs.insert((pattern.to_string(), category.to_string()));
        self.add_category(category);
        Ok(true)
    }
}

/// Whether appending `candidate` to `pairs` would pair one pattern with two categories.
pub fn would_violate<'a, I>(pairs: I, candidate: (&'a str, &'a str)) -> bool
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    verify_no_pattern_maps_to_more_than_one_category(pairs.into_iter().chain(std::iter::once(candidate))).is_err()
}
