//! Category name reconciliation.
//!
//! Imported spreadsheets carry free-text category paths such as
//! `"Men's / Tops / T-Shirts"`. [`CategoryReconciler`] maps the leaf of such a
//! path onto a brand's existing category tree: a known id passes through, then
//! an exact [`canonicalize`]d name match is tried, and finally the closest
//! canonical name within a small [`levenshtein`] distance.

use std::collections::HashMap;

use thiserror::Error;

use crate::catalog::Category;

/// Largest edit distance accepted for a fuzzy category match.
pub const DEFAULT_MAX_DISTANCE: usize = 2;

/// Known misspellings rewritten after canonicalization.
const CANONICAL_OVERRIDES: &[(&str, &str)] = &[
    ("footware", "footwear"),
    ("accesories", "accessories"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Category \"{0}\" not found in database")]
    CategoryNotFound(String),
}

/// How a [`CategoryMatch`] was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The input already was a category id.
    Id,
    /// The leaf's canonical name equals a category's canonical name.
    Exact,
    /// Closest canonical name within the distance threshold.
    Fuzzy { distance: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch {
    pub id: String,
    pub name: String,
    pub kind: MatchKind,
}

/// Normalizes a display name for matching.
///
/// Lowercases, spells `&` as `and`, drops every non-alphanumeric character
/// and finally applies the static override table.
#[must_use]
pub fn canonicalize(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .replace('&', "and")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();

    CANONICAL_OVERRIDES
        .iter()
        .find(|(from, _)| *from == stripped)
        .map_or(stripped, |(_, to)| (*to).to_string())
}

/// Edit distance between two strings, counted in chars.
///
/// Full `(n + 1) x (m + 1)` table; insert, delete and substitute all cost 1.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a.len()][b.len()]
}

/// Returns the last non-empty `/`-separated segment of `path`, trimmed.
#[must_use]
pub fn leaf_segment(path: &str) -> Option<&str> {
    path.split('/').map(str::trim).rev().find(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
struct IndexedCategory {
    id: String,
    name: String,
    canonical: String,
}

/// Index over a brand's categories answering "which category is this?".
///
/// Categories keep the order they were supplied in; that order breaks ties
/// between equally distant fuzzy candidates.
#[derive(Debug, Clone)]
pub struct CategoryReconciler {
    entries: Vec<IndexedCategory>,
    by_id: HashMap<String, usize>,
    max_distance: usize,
}

impl CategoryReconciler {
    #[must_use]
    pub fn new<'a, I>(categories: I) -> Self
    where
        I: IntoIterator<Item = &'a Category>,
    {
        let mut entries = Vec::new();
        let mut by_id = HashMap::new();
        for category in categories {
            by_id.entry(category.id.clone()).or_insert(entries.len());
            entries.push(IndexedCategory {
                id: category.id.clone(),
                name: category.name.clone(),
                canonical: canonicalize(&category.name),
            });
        }
        Self {
            entries,
            by_id,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }

    #[must_use]
    pub fn with_max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = max_distance;
        self
    }

    #[must_use]
    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a category id or free-text category path.
    ///
    /// Returns `None` when nothing is within the distance threshold, or when
    /// the input has no usable leaf segment.
    #[must_use]
    pub fn resolve(&self, input: &str) -> Option<CategoryMatch> {
        let trimmed = input.trim();
        if let Some(&idx) = self.by_id.get(trimmed) {
            return Some(self.to_match(idx, MatchKind::Id));
        }

        let leaf = canonicalize(leaf_segment(trimmed)?);
        if leaf.is_empty() {
            return None;
        }

        if let Some(idx) = self.entries.iter().position(|e| e.canonical == leaf) {
            return Some(self.to_match(idx, MatchKind::Exact));
        }

        let mut best: Option<(usize, usize)> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            let distance = levenshtein(&leaf, &entry.canonical);
            if distance > self.max_distance {
                continue;
            }
            // Strict comparison keeps the first-seen candidate on ties.
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }

        best.map(|(idx, distance)| self.to_match(idx, MatchKind::Fuzzy { distance }))
    }

    /// Like [`resolve`](Self::resolve) but yields only the id.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::CategoryNotFound`] when no category matches.
    pub fn resolve_id(&self, input: &str) -> Result<String, ReconcileError> {
        self.resolve(input)
            .map(|m| m.id)
            .ok_or_else(|| ReconcileError::CategoryNotFound(input.trim().to_string()))
    }

    fn to_match(&self, idx: usize, kind: MatchKind) -> CategoryMatch {
        let entry = &self.entries[idx];
        CategoryMatch {
            id: entry.id.clone(),
            name: entry.name.clone(),
            kind,
        }
    }
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
