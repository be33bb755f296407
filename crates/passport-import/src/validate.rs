//! Pre-flight validation of import rows.
//!
//! Mirrors the row rules the remote service applies when it validates a bulk
//! import job, so a file can be fixed before it is uploaded. Given a
//! [`CatalogSnapshot`], values that reference catalog entities the brand does
//! not have yet are collected as [`UnmappedValue`]s instead of errors.

use std::collections::{BTreeSet, HashMap};

use passport_core::{
    CatalogEntityKind, CatalogSnapshot, CategoryReconciler, ImportRowError, UnmappedValue,
};
use reqwest::Url;

use crate::schema::{ImportFile, ImportRow, CARE_CODES, ECO_CLAIMS};

pub const MAX_PRODUCT_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_MATERIAL_TOTAL: u32 = 100;

const NAME_PUNCTUATION: [char; 11] = [
    '-', '\'', '\u{2019}', '&', '.', ',', '/', '(', ')', '+', ':',
];

/// Columns whose values must exist in the brand's catalog.
const ENTITY_COLUMNS: [&str; 7] = [
    "category_name",
    "season",
    "color_name",
    "size_name",
    "material_1_name",
    "material_2_name",
    "material_3_name",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub total_rows: u32,
    /// Rows without any error. Unmapped values do not make a row invalid.
    pub valid_rows: u32,
    pub errors: Vec<ImportRowError>,
    pub unmapped: Vec<UnmappedValue>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Row numbers with at least one error, ascending.
    #[must_use]
    pub fn error_rows(&self) -> BTreeSet<u32> {
        self.errors.iter().map(|e| e.row_number).collect()
    }

    pub fn errors_for(&self, row_number: u32) -> impl Iterator<Item = &ImportRowError> {
        self.errors.iter().filter(move |e| e.row_number == row_number)
    }
}

/// Accumulates row checks across a file.
///
/// Duplicate detection needs every earlier row, so rows must be fed in file
/// order through [`Validator::check_row`].
#[derive(Debug, Default)]
pub struct Validator<'a> {
    catalog: Option<&'a CatalogSnapshot>,
    reconciler: Option<CategoryReconciler>,
    first_upid: HashMap<String, u32>,
    first_sku: HashMap<String, u32>,
    unmapped_index: HashMap<(String, String), usize>,
    report: ValidationReport,
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also reports values missing from `catalog`. Categories are matched with
    /// a [`CategoryReconciler`] using `max_distance`.
    #[must_use]
    pub fn with_catalog(catalog: &'a CatalogSnapshot, max_distance: usize) -> Self {
        Self {
            catalog: Some(catalog),
            reconciler: Some(
                CategoryReconciler::new(&catalog.categories).with_max_distance(max_distance),
            ),
            ..Self::default()
        }
    }

    pub fn check_row(&mut self, row_number: u32, row: &ImportRow) {
        let errors_before = self.report.errors.len();

        self.check_required(row_number, row);
        self.check_lengths(row_number, row);
        self.check_name_characters(row_number, row);
        self.check_duplicates(row_number, row);
        self.check_urls(row_number, row);
        self.check_materials(row_number, row);
        self.check_codes(row_number, row, "care_codes", &CARE_CODES, "care code");
        self.check_codes(row_number, row, "eco_claims", &ECO_CLAIMS, "eco claim");
        self.check_environment_score(row_number, row);
        self.collect_unmapped(row_number, row);

        self.report.total_rows += 1;
        if self.report.errors.len() == errors_before {
            self.report.valid_rows += 1;
        }
    }

    #[must_use]
    pub fn finish(self) -> ValidationReport {
        tracing::debug!(
            total_rows = self.report.total_rows,
            valid_rows = self.report.valid_rows,
            errors = self.report.errors.len(),
            unmapped = self.report.unmapped.len(),
            "validated import rows"
        );
        self.report
    }

    fn push(&mut self, row_number: u32, field: Option<&str>, message: String) {
        self.report.errors.push(ImportRowError {
            row_number,
            field: field.map(str::to_string),
            message,
        });
    }

    fn check_required(&mut self, row_number: u32, row: &ImportRow) {
        if row.field("product_name").is_none() {
            self.push(
                row_number,
                Some("product_name"),
                "product_name is required".to_string(),
            );
        }
        if row.field("upid").is_none() && row.field("sku").is_none() {
            self.push(
                row_number,
                Some("upid"),
                "either upid or sku is required".to_string(),
            );
        }
    }

    fn check_lengths(&mut self, row_number: u32, row: &ImportRow) {
        for (column, max) in [
            ("product_name", MAX_PRODUCT_NAME_LEN),
            ("description", MAX_DESCRIPTION_LEN),
        ] {
            let Some(value) = row.field(column) else {
                continue;
            };
            let len = value.chars().count();
            if len > max {
                self.push(
                    row_number,
                    Some(column),
                    format!("{column} exceeds {max} characters (got {len})"),
                );
            }
        }
    }

    fn check_name_characters(&mut self, row_number: u32, row: &ImportRow) {
        let Some(name) = row.field("product_name") else {
            return;
        };
        let mut rejected: Vec<char> = Vec::new();
        for c in name.chars() {
            if !is_name_char(c) && !rejected.contains(&c) {
                rejected.push(c);
            }
        }
        if !rejected.is_empty() {
            let shown: String = rejected.into_iter().collect();
            self.push(
                row_number,
                Some("product_name"),
                format!("product_name contains unsupported characters '{shown}'"),
            );
        }
    }

    fn check_duplicates(&mut self, row_number: u32, row: &ImportRow) {
        if let Some(upid) = row.field("upid") {
            if let Some(first) = self.first_upid.get(upid).copied() {
                self.push(
                    row_number,
                    Some("upid"),
                    format!("duplicate upid '{upid}' (first seen in row {first})"),
                );
            } else {
                self.first_upid.insert(upid.to_string(), row_number);
            }
        }
        if let Some(sku) = row.field("sku") {
            if let Some(first) = self.first_sku.get(sku).copied() {
                self.push(
                    row_number,
                    Some("sku"),
                    format!("duplicate sku '{sku}' (first seen in row {first})"),
                );
            } else {
                self.first_sku.insert(sku.to_string(), row_number);
            }
        }
    }

    fn check_urls(&mut self, row_number: u32, row: &ImportRow) {
        for column in ["primary_image_url", "product_image_url"] {
            let Some(value) = row.field(column) else {
                continue;
            };
            let valid = Url::parse(value)
                .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
            if !valid {
                self.push(
                    row_number,
                    Some(column),
                    format!("{column} must be an absolute http(s) URL, got '{value}'"),
                );
            }
        }
    }

    /// Percentages count only for named materials; a blend may not exceed 100.
    fn check_materials(&mut self, row_number: u32, row: &ImportRow) {
        let mut total: u32 = 0;
        let mut percentage_error = false;

        for (slot, name, percentage) in row.materials() {
            let (Some(_), Some(raw)) = (name, percentage) else {
                continue;
            };
            match raw.parse::<u8>() {
                Ok(pct) if pct <= 100 => total += u32::from(pct),
                _ => {
                    percentage_error = true;
                    let column = format!("material_{slot}_percentage");
                    self.push(
                        row_number,
                        Some(column.as_str()),
                        format!("{column} must be an integer between 0 and 100, got '{raw}'"),
                    );
                }
            }
        }

        if !percentage_error && total > MAX_MATERIAL_TOTAL {
            self.push(
                row_number,
                None,
                format!("material percentages sum to {total}, exceeding {MAX_MATERIAL_TOTAL}"),
            );
        }
    }

    fn check_codes(
        &mut self,
        row_number: u32,
        row: &ImportRow,
        column: &str,
        known: &[&str],
        label: &str,
    ) {
        let Some(value) = row.field(column) else {
            return;
        };
        let unknown: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty() && !known.contains(code))
            .collect();
        for code in unknown {
            self.push(row_number, Some(column), format!("unknown {label} '{code}'"));
        }
    }

    fn check_environment_score(&mut self, row_number: u32, row: &ImportRow) {
        let Some(raw) = row.field("environment_score") else {
            return;
        };
        if !raw.parse::<u8>().is_ok_and(|score| score <= 100) {
            self.push(
                row_number,
                Some("environment_score"),
                format!("environment_score must be an integer between 0 and 100, got '{raw}'"),
            );
        }
    }

    fn collect_unmapped(&mut self, row_number: u32, row: &ImportRow) {
        let Some(catalog) = self.catalog else {
            return;
        };

        for column in ENTITY_COLUMNS {
            let Some(value) = row.field(column) else {
                continue;
            };
            let Some(kind) = CatalogEntityKind::from_column(column) else {
                continue;
            };
            let known = if kind == CatalogEntityKind::Category {
                self.reconciler
                    .as_ref()
                    .is_some_and(|r| r.resolve(value).is_some())
            } else {
                catalog.has_entity_named(kind, value)
            };
            if known {
                continue;
            }

            let key = (column.to_string(), value.to_string());
            let idx = match self.unmapped_index.get(&key) {
                Some(&idx) => idx,
                None => {
                    self.report
                        .unmapped
                        .push(UnmappedValue::new(column, value));
                    let idx = self.report.unmapped.len() - 1;
                    self.unmapped_index.insert(key, idx);
                    idx
                }
            };
            let rows = &mut self.report.unmapped[idx].affected_rows;
            if rows.last() != Some(&row_number) {
                rows.push(row_number);
            }
        }
    }
}

/// Letters, digits, spaces and the punctuation found in garment names.
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == ' ' || NAME_PUNCTUATION.contains(&c)
}

/// Validates every row of `file` in order.
///
/// With `catalog`, values absent from the brand's catalog are reported as
/// unmapped; categories are matched within `max_distance` edits.
#[must_use]
pub fn validate_rows(
    file: &ImportFile,
    catalog: Option<&CatalogSnapshot>,
    max_distance: usize,
) -> ValidationReport {
    let mut validator = match catalog {
        Some(catalog) => Validator::with_catalog(catalog, max_distance),
        None => Validator::new(),
    };
    for (row_number, row) in file.numbered_rows() {
        validator.check_row(row_number, row);
    }
    validator.finish()
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
