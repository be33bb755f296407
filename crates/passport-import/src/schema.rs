//! The bulk import spreadsheet layout.

use std::collections::HashSet;
use std::io::Read;

use serde::Deserialize;

use crate::error::{HeaderMismatch, ImportError};

/// Column headers of the import template, in template order.
pub const IMPORT_HEADERS: [&str; 19] = [
    "product_name",
    "upid",
    "sku",
    "description",
    "category_name",
    "season",
    "primary_image_url",
    "color_name",
    "size_name",
    "product_image_url",
    "material_1_name",
    "material_1_percentage",
    "material_2_name",
    "material_2_percentage",
    "material_3_name",
    "material_3_percentage",
    "care_codes",
    "eco_claims",
    "environment_score",
];

pub const CARE_CODES: [&str; 7] = [
    "MACHINE_WASH",
    "HAND_WASH",
    "DRY_CLEAN",
    "TUMBLE_DRY",
    "DO_NOT_BLEACH",
    "IRON_LOW_HEAT",
    "DO_NOT_IRON",
];

pub const ECO_CLAIMS: [&str; 8] = [
    "ORGANIC",
    "RECYCLED",
    "CARBON_NEUTRAL",
    "GOTS_CERTIFIED",
    "FAIR_TRADE",
    "OEKO_TEX",
    "BLUESIGN",
    "CRADLE_TO_CRADLE",
];

const TEMPLATE_EXAMPLE: [&str; 19] = [
    "Classic Cotton T-Shirt",
    "UPID-100001",
    "SKU-TSH-10001",
    "A comfortable and stylish t-shirt perfect for everyday wear.",
    "Men's / Tops / T-Shirts",
    "SS25",
    "https://cdn.example.com/products/product-100001.jpg",
    "Black",
    "M",
    "",
    "Cotton",
    "95",
    "Elastane",
    "5",
    "",
    "",
    "MACHINE_WASH,DO_NOT_BLEACH",
    "ORGANIC",
    "82",
];

/// One data row of an import file. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportRow {
    pub product_name: Option<String>,
    pub upid: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub category_name: Option<String>,
    pub season: Option<String>,
    pub primary_image_url: Option<String>,
    pub color_name: Option<String>,
    pub size_name: Option<String>,
    pub product_image_url: Option<String>,
    pub material_1_name: Option<String>,
    pub material_1_percentage: Option<String>,
    pub material_2_name: Option<String>,
    pub material_2_percentage: Option<String>,
    pub material_3_name: Option<String>,
    pub material_3_percentage: Option<String>,
    pub care_codes: Option<String>,
    pub eco_claims: Option<String>,
    pub environment_score: Option<String>,
}

impl ImportRow {
    /// Value of a template column, `None` for empty cells and unknown columns.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&str> {
        let value = match column {
            "product_name" => &self.product_name,
            "upid" => &self.upid,
            "sku" => &self.sku,
            "description" => &self.description,
            "category_name" => &self.category_name,
            "season" => &self.season,
            "primary_image_url" => &self.primary_image_url,
            "color_name" => &self.color_name,
            "size_name" => &self.size_name,
            "product_image_url" => &self.product_image_url,
            "material_1_name" => &self.material_1_name,
            "material_1_percentage" => &self.material_1_percentage,
            "material_2_name" => &self.material_2_name,
            "material_2_percentage" => &self.material_2_percentage,
            "material_3_name" => &self.material_3_name,
            "material_3_percentage" => &self.material_3_percentage,
            "care_codes" => &self.care_codes,
            "eco_claims" => &self.eco_claims,
            "environment_score" => &self.environment_score,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// All cells in template order, empty cells as `""`.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        IMPORT_HEADERS
            .iter()
            .map(|column| self.field(column).unwrap_or(""))
            .collect()
    }

    /// `(slot, name, percentage)` for the three material slots.
    #[must_use]
    pub fn materials(&self) -> [(u8, Option<&str>, Option<&str>); 3] {
        [
            (
                1,
                self.field("material_1_name"),
                self.field("material_1_percentage"),
            ),
            (
                2,
                self.field("material_2_name"),
                self.field("material_2_percentage"),
            ),
            (
                3,
                self.field("material_3_name"),
                self.field("material_3_percentage"),
            ),
        ]
    }
}

/// A parsed import file whose headers match the template.
#[derive(Debug, Clone, Default)]
pub struct ImportFile {
    /// Data rows; row number `n` is `rows[n - 1]`.
    pub rows: Vec<ImportRow>,
}

impl ImportFile {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows paired with their 1-based row numbers.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (u32, &ImportRow)> {
        (1u32..).zip(self.rows.iter())
    }
}

/// Compares a header row against [`IMPORT_HEADERS`].
///
/// Headers are trimmed and matched case-sensitively. A repeated header counts
/// as unexpected.
///
/// # Errors
///
/// Returns the [`HeaderMismatch`] when any column is missing or unexpected.
pub fn check_headers<'a, I>(headers: I) -> Result<(), HeaderMismatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut mismatch = HeaderMismatch::default();

    for header in headers {
        let header = header.trim();
        if !IMPORT_HEADERS.contains(&header) || !seen.insert(header) {
            mismatch.unexpected.push(header.to_string());
        }
    }

    mismatch.missing = IMPORT_HEADERS
        .iter()
        .filter(|h| !seen.contains(*h))
        .map(|h| (*h).to_string())
        .collect();

    if mismatch.is_empty() {
        Ok(())
    } else {
        Err(mismatch)
    }
}

/// Reads an import file, checking headers before any row is parsed.
///
/// Cells are trimmed. Columns may appear in any order.
///
/// # Errors
///
/// - [`ImportError::Headers`] when the header row does not match the template.
/// - [`ImportError::Csv`] on malformed CSV, including rows whose field count
///   differs from the header row.
pub fn read_import<R: Read>(reader: R) -> Result<ImportFile, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    check_headers(headers.iter()).map_err(ImportError::Headers)?;

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row: ImportRow = record.deserialize(Some(&headers))?;
        rows.push(row);
    }

    tracing::debug!(rows = rows.len(), "read import file");
    Ok(ImportFile { rows })
}

/// Builds the downloadable import template: the header row and one example.
///
/// # Errors
///
/// Returns [`ImportError`] if the CSV writer fails to flush.
pub fn template_csv() -> Result<String, ImportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(IMPORT_HEADERS)?;
    writer.write_record(TEMPLATE_EXAMPLE)?;
    let bytes = writer.into_inner().map_err(csv::IntoInnerError::into_error)?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
