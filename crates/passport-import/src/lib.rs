//! Client-side handling of bulk import spreadsheets.
//!
//! Everything here runs locally before (or instead of) a round trip to the
//! remote service: the downloadable template, a pre-flight validation that
//! mirrors the server's row rules, and the failed-row export.

pub mod error;
pub mod export;
pub mod schema;
pub mod validate;

pub use error::{HeaderMismatch, ImportError};
pub use export::{export_failed_rows, export_row_errors};
pub use schema::{
    check_headers, read_import, template_csv, ImportFile, ImportRow, CARE_CODES, ECO_CLAIMS,
    IMPORT_HEADERS,
};
pub use validate::{validate_rows, ValidationReport, Validator};
