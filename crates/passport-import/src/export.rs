//! CSV downloads built locally, without a server round trip.

use passport_core::ImportRowError;

use crate::error::ImportError;
use crate::schema::{ImportFile, IMPORT_HEADERS};
use crate::validate::ValidationReport;

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ImportError> {
    let bytes = writer
        .into_inner()
        .map_err(csv::IntoInnerError::into_error)?;
    Ok(String::from_utf8(bytes)?)
}

/// Re-emits every row of `file` that has at least one error in `report`.
///
/// The output keeps the template columns, so it can be corrected and uploaded
/// again, and appends `row_number` and `errors` (messages joined by `"; "`).
///
/// # Errors
///
/// Returns [`ImportError`] if the CSV writer fails.
pub fn export_failed_rows(
    file: &ImportFile,
    report: &ValidationReport,
) -> Result<String, ImportError> {
    let failed = report.error_rows();
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = IMPORT_HEADERS.to_vec();
    header.extend(["row_number", "errors"]);
    writer.write_record(&header)?;

    for (row_number, row) in file.numbered_rows() {
        if !failed.contains(&row_number) {
            continue;
        }
        let errors = report
            .errors_for(row_number)
            .map(|e| match &e.field {
                Some(field) => format!("{field}: {}", e.message),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        let number = row_number.to_string();

        let mut record = row.values();
        record.push(&number);
        record.push(&errors);
        writer.write_record(&record)?;
    }

    finish(writer)
}

/// Server-reported row errors as `row_number,field,message` CSV.
///
/// # Errors
///
/// Returns [`ImportError`] if the CSV writer fails.
pub fn export_row_errors(errors: &[ImportRowError]) -> Result<String, ImportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["row_number", "field", "message"])?;
    for error in errors {
        writer.write_record([
            error.row_number.to_string().as_str(),
            error.field.as_deref().unwrap_or(""),
            error.message.as_str(),
        ])?;
    }
    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{read_import, ImportRow};
    use crate::validate::validate_rows;

    fn sample_file() -> ImportFile {
        ImportFile {
            rows: vec![
                ImportRow {
                    product_name: Some("Tee".into()),
                    upid: Some("UPID-1".into()),
                    ..ImportRow::default()
                },
                ImportRow {
                    upid: Some("UPID-1".into()),
                    description: Some("Soft, \"heavy\" cotton".into()),
                    ..ImportRow::default()
                },
            ],
        }
    }

    #[test]
    fn exports_only_failed_rows_with_joined_errors() {
        let file = sample_file();
        let report = validate_rows(&file, None, 2);
        let csv = export_failed_rows(&file, &report).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), IMPORT_HEADERS.len() + 2);
        assert_eq!(&headers[19], "row_number");
        assert_eq!(&headers[20], "errors");

        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][19], "2");
        assert_eq!(
            &records[0][20],
            "product_name: product_name is required; upid: duplicate upid 'UPID-1' (first seen in row 1)"
        );
        assert_eq!(&records[0][3], "Soft, \"heavy\" cotton");
    }

    #[test]
    fn exported_rows_can_be_read_back_as_import_rows() {
        let file = sample_file();
        let report = validate_rows(&file, None, 2);
        let csv = export_failed_rows(&file, &report).unwrap();

        // Extra columns are rejected by the importer, so strip them first.
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(IMPORT_HEADERS).unwrap();
        for record in reader.records() {
            let record = record.unwrap();
            writer
                .write_record(record.iter().take(IMPORT_HEADERS.len()))
                .unwrap();
        }
        let stripped = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let reread = read_import(stripped.as_bytes()).unwrap();
        assert_eq!(reread.rows, vec![file.rows[1].clone()]);
    }

    #[test]
    fn clean_report_exports_header_only() {
        let file = ImportFile {
            rows: vec![ImportRow {
                product_name: Some("Tee".into()),
                sku: Some("SKU-1".into()),
                ..ImportRow::default()
            }],
        };
        let report = validate_rows(&file, None, 2);
        let csv = export_failed_rows(&file, &report).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn row_errors_export_leaves_missing_field_blank() {
        let errors = vec![
            ImportRowError {
                row_number: 7,
                field: None,
                message: "row could not be parsed".into(),
            },
            ImportRowError {
                row_number: 9,
                field: Some("sku".into()),
                message: "duplicate".into(),
            },
        ];
        let csv = export_row_errors(&errors).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "row_number,field,message",
                "7,,row could not be parsed",
                "9,sku,duplicate"
            ]
        );
    }
}
