//! Commands that work on local files only and never call the service.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use passport_import::{export_failed_rows, read_import, template_csv, validate_rows};

/// Print the import template, or write it to `output`.
///
/// # Errors
///
/// Returns an error if the template cannot be rendered or written.
pub(crate) fn run_template(output: Option<&Path>) -> anyhow::Result<()> {
    let csv = template_csv()?;
    match output {
        Some(path) => {
            std::fs::write(path, csv)
                .with_context(|| format!("writing template to {}", path.display()))?;
            println!("template written to {}", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

/// Validate an import CSV and print every row error.
///
/// With `catalog`, values missing from the snapshot are listed as unmapped.
/// Fails when any row has an error so scripts can gate uploads on it.
///
/// # Errors
///
/// Returns an error if a file cannot be read or written, or if any row fails
/// validation.
pub(crate) fn run_validate(
    file: &Path,
    catalog: Option<&Path>,
    failed_output: Option<&Path>,
    max_distance: usize,
) -> anyhow::Result<()> {
    let reader = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let import = read_import(reader).with_context(|| format!("reading {}", file.display()))?;

    let snapshot = catalog
        .map(passport_core::load_catalog_snapshot)
        .transpose()
        .context("loading catalog snapshot")?;
    let report = validate_rows(&import, snapshot.as_ref(), max_distance);

    println!(
        "{} rows: {} valid, {} with errors",
        report.total_rows,
        report.valid_rows,
        report.error_rows().len()
    );
    for error in &report.errors {
        println!("  {error}");
    }

    if !report.unmapped.is_empty() {
        println!();
        println!("{:<18}{:<28}ROWS", "COLUMN", "VALUE");
        for value in &report.unmapped {
            let rows = value
                .affected_rows
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            println!("{:<18}{:<28}{rows}", value.source_column, value.raw_value);
        }
    }

    if let Some(path) = failed_output {
        if report.is_clean() {
            tracing::info!("no failed rows; skipping failed-row export");
        } else {
            let csv = export_failed_rows(&import, &report)?;
            std::fs::write(path, csv)
                .with_context(|| format!("writing failed rows to {}", path.display()))?;
            println!("failed rows written to {}", path.display());
        }
    }

    if !report.is_clean() {
        anyhow::bail!(
            "{} of {} rows failed validation",
            report.error_rows().len(),
            report.total_rows
        );
    }
    Ok(())
}
