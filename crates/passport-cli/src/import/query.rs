use std::path::Path;

use anyhow::Context;
use passport_core::{ImportJob, RowStatus};
use uuid::Uuid;

use crate::Remote;

pub(crate) fn print_job(job: &ImportJob) {
    println!("Job:     {}", job.id);
    if let Some(name) = &job.file_name {
        println!("File:    {name}");
    }
    println!("Status:  {}", job.status);
    println!(
        "Rows:    {} total, {} valid, {} with errors",
        job.total_rows, job.valid_rows, job.error_rows
    );
    println!("Created: {}", job.created_at.format("%Y-%m-%d %H:%M UTC"));
}

/// # Errors
///
/// Returns an error if the status call fails.
pub(crate) async fn run_status(remote: &Remote, job_id: Uuid) -> anyhow::Result<()> {
    let job = remote
        .client
        .job_status(job_id)
        .await
        .with_context(|| format!("fetching status of job {job_id}"))?;
    print_job(&job);
    Ok(())
}

/// # Errors
///
/// Returns an error if the preview call fails.
pub(crate) async fn run_preview(remote: &Remote, job_id: Uuid, page: u32) -> anyhow::Result<()> {
    let rows = remote
        .client
        .preview(job_id, page, remote.config.page_size)
        .await
        .with_context(|| format!("fetching preview of job {job_id}"))?;

    println!("{:<7}{:<8}PRODUCT", "ROW", "STATUS");
    for row in &rows.items {
        let status = match row.status {
            RowStatus::Valid => "valid",
            RowStatus::Error => "error",
        };
        let product = row
            .data
            .get("product_name")
            .map_or("\u{2014}", String::as_str);
        println!("{:<7}{status:<8}{product}", row.row_number);
    }
    println!("page {} of {}", rows.page, rows.total_pages().max(1));
    Ok(())
}

/// Print one page of row errors, or with `output` write every page to CSV.
///
/// # Errors
///
/// Returns an error if an errors call fails or the file cannot be written.
pub(crate) async fn run_errors(
    remote: &Remote,
    job_id: Uuid,
    page: u32,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let page_size = remote.config.page_size;

    let Some(path) = output else {
        let errors = remote
            .client
            .errors(job_id, page, page_size)
            .await
            .with_context(|| format!("fetching errors of job {job_id}"))?;
        if errors.items.is_empty() {
            println!("no row errors");
            return Ok(());
        }
        for error in &errors.items {
            println!("{error}");
        }
        println!("page {} of {}", errors.page, errors.total_pages());
        return Ok(());
    };

    let all = remote
        .client
        .all_errors(job_id, page_size)
        .await
        .with_context(|| format!("fetching errors of job {job_id}"))?;

    let csv = passport_import::export_row_errors(&all)?;
    std::fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
    println!("{} row errors written to {}", all.len(), path.display());
    Ok(())
}

/// # Errors
///
/// Returns an error if the unmapped call fails.
pub(crate) async fn run_unmapped(remote: &Remote, job_id: Uuid) -> anyhow::Result<()> {
    let values = remote
        .client
        .list_unmapped(job_id)
        .await
        .with_context(|| format!("fetching unmapped values of job {job_id}"))?;

    if values.is_empty() {
        println!("no unmapped values");
        return Ok(());
    }
    println!("{:<18}{:<28}{:<9}ROWS", "COLUMN", "VALUE", "DEFINED");
    for value in &values {
        println!(
            "{:<18}{:<28}{:<9}{}",
            value.source_column,
            value.raw_value,
            if value.is_defined { "yes" } else { "no" },
            value.affected_rows.len()
        );
    }
    Ok(())
}
