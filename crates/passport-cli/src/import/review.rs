use anyhow::Context;
use passport_api::{ImportReview, PassportClient, Resolution};
use passport_core::CategoryReconciler;
use uuid::Uuid;

use super::query::print_job;
use super::Mapping;
use crate::Remote;

#[derive(Debug, Default)]
pub(crate) struct ReviewOptions {
    pub mappings: Vec<Mapping>,
    pub auto_categories: bool,
    pub create_missing: bool,
    pub dry_run: bool,
}

fn print_plan(review: &ImportReview<'_, PassportClient>) {
    let open: Vec<_> = review.unmapped().iter().filter(|v| !v.is_defined).collect();
    if open.is_empty() {
        println!("no unmapped values to resolve");
        return;
    }
    println!("{:<18}{:<28}ACTION", "COLUMN", "VALUE");
    for value in open {
        let action = match review.resolution(&value.source_column, &value.raw_value) {
            Some(Resolution::Map { entity_id }) => format!("map to {entity_id}"),
            Some(Resolution::Create { name }) => format!("create '{name}'"),
            None => "UNRESOLVED".to_string(),
        };
        println!("{:<18}{:<28}{action}", value.source_column, value.raw_value);
    }
}

/// Resolve a job's unmapped values from the command line and commit it.
///
/// Explicit `--map` selections are applied first; `--auto-categories` then
/// proposes category matches and `--create-missing` marks whatever is left
/// for creation.
///
/// # Errors
///
/// Returns an error if the job cannot be reviewed, a selection names an
/// unknown value, values remain unresolved, or commit fails.
pub(crate) async fn run_review(
    remote: &Remote,
    job_id: Uuid,
    options: &ReviewOptions,
) -> anyhow::Result<()> {
    let mut review = ImportReview::load(&remote.client, job_id, remote.config.page_size)
        .await
        .with_context(|| format!("loading job {job_id} for review"))?;
    print_job(review.job());
    println!();

    for mapping in &options.mappings {
        review.map_value(
            &mapping.source_column,
            &mapping.raw_value,
            &mapping.entity_id,
        )?;
    }

    let has_open_categories = review
        .unresolved()
        .iter()
        .any(|v| v.source_column == "category_name");
    if options.auto_categories && has_open_categories {
        let categories = remote
            .client
            .list_categories()
            .await
            .context("listing categories")?;
        let reconciler = CategoryReconciler::new(&categories)
            .with_max_distance(remote.config.category_max_distance);
        let proposed = review.auto_resolve_categories(&reconciler)?;
        tracing::info!(proposed, "matched categories automatically");
    }

    if options.create_missing {
        let marked = review.create_all_unresolved()?;
        tracing::info!(marked, "marked unresolved values for creation");
    }

    print_plan(&review);

    if options.dry_run {
        println!();
        println!("dry run: nothing was sent");
        return Ok(());
    }

    let job = review.commit().await.context("committing import")?;
    println!();
    println!("job {} is now {}", job.id, job.status);
    Ok(())
}

/// Approve a job whose unmapped values are already defined.
///
/// # Errors
///
/// Returns an error if the job cannot be reviewed, values remain unresolved,
/// or approval fails.
pub(crate) async fn run_approve(remote: &Remote, job_id: Uuid) -> anyhow::Result<()> {
    run_review(remote, job_id, &ReviewOptions::default()).await
}

/// # Errors
///
/// Returns an error if the job is already closed or the cancel call fails.
pub(crate) async fn run_cancel(remote: &Remote, job_id: Uuid) -> anyhow::Result<()> {
    let job = remote
        .client
        .job_status(job_id)
        .await
        .with_context(|| format!("fetching status of job {job_id}"))?;
    if job.status.is_terminal() {
        anyhow::bail!("job {job_id} is already {}", job.status);
    }
    let job = remote
        .client
        .cancel(job_id)
        .await
        .with_context(|| format!("cancelling job {job_id}"))?;
    println!("job {} is now {}", job.id, job.status);
    Ok(())
}
