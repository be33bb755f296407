//! Bulk import job command handlers for the CLI.
//!
//! Read-only commands page through a job's staging rows, errors and unmapped
//! values. `review` and `approve` go through [`passport_api::ImportReview`],
//! so a job is never approved while unmapped values are unresolved.

mod query;
mod review;

use std::path::PathBuf;

use clap::Subcommand;
use uuid::Uuid;

pub(crate) use query::{run_errors, run_preview, run_status, run_unmapped};
pub(crate) use review::{run_approve, run_cancel, run_review, ReviewOptions};

/// A `COLUMN:RAW=ENTITY_ID` selection passed with `--map`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub source_column: String,
    pub raw_value: String,
    pub entity_id: String,
}

pub(crate) fn parse_mapping(s: &str) -> Result<Mapping, String> {
    let (value, entity_id) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected COLUMN:RAW=ENTITY_ID, got '{s}'"))?;
    let (source_column, raw_value) = value
        .split_once(':')
        .ok_or_else(|| format!("expected COLUMN:RAW=ENTITY_ID, got '{s}'"))?;
    if source_column.trim().is_empty() || raw_value.is_empty() || entity_id.trim().is_empty() {
        return Err(format!("expected COLUMN:RAW=ENTITY_ID, got '{s}'"));
    }
    Ok(Mapping {
        source_column: source_column.trim().to_string(),
        raw_value: raw_value.to_string(),
        entity_id: entity_id.trim().to_string(),
    })
}

/// Sub-commands available under `import`.
#[derive(Debug, Subcommand)]
pub enum ImportCommands {
    /// Show a job's status and row counts
    Status {
        #[arg(long)]
        job: Uuid,
    },
    /// Show one page of staging rows
    Preview {
        #[arg(long)]
        job: Uuid,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one page of row errors, or export all of them
    Errors {
        #[arg(long)]
        job: Uuid,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Write every row error to this CSV file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List values not yet linked to catalog entities
    Unmapped {
        #[arg(long)]
        job: Uuid,
    },
    /// Resolve unmapped values and approve the job
    Review {
        #[arg(long)]
        job: Uuid,
        /// Link a value to an existing entity, as COLUMN:RAW=ENTITY_ID
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<Mapping>,
        /// Map unresolved categories to their closest catalog match
        #[arg(long)]
        auto_categories: bool,
        /// Create a catalog entity for every value still unresolved
        #[arg(long)]
        create_missing: bool,
        /// Print the plan without sending anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Approve a job whose unmapped values are all defined
    Approve {
        #[arg(long)]
        job: Uuid,
    },
    /// Cancel a job
    Cancel {
        #[arg(long)]
        job: Uuid,
    },
}

pub(crate) async fn run(command: ImportCommands, brand: Option<&str>) -> anyhow::Result<()> {
    let remote = crate::connect(brand)?;
    match command {
        ImportCommands::Status { job } => run_status(&remote, job).await,
        ImportCommands::Preview { job, page } => run_preview(&remote, job, page).await,
        ImportCommands::Errors { job, page, output } => {
            run_errors(&remote, job, page, output.as_deref()).await
        }
        ImportCommands::Unmapped { job } => run_unmapped(&remote, job).await,
        ImportCommands::Review {
            job,
            mappings,
            auto_categories,
            create_missing,
            dry_run,
        } => {
            let options = ReviewOptions {
                mappings,
                auto_categories,
                create_missing,
                dry_run,
            };
            run_review(&remote, job, &options).await
        }
        ImportCommands::Approve { job } => run_approve(&remote, job).await,
        ImportCommands::Cancel { job } => run_cancel(&remote, job).await,
    }
}
