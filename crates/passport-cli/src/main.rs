mod catalog;
mod categories;
mod import;
mod local;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use passport_api::{ApiError, PassportClient, ReviewError};
use passport_core::AppConfig;
use tracing_subscriber::EnvFilter;

use crate::catalog::CatalogCommands;
use crate::categories::CategoriesCommands;
use crate::import::ImportCommands;

#[derive(Debug, Parser)]
#[command(name = "passport")]
#[command(about = "Brand catalog import toolkit")]
struct Cli {
    /// Brand (tenant) to act for; overrides PASSPORT_BRAND_ID
    #[arg(long, global = true)]
    brand: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the bulk import CSV template
    Template {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check an import CSV locally before uploading it
    Validate {
        /// The CSV file to check
        file: PathBuf,
        /// Catalog snapshot (YAML) used to report unmapped values
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Write rows that failed validation to this CSV file
        #[arg(long)]
        failed_output: Option<PathBuf>,
        /// Maximum edit distance for fuzzy category matches
        #[arg(
            long,
            env = "PASSPORT_CATEGORY_MAX_DISTANCE",
            default_value_t = passport_core::DEFAULT_MAX_DISTANCE
        )]
        max_distance: usize,
    },
    /// Match and create catalog categories
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Work with the brand's catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Review and commit bulk import jobs
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
}

/// Configuration and API client for commands that talk to the service.
pub(crate) struct Remote {
    pub config: AppConfig,
    pub client: PassportClient,
}

/// Load configuration and build the API client. `brand` wins over
/// `PASSPORT_BRAND_ID`.
pub(crate) fn connect(brand: Option<&str>) -> anyhow::Result<Remote> {
    let mut config = passport_core::load_app_config().context("loading configuration")?;
    if let Some(brand) = brand {
        config.brand_id = Some(brand.to_string());
    }
    if config.brand_id.is_none() {
        tracing::warn!("no brand set; pass --brand or PASSPORT_BRAND_ID");
    }
    tracing::debug!(env = %config.env, api_url = %config.api_url, "loaded configuration");
    let client = PassportClient::new(&config).context("building API client")?;
    Ok(Remote { config, client })
}

fn init_tracing() -> anyhow::Result<()> {
    let level = std::env::var("PASSPORT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// The service's own wording for the first API failure in `err`'s chain.
fn api_failure_message(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|cause| {
            cause
                .downcast_ref::<ApiError>()
                .or_else(|| match cause.downcast_ref::<ReviewError>() {
                    Some(ReviewError::Api(api)) => Some(api),
                    _ => None,
                })
        })
        .map(ApiError::user_message)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    run(cli).await.map_err(|err| match api_failure_message(&err) {
        Some(message) => err.context(message),
        None => err,
    })
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let brand = cli.brand.as_deref();
    match cli.command {
        Commands::Template { output } => local::run_template(output.as_deref())?,
        Commands::Validate {
            file,
            catalog,
            failed_output,
            max_distance,
        } => local::run_validate(
            &file,
            catalog.as_deref(),
            failed_output.as_deref(),
            max_distance,
        )?,
        Commands::Categories { command } => categories::run(command, brand).await?,
        Commands::Catalog { command } => catalog::run(command, brand).await?,
        Commands::Import { command } => import::run(command, brand).await?,
    }

    Ok(())
}
