use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;

/// Sub-commands available under `catalog`.
#[derive(Debug, Subcommand)]
pub enum CatalogCommands {
    /// Save the brand's categories and entities as a YAML snapshot
    Snapshot {
        #[arg(long)]
        output: PathBuf,
    },
}

pub(crate) async fn run(command: CatalogCommands, brand: Option<&str>) -> anyhow::Result<()> {
    match command {
        CatalogCommands::Snapshot { output } => {
            let remote = crate::connect(brand)?;
            let snapshot = remote
                .client
                .fetch_snapshot()
                .await
                .context("fetching catalog")?;
            passport_core::save_catalog_snapshot(&output, &snapshot)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "{} categories and {} entities written to {}",
                snapshot.categories.len(),
                snapshot.entities.len(),
                output.display()
            );
            Ok(())
        }
    }
}
