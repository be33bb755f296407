//! Category matching and creation.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use passport_core::{CatalogSnapshot, CategoryReconciler, MatchKind, ReconcileError};

/// Sub-commands available under `categories`.
#[derive(Debug, Subcommand)]
pub enum CategoriesCommands {
    /// Resolve a category path or id to a catalog category
    Match {
        /// Category id, name, or path such as "Men's / Tops / T-Shirts"
        input: String,
        /// Match against a catalog snapshot instead of the live catalog
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Maximum edit distance for fuzzy matches
        #[arg(long, env = "PASSPORT_CATEGORY_MAX_DISTANCE")]
        max_distance: Option<usize>,
    },
    /// Find or create a category by name
    Ensure {
        name: String,
        /// Parent category id
        #[arg(long)]
        parent: Option<String>,
    },
}

pub(crate) async fn run(command: CategoriesCommands, brand: Option<&str>) -> anyhow::Result<()> {
    match command {
        CategoriesCommands::Match {
            input,
            catalog,
            max_distance,
        } => run_match(&input, catalog.as_deref(), max_distance, brand).await,
        CategoriesCommands::Ensure { name, parent } => {
            let remote = crate::connect(brand)?;
            let category = remote
                .client
                .ensure_category(&name, parent.as_deref())
                .await
                .with_context(|| format!("ensuring category '{name}'"))?;
            println!("{}\t{}", category.id, category.name);
            Ok(())
        }
    }
}

async fn run_match(
    input: &str,
    catalog: Option<&std::path::Path>,
    max_distance: Option<usize>,
    brand: Option<&str>,
) -> anyhow::Result<()> {
    let (snapshot, max_distance) = match catalog {
        Some(path) => (
            passport_core::load_catalog_snapshot(path).context("loading catalog snapshot")?,
            max_distance.unwrap_or(passport_core::DEFAULT_MAX_DISTANCE),
        ),
        None => {
            let remote = crate::connect(brand)?;
            let categories = remote
                .client
                .list_categories()
                .await
                .context("listing categories")?;
            (
                CatalogSnapshot {
                    categories,
                    entities: Vec::new(),
                },
                max_distance.unwrap_or(remote.config.category_max_distance),
            )
        }
    };

    let reconciler = CategoryReconciler::new(&snapshot.categories).with_max_distance(max_distance);
    let Some(found) = reconciler.resolve(input) else {
        return Err(ReconcileError::CategoryNotFound(input.trim().to_string()).into());
    };

    let how = match found.kind {
        MatchKind::Id => "id".to_string(),
        MatchKind::Exact => "exact".to_string(),
        MatchKind::Fuzzy { distance } => format!("fuzzy, distance {distance}"),
    };
    let path = snapshot
        .category_path(&found.id)
        .unwrap_or_else(|| found.name.clone());
    println!("{}\t{path}\t({how})", found.id);
    Ok(())
}
