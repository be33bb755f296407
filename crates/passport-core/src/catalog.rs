use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A node of a brand's category tree. Owned by the remote catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Kinds of catalog records a brand maintains and an import can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogEntityKind {
    Material,
    Color,
    Size,
    Facility,
    Manufacturer,
    Season,
    Certification,
    Category,
}

impl CatalogEntityKind {
    pub const ALL: [CatalogEntityKind; 8] = [
        CatalogEntityKind::Material,
        CatalogEntityKind::Color,
        CatalogEntityKind::Size,
        CatalogEntityKind::Facility,
        CatalogEntityKind::Manufacturer,
        CatalogEntityKind::Season,
        CatalogEntityKind::Certification,
        CatalogEntityKind::Category,
    ];

    /// The entity kind referenced by an import column, if any.
    #[must_use]
    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            "color_name" => Some(Self::Color),
            "size_name" => Some(Self::Size),
            "category_name" => Some(Self::Category),
            "season" => Some(Self::Season),
            "material_1_name" | "material_2_name" | "material_3_name" => Some(Self::Material),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Material => "material",
            Self::Color => "color",
            Self::Size => "size",
            Self::Facility => "facility",
            Self::Manufacturer => "manufacturer",
            Self::Season => "season",
            Self::Certification => "certification",
            Self::Category => "category",
        }
    }
}

impl std::fmt::Display for CatalogEntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CatalogEntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown catalog entity kind '{s}'"))
    }
}

/// A non-category catalog record (material, color, size, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: String,
    pub kind: CatalogEntityKind,
    pub name: String,
}

/// A spreadsheet value that is not yet linked to a catalog entity.
///
/// Created when the server validates a bulk import job. `is_defined` flips
/// once a mapping or creation succeeds; the value is discarded when the job
/// is cancelled or approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedValue {
    pub raw_value: String,
    pub source_column: String,
    /// 1-based data row numbers, in the order they were first seen.
    pub affected_rows: Vec<u32>,
    #[serde(default)]
    pub is_defined: bool,
}

impl UnmappedValue {
    #[must_use]
    pub fn new(source_column: &str, raw_value: &str) -> Self {
        Self {
            raw_value: raw_value.to_string(),
            source_column: source_column.to_string(),
            affected_rows: Vec::new(),
            is_defined: false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<CatalogEntityKind> {
        CatalogEntityKind::from_column(&self.source_column)
    }

    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (&self.source_column, &self.raw_value)
    }

    pub fn mark_defined(&mut self) {
        self.is_defined = true;
    }
}

/// A brand's categories and catalog entities, as stored in a local YAML file
/// or assembled from the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub entities: Vec<CatalogEntity>,
}

impl CatalogSnapshot {
    /// Whether an entity of `kind` is named `name`, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn has_entity_named(&self, kind: CatalogEntityKind, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        self.entities
            .iter()
            .any(|e| e.kind == kind && e.name.trim().to_lowercase() == needle)
    }

    #[must_use]
    pub fn entities_of(&self, kind: CatalogEntityKind) -> Vec<&CatalogEntity> {
        self.entities.iter().filter(|e| e.kind == kind).collect()
    }

    /// Renders a category as `Root / Child / Leaf`.
    ///
    /// Returns `None` for unknown ids. A parent cycle stops the walk at the
    /// first repeated id.
    #[must_use]
    pub fn category_path(&self, id: &str) -> Option<String> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.categories.iter().find(|c| c.id == id)?;
        loop {
            if !seen.insert(current.id.as_str()) {
                break;
            }
            names.push(current.name.as_str());
            let Some(parent_id) = current.parent_id.as_deref() else {
                break;
            };
            match self.categories.iter().find(|c| c.id == parent_id) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        names.reverse();
        Some(names.join(" / "))
    }
}

/// Load and validate a catalog snapshot from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog_snapshot(path: &Path) -> Result<CatalogSnapshot, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SnapshotIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let snapshot: CatalogSnapshot = serde_yaml::from_str(&content)?;

    validate_snapshot(&snapshot)?;

    Ok(snapshot)
}

/// Write a catalog snapshot as YAML, replacing `path`.
///
/// # Errors
///
/// Returns `ConfigError` if the snapshot is invalid or the file cannot be written.
pub fn save_catalog_snapshot(path: &Path, snapshot: &CatalogSnapshot) -> Result<(), ConfigError> {
    validate_snapshot(snapshot)?;
    let content = serde_yaml::to_string(snapshot)?;
    std::fs::write(path, content).map_err(|e| ConfigError::SnapshotIo {
        path: path.display().to_string(),
        source: e,
    })
}

fn validate_snapshot(snapshot: &CatalogSnapshot) -> Result<(), ConfigError> {
    let mut seen_categories = HashSet::new();
    for category in &snapshot.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' has an empty name",
                category.id
            )));
        }
        if !seen_categories.insert(category.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category id: '{}'",
                category.id
            )));
        }
    }

    let mut seen_entities = HashSet::new();
    for entity in &snapshot.entities {
        if entity.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} '{}' has an empty name",
                entity.kind, entity.id
            )));
        }
        if !seen_entities.insert((entity.kind, entity.id.as_str())) {
            return Err(ConfigError::Validation(format!(
                "duplicate {} id: '{}'",
                entity.kind, entity.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
