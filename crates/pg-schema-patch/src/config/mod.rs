//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{PatchError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Seed value overrides: column name mapped to a literal SQL expression
/// that always replaces the fetched value.
pub type SeedOverrides = HashMap<String, String>;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

/// Load the per-table seed metadata array from a JSON file.
pub fn load_table_metadata<P: AsRef<Path>>(path: P) -> Result<Vec<TableMetadata>> {
    let content = std::fs::read_to_string(path)?;
    parse_table_metadata(&content)
}

/// Parse the per-table seed metadata array from a JSON string.
pub fn parse_table_metadata(json: &str) -> Result<Vec<TableMetadata>> {
    let entries: Vec<TableMetadata> = serde_json::from_str(json)?;
    for entry in &entries {
        if entry.compare_columns.is_empty() {
            return Err(PatchError::Config(format!(
                "table metadata for '{}' has no compareColumns",
                entry.table_name
            )));
        }
    }
    Ok(entries)
}

/// Load the seeding override map from a JSON file.
pub fn load_seed_overrides<P: AsRef<Path>>(path: P) -> Result<SeedOverrides> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Find the metadata entry for a table; the seed pipeline refuses to run
/// a table that has no entry.
pub fn metadata_for<'a>(
    entries: &'a [TableMetadata],
    table_name: &str,
) -> Result<&'a TableMetadata> {
    entries
        .iter()
        .find(|m| m.table_name == table_name)
        .ok_or_else(|| PatchError::MissingMetadata(table_name.to_string()))
}
