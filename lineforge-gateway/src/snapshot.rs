use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use lineforge_types::Record;
use serde::Deserialize;

/// A YAML snapshot of the read-only inventory the in-memory adapter serves.
///
/// Lets the CLI and integration tests resolve configured ad units and
/// placements without a live platform connection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InventorySnapshot {
    pub network: Option<Record>,
    pub user: Option<Record>,
    pub ad_units: Vec<Record>,
    pub placements: Vec<Record>,
}

/// Load an inventory snapshot from a YAML file.
pub fn load_snapshot(path: &Utf8Path) -> anyhow::Result<InventorySnapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read inventory snapshot {}", path))?;
    parse_snapshot(&contents).with_context(|| format!("parse inventory snapshot {}", path))
}

/// Parse a snapshot from a string.
pub fn parse_snapshot(contents: &str) -> anyhow::Result<InventorySnapshot> {
    serde_yaml::from_str(contents).context("invalid YAML")
}
