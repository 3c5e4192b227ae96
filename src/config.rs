//! Typed view of the host's `audit` configuration section

use serde_json::{Map, Value};

/// The `audit` section of the host package manager configuration
///
/// `block_insecure` is tri-state: `None` means the user never configured the
/// setting, while `Some(_)` is an explicit choice that must not be
/// overridden. Key presence in the section is what marks a value as
/// configured, so any present value maps to `Some(..)` regardless of type.
///
/// Keys of the section this plugin does not manage are carried in `extra`
/// so a section-level merge never drops them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditConfig {
    /// Whether the host aborts install/update on un-ignored advisories
    pub block_insecure: Option<bool>,
    /// Advisory IDs exempted from audit blocking, insertion order preserved
    pub ignore: Vec<String>,
    /// Unmanaged keys of the `audit` section, passed through untouched
    pub extra: Map<String, Value>,
}

impl AuditConfig {
    /// Build the typed view from the raw `audit` section
    pub fn from_section(section: &Map<String, Value>) -> Self {
        let mut extra = section.clone();
        let block_insecure = extra
            .remove("block-insecure")
            .map(|value| value.as_bool().unwrap_or(false));
        let ignore = match extra.remove("ignore") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        };

        Self {
            block_insecure,
            ignore,
            extra,
        }
    }

    /// Render the section back into the raw form the host stores
    pub fn to_section(&self) -> Map<String, Value> {
        let mut section = self.extra.clone();
        if let Some(block) = self.block_insecure {
            section.insert("block-insecure".to_string(), Value::Bool(block));
        }
        if !self.ignore.is_empty() {
            section.insert(
                "ignore".to_string(),
                Value::Array(self.ignore.iter().cloned().map(Value::String).collect()),
            );
        }
        section
    }
}

/// Union of the current ignore list and newly reported advisory IDs
///
/// Existing order is preserved and genuinely new IDs are appended in the
/// order first encountered; duplicates (including pre-existing ones) are
/// dropped.
pub fn union_ignored(existing: &[String], found: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + found.len());
    for id in existing.iter().chain(found) {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    merged
}
