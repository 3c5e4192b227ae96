//! Narrow capabilities onto the host package manager

use crate::error::{ReconcilerError, Result};
use colored::Colorize;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Live configuration accessor plus durable config-source writer
///
/// `get`/`merge` operate on the host's in-memory configuration; only
/// `add_config_setting` reaches the on-disk store. The host serializes hook
/// execution, so implementations do not need interior locking.
pub trait HostConfig {
    /// Current contents of one configuration section
    fn get(&self, section: &str) -> Map<String, Value>;

    /// Shallow-merge values into the live view of a section
    fn merge(&mut self, section: &str, values: Map<String, Value>);

    /// Write one dotted-path setting through to the durable config source
    fn add_config_setting(&mut self, dotted_key: &str, value: Value) -> Result<()>;
}

/// Leveled console output, written to the error stream so it never mixes
/// with the host's own stdout
pub trait OutputSink {
    fn info(&mut self, message: &str);
    fn warning(&mut self, message: &str);
    fn plain(&mut self, message: &str);
}

/// File-backed [`HostConfig`] over a `composer.json`-style manifest
///
/// The live view mirrors the manifest's top-level `config` object. Merges
/// stay in memory; `add_config_setting` rewrites the manifest in place,
/// creating intermediate objects along the dotted path. Unrelated manifest
/// keys are never touched.
pub struct JsonConfigStore {
    path: PathBuf,
    manifest: Map<String, Value>,
    live: Map<String, Value>,
}

impl JsonConfigStore {
    /// Load the manifest at `path`
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = fs::read_to_string(&path)?;
        let manifest = match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => map,
            _ => {
                return Err(ReconcilerError::config(format!(
                    "manifest {} is not a JSON object",
                    path.display()
                )))
            }
        };
        let live = manifest
            .get("config")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        debug!("Loaded manifest from {}", path.display());
        Ok(Self {
            path,
            manifest,
            live,
        })
    }

    /// Path of the backing manifest file
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn write_manifest(&self) -> Result<()> {
        let mut rendered = serde_json::to_string_pretty(&self.manifest)?;
        rendered.push('\n');
        fs::write(&self.path, rendered)?;
        debug!("Rewrote manifest at {}", self.path.display());
        Ok(())
    }
}

impl HostConfig for JsonConfigStore {
    fn get(&self, section: &str) -> Map<String, Value> {
        self.live
            .get(section)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    fn merge(&mut self, section: &str, values: Map<String, Value>) {
        shallow_merge(&mut self.live, section, values);
    }

    fn add_config_setting(&mut self, dotted_key: &str, value: Value) -> Result<()> {
        let mut parts: Vec<&str> = dotted_key.split('.').collect();
        let leaf = match parts.pop() {
            Some(leaf) if !leaf.is_empty() => leaf,
            _ => {
                return Err(ReconcilerError::config(format!(
                    "invalid configuration key: {:?}",
                    dotted_key
                )))
            }
        };

        let config = ensure_object(
            self.manifest
                .entry("config")
                .or_insert_with(|| Value::Object(Map::new())),
        );
        let mut cursor = config;
        for part in parts {
            let slot = cursor
                .entry(part)
                .or_insert_with(|| Value::Object(Map::new()));
            cursor = ensure_object(slot);
        }
        cursor.insert(leaf.to_string(), value);

        self.write_manifest()
    }
}

/// Console sink writing colored leveled messages to stderr
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn info(&mut self, message: &str) {
        eprintln!("{}", message.cyan());
    }

    fn warning(&mut self, message: &str) {
        eprintln!("{}", message.yellow());
    }

    fn plain(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

fn shallow_merge(live: &mut Map<String, Value>, section: &str, values: Map<String, Value>) {
    let slot = live
        .entry(section)
        .or_insert_with(|| Value::Object(Map::new()));
    match slot.as_object_mut() {
        Some(existing) => {
            for (key, value) in values {
                existing.insert(key, value);
            }
        }
        None => *slot = Value::Object(values),
    }
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just made an object"),
    }
}
