//! Audit subprocess capability

use crate::error::{ReconcilerError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::process::Command;
use tracing::debug;

/// Phrase the audit tool prints when it has nothing to report
pub const NO_FINDINGS_PHRASE: &str = "No security vulnerability advisories found";

/// Advisory IDs reported by one machine-readable audit run, in report order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFindings {
    pub ids: Vec<String>,
}

impl AuditFindings {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Output of one human-readable audit run
#[derive(Debug, Clone)]
pub struct AuditSummary {
    pub text: String,
}

impl AuditSummary {
    pub fn from_output(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// True when the output is blank or reports zero findings
    pub fn is_clean(&self) -> bool {
        self.text.trim().is_empty()
            || self
                .text
                .to_lowercase()
                .contains(&NO_FINDINGS_PHRASE.to_lowercase())
    }
}

/// Source of audit results
///
/// Isolates the subprocess mechanics so handlers can be tested against
/// canned results, or the whole thing swapped for a library call.
pub trait AuditProvider {
    /// Advisory IDs currently reported against the installed dependencies
    fn findings(&self) -> Result<AuditFindings>;

    /// Human-readable audit summary
    fn summary(&self) -> Result<AuditSummary>;
}

/// [`AuditProvider`] shelling out to `<tool> audit --format=...`
///
/// Stdout and stderr are captured together. The exit status is deliberately
/// never inspected: the audit subcommand exits non-zero whenever advisories
/// exist, so only a spawn failure or blank output counts as unavailable.
pub struct CommandAuditProvider {
    tool: String,
}

impl CommandAuditProvider {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    fn run(&self, format: &str) -> Result<String> {
        debug!("Running {} audit --format={}", self.tool, format);
        let output = Command::new(&self.tool)
            .arg("audit")
            .arg(format!("--format={}", format))
            .output()
            .map_err(|e| {
                debug!("Failed to spawn {}: {}", self.tool, e);
                ReconcilerError::AuditUnavailable
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }
}

impl AuditProvider for CommandAuditProvider {
    fn findings(&self) -> Result<AuditFindings> {
        let output = self.run("json")?;
        if output.trim().is_empty() {
            return Err(ReconcilerError::AuditUnavailable);
        }
        parse_findings(&output)
    }

    fn summary(&self) -> Result<AuditSummary> {
        Ok(AuditSummary::from_output(self.run("summary")?))
    }
}

#[derive(Deserialize)]
struct AuditReport {
    #[serde(default)]
    advisories: Map<String, Value>,
}

/// Extract advisory IDs from the audit tool's JSON report
///
/// Only the key set of the top-level `advisories` mapping matters; the
/// advisory bodies are opaque. Key order follows the document.
fn parse_findings(output: &str) -> Result<AuditFindings> {
    let report: AuditReport =
        serde_json::from_str(output).map_err(ReconcilerError::AuditParse)?;
    Ok(AuditFindings {
        ids: report.advisories.keys().cloned().collect(),
    })
}
