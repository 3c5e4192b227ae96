//! # composer_advisory_manager
//!
//! A dependency-manager plugin companion that keeps installs unblocked by
//! security advisories:
//! - **Non-blocking audits**: disables `audit.block-insecure` unless the user configured it explicitly
//! - **Advisory auto-ignore**: collects advisory IDs reported by the audit subcommand and persists them into `audit.ignore`
//! - **Visible summaries**: echoes the audit summary after install/update without ever failing the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use composer_advisory_manager::{
//!     AdvisoryReconciler, CommandAuditProvider, ConsoleSink, JsonConfigStore, LifecycleEvent,
//! };
//!
//! # fn main() -> composer_advisory_manager::Result<()> {
//! let mut store = JsonConfigStore::load("composer.json")?;
//! let mut sink = ConsoleSink;
//!
//! let mut reconciler = AdvisoryReconciler::new(CommandAuditProvider::new("composer"));
//! reconciler.handle(LifecycleEvent::PostUpdate, &mut store, &mut sink);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - Closed lifecycle-event enum with a static event-to-handler dispatch table
//! - Narrow host capabilities ([`HostConfig`], [`OutputSink`]) so the plugin can be embedded or tested with doubles
//! - [`AuditProvider`] seam isolating the audit subprocess mechanics
//! - Order-preserving, deduplicated ignore-list reconciliation
//! - CLI hook runner (`advisory-hook`) for script-based hosts

mod audit;
mod config;
mod error;
mod events;
mod host;
mod reconciler;

// Re-export public API
pub use audit::{
    AuditFindings, AuditProvider, AuditSummary, CommandAuditProvider, NO_FINDINGS_PHRASE,
};
pub use config::{union_ignored, AuditConfig};
pub use error::{ReconcilerError, Result};
pub use events::{Action, LifecycleEvent};
pub use host::{ConsoleSink, HostConfig, JsonConfigStore, OutputSink};
pub use reconciler::AdvisoryReconciler;
