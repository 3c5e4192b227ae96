//! Lifecycle handlers that keep installs unblocked by advisories

use crate::audit::AuditProvider;
use crate::config::{union_ignored, AuditConfig};
use crate::error::ReconcilerError;
use crate::events::{Action, LifecycleEvent};
use crate::host::{HostConfig, OutputSink};
use serde_json::json;
use tracing::debug;

/// Prefix on every console message so hook output is attributable
const TAG: &str = "[advisory-manager]";

/// Configuration section this component manages
const AUDIT_SECTION: &str = "audit";

/// Runs the handlers registered for each lifecycle event
///
/// Constructed once per process; the remediation notice is shown at most
/// once per instance. Every handler is an independent, idempotent
/// transaction over the host's `audit` section, and no failure is ever
/// raised to the caller: each degrades to a sink message so the host's
/// install/update always continues.
pub struct AdvisoryReconciler<P> {
    provider: P,
    remediation_shown: bool,
}

impl<P: AuditProvider> AdvisoryReconciler<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            remediation_shown: false,
        }
    }

    /// Run the handlers registered for `event`, in registration order
    pub fn handle(
        &mut self,
        event: LifecycleEvent,
        host: &mut dyn HostConfig,
        sink: &mut dyn OutputSink,
    ) {
        debug!("Handling lifecycle event: {}", event);
        for action in event.actions() {
            match action {
                Action::ActivateNonBlocking => self.activate_non_blocking(host, sink),
                Action::DisableAuditBlock => self.disable_audit_block(host, sink),
                Action::AppendIgnoredAdvisories => self.append_ignored_advisories(host, sink),
                Action::DisplayAuditSummary => self.display_audit_summary(sink),
            }
        }
    }

    /// Turn off audit blocking at activation, before any command runs
    fn activate_non_blocking(&mut self, host: &mut dyn HostConfig, sink: &mut dyn OutputSink) {
        if !disable_blocking(host) {
            return;
        }
        sink.info(&format!(
            "{} Automatically disabled audit blocking to allow installation. \
             This setting is managed by the plugin going forward.",
            TAG
        ));
    }

    /// Turn off audit blocking before an install/update runs
    fn disable_audit_block(&mut self, host: &mut dyn HostConfig, sink: &mut dyn OutputSink) {
        if !disable_blocking(host) {
            return;
        }
        sink.warning(&format!(
            "{} Security advisories were blocking install/update. \
             For continuity, audit.block-insecure has been automatically disabled. \
             To re-enable strict auditing, set \"block-insecure\": true under config.audit.",
            TAG
        ));
        self.print_remediation(sink);
    }

    /// One-shot upgrade recommendation, shown after the first disable
    fn print_remediation(&mut self, sink: &mut dyn OutputSink) {
        if self.remediation_shown {
            return;
        }
        self.remediation_shown = true;

        sink.plain("");
        sink.info(&format!("{} Recommended remediation:", TAG));
        sink.plain("The dependency manager encountered blocked packages due to security advisories.");
        sink.plain("Plan to upgrade the affected packages so the advisory ignore list can be removed.");
        sink.plain("Common example upgrades:");
        sink.plain("  - twig/twig to ^3.22");
        sink.plain("  - symfony/process to ^5.4.47");
        sink.plain("  - consolidation/robo to the latest compatible release");
        sink.plain("This keeps your build unblocked now, but it does not replace patching.");
        sink.plain("");
    }

    /// Collect advisory IDs from the audit and persist them into the
    /// ignore list
    ///
    /// Every failure mode is a soft stop: the reason is reported through the
    /// sink and nothing is partially persisted.
    fn append_ignored_advisories(&mut self, host: &mut dyn HostConfig, sink: &mut dyn OutputSink) {
        sink.info(&format!(
            "{} Running the audit to detect new advisories to ignore...",
            TAG
        ));

        let findings = match self.provider.findings() {
            Ok(findings) => findings,
            Err(ReconcilerError::AuditUnavailable) => {
                sink.warning(&format!(
                    "{} Could not get audit results, skipping advisory auto-ignore.",
                    TAG
                ));
                return;
            }
            Err(ReconcilerError::AuditParse(_)) => {
                sink.warning(&format!(
                    "{} Could not parse audit JSON, skipping advisory auto-ignore.",
                    TAG
                ));
                return;
            }
            Err(e) => {
                sink.warning(&format!(
                    "{} Audit failed ({}), skipping advisory auto-ignore.",
                    TAG, e
                ));
                return;
            }
        };

        if findings.is_empty() {
            sink.info(&format!("{} No security advisories detected.", TAG));
            return;
        }

        let mut config = AuditConfig::from_section(&host.get(AUDIT_SECTION));
        let merged = union_ignored(&config.ignore, &findings.ids);
        if merged == config.ignore {
            sink.info(&format!("{} Advisory IDs already ignored.", TAG));
            return;
        }

        let added: Vec<String> = merged
            .iter()
            .filter(|id| !config.ignore.contains(id))
            .cloned()
            .collect();
        config.ignore = merged;

        host.merge(AUDIT_SECTION, config.to_section());
        if let Err(e) = host.add_config_setting("audit.ignore", json!(config.ignore)) {
            sink.warning(&format!(
                "{} Could not persist the ignore list ({}), it will be rebuilt on the next update.",
                TAG, e
            ));
            return;
        }

        for id in &added {
            sink.info(&format!("{} Added advisory ID to ignore list: {}", TAG, id));
        }
    }

    /// Echo the audit summary after install/update without failing the run
    fn display_audit_summary(&mut self, sink: &mut dyn OutputSink) {
        let summary = match self.provider.summary() {
            Ok(summary) => summary,
            Err(e) => {
                debug!("Audit summary unavailable: {}", e);
                return;
            }
        };
        if summary.is_clean() {
            return;
        }

        sink.plain("");
        sink.warning("╔═══════════════════════════════════════════════════════════════╗");
        sink.warning("║  SECURITY ADVISORIES DETECTED (non-blocking)                  ║");
        sink.warning("╚═══════════════════════════════════════════════════════════════╝");
        sink.plain("");

        for line in summary.text.lines() {
            if !line.trim().is_empty() {
                sink.plain(&format!("  {}", line));
            }
        }

        sink.plain("");
        sink.info("These advisories have been auto-ignored to allow builds to continue.");
        sink.info("Run the audit subcommand for full details.");
        sink.info("Please plan to upgrade affected packages as soon as possible.");
        sink.plain("");
    }
}

/// Set `block-insecure` to `false` unless the user configured it, returning
/// whether blocking was actually turned off
fn disable_blocking(host: &mut dyn HostConfig) -> bool {
    let mut config = AuditConfig::from_section(&host.get(AUDIT_SECTION));
    if config.block_insecure.is_some() {
        debug!("audit.block-insecure already configured, respecting it");
        return false;
    }
    config.block_insecure = Some(false);
    host.merge(AUDIT_SECTION, config.to_section());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFindings, AuditSummary};
    use crate::error::Result;
    use crate::host::doubles::{MemoryConfig, RecordingSink, SinkLevel};
    use serde_json::{json, Value};

    enum FakeFindings {
        Ids(Vec<&'static str>),
        Unavailable,
        Malformed,
    }

    struct FakeAudit {
        findings: FakeFindings,
        summary: &'static str,
    }

    impl FakeAudit {
        fn with_ids(ids: &[&'static str]) -> Self {
            Self {
                findings: FakeFindings::Ids(ids.to_vec()),
                summary: "Found 1 security vulnerability advisory affecting 1 package",
            }
        }

        fn clean() -> Self {
            Self {
                findings: FakeFindings::Ids(Vec::new()),
                summary: "No security vulnerability advisories found",
            }
        }
    }

    impl AuditProvider for FakeAudit {
        fn findings(&self) -> Result<AuditFindings> {
            match &self.findings {
                FakeFindings::Ids(ids) => Ok(AuditFindings {
                    ids: ids.iter().map(|id| id.to_string()).collect(),
                }),
                FakeFindings::Unavailable => Err(ReconcilerError::AuditUnavailable),
                FakeFindings::Malformed => Err(ReconcilerError::AuditParse(
                    serde_json::from_str::<Value>("{").unwrap_err(),
                )),
            }
        }

        fn summary(&self) -> Result<AuditSummary> {
            Ok(AuditSummary::from_output(self.summary))
        }
    }

    fn audit_section(host: &MemoryConfig) -> serde_json::Map<String, Value> {
        host.get(AUDIT_SECTION)
    }

    #[test]
    fn test_disable_sets_block_insecure_exactly_once() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::clean());

        reconciler.handle(LifecycleEvent::PreInstall, &mut host, &mut sink);
        assert_eq!(
            audit_section(&host).get("block-insecure"),
            Some(&json!(false))
        );
        assert_eq!(sink.count("block-insecure has been automatically disabled"), 1);

        // Now Some(false): the second call is a pure no-op
        reconciler.handle(LifecycleEvent::PreUpdate, &mut host, &mut sink);
        assert_eq!(
            audit_section(&host).get("block-insecure"),
            Some(&json!(false))
        );
        assert_eq!(sink.count("block-insecure has been automatically disabled"), 1);
    }

    #[test]
    fn test_disable_respects_explicit_user_choice() {
        for explicit in [true, false] {
            let mut host = MemoryConfig::with_section(
                AUDIT_SECTION,
                json!({ "block-insecure": explicit }),
            );
            let mut sink = RecordingSink::default();
            let mut reconciler = AdvisoryReconciler::new(FakeAudit::clean());

            reconciler.handle(LifecycleEvent::PreInstall, &mut host, &mut sink);
            assert_eq!(
                audit_section(&host).get("block-insecure"),
                Some(&json!(explicit))
            );
            assert!(sink.lines.is_empty());
        }
    }

    #[test]
    fn test_remediation_notice_shown_at_most_once() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::clean());

        reconciler.handle(LifecycleEvent::PreInstall, &mut host, &mut sink);
        assert_eq!(sink.count("Recommended remediation"), 1);

        // Force a second disable by clearing the section
        host.sections.remove(AUDIT_SECTION);
        reconciler.handle(LifecycleEvent::PreUpdate, &mut host, &mut sink);
        assert_eq!(sink.count("block-insecure has been automatically disabled"), 2);
        assert_eq!(sink.count("Recommended remediation"), 1);
    }

    #[test]
    fn test_activation_message_differs_and_skips_remediation() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::clean());

        reconciler.handle(LifecycleEvent::Activate, &mut host, &mut sink);
        assert_eq!(
            audit_section(&host).get("block-insecure"),
            Some(&json!(false))
        );
        assert_eq!(sink.count("Automatically disabled audit blocking"), 1);
        assert_eq!(sink.count("Recommended remediation"), 0);

        reconciler.handle(LifecycleEvent::Activate, &mut host, &mut sink);
        assert_eq!(sink.count("Automatically disabled audit blocking"), 1);
    }

    #[test]
    fn test_append_merges_new_ids_in_order() {
        let mut host = MemoryConfig::with_section(
            AUDIT_SECTION,
            json!({ "ignore": ["CVE-1"] }),
        );
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::with_ids(&["CVE-1", "CVE-2"]));

        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);

        assert_eq!(
            audit_section(&host).get("ignore"),
            Some(&json!(["CVE-1", "CVE-2"]))
        );
        assert_eq!(
            host.durable_writes,
            vec![("audit.ignore".to_string(), json!(["CVE-1", "CVE-2"]))]
        );
        assert_eq!(sink.count("Added advisory ID to ignore list: CVE-2"), 1);
        assert_eq!(sink.count("Added advisory ID to ignore list: CVE-1"), 0);
    }

    #[test]
    fn test_append_is_idempotent_for_identical_audit_output() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::with_ids(&["CVE-1"]));

        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);
        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);

        assert_eq!(audit_section(&host).get("ignore"), Some(&json!(["CVE-1"])));
        assert_eq!(host.durable_writes.len(), 1);
        assert_eq!(sink.count("Advisory IDs already ignored"), 1);
    }

    #[test]
    fn test_append_stops_on_empty_advisories() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::clean());

        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);

        assert!(audit_section(&host).get("ignore").is_none());
        assert!(host.durable_writes.is_empty());
        assert_eq!(sink.count("No security advisories detected"), 1);
    }

    #[test]
    fn test_append_stops_on_unavailable_audit() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit {
            findings: FakeFindings::Unavailable,
            summary: "",
        });

        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);

        assert!(audit_section(&host).is_empty());
        assert!(host.durable_writes.is_empty());
        assert_eq!(sink.count("Could not get audit results"), 1);
    }

    #[test]
    fn test_append_stops_on_malformed_json() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit {
            findings: FakeFindings::Malformed,
            summary: "",
        });

        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);

        assert!(audit_section(&host).is_empty());
        assert!(host.durable_writes.is_empty());
        assert_eq!(sink.count("Could not parse audit JSON"), 1);
    }

    #[test]
    fn test_append_durable_write_failure_is_soft() {
        let mut host = MemoryConfig {
            fail_durable: true,
            ..MemoryConfig::default()
        };
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::with_ids(&["CVE-1"]));

        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);

        assert_eq!(sink.count("Could not persist the ignore list"), 1);
        assert_eq!(sink.count("Added advisory ID"), 0);
    }

    #[test]
    fn test_summary_prints_nothing_when_clean() {
        let mut host = MemoryConfig::with_section(
            AUDIT_SECTION,
            json!({ "block-insecure": false }),
        );
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::clean());

        reconciler.handle(LifecycleEvent::PostInstall, &mut host, &mut sink);
        // Post-install only displays the summary, and a clean one is silent
        assert!(sink.lines.is_empty());
    }

    #[test]
    fn test_summary_banner_indents_non_blank_lines() {
        let mut host = MemoryConfig::with_section(
            AUDIT_SECTION,
            json!({ "block-insecure": false }),
        );
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit {
            findings: FakeFindings::Ids(Vec::new()),
            summary: "Found 2 advisories\n\n  - twig/twig",
        });

        reconciler.handle(LifecycleEvent::PostInstall, &mut host, &mut sink);

        let messages = sink.messages();
        assert!(messages
            .iter()
            .any(|m| m.contains("SECURITY ADVISORIES DETECTED")));
        assert!(messages.contains(&"  Found 2 advisories"));
        assert!(messages.contains(&"    - twig/twig"));
        // Blank input lines are dropped rather than indented
        assert!(!messages.contains(&"  "));
        assert!(sink.contains("auto-ignored to allow builds to continue"));
        assert_eq!(
            sink.lines
                .iter()
                .filter(|(level, _)| *level == SinkLevel::Warning)
                .count(),
            3
        );
    }

    #[test]
    fn test_post_update_appends_then_displays() {
        let mut host = MemoryConfig::default();
        let mut sink = RecordingSink::default();
        let mut reconciler = AdvisoryReconciler::new(FakeAudit::with_ids(&["CVE-1"]));

        reconciler.handle(LifecycleEvent::PostUpdate, &mut host, &mut sink);

        let added = sink
            .messages()
            .iter()
            .position(|m| m.contains("Added advisory ID"))
            .unwrap();
        let banner = sink
            .messages()
            .iter()
            .position(|m| m.contains("SECURITY ADVISORIES DETECTED"))
            .unwrap();
        assert!(added < banner);
    }
}
