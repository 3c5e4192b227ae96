//! Lifecycle events delivered by the host package manager

/// Lifecycle moments the plugin can be invoked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Plugin activation, before any command runs
    Activate,
    PreInstall,
    PreUpdate,
    PostUpdate,
    PostInstall,
    Deactivate,
    Uninstall,
}

/// Unit of work the reconciler runs in response to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Turn off audit blocking when the plugin is first activated
    ActivateNonBlocking,
    /// Turn off audit blocking before an install/update runs
    DisableAuditBlock,
    /// Collect advisory IDs from the audit and append them to the ignore list
    AppendIgnoredAdvisories,
    /// Echo the audit summary without failing the run
    DisplayAuditSummary,
}

impl LifecycleEvent {
    /// Every event, in host delivery order
    pub const ALL: [LifecycleEvent; 7] = [
        Self::Activate,
        Self::PreInstall,
        Self::PreUpdate,
        Self::PostUpdate,
        Self::PostInstall,
        Self::Deactivate,
        Self::Uninstall,
    ];

    /// Handlers registered for this event, run in registration order
    pub fn actions(self) -> &'static [Action] {
        match self {
            Self::Activate => &[Action::ActivateNonBlocking],
            Self::PreInstall | Self::PreUpdate => &[Action::DisableAuditBlock],
            Self::PostUpdate => &[
                Action::AppendIgnoredAdvisories,
                Action::DisplayAuditSummary,
            ],
            Self::PostInstall => &[Action::DisplayAuditSummary],
            Self::Deactivate | Self::Uninstall => &[],
        }
    }

    /// Event name as the host spells it
    pub fn name(self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::PreInstall => "pre-install",
            Self::PreUpdate => "pre-update",
            Self::PostUpdate => "post-update",
            Self::PostInstall => "post-install",
            Self::Deactivate => "deactivate",
            Self::Uninstall => "uninstall",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "activate" => Ok(Self::Activate),
            "pre-install" | "pre-install-cmd" => Ok(Self::PreInstall),
            "pre-update" | "pre-update-cmd" => Ok(Self::PreUpdate),
            "post-update" | "post-update-cmd" => Ok(Self::PostUpdate),
            "post-install" | "post-install-cmd" => Ok(Self::PostInstall),
            "deactivate" => Ok(Self::Deactivate),
            "uninstall" => Ok(Self::Uninstall),
            _ => Err(format!("Unknown lifecycle event: {}", s)),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ActivateNonBlocking => "activate-non-blocking",
            Self::DisableAuditBlock => "disable-audit-block",
            Self::AppendIgnoredAdvisories => "append-ignored-advisories",
            Self::DisplayAuditSummary => "display-audit-summary",
        };
        write!(f, "{}", name)
    }
}
