use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by permission engine use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when missing permission rows were created for a configuration.
    PermissionsProvisioned,
    /// Emitted when a field set or workflow migration pruned permissions.
    PermissionMigrationApplied,
    /// Emitted when permissions depending on removed statuses were pruned.
    StatusRemovalConfirmed,
    /// Emitted when permissions depending on removed transitions were pruned.
    TransitionRemovalConfirmed,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionsProvisioned => "permission.provisioned",
            Self::PermissionMigrationApplied => "permission.migration.applied",
            Self::StatusRemovalConfirmed => "permission.status_removal.confirmed",
            Self::TransitionRemovalConfirmed => "permission.transition_removal.confirmed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AuditAction;

    #[test]
    fn audit_actions_share_permission_namespace() {
        for action in [
            AuditAction::PermissionsProvisioned,
            AuditAction::PermissionMigrationApplied,
            AuditAction::StatusRemovalConfirmed,
            AuditAction::TransitionRemovalConfirmed,
        ] {
            assert!(action.as_str().starts_with("permission."));
        }
    }
}
