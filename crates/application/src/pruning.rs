use std::collections::BTreeSet;
use std::sync::Arc;

use itemflow_core::{AppResult, TenantId};
use itemflow_domain::{ItemTypeSet, PermissionRef};
use serde::Serialize;
use tracing::{info, warn};

use crate::permission_ports::{
    GrantCleanup, PermissionRepository, ProjectScope, PrunePlan, PruneTarget,
};

/// Counts reported after permissions were pruned and their grants cleaned up.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PruneSummary {
    /// Permission rows deleted.
    pub deleted_permissions: usize,
    /// Tenant-scoped assignments deleted.
    pub deleted_assignments: usize,
    /// Project-scoped assignments deleted.
    pub deleted_project_assignments: usize,
    /// Preserved permission rows moved onto a new structural key.
    pub rebound_permissions: usize,
    /// Grants whose cleanup ran without a failing step.
    pub grants_cleaned: usize,
    /// Grants with at least one failed cleanup step.
    pub grant_cleanup_failures: usize,
}

/// Builds the prune target of a permission owned by a configuration of `item_type_set`.
///
/// Project assignments are scoped by every project associated with the set.
pub(crate) fn prune_target(permission: PermissionRef, item_type_set: &ItemTypeSet) -> PruneTarget {
    PruneTarget {
        permission,
        project_scopes: item_type_set
            .project_ids()
            .iter()
            .map(|project_id| ProjectScope {
                project_id: *project_id,
                item_type_set_id: item_type_set.id(),
            })
            .collect(),
    }
}

/// Runs a prune transaction, then removes orphaned grants one by one.
#[derive(Clone)]
pub(crate) struct PermissionPruner {
    permission_repository: Arc<dyn PermissionRepository>,
    grant_cleanup: Arc<dyn GrantCleanup>,
}

impl PermissionPruner {
    pub(crate) fn new(
        permission_repository: Arc<dyn PermissionRepository>,
        grant_cleanup: Arc<dyn GrantCleanup>,
    ) -> Self {
        Self {
            permission_repository,
            grant_cleanup,
        }
    }

    pub(crate) async fn prune(&self, tenant_id: TenantId, plan: &PrunePlan) -> AppResult<PruneSummary> {
        if plan.is_empty() {
            return Ok(PruneSummary::default());
        }

        let outcome = self
            .permission_repository
            .prune_permissions(tenant_id, plan)
            .await?;

        let mut summary = PruneSummary {
            deleted_permissions: outcome.deleted_permissions,
            deleted_assignments: outcome.deleted_assignments,
            deleted_project_assignments: outcome.deleted_project_assignments,
            rebound_permissions: outcome.rebound_permissions,
            ..PruneSummary::default()
        };

        // Runs after the prune commit; each grant gets its own transaction.
        let orphaned: BTreeSet<_> = outcome.orphaned_grants.into_iter().collect();
        for grant_id in orphaned {
            let report = self
                .grant_cleanup
                .delete_grant_completely(tenant_id, grant_id)
                .await;
            if report.is_clean() {
                summary.grants_cleaned += 1;
            } else {
                warn!(
                    tenant_id = %tenant_id,
                    grant_id = %grant_id,
                    failed_steps = ?report.failed_steps,
                    "grant cleanup finished with failed steps"
                );
                summary.grant_cleanup_failures += 1;
            }
        }

        info!(
            tenant_id = %tenant_id,
            deleted_permissions = summary.deleted_permissions,
            rebound_permissions = summary.rebound_permissions,
            grants_cleaned = summary.grants_cleaned,
            grant_cleanup_failures = summary.grant_cleanup_failures,
            "permission prune completed"
        );

        Ok(summary)
    }
}
