use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use itemflow_core::{AppResult, TenantId};
use itemflow_domain::{
    GrantId, ItemTypeConfigurationId, ItemTypePermission, ItemTypeSetId, PermissionKey,
    PermissionRef, ProjectId,
};
use serde::Serialize;

/// Roles and grants attached to one permission across every assignment scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentSummary {
    /// Role names assigned directly or through tenant/project assignments.
    pub role_names: BTreeSet<String>,
    /// Grants attached directly or through tenant/project assignments.
    pub grant_count: usize,
    /// Project-scoped assignments referencing the permission.
    pub project_assignment_count: usize,
}

impl AssignmentSummary {
    /// Returns whether anyone currently holds the permission.
    #[must_use]
    pub fn has_assignments(&self) -> bool {
        !self.role_names.is_empty() || self.grant_count > 0
    }
}

/// Project scope a project permission assignment lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectScope {
    /// Project identifier.
    pub project_id: ProjectId,
    /// Item type set the project uses.
    pub item_type_set_id: ItemTypeSetId,
}

/// One permission to delete together with its assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneTarget {
    /// Permission row to delete.
    pub permission: PermissionRef,
    /// Project scopes whose project assignments must go as well.
    pub project_scopes: Vec<ProjectScope>,
}

/// Preserved permission whose structural key moves to a matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRebind {
    /// Preserved permission row.
    pub permission: PermissionRef,
    /// Key in the new structure.
    pub key: PermissionKey,
}

/// Mutations executed atomically by [`PermissionRepository::prune_permissions`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrunePlan {
    /// Permissions to delete.
    pub targets: Vec<PruneTarget>,
    /// Preserved permissions to rebind.
    pub rebinds: Vec<PermissionRebind>,
}

impl PrunePlan {
    /// Returns whether the plan mutates nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.rebinds.is_empty()
    }
}

/// Result of one committed prune transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PruneOutcome {
    /// Permission rows deleted.
    pub deleted_permissions: usize,
    /// Tenant-scoped assignments deleted.
    pub deleted_assignments: usize,
    /// Project-scoped assignments deleted.
    pub deleted_project_assignments: usize,
    /// Preserved permission rows rebound to a new key.
    pub rebound_permissions: usize,
    /// Grants left without an owner, to be cleaned up after commit.
    pub orphaned_grants: Vec<GrantId>,
}

/// Storage port for derived permission rows and their assignments.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Lists every permission row of a configuration, across the six kinds.
    async fn list_permissions(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<Vec<ItemTypePermission>>;

    /// Inserts rows with empty role and grant sets for the given keys.
    ///
    /// Keys already covered are skipped; only rows actually created are returned.
    async fn insert_permissions(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
        keys: &[PermissionKey],
    ) -> AppResult<Vec<ItemTypePermission>>;

    /// Loads assignment summaries; permissions without any assignment may be absent.
    async fn load_assignments(
        &self,
        tenant_id: TenantId,
        permissions: &[PermissionRef],
    ) -> AppResult<HashMap<PermissionRef, AssignmentSummary>>;

    /// Deletes targets with their assignments and rebinds preserved rows, in one transaction.
    async fn prune_permissions(
        &self,
        tenant_id: TenantId,
        plan: &PrunePlan,
    ) -> AppResult<PruneOutcome>;
}
