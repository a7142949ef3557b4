use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use itemflow_application::{AssignmentSummary, PermissionRepository, PruneOutcome, PrunePlan};
use itemflow_core::{AppResult, TenantId};
use itemflow_domain::{ItemTypeConfigurationId, ItemTypePermission, PermissionKey, PermissionRef};

mod assignments;
mod listing;
mod pruning;

/// PostgreSQL-backed store of the six permission kinds and their assignments.
#[derive(Clone)]
pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn list_permissions(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<Vec<ItemTypePermission>> {
        self.list_permissions_impl(tenant_id, item_type_configuration_id)
            .await
    }

    async fn insert_permissions(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
        keys: &[PermissionKey],
    ) -> AppResult<Vec<ItemTypePermission>> {
        self.insert_permissions_impl(tenant_id, item_type_configuration_id, keys)
            .await
    }

    async fn load_assignments(
        &self,
        tenant_id: TenantId,
        permissions: &[PermissionRef],
    ) -> AppResult<HashMap<PermissionRef, AssignmentSummary>> {
        self.load_assignments_impl(tenant_id, permissions).await
    }

    async fn prune_permissions(
        &self,
        tenant_id: TenantId,
        plan: &PrunePlan,
    ) -> AppResult<PruneOutcome> {
        self.prune_permissions_impl(tenant_id, plan).await
    }
}
