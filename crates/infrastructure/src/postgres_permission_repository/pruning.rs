use itemflow_application::{PermissionRebind, PruneTarget};
use itemflow_core::AppError;
use itemflow_domain::GrantId;
use sqlx::{Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use super::*;
use crate::schema_contract::permission_storage;

fn count(rows: u64) -> usize {
    usize::try_from(rows).unwrap_or(usize::MAX)
}

impl PostgresPermissionRepository {
    pub(super) async fn prune_permissions_impl(
        &self,
        tenant_id: TenantId,
        plan: &PrunePlan,
    ) -> AppResult<PruneOutcome> {
        let mut outcome = PruneOutcome::default();
        if plan.is_empty() {
            return Ok(outcome);
        }

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        for target in &plan.targets {
            prune_target(&mut transaction, tenant_id, target, &mut outcome).await?;
        }
        for rebind in &plan.rebinds {
            outcome.rebound_permissions += rebind_permission(&mut transaction, tenant_id, rebind).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit permission prune: {error}"))
        })?;

        Ok(outcome)
    }
}

async fn prune_target(
    transaction: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    target: &PruneTarget,
    outcome: &mut PruneOutcome,
) -> AppResult<()> {
    let permission = target.permission;
    let permission_type = permission.kind.as_str();
    let storage = permission_storage(permission.kind);

    let tenant_grants = sqlx::query_scalar::<_, Option<Uuid>>(
        r#"
        DELETE FROM permission_assignments
        WHERE tenant_id = $1
            AND permission_type = $2
            AND permission_id = $3
            AND scope = 'tenant'
        RETURNING grant_id
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(permission_type)
    .bind(permission.id.as_uuid())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to delete tenant assignment of permission '{permission}': {error}"
        ))
    })?;
    outcome.deleted_assignments += tenant_grants.len();
    collect_grants(outcome, tenant_grants);

    let (project_ids, item_type_set_ids): (Vec<Uuid>, Vec<Uuid>) = target
        .project_scopes
        .iter()
        .map(|scope| (scope.project_id.as_uuid(), scope.item_type_set_id.as_uuid()))
        .unzip();

    // Deleting the wrapped assignment cascades to the project assignment row.
    let project_grants = sqlx::query_scalar::<_, Option<Uuid>>(
        r#"
        DELETE FROM permission_assignments AS assignments
        USING project_permission_assignments AS project_assignments,
            UNNEST($4::uuid[], $5::uuid[]) AS scopes(project_id, item_type_set_id)
        WHERE project_assignments.assignment_id = assignments.id
            AND project_assignments.project_id = scopes.project_id
            AND project_assignments.item_type_set_id = scopes.item_type_set_id
            AND assignments.tenant_id = $1
            AND assignments.permission_type = $2
            AND assignments.permission_id = $3
        RETURNING assignments.grant_id
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(permission_type)
    .bind(permission.id.as_uuid())
    .bind(project_ids.as_slice())
    .bind(item_type_set_ids.as_slice())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to delete project assignments of permission '{permission}': {error}"
        ))
    })?;
    outcome.deleted_project_assignments += project_grants.len();
    collect_grants(outcome, project_grants);

    // Project assignments of projects no longer using the set would dangle.
    let stale_grants = sqlx::query_scalar::<_, Option<Uuid>>(
        r#"
        DELETE FROM permission_assignments
        WHERE tenant_id = $1
            AND permission_type = $2
            AND permission_id = $3
        RETURNING grant_id
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(permission_type)
    .bind(permission.id.as_uuid())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to delete stale assignments of permission '{permission}': {error}"
        ))
    })?;
    if !stale_grants.is_empty() {
        warn!(
            tenant_id = %tenant_id,
            permission_id = %permission.id,
            permission_type,
            stale_assignments = stale_grants.len(),
            "deleted project assignments outside the item type set's current projects"
        );
        outcome.deleted_project_assignments += stale_grants.len();
        collect_grants(outcome, stale_grants);
    }

    let owned = sqlx::query_scalar::<_, Uuid>(&format!(
        "SELECT id FROM {table} WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        table = storage.permission_table,
    ))
    .bind(permission.id.as_uuid())
    .bind(tenant_id.as_uuid())
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!("failed to lock permission '{permission}': {error}"))
    })?;
    if owned.is_none() {
        debug!(
            tenant_id = %tenant_id,
            permission_id = %permission.id,
            permission_type,
            "permission already deleted"
        );
        return Ok(());
    }

    sqlx::query(&format!(
        "DELETE FROM {table} WHERE {column} = $1",
        table = storage.role_table,
        column = storage.permission_column,
    ))
    .bind(permission.id.as_uuid())
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to delete role links of permission '{permission}': {error}"
        ))
    })?;

    let direct_grants = sqlx::query_scalar::<_, Uuid>(&format!(
        "DELETE FROM {table} WHERE {column} = $1 RETURNING grant_id",
        table = storage.grant_table,
        column = storage.permission_column,
    ))
    .bind(permission.id.as_uuid())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to delete grant links of permission '{permission}': {error}"
        ))
    })?;
    collect_grants(outcome, direct_grants.into_iter().map(Some));

    let deleted = sqlx::query(&format!(
        "DELETE FROM {table} WHERE id = $1 AND tenant_id = $2",
        table = storage.permission_table,
    ))
    .bind(permission.id.as_uuid())
    .bind(tenant_id.as_uuid())
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!("failed to delete permission '{permission}': {error}"))
    })?;
    outcome.deleted_permissions += count(deleted.rows_affected());

    Ok(())
}

fn collect_grants(outcome: &mut PruneOutcome, grants: impl IntoIterator<Item = Option<Uuid>>) {
    outcome
        .orphaned_grants
        .extend(grants.into_iter().flatten().map(GrantId::from_uuid));
}

async fn rebind_permission(
    transaction: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    rebind: &PermissionRebind,
) -> AppResult<usize> {
    let permission = rebind.permission;
    if rebind.key.kind() != permission.kind {
        return Err(AppError::Validation(format!(
            "cannot rebind {} permission '{}' to a {} key",
            permission.kind,
            permission.id,
            rebind.key.kind()
        )));
    }

    let query = match rebind.key {
        // Keyed by the configuration alone, nothing to move.
        PermissionKey::Worker | PermissionKey::Creator => return Ok(0),
        PermissionKey::StatusOwner { workflow_status_id } => sqlx::query(
            r#"
            UPDATE status_owner_permissions
            SET workflow_status_id = $3
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(permission.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(workflow_status_id.as_uuid()),
        PermissionKey::FieldOwner {
            field_configuration_id,
        } => sqlx::query(
            r#"
            UPDATE field_owner_permissions
            SET field_configuration_id = $3
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(permission.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(field_configuration_id.as_uuid()),
        PermissionKey::Executor { transition_id } => sqlx::query(
            r#"
            UPDATE executor_permissions
            SET transition_id = $3
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(permission.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(transition_id.as_uuid()),
        PermissionKey::FieldStatus {
            field_configuration_id,
            workflow_status_id,
            access,
        } => sqlx::query(
            r#"
            UPDATE field_status_permissions
            SET field_configuration_id = $3,
                workflow_status_id = $4,
                access = $5
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(permission.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(field_configuration_id.as_uuid())
        .bind(workflow_status_id.as_uuid())
        .bind(access.as_str()),
    };

    let updated = query.execute(&mut **transaction).await.map_err(|error| {
        AppError::Internal(format!("failed to rebind permission '{permission}': {error}"))
    })?;

    Ok(count(updated.rows_affected()))
}
