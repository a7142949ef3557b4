use std::str::FromStr;

use itemflow_core::AppError;
use itemflow_domain::{
    FieldConfigurationId, FieldStatusAccess, PermissionId, PermissionKind, TransitionId,
    WorkflowStatusId,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::*;

#[derive(Debug, FromRow)]
struct PermissionRow {
    kind: String,
    id: Uuid,
    workflow_status_id: Option<Uuid>,
    field_configuration_id: Option<Uuid>,
    transition_id: Option<Uuid>,
    access: Option<String>,
}

fn required<T>(value: Option<T>, kind: PermissionKind, column: &str) -> AppResult<T> {
    value.ok_or_else(|| {
        AppError::Internal(format!("stored {kind} permission is missing '{column}'"))
    })
}

impl PermissionRow {
    fn into_permission(
        self,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<ItemTypePermission> {
        let kind = PermissionKind::from_str(self.kind.as_str())?;
        let key = match kind {
            PermissionKind::Worker => PermissionKey::Worker,
            PermissionKind::Creator => PermissionKey::Creator,
            PermissionKind::StatusOwner => PermissionKey::StatusOwner {
                workflow_status_id: WorkflowStatusId::from_uuid(required(
                    self.workflow_status_id,
                    kind,
                    "workflow_status_id",
                )?),
            },
            PermissionKind::FieldOwner => PermissionKey::FieldOwner {
                field_configuration_id: FieldConfigurationId::from_uuid(required(
                    self.field_configuration_id,
                    kind,
                    "field_configuration_id",
                )?),
            },
            PermissionKind::Executor => PermissionKey::Executor {
                transition_id: TransitionId::from_uuid(required(
                    self.transition_id,
                    kind,
                    "transition_id",
                )?),
            },
            PermissionKind::FieldStatus => PermissionKey::FieldStatus {
                field_configuration_id: FieldConfigurationId::from_uuid(required(
                    self.field_configuration_id,
                    kind,
                    "field_configuration_id",
                )?),
                workflow_status_id: WorkflowStatusId::from_uuid(required(
                    self.workflow_status_id,
                    kind,
                    "workflow_status_id",
                )?),
                access: FieldStatusAccess::from_str(
                    required(self.access, kind, "access")?.as_str(),
                )?,
            },
        };

        Ok(ItemTypePermission::new(
            PermissionId::from_uuid(self.id),
            item_type_configuration_id,
            key,
        ))
    }
}

fn insert_statement(kind: PermissionKind) -> &'static str {
    match kind {
        PermissionKind::Worker => {
            r#"
            INSERT INTO worker_permissions (tenant_id, item_type_configuration_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#
        }
        PermissionKind::Creator => {
            r#"
            INSERT INTO creator_permissions (tenant_id, item_type_configuration_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#
        }
        PermissionKind::StatusOwner => {
            r#"
            INSERT INTO status_owner_permissions (
                tenant_id,
                item_type_configuration_id,
                workflow_status_id
            )
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#
        }
        PermissionKind::FieldOwner => {
            r#"
            INSERT INTO field_owner_permissions (
                tenant_id,
                item_type_configuration_id,
                field_configuration_id
            )
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#
        }
        PermissionKind::Executor => {
            r#"
            INSERT INTO executor_permissions (
                tenant_id,
                item_type_configuration_id,
                transition_id
            )
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#
        }
        PermissionKind::FieldStatus => {
            r#"
            INSERT INTO field_status_permissions (
                tenant_id,
                item_type_configuration_id,
                field_configuration_id,
                workflow_status_id,
                access
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#
        }
    }
}

impl PostgresPermissionRepository {
    pub(super) async fn list_permissions_impl(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<Vec<ItemTypePermission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT 'worker' AS kind, id,
                NULL::uuid AS workflow_status_id,
                NULL::uuid AS field_configuration_id,
                NULL::uuid AS transition_id,
                NULL::text AS access,
                1 AS kind_order
            FROM worker_permissions
            WHERE tenant_id = $1 AND item_type_configuration_id = $2
            UNION ALL
            SELECT 'creator', id, NULL, NULL, NULL, NULL, 2
            FROM creator_permissions
            WHERE tenant_id = $1 AND item_type_configuration_id = $2
            UNION ALL
            SELECT 'status_owner', id, workflow_status_id, NULL, NULL, NULL, 3
            FROM status_owner_permissions
            WHERE tenant_id = $1 AND item_type_configuration_id = $2
            UNION ALL
            SELECT 'field_owner', id, NULL, field_configuration_id, NULL, NULL, 4
            FROM field_owner_permissions
            WHERE tenant_id = $1 AND item_type_configuration_id = $2
            UNION ALL
            SELECT 'executor', id, NULL, NULL, transition_id, NULL, 5
            FROM executor_permissions
            WHERE tenant_id = $1 AND item_type_configuration_id = $2
            UNION ALL
            SELECT 'field_status', id, workflow_status_id, field_configuration_id, NULL, access, 6
            FROM field_status_permissions
            WHERE tenant_id = $1 AND item_type_configuration_id = $2
            ORDER BY kind_order, id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_type_configuration_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list permissions of item type configuration '{item_type_configuration_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(|row| row.into_permission(item_type_configuration_id))
            .collect()
    }

    pub(super) async fn insert_permissions_impl(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
        keys: &[PermissionKey],
    ) -> AppResult<Vec<ItemTypePermission>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let mut created = Vec::new();
        for key in keys {
            // Key columns follow the shared ones as $3.. in the order bound here.
            let mut query = sqlx::query_scalar::<_, Uuid>(insert_statement(key.kind()))
                .bind(tenant_id.as_uuid())
                .bind(item_type_configuration_id.as_uuid());
            if let Some(field_configuration_id) = key.field_configuration_id() {
                query = query.bind(field_configuration_id.as_uuid());
            }
            if let Some(workflow_status_id) = key.workflow_status_id() {
                query = query.bind(workflow_status_id.as_uuid());
            }
            if let Some(transition_id) = key.transition_id() {
                query = query.bind(transition_id.as_uuid());
            }
            if let Some(access) = key.access() {
                query = query.bind(access.as_str());
            }

            let inserted = query
                .fetch_optional(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to insert {} permission: {error}",
                        key.kind()
                    ))
                })?;

            if let Some(id) = inserted {
                created.push(ItemTypePermission::new(
                    PermissionId::from_uuid(id),
                    item_type_configuration_id,
                    *key,
                ));
            }
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit permission inserts: {error}"))
        })?;

        Ok(created)
    }
}
