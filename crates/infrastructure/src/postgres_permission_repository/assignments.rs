use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use itemflow_core::AppError;
use itemflow_domain::{PermissionId, PermissionKind};
use sqlx::FromRow;
use uuid::Uuid;

use super::*;
use crate::schema_contract::permission_storage;

#[derive(Debug, FromRow)]
struct DirectRoleRow {
    permission_id: Uuid,
    role_name: String,
}

#[derive(Debug, FromRow)]
struct DirectGrantRow {
    permission_id: Uuid,
    grant_count: i64,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    permission_type: String,
    permission_id: Uuid,
    has_grant: bool,
    project_scoped: bool,
}

#[derive(Debug, FromRow)]
struct AssignmentRoleRow {
    permission_type: String,
    permission_id: Uuid,
    role_name: String,
}

fn reference(permission_type: &str, permission_id: Uuid) -> AppResult<PermissionRef> {
    Ok(PermissionRef {
        kind: PermissionKind::from_str(permission_type)?,
        id: PermissionId::from_uuid(permission_id),
    })
}

impl PostgresPermissionRepository {
    pub(super) async fn load_assignments_impl(
        &self,
        tenant_id: TenantId,
        permissions: &[PermissionRef],
    ) -> AppResult<HashMap<PermissionRef, AssignmentSummary>> {
        let mut summaries: HashMap<PermissionRef, AssignmentSummary> = HashMap::new();
        if permissions.is_empty() {
            return Ok(summaries);
        }

        let mut ids_by_kind: BTreeMap<PermissionKind, Vec<Uuid>> = BTreeMap::new();
        for permission in permissions {
            ids_by_kind
                .entry(permission.kind)
                .or_default()
                .push(permission.id.as_uuid());
        }
        let requested = permissions.iter().copied().collect::<HashSet<_>>();

        for (kind, ids) in &ids_by_kind {
            let storage = permission_storage(*kind);

            let roles = sqlx::query_as::<_, DirectRoleRow>(&format!(
                r#"
                SELECT joined.{column} AS permission_id, roles.name AS role_name
                FROM {table} AS joined
                INNER JOIN roles
                    ON roles.id = joined.role_id
                WHERE roles.tenant_id = $1
                    AND joined.{column} = ANY($2)
                "#,
                column = storage.permission_column,
                table = storage.role_table,
            ))
            .bind(tenant_id.as_uuid())
            .bind(ids.as_slice())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load {kind} permission roles: {error}"))
            })?;

            for row in roles {
                let key = PermissionRef {
                    kind: *kind,
                    id: PermissionId::from_uuid(row.permission_id),
                };
                summaries
                    .entry(key)
                    .or_default()
                    .role_names
                    .insert(row.role_name);
            }

            let grants = sqlx::query_as::<_, DirectGrantRow>(&format!(
                r#"
                SELECT joined.{column} AS permission_id, COUNT(*) AS grant_count
                FROM {table} AS joined
                INNER JOIN grants
                    ON grants.id = joined.grant_id
                WHERE grants.tenant_id = $1
                    AND joined.{column} = ANY($2)
                GROUP BY joined.{column}
                "#,
                column = storage.permission_column,
                table = storage.grant_table,
            ))
            .bind(tenant_id.as_uuid())
            .bind(ids.as_slice())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load {kind} permission grants: {error}"))
            })?;

            for row in grants {
                let key = PermissionRef {
                    kind: *kind,
                    id: PermissionId::from_uuid(row.permission_id),
                };
                summaries.entry(key).or_default().grant_count +=
                    usize::try_from(row.grant_count).unwrap_or_default();
            }
        }

        let all_ids = permissions
            .iter()
            .map(|permission| permission.id.as_uuid())
            .collect::<Vec<_>>();

        let assignments = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                assignments.permission_type,
                assignments.permission_id,
                assignments.grant_id IS NOT NULL AS has_grant,
                project_assignments.id IS NOT NULL AS project_scoped
            FROM permission_assignments AS assignments
            LEFT JOIN project_permission_assignments AS project_assignments
                ON project_assignments.assignment_id = assignments.id
            WHERE assignments.tenant_id = $1
                AND assignments.permission_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(all_ids.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load permission assignments: {error}"))
        })?;

        for row in assignments {
            let key = reference(row.permission_type.as_str(), row.permission_id)?;
            if !requested.contains(&key) {
                continue;
            }

            let summary = summaries.entry(key).or_default();
            if row.has_grant {
                summary.grant_count += 1;
            }
            if row.project_scoped {
                summary.project_assignment_count += 1;
            }
        }

        let assignment_roles = sqlx::query_as::<_, AssignmentRoleRow>(
            r#"
            SELECT
                assignments.permission_type,
                assignments.permission_id,
                roles.name AS role_name
            FROM permission_assignments AS assignments
            INNER JOIN permission_assignment_roles AS assignment_roles
                ON assignment_roles.assignment_id = assignments.id
            INNER JOIN roles
                ON roles.id = assignment_roles.role_id
            WHERE assignments.tenant_id = $1
                AND assignments.permission_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(all_ids.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load permission assignment roles: {error}"
            ))
        })?;

        for row in assignment_roles {
            let key = reference(row.permission_type.as_str(), row.permission_id)?;
            if requested.contains(&key) {
                summaries
                    .entry(key)
                    .or_default()
                    .role_names
                    .insert(row.role_name);
            }
        }

        Ok(summaries)
    }
}
