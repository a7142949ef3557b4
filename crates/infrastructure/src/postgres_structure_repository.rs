use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use itemflow_application::StructureRepository;
use itemflow_core::{AppError, AppResult, TenantId};
use itemflow_domain::{
    FieldConfiguration, FieldConfigurationId, FieldId, FieldSet, FieldSetEntry, FieldSetId,
    FieldType, ItemTypeConfiguration, ItemTypeConfigurationId, ItemTypeConfigurationInput,
    ItemTypeId, ItemTypeSet, ItemTypeSetId, ItemTypeSetScope, ProjectId, StatusId, Transition,
    TransitionId, Workflow, WorkflowId, WorkflowStatus, WorkflowStatusId,
};

/// PostgreSQL-backed read model of the configuration hierarchy.
#[derive(Clone)]
pub struct PostgresStructureRepository {
    pool: PgPool,
}

impl PostgresStructureRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ConfigurationRow {
    id: Uuid,
    item_type_id: Uuid,
    item_type_name: String,
    item_type_set_id: Uuid,
    workflow_id: Uuid,
    field_set_id: Uuid,
}

#[derive(Debug, FromRow)]
struct ItemTypeSetRow {
    id: Uuid,
    name: String,
    scope: String,
}

#[derive(Debug, FromRow)]
struct NamedRow {
    id: Uuid,
    name: String,
}

#[derive(Debug, FromRow)]
struct WorkflowStatusRow {
    id: Uuid,
    status_id: Uuid,
    status_name: String,
    position: i32,
}

#[derive(Debug, FromRow)]
struct TransitionRow {
    id: Uuid,
    name: String,
    from_workflow_status_id: Uuid,
    to_workflow_status_id: Uuid,
}

#[derive(Debug, FromRow)]
struct FieldSetEntryRow {
    field_configuration_id: Uuid,
    field_id: Uuid,
    field_name: String,
    configuration_name: String,
    field_type: String,
    order_index: i32,
}

const CONFIGURATION_COLUMNS: &str = r#"
    configurations.id,
    configurations.item_type_id,
    item_types.name AS item_type_name,
    configurations.item_type_set_id,
    configurations.workflow_id,
    configurations.field_set_id
"#;

fn configuration_from_row(row: ConfigurationRow) -> AppResult<ItemTypeConfiguration> {
    ItemTypeConfiguration::new(ItemTypeConfigurationInput {
        id: ItemTypeConfigurationId::from_uuid(row.id),
        item_type_id: ItemTypeId::from_uuid(row.item_type_id),
        item_type_name: row.item_type_name,
        item_type_set_id: ItemTypeSetId::from_uuid(row.item_type_set_id),
        workflow_id: WorkflowId::from_uuid(row.workflow_id),
        field_set_id: FieldSetId::from_uuid(row.field_set_id),
    })
}

fn ordering(value: i32, label: &str) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(format!("stored {label} '{value}' is negative")))
}

impl PostgresStructureRepository {
    async fn list_configurations_where(
        &self,
        tenant_id: TenantId,
        column: &'static str,
        value: Uuid,
    ) -> AppResult<Vec<ItemTypeConfiguration>> {
        let rows = sqlx::query_as::<_, ConfigurationRow>(&format!(
            r#"
            SELECT {CONFIGURATION_COLUMNS}
            FROM item_type_configurations AS configurations
            INNER JOIN item_types
                ON item_types.id = configurations.item_type_id
            WHERE configurations.tenant_id = $1
                AND configurations.{column} = $2
            ORDER BY item_types.name, configurations.id
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list item type configurations by {column}: {error}"
            ))
        })?;

        rows.into_iter().map(configuration_from_row).collect()
    }
}

#[async_trait]
impl StructureRepository for PostgresStructureRepository {
    async fn find_item_type_configuration(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<Option<ItemTypeConfiguration>> {
        let row = sqlx::query_as::<_, ConfigurationRow>(&format!(
            r#"
            SELECT {CONFIGURATION_COLUMNS}
            FROM item_type_configurations AS configurations
            INNER JOIN item_types
                ON item_types.id = configurations.item_type_id
            WHERE configurations.tenant_id = $1
                AND configurations.id = $2
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(item_type_configuration_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find item type configuration '{item_type_configuration_id}': {error}"
            ))
        })?;

        row.map(configuration_from_row).transpose()
    }

    async fn list_configurations_for_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Vec<ItemTypeConfiguration>> {
        self.list_configurations_where(tenant_id, "workflow_id", workflow_id.as_uuid())
            .await
    }

    async fn list_configurations_for_field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<Vec<ItemTypeConfiguration>> {
        self.list_configurations_where(tenant_id, "field_set_id", field_set_id.as_uuid())
            .await
    }

    async fn find_item_type_set(
        &self,
        tenant_id: TenantId,
        item_type_set_id: ItemTypeSetId,
    ) -> AppResult<Option<ItemTypeSet>> {
        let Some(row) = sqlx::query_as::<_, ItemTypeSetRow>(
            r#"
            SELECT id, name, scope
            FROM item_type_sets
            WHERE id = $2
                AND (tenant_id = $1 OR scope = 'global')
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_type_set_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find item type set '{item_type_set_id}': {error}"
            ))
        })?
        else {
            return Ok(None);
        };

        // Only projects of the calling tenant, also for global sets.
        let project_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT set_projects.project_id
            FROM item_type_set_projects AS set_projects
            INNER JOIN projects
                ON projects.id = set_projects.project_id
            WHERE set_projects.item_type_set_id = $2
                AND projects.tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_type_set_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list projects of item type set '{item_type_set_id}': {error}"
            ))
        })?;

        ItemTypeSet::new(
            ItemTypeSetId::from_uuid(row.id),
            row.name,
            ItemTypeSetScope::from_str(row.scope.as_str())?,
            project_ids
                .into_iter()
                .map(ProjectId::from_uuid)
                .collect::<BTreeSet<_>>(),
        )
        .map(Some)
    }

    async fn find_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>> {
        let Some(workflow) = sqlx::query_as::<_, NamedRow>(
            r#"
            SELECT id, name
            FROM workflows
            WHERE tenant_id = $1
                AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(workflow_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find workflow '{workflow_id}': {error}"))
        })?
        else {
            return Ok(None);
        };

        let status_rows = sqlx::query_as::<_, WorkflowStatusRow>(
            r#"
            SELECT
                workflow_statuses.id,
                workflow_statuses.status_id,
                statuses.name AS status_name,
                workflow_statuses.position
            FROM workflow_statuses
            INNER JOIN statuses
                ON statuses.id = workflow_statuses.status_id
            WHERE workflow_statuses.workflow_id = $1
            ORDER BY workflow_statuses.position, workflow_statuses.id
            "#,
        )
        .bind(workflow.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list statuses of workflow '{workflow_id}': {error}"
            ))
        })?;

        let transition_rows = sqlx::query_as::<_, TransitionRow>(
            r#"
            SELECT id, name, from_workflow_status_id, to_workflow_status_id
            FROM transitions
            WHERE workflow_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(workflow.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list transitions of workflow '{workflow_id}': {error}"
            ))
        })?;

        let statuses = status_rows
            .into_iter()
            .map(|row| {
                WorkflowStatus::new(
                    WorkflowStatusId::from_uuid(row.id),
                    StatusId::from_uuid(row.status_id),
                    row.status_name,
                    ordering(row.position, "workflow status position")?,
                )
            })
            .collect::<AppResult<Vec<_>>>()?;
        let transitions = transition_rows
            .into_iter()
            .map(|row| {
                Transition::new(
                    TransitionId::from_uuid(row.id),
                    row.name,
                    WorkflowStatusId::from_uuid(row.from_workflow_status_id),
                    WorkflowStatusId::from_uuid(row.to_workflow_status_id),
                )
            })
            .collect::<AppResult<Vec<_>>>()?;

        Workflow::new(
            WorkflowId::from_uuid(workflow.id),
            workflow.name,
            statuses,
            transitions,
        )
        .map(Some)
    }

    async fn find_field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<Option<FieldSet>> {
        let Some(field_set) = sqlx::query_as::<_, NamedRow>(
            r#"
            SELECT id, name
            FROM field_sets
            WHERE tenant_id = $1
                AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(field_set_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find field set '{field_set_id}': {error}"))
        })?
        else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, FieldSetEntryRow>(
            r#"
            SELECT
                configurations.id AS field_configuration_id,
                configurations.field_id,
                fields.name AS field_name,
                configurations.name AS configuration_name,
                configurations.field_type,
                entries.order_index
            FROM field_set_entries AS entries
            INNER JOIN field_configurations AS configurations
                ON configurations.id = entries.field_configuration_id
            INNER JOIN fields
                ON fields.id = configurations.field_id
            WHERE entries.field_set_id = $1
            ORDER BY entries.order_index, configurations.id
            "#,
        )
        .bind(field_set.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list entries of field set '{field_set_id}': {error}"
            ))
        })?;

        let entries = rows
            .into_iter()
            .map(|row| {
                let configuration = FieldConfiguration::new(
                    FieldConfigurationId::from_uuid(row.field_configuration_id),
                    FieldId::from_uuid(row.field_id),
                    row.field_name,
                    row.configuration_name,
                    FieldType::from_str(row.field_type.as_str())?,
                )?;
                Ok(FieldSetEntry::new(
                    configuration,
                    ordering(row.order_index, "field set order index")?,
                ))
            })
            .collect::<AppResult<Vec<_>>>()?;

        FieldSet::new(FieldSetId::from_uuid(field_set.id), field_set.name, entries).map(Some)
    }
}
