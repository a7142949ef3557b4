use async_trait::async_trait;
use itemflow_core::{AppResult, TenantId};
use itemflow_domain::{
    FieldSet, FieldSetId, ItemTypeConfiguration, ItemTypeConfigurationId, ItemTypeSet,
    ItemTypeSetId, Workflow, WorkflowId,
};

/// Read-only port onto the configuration layer's structural snapshots.
///
/// Every lookup is tenant-scoped: an entity owned by another tenant is
/// reported as absent.
#[async_trait]
pub trait StructureRepository: Send + Sync {
    /// Finds one item type configuration.
    async fn find_item_type_configuration(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<Option<ItemTypeConfiguration>>;

    /// Lists configurations currently bound to a workflow.
    async fn list_configurations_for_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Vec<ItemTypeConfiguration>>;

    /// Lists configurations currently bound to a field set.
    async fn list_configurations_for_field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<Vec<ItemTypeConfiguration>>;

    /// Finds an item type set with its associated projects.
    async fn find_item_type_set(
        &self,
        tenant_id: TenantId,
        item_type_set_id: ItemTypeSetId,
    ) -> AppResult<Option<ItemTypeSet>>;

    /// Finds a workflow snapshot with its status nodes and transitions.
    async fn find_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>>;

    /// Finds a field set snapshot with its entries.
    async fn find_field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<Option<FieldSet>>;
}
