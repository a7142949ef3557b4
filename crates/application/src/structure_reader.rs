use std::sync::Arc;

use itemflow_core::{AppError, AppResult, TenantId};
use itemflow_domain::{
    FieldSet, FieldSetId, ItemTypeConfiguration, ItemTypeConfigurationId, ItemTypeSet,
    ItemTypeSetId, Workflow, WorkflowId,
};

use crate::permission_ports::StructureRepository;

/// Structure snapshots a configuration is currently bound to.
#[derive(Debug, Clone)]
pub(crate) struct BoundStructure {
    pub(crate) configuration: ItemTypeConfiguration,
    pub(crate) item_type_set: ItemTypeSet,
    pub(crate) workflow: Workflow,
    pub(crate) field_set: FieldSet,
}

/// Resolves structural snapshots, turning absent entities into `NotFound`.
#[derive(Clone)]
pub(crate) struct StructureReader {
    repository: Arc<dyn StructureRepository>,
}

impl StructureReader {
    pub(crate) fn new(repository: Arc<dyn StructureRepository>) -> Self {
        Self { repository }
    }

    pub(crate) async fn configuration(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<ItemTypeConfiguration> {
        self.repository
            .find_item_type_configuration(tenant_id, item_type_configuration_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "item type configuration '{item_type_configuration_id}' does not exist"
                ))
            })
    }

    pub(crate) async fn item_type_set(
        &self,
        tenant_id: TenantId,
        item_type_set_id: ItemTypeSetId,
    ) -> AppResult<ItemTypeSet> {
        self.repository
            .find_item_type_set(tenant_id, item_type_set_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("item type set '{item_type_set_id}' does not exist"))
            })
    }

    pub(crate) async fn workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Workflow> {
        self.repository
            .find_workflow(tenant_id, workflow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("workflow '{workflow_id}' does not exist")))
    }

    pub(crate) async fn field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<FieldSet> {
        self.repository
            .find_field_set(tenant_id, field_set_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("field set '{field_set_id}' does not exist")))
    }

    pub(crate) async fn configurations_for_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Vec<ItemTypeConfiguration>> {
        self.repository
            .list_configurations_for_workflow(tenant_id, workflow_id)
            .await
    }

    pub(crate) async fn configurations_for_field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<Vec<ItemTypeConfiguration>> {
        self.repository
            .list_configurations_for_field_set(tenant_id, field_set_id)
            .await
    }

    /// Loads the set, workflow and field set of an already resolved configuration.
    pub(crate) async fn bind(
        &self,
        tenant_id: TenantId,
        configuration: ItemTypeConfiguration,
    ) -> AppResult<BoundStructure> {
        let item_type_set = self
            .item_type_set(tenant_id, configuration.item_type_set_id())
            .await?;
        let workflow = self.workflow(tenant_id, configuration.workflow_id()).await?;
        let field_set = self
            .field_set(tenant_id, configuration.field_set_id())
            .await?;

        Ok(BoundStructure {
            configuration,
            item_type_set,
            workflow,
            field_set,
        })
    }

    pub(crate) async fn bound_structure(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<BoundStructure> {
        let configuration = self
            .configuration(tenant_id, item_type_configuration_id)
            .await?;
        self.bind(tenant_id, configuration).await
    }
}
