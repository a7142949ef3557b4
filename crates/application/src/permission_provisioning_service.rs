use std::collections::BTreeMap;
use std::sync::Arc;

use itemflow_core::{AppResult, UserIdentity};
use itemflow_domain::{
    AuditAction, FieldSetId, ItemTypeConfiguration, ItemTypeConfigurationId, PermissionKind,
    WorkflowId, missing_permission_keys, required_permission_keys,
};
use serde::Serialize;
use tracing::info;

use crate::permission_ports::{
    AuditEvent, AuditRepository, PermissionRepository, StructureRepository,
};
use crate::structure_reader::{BoundStructure, StructureReader};

/// Result of provisioning one item type configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningReport {
    /// Provisioned configuration.
    pub item_type_configuration_id: ItemTypeConfigurationId,
    /// Rows created in this call, per kind. Kinds without new rows are absent.
    pub created: BTreeMap<PermissionKind, usize>,
    /// Structural keys that already had a permission row.
    pub already_covered: usize,
}

impl ProvisioningReport {
    /// Returns the number of rows created across all kinds.
    #[must_use]
    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }
}

/// Creates missing permission rows for the structure a configuration is bound to.
#[derive(Clone)]
pub struct PermissionProvisioningService {
    structure: StructureReader,
    permission_repository: Arc<dyn PermissionRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl PermissionProvisioningService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        structure_repository: Arc<dyn StructureRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            structure: StructureReader::new(structure_repository),
            permission_repository,
            audit_repository,
        }
    }

    /// Ensures every structural key of the configuration has a permission row.
    ///
    /// Idempotent: existing rows are never duplicated nor removed.
    pub async fn provision(
        &self,
        actor: &UserIdentity,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<ProvisioningReport> {
        let bound = self
            .structure
            .bound_structure(actor.tenant_id(), item_type_configuration_id)
            .await?;
        self.provision_bound(actor, &bound).await
    }

    /// Re-provisions every configuration bound to a workflow.
    pub async fn provision_workflow(
        &self,
        actor: &UserIdentity,
        workflow_id: WorkflowId,
    ) -> AppResult<Vec<ProvisioningReport>> {
        self.structure
            .workflow(actor.tenant_id(), workflow_id)
            .await?;
        let configurations = self
            .structure
            .configurations_for_workflow(actor.tenant_id(), workflow_id)
            .await?;

        self.provision_all(actor, configurations).await
    }

    /// Re-provisions every configuration bound to a field set.
    pub async fn provision_field_set(
        &self,
        actor: &UserIdentity,
        field_set_id: FieldSetId,
    ) -> AppResult<Vec<ProvisioningReport>> {
        self.structure
            .field_set(actor.tenant_id(), field_set_id)
            .await?;
        let configurations = self
            .structure
            .configurations_for_field_set(actor.tenant_id(), field_set_id)
            .await?;

        self.provision_all(actor, configurations).await
    }

    async fn provision_all(
        &self,
        actor: &UserIdentity,
        configurations: Vec<ItemTypeConfiguration>,
    ) -> AppResult<Vec<ProvisioningReport>> {
        let mut reports = Vec::with_capacity(configurations.len());
        for configuration in configurations {
            let bound = self.structure.bind(actor.tenant_id(), configuration).await?;
            reports.push(self.provision_bound(actor, &bound).await?);
        }

        Ok(reports)
    }

    async fn provision_bound(
        &self,
        actor: &UserIdentity,
        bound: &BoundStructure,
    ) -> AppResult<ProvisioningReport> {
        let tenant_id = actor.tenant_id();
        let configuration_id = bound.configuration.id();

        let existing = self
            .permission_repository
            .list_permissions(tenant_id, configuration_id)
            .await?;
        let required = required_permission_keys(&bound.workflow, &bound.field_set).len();
        let missing = missing_permission_keys(&existing, &bound.workflow, &bound.field_set);

        let created = if missing.is_empty() {
            Vec::new()
        } else {
            self.permission_repository
                .insert_permissions(tenant_id, configuration_id, &missing)
                .await?
        };

        let mut created_by_kind = BTreeMap::new();
        for permission in &created {
            *created_by_kind.entry(permission.kind()).or_insert(0) += 1;
        }

        let report = ProvisioningReport {
            item_type_configuration_id: configuration_id,
            created: created_by_kind,
            already_covered: required - missing.len(),
        };

        if report.total_created() > 0 {
            info!(
                tenant_id = %tenant_id,
                item_type_configuration_id = %configuration_id,
                created = report.total_created(),
                already_covered = report.already_covered,
                "provisioned permissions"
            );

            self.audit_repository
                .append_event(AuditEvent {
                    tenant_id,
                    subject: actor.subject().to_owned(),
                    action: AuditAction::PermissionsProvisioned,
                    resource_type: "item_type_configuration".to_owned(),
                    resource_id: configuration_id.to_string(),
                    detail: Some(format!(
                        "created {} permissions for '{}'",
                        report.total_created(),
                        bound.configuration.item_type_name()
                    )),
                })
                .await?;
        }

        Ok(report)
    }
}
