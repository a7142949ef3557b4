use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use itemflow_core::{AppResult, TenantId, UserIdentity};
use itemflow_domain::{
    FieldConfiguration, FieldConfigurationId, FieldId, FieldSet, FieldSetEntry, FieldSetId,
    FieldType, GrantId, ItemTypeConfiguration, ItemTypeConfigurationId,
    ItemTypeConfigurationInput, ItemTypeId, ItemTypePermission, ItemTypeSet, ItemTypeSetId,
    ItemTypeSetScope, PermissionId, PermissionKey, PermissionRef, ProjectId, StatusId, Transition,
    TransitionId, Workflow, WorkflowId, WorkflowStatus, WorkflowStatusId,
};

use crate::permission_ports::{
    AssignmentSummary, AuditEvent, AuditRepository, GrantCleanup, GrantCleanupReport,
    PermissionRepository, ProjectScope, PruneOutcome, PrunePlan, StructureRepository,
};

#[derive(Debug, Clone)]
struct FakeAssignment {
    permission: PermissionRef,
    scope: Option<ProjectScope>,
    roles: BTreeSet<String>,
    grant: Option<GrantId>,
}

/// In-memory implementation of every engine port.
#[derive(Default)]
pub(crate) struct FakeStore {
    configurations: Mutex<Vec<(TenantId, ItemTypeConfiguration)>>,
    item_type_sets: Mutex<Vec<(TenantId, ItemTypeSet)>>,
    workflows: Mutex<Vec<(TenantId, Workflow)>>,
    field_sets: Mutex<Vec<(TenantId, FieldSet)>>,
    permissions: Mutex<Vec<(TenantId, ItemTypePermission)>>,
    direct_roles: Mutex<Vec<(PermissionRef, String)>>,
    direct_grants: Mutex<Vec<(PermissionRef, GrantId)>>,
    assignments: Mutex<Vec<FakeAssignment>>,
    grants: Mutex<BTreeSet<GrantId>>,
    failing_grants: Mutex<BTreeSet<GrantId>>,
    audit_events: Mutex<Vec<AuditEvent>>,
}

impl FakeStore {
    pub(crate) async fn add_workflow(&self, tenant_id: TenantId, workflow: Workflow) {
        self.workflows.lock().await.push((tenant_id, workflow));
    }

    pub(crate) async fn add_field_set(&self, tenant_id: TenantId, field_set: FieldSet) {
        self.field_sets.lock().await.push((tenant_id, field_set));
    }

    pub(crate) async fn add_item_type_set(&self, tenant_id: TenantId, item_type_set: ItemTypeSet) {
        self.item_type_sets
            .lock()
            .await
            .push((tenant_id, item_type_set));
    }

    pub(crate) async fn add_configuration(
        &self,
        tenant_id: TenantId,
        configuration: ItemTypeConfiguration,
    ) {
        self.configurations
            .lock()
            .await
            .push((tenant_id, configuration));
    }

    pub(crate) async fn assign_direct_role(&self, permission: PermissionRef, role: &str) {
        self.direct_roles
            .lock()
            .await
            .push((permission, role.to_owned()));
    }

    pub(crate) async fn attach_direct_grant(&self, permission: PermissionRef) -> GrantId {
        let grant_id = GrantId::new();
        self.grants.lock().await.insert(grant_id);
        self.direct_grants.lock().await.push((permission, grant_id));
        grant_id
    }

    /// Attaches an assignment with one role and a fresh grant; `scope` None is tenant-wide.
    pub(crate) async fn attach_assignment(
        &self,
        permission: PermissionRef,
        scope: Option<ProjectScope>,
        role: &str,
    ) -> GrantId {
        let grant_id = GrantId::new();
        self.grants.lock().await.insert(grant_id);
        self.assignments.lock().await.push(FakeAssignment {
            permission,
            scope,
            roles: BTreeSet::from([role.to_owned()]),
            grant: Some(grant_id),
        });
        grant_id
    }

    pub(crate) async fn fail_cleanup_of(&self, grant_id: GrantId) {
        self.failing_grants.lock().await.insert(grant_id);
    }

    pub(crate) async fn permissions_of(
        &self,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> Vec<ItemTypePermission> {
        self.permissions
            .lock()
            .await
            .iter()
            .filter(|(_, permission)| {
                permission.item_type_configuration_id() == item_type_configuration_id
            })
            .map(|(_, permission)| permission.clone())
            .collect()
    }

    pub(crate) async fn permission_with_key(
        &self,
        item_type_configuration_id: ItemTypeConfigurationId,
        key: PermissionKey,
    ) -> Option<ItemTypePermission> {
        self.permissions_of(item_type_configuration_id)
            .await
            .into_iter()
            .find(|permission| permission.key() == key)
    }

    pub(crate) async fn assignment_count(&self) -> usize {
        self.assignments.lock().await.len()
    }

    pub(crate) async fn project_assignment_count(&self) -> usize {
        self.assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| assignment.scope.is_some())
            .count()
    }

    pub(crate) async fn has_grant(&self, grant_id: GrantId) -> bool {
        self.grants.lock().await.contains(&grant_id)
    }

    pub(crate) async fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit_events.lock().await.clone()
    }
}

#[async_trait]
impl StructureRepository for FakeStore {
    async fn find_item_type_configuration(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<Option<ItemTypeConfiguration>> {
        Ok(self
            .configurations
            .lock()
            .await
            .iter()
            .find(|(owner, configuration)| {
                *owner == tenant_id && configuration.id() == item_type_configuration_id
            })
            .map(|(_, configuration)| configuration.clone()))
    }

    async fn list_configurations_for_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Vec<ItemTypeConfiguration>> {
        Ok(self
            .configurations
            .lock()
            .await
            .iter()
            .filter(|(owner, configuration)| {
                *owner == tenant_id && configuration.workflow_id() == workflow_id
            })
            .map(|(_, configuration)| configuration.clone())
            .collect())
    }

    async fn list_configurations_for_field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<Vec<ItemTypeConfiguration>> {
        Ok(self
            .configurations
            .lock()
            .await
            .iter()
            .filter(|(owner, configuration)| {
                *owner == tenant_id && configuration.field_set_id() == field_set_id
            })
            .map(|(_, configuration)| configuration.clone())
            .collect())
    }

    async fn find_item_type_set(
        &self,
        tenant_id: TenantId,
        item_type_set_id: ItemTypeSetId,
    ) -> AppResult<Option<ItemTypeSet>> {
        Ok(self
            .item_type_sets
            .lock()
            .await
            .iter()
            .find(|(owner, set)| *owner == tenant_id && set.id() == item_type_set_id)
            .map(|(_, set)| set.clone()))
    }

    async fn find_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>> {
        Ok(self
            .workflows
            .lock()
            .await
            .iter()
            .find(|(owner, workflow)| *owner == tenant_id && workflow.id() == workflow_id)
            .map(|(_, workflow)| workflow.clone()))
    }

    async fn find_field_set(
        &self,
        tenant_id: TenantId,
        field_set_id: FieldSetId,
    ) -> AppResult<Option<FieldSet>> {
        Ok(self
            .field_sets
            .lock()
            .await
            .iter()
            .find(|(owner, field_set)| *owner == tenant_id && field_set.id() == field_set_id)
            .map(|(_, field_set)| field_set.clone()))
    }
}

#[async_trait]
impl PermissionRepository for FakeStore {
    async fn list_permissions(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
    ) -> AppResult<Vec<ItemTypePermission>> {
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .filter(|(owner, permission)| {
                *owner == tenant_id
                    && permission.item_type_configuration_id() == item_type_configuration_id
            })
            .map(|(_, permission)| permission.clone())
            .collect())
    }

    async fn insert_permissions(
        &self,
        tenant_id: TenantId,
        item_type_configuration_id: ItemTypeConfigurationId,
        keys: &[PermissionKey],
    ) -> AppResult<Vec<ItemTypePermission>> {
        let mut permissions = self.permissions.lock().await;
        let mut created = Vec::new();
        for key in keys {
            let exists = permissions.iter().any(|(_, permission)| {
                permission.item_type_configuration_id() == item_type_configuration_id
                    && permission.key() == *key
            });
            if exists {
                continue;
            }

            let permission =
                ItemTypePermission::new(PermissionId::new(), item_type_configuration_id, *key);
            permissions.push((tenant_id, permission.clone()));
            created.push(permission);
        }

        Ok(created)
    }

    async fn load_assignments(
        &self,
        _tenant_id: TenantId,
        permissions: &[PermissionRef],
    ) -> AppResult<HashMap<PermissionRef, AssignmentSummary>> {
        let direct_roles = self.direct_roles.lock().await;
        let direct_grants = self.direct_grants.lock().await;
        let assignments = self.assignments.lock().await;

        let mut summaries = HashMap::new();
        for permission in permissions {
            let mut summary = AssignmentSummary::default();
            for (owner, role) in direct_roles.iter() {
                if owner == permission {
                    summary.role_names.insert(role.clone());
                }
            }
            summary.grant_count += direct_grants
                .iter()
                .filter(|(owner, _)| owner == permission)
                .count();
            for assignment in assignments.iter() {
                if assignment.permission != *permission {
                    continue;
                }
                summary.role_names.extend(assignment.roles.iter().cloned());
                summary.grant_count += usize::from(assignment.grant.is_some());
                summary.project_assignment_count += usize::from(assignment.scope.is_some());
            }
            summaries.insert(*permission, summary);
        }

        Ok(summaries)
    }

    async fn prune_permissions(
        &self,
        tenant_id: TenantId,
        plan: &PrunePlan,
    ) -> AppResult<PruneOutcome> {
        let mut permissions = self.permissions.lock().await;
        let mut direct_roles = self.direct_roles.lock().await;
        let mut direct_grants = self.direct_grants.lock().await;
        let mut assignments = self.assignments.lock().await;
        let mut outcome = PruneOutcome::default();

        for target in &plan.targets {
            let before = assignments.len();
            let mut kept = Vec::with_capacity(before);
            for assignment in assignments.drain(..) {
                if assignment.permission != target.permission {
                    kept.push(assignment);
                    continue;
                }
                match assignment.scope {
                    None => outcome.deleted_assignments += 1,
                    Some(_) => outcome.deleted_project_assignments += 1,
                }
                outcome.orphaned_grants.extend(assignment.grant);
            }
            *assignments = kept;

            direct_roles.retain(|(owner, _)| *owner != target.permission);
            direct_grants.retain(|(owner, grant_id)| {
                if *owner == target.permission {
                    outcome.orphaned_grants.push(*grant_id);
                    return false;
                }
                true
            });

            let count = permissions.len();
            permissions.retain(|(owner, permission)| {
                !(*owner == tenant_id && permission.reference() == target.permission)
            });
            outcome.deleted_permissions += count - permissions.len();
        }

        for rebind in &plan.rebinds {
            for (owner, permission) in permissions.iter_mut() {
                if *owner == tenant_id && permission.reference() == rebind.permission {
                    *permission = ItemTypePermission::new(
                        permission.id(),
                        permission.item_type_configuration_id(),
                        rebind.key,
                    );
                    outcome.rebound_permissions += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl GrantCleanup for FakeStore {
    async fn delete_grant_completely(
        &self,
        _tenant_id: TenantId,
        grant_id: GrantId,
    ) -> GrantCleanupReport {
        if self.failing_grants.lock().await.contains(&grant_id) {
            return GrantCleanupReport {
                failed_steps: vec!["grant_users".to_owned()],
                ..GrantCleanupReport::default()
            };
        }

        let grant_deleted = self.grants.lock().await.remove(&grant_id);
        GrantCleanupReport {
            removed_rows: u64::from(grant_deleted),
            grant_deleted,
            failed_steps: Vec::new(),
        }
    }
}

#[async_trait]
impl AuditRepository for FakeStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.audit_events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) fn status(name: &str, position: u32) -> WorkflowStatus {
    status_of(StatusId::new(), name, position)
}

/// Creates a node of an existing tenant-level status, as a second workflow would.
pub(crate) fn status_of(status_id: StatusId, name: &str, position: u32) -> WorkflowStatus {
    WorkflowStatus::new(WorkflowStatusId::new(), status_id, name, position)
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn transition(name: &str, from: &WorkflowStatus, to: &WorkflowStatus) -> Transition {
    Transition::new(TransitionId::new(), name, from.id(), to.id())
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn workflow(
    name: &str,
    statuses: Vec<WorkflowStatus>,
    transitions: Vec<Transition>,
) -> Workflow {
    Workflow::new(WorkflowId::new(), name, statuses, transitions).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn field_configuration(field_id: FieldId, name: &str) -> FieldConfiguration {
    FieldConfiguration::new(
        FieldConfigurationId::new(),
        field_id,
        name,
        format!("{name} configuration"),
        FieldType::Text,
    )
    .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn field_set(name: &str, configurations: Vec<FieldConfiguration>) -> FieldSet {
    let entries = configurations
        .into_iter()
        .enumerate()
        .map(|(index, configuration)| {
            FieldSetEntry::new(configuration, u32::try_from(index).unwrap_or(u32::MAX))
        })
        .collect();
    FieldSet::new(FieldSetId::new(), name, entries).unwrap_or_else(|_| unreachable!())
}

/// One tenant with a configuration bound to a workflow and field set.
pub(crate) struct Scenario {
    pub(crate) actor: UserIdentity,
    pub(crate) store: Arc<FakeStore>,
    pub(crate) configuration: ItemTypeConfiguration,
    pub(crate) item_type_set: ItemTypeSet,
    pub(crate) workflow: Workflow,
    pub(crate) field_set: FieldSet,
}

impl Scenario {
    pub(crate) async fn new(workflow: Workflow, field_set: FieldSet, projects: usize) -> Self {
        let tenant_id = TenantId::new();
        let store = Arc::new(FakeStore::default());

        let project_ids: BTreeSet<ProjectId> = (0..projects).map(|_| ProjectId::new()).collect();
        let item_type_set = ItemTypeSet::new(
            ItemTypeSetId::new(),
            "Software",
            ItemTypeSetScope::Project,
            project_ids,
        )
        .unwrap_or_else(|_| unreachable!());
        let configuration = ItemTypeConfiguration::new(ItemTypeConfigurationInput {
            id: ItemTypeConfigurationId::new(),
            item_type_id: ItemTypeId::new(),
            item_type_name: "Bug".to_owned(),
            item_type_set_id: item_type_set.id(),
            workflow_id: workflow.id(),
            field_set_id: field_set.id(),
        })
        .unwrap_or_else(|_| unreachable!());

        store.add_workflow(tenant_id, workflow.clone()).await;
        store.add_field_set(tenant_id, field_set.clone()).await;
        store
            .add_item_type_set(tenant_id, item_type_set.clone())
            .await;
        store
            .add_configuration(tenant_id, configuration.clone())
            .await;

        Self {
            actor: UserIdentity::new("admin", tenant_id),
            store,
            configuration,
            item_type_set,
            workflow,
            field_set,
        }
    }

    pub(crate) fn tenant_id(&self) -> TenantId {
        self.actor.tenant_id()
    }

    /// Creates every permission row of the bound structure without going through a service.
    pub(crate) async fn seed_permissions(&self) {
        let keys = itemflow_domain::required_permission_keys(&self.workflow, &self.field_set);
        let created = self
            .store
            .insert_permissions(self.tenant_id(), self.configuration.id(), &keys)
            .await;
        assert!(created.is_ok());
    }

    pub(crate) async fn permission(&self, key: PermissionKey) -> ItemTypePermission {
        self.store
            .permission_with_key(self.configuration.id(), key)
            .await
            .unwrap_or_else(|| unreachable!())
    }

    pub(crate) fn project_scopes(&self) -> Vec<ProjectScope> {
        self.item_type_set
            .project_ids()
            .iter()
            .map(|project_id| ProjectScope {
                project_id: *project_id,
                item_type_set_id: self.item_type_set.id(),
            })
            .collect()
    }
}
