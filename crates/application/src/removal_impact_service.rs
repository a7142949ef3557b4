use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use itemflow_core::{AppError, AppResult, TenantId, UserIdentity};
use itemflow_domain::{
    AuditAction, ItemTypePermission, PermissionKey, StatusId, Transition, TransitionId, Workflow,
    WorkflowId, WorkflowStatusId,
};
use serde::Serialize;
use tracing::info;

use crate::permission_impact::{ImpactBuilder, PermissionImpact};
use crate::permission_ports::{
    AuditEvent, AuditRepository, GrantCleanup, PermissionRepository, PrunePlan,
    StructureRepository,
};
use crate::pruning::{PermissionPruner, PruneSummary, prune_target};
use crate::structure_reader::StructureReader;

/// Status requested for removal, resolved to its node in the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedStatus {
    /// Tenant-level status.
    pub status_id: StatusId,
    /// Node of the status in the analyzed workflow.
    pub workflow_status_id: WorkflowStatusId,
    /// Status name.
    pub status_name: String,
}

/// Transition that disappears with a removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedTransition {
    /// Transition identifier.
    pub transition_id: TransitionId,
    /// Transition name.
    pub name: String,
    /// Source status name.
    pub from_status_name: String,
    /// Target status name.
    pub to_status_name: String,
    /// Whether the transition itself was named for removal.
    ///
    /// Always false in a status removal report, where every transition is part
    /// of the closure of the removed statuses. Always true in a transition removal report.
    pub requested: bool,
}

impl RemovedTransition {
    fn describe(workflow: &Workflow, transition: &Transition, requested: bool) -> Self {
        let status_name = |id| {
            workflow
                .workflow_status(id)
                .map(|status| status.status_name().as_str().to_owned())
                .unwrap_or_default()
        };

        Self {
            transition_id: transition.id(),
            name: transition.name().as_str().to_owned(),
            from_status_name: status_name(transition.from_status()),
            to_status_name: status_name(transition.to_status()),
            requested,
        }
    }
}

/// Permissions depending on statuses proposed for removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRemovalImpact {
    /// Analyzed workflow.
    pub workflow_id: WorkflowId,
    /// Workflow name.
    pub workflow_name: String,
    /// Requested statuses.
    pub removed_statuses: Vec<RemovedStatus>,
    /// Transition closure of the requested statuses.
    pub removed_transitions: Vec<RemovedTransition>,
    /// Impacted permissions of every configuration bound to the workflow.
    pub impacts: Vec<PermissionImpact>,
    /// Number of impacted permissions.
    pub total_impacted: usize,
    /// Impacted permissions currently held by a role or grant.
    pub total_with_assignments: usize,
}

/// Permissions depending on transitions proposed for removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRemovalImpact {
    /// Analyzed workflow.
    pub workflow_id: WorkflowId,
    /// Workflow name.
    pub workflow_name: String,
    /// Requested transitions.
    pub removed_transitions: Vec<RemovedTransition>,
    /// Impacted executor permissions of every configuration bound to the workflow.
    pub impacts: Vec<PermissionImpact>,
    /// Number of impacted permissions.
    pub total_impacted: usize,
    /// Impacted permissions currently held by a role or grant.
    pub total_with_assignments: usize,
}

/// Result of pruning the permissions of a confirmed structural removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalApplyResult {
    /// Workflow the removal applies to.
    pub workflow_id: WorkflowId,
    /// Permissions found impacted by the re-run analysis.
    pub analyzed_permissions: usize,
    /// Prune counts.
    #[serde(flatten)]
    pub summary: PruneSummary,
}

struct CollectedImpacts {
    impacts: Vec<PermissionImpact>,
    plan: PrunePlan,
}

/// Analyzes and confirms in-place removal of workflow statuses and transitions.
#[derive(Clone)]
pub struct RemovalImpactService {
    structure: StructureReader,
    permission_repository: Arc<dyn PermissionRepository>,
    pruner: PermissionPruner,
    audit_repository: Arc<dyn AuditRepository>,
}

impl RemovalImpactService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        structure_repository: Arc<dyn StructureRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
        grant_cleanup: Arc<dyn GrantCleanup>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            structure: StructureReader::new(structure_repository),
            pruner: PermissionPruner::new(permission_repository.clone(), grant_cleanup),
            permission_repository,
            audit_repository,
        }
    }

    /// Lists permissions lost when the given statuses leave the workflow.
    ///
    /// Transitions incident to a removed status are removed with it, so their
    /// executor permissions are reported even when not requested.
    pub async fn analyze_status_removal(
        &self,
        actor: &UserIdentity,
        workflow_id: WorkflowId,
        status_ids: &[StatusId],
    ) -> AppResult<StatusRemovalImpact> {
        self.status_removal(actor.tenant_id(), workflow_id, status_ids)
            .await
            .map(|(report, _)| report)
    }

    /// Lists executor permissions lost when the given transitions are removed.
    pub async fn analyze_transition_removal(
        &self,
        actor: &UserIdentity,
        workflow_id: WorkflowId,
        transition_ids: &[TransitionId],
    ) -> AppResult<TransitionRemovalImpact> {
        self.transition_removal(actor.tenant_id(), workflow_id, transition_ids)
            .await
            .map(|(report, _)| report)
    }

    /// Re-runs the status removal analysis and prunes every impacted permission.
    ///
    /// The statuses and transitions themselves are left to the caller.
    pub async fn confirm_status_removal(
        &self,
        actor: &UserIdentity,
        workflow_id: WorkflowId,
        status_ids: &[StatusId],
    ) -> AppResult<RemovalApplyResult> {
        let (report, plan) = self
            .status_removal(actor.tenant_id(), workflow_id, status_ids)
            .await?;
        let detail = format!(
            "removed statuses [{}] of workflow '{}'",
            report
                .removed_statuses
                .iter()
                .map(|status| status.status_name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            report.workflow_name
        );

        self.confirm(
            actor,
            workflow_id,
            plan,
            AuditAction::StatusRemovalConfirmed,
            detail,
        )
        .await
    }

    /// Re-runs the transition removal analysis and prunes every impacted permission.
    pub async fn confirm_transition_removal(
        &self,
        actor: &UserIdentity,
        workflow_id: WorkflowId,
        transition_ids: &[TransitionId],
    ) -> AppResult<RemovalApplyResult> {
        let (report, plan) = self
            .transition_removal(actor.tenant_id(), workflow_id, transition_ids)
            .await?;
        let detail = format!(
            "removed transitions [{}] of workflow '{}'",
            report
                .removed_transitions
                .iter()
                .map(|transition| transition.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            report.workflow_name
        );

        self.confirm(
            actor,
            workflow_id,
            plan,
            AuditAction::TransitionRemovalConfirmed,
            detail,
        )
        .await
    }

    async fn confirm(
        &self,
        actor: &UserIdentity,
        workflow_id: WorkflowId,
        plan: PrunePlan,
        action: AuditAction,
        detail: String,
    ) -> AppResult<RemovalApplyResult> {
        let analyzed_permissions = plan.targets.len();
        let summary = self.pruner.prune(actor.tenant_id(), &plan).await?;

        self.audit_repository
            .append_event(AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action,
                resource_type: "workflow".to_owned(),
                resource_id: workflow_id.to_string(),
                detail: Some(format!(
                    "{detail}; deleted {} permissions",
                    summary.deleted_permissions
                )),
            })
            .await?;

        Ok(RemovalApplyResult {
            workflow_id,
            analyzed_permissions,
            summary,
        })
    }

    async fn status_removal(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        status_ids: &[StatusId],
    ) -> AppResult<(StatusRemovalImpact, PrunePlan)> {
        if status_ids.is_empty() {
            return Err(AppError::Validation(
                "at least one status must be selected for removal".to_owned(),
            ));
        }

        let workflow = self.structure.workflow(tenant_id, workflow_id).await?;

        let mut removed_statuses = Vec::new();
        let mut removed_nodes = BTreeSet::new();
        for status_id in status_ids {
            let node = workflow.node_for_status(*status_id).ok_or_else(|| {
                AppError::NotFound(format!(
                    "status '{status_id}' is not part of workflow '{}'",
                    workflow.name()
                ))
            })?;
            if removed_nodes.insert(node.id()) {
                removed_statuses.push(RemovedStatus {
                    status_id: *status_id,
                    workflow_status_id: node.id(),
                    status_name: node.status_name().as_str().to_owned(),
                });
            }
        }

        let closure = workflow.transition_closure(&removed_nodes);
        let closure_ids: HashSet<TransitionId> =
            closure.iter().map(|transition| transition.id()).collect();
        let removed_transitions = closure
            .iter()
            .map(|transition| RemovedTransition::describe(&workflow, transition, false))
            .collect();

        let collected = self
            .collect_impacts(tenant_id, &workflow, |key| match key {
                PermissionKey::StatusOwner { workflow_status_id }
                | PermissionKey::FieldStatus {
                    workflow_status_id, ..
                } => removed_nodes.contains(&workflow_status_id),
                PermissionKey::Executor { transition_id } => closure_ids.contains(&transition_id),
                PermissionKey::Worker
                | PermissionKey::Creator
                | PermissionKey::FieldOwner { .. } => false,
            })
            .await?;

        info!(
            tenant_id = %tenant_id,
            workflow_id = %workflow_id,
            removed_statuses = removed_nodes.len(),
            closure_transitions = closure_ids.len(),
            impacted = collected.impacts.len(),
            "analyzed status removal"
        );

        let report = StatusRemovalImpact {
            workflow_id,
            workflow_name: workflow.name().as_str().to_owned(),
            removed_statuses,
            removed_transitions,
            total_impacted: collected.impacts.len(),
            total_with_assignments: count_with_assignments(&collected.impacts),
            impacts: collected.impacts,
        };

        Ok((report, collected.plan))
    }

    async fn transition_removal(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        transition_ids: &[TransitionId],
    ) -> AppResult<(TransitionRemovalImpact, PrunePlan)> {
        if transition_ids.is_empty() {
            return Err(AppError::Validation(
                "at least one transition must be selected for removal".to_owned(),
            ));
        }

        let workflow = self.structure.workflow(tenant_id, workflow_id).await?;

        let mut removed = HashSet::new();
        let mut removed_transitions = Vec::new();
        for transition_id in transition_ids {
            let transition = workflow.transition(*transition_id).ok_or_else(|| {
                AppError::NotFound(format!(
                    "transition '{transition_id}' is not part of workflow '{}'",
                    workflow.name()
                ))
            })?;
            if removed.insert(transition.id()) {
                removed_transitions.push(RemovedTransition::describe(&workflow, transition, true));
            }
        }

        let collected = self
            .collect_impacts(tenant_id, &workflow, |key| {
                key.transition_id()
                    .is_some_and(|transition_id| removed.contains(&transition_id))
            })
            .await?;

        info!(
            tenant_id = %tenant_id,
            workflow_id = %workflow_id,
            removed_transitions = removed.len(),
            impacted = collected.impacts.len(),
            "analyzed transition removal"
        );

        let report = TransitionRemovalImpact {
            workflow_id,
            workflow_name: workflow.name().as_str().to_owned(),
            removed_transitions,
            total_impacted: collected.impacts.len(),
            total_with_assignments: count_with_assignments(&collected.impacts),
            impacts: collected.impacts,
        };

        Ok((report, collected.plan))
    }

    /// Collects matching permissions of every configuration bound to the workflow.
    async fn collect_impacts(
        &self,
        tenant_id: TenantId,
        workflow: &Workflow,
        is_impacted: impl Fn(PermissionKey) -> bool,
    ) -> AppResult<CollectedImpacts> {
        let configurations = self
            .structure
            .configurations_for_workflow(tenant_id, workflow.id())
            .await?;

        let mut impacts = Vec::new();
        let mut plan = PrunePlan::default();
        for configuration in configurations {
            let permissions: Vec<ItemTypePermission> = self
                .permission_repository
                .list_permissions(tenant_id, configuration.id())
                .await?
                .into_iter()
                .filter(|permission| is_impacted(permission.key()))
                .collect();
            if permissions.is_empty() {
                continue;
            }

            let item_type_set = self
                .structure
                .item_type_set(tenant_id, configuration.item_type_set_id())
                .await?;
            let field_set = self
                .structure
                .field_set(tenant_id, configuration.field_set_id())
                .await?;
            let references: Vec<_> = permissions
                .iter()
                .map(ItemTypePermission::reference)
                .collect();
            let assignments = self
                .permission_repository
                .load_assignments(tenant_id, &references)
                .await?;

            let builder = ImpactBuilder {
                configuration: &configuration,
                item_type_set: &item_type_set,
                workflow,
                field_set: &field_set,
                assignments: &assignments,
            };
            for permission in &permissions {
                impacts.push(builder.impact(permission));
                plan.targets
                    .push(prune_target(permission.reference(), &item_type_set));
            }
        }

        Ok(CollectedImpacts { impacts, plan })
    }
}

fn count_with_assignments(impacts: &[PermissionImpact]) -> usize {
    impacts
        .iter()
        .filter(|impact| impact.has_assignments)
        .count()
}
