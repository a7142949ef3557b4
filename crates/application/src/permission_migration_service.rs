mod matching;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itemflow_core::{AppError, AppResult, TenantId, UserIdentity};
use itemflow_domain::{
    AuditAction, FieldSetId, ItemTypeConfigurationId, ItemTypePermission, ItemTypeSetId,
    PermissionId, PermissionKind, WorkflowId,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::permission_impact::{ImpactBuilder, SelectablePermissionImpact};
use crate::permission_ports::{
    AuditEvent, AuditRepository, GrantCleanup, PermissionRebind, PermissionRepository, PrunePlan,
    StructureRepository,
};
use crate::pruning::{PermissionPruner, PruneSummary, prune_target};
use crate::structure_reader::StructureReader;

pub use matching::{MatchContext, PermissionMatch, PermissionMatchStrategy};

/// Proposed rebinding of a configuration to another field set and/or workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationProposal {
    /// Configuration to migrate.
    pub item_type_configuration_id: ItemTypeConfigurationId,
    /// Target field set; `None` keeps the current one.
    pub new_field_set_id: Option<FieldSetId>,
    /// Target workflow; `None` keeps the current one.
    pub new_workflow_id: Option<WorkflowId>,
}

/// Preservation verdict for every permission of a configuration under a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationImpactReport {
    /// Migrated configuration.
    pub item_type_configuration_id: ItemTypeConfigurationId,
    /// Item type name of the configuration.
    pub item_type_name: String,
    /// Set owning the configuration.
    pub item_type_set_id: ItemTypeSetId,
    /// Currently bound field set.
    pub old_field_set_id: FieldSetId,
    /// Proposed field set.
    pub new_field_set_id: FieldSetId,
    /// Currently bound workflow.
    pub old_workflow_id: WorkflowId,
    /// Proposed workflow.
    pub new_workflow_id: WorkflowId,
    /// Permission verdicts, grouped by kind in catalog order.
    pub impacts: Vec<SelectablePermissionImpact>,
    /// Permissions evaluated.
    pub total_analyzed: usize,
    /// Permissions with a counterpart in the proposed structure.
    pub total_preservable: usize,
    /// Permissions without a counterpart.
    pub total_removable: usize,
    /// Permissions held by at least one role.
    pub total_with_roles: usize,
    /// Removable permissions currently held by a role or grant.
    pub total_removable_with_assignments: usize,
    /// Analysis timestamp.
    pub analyzed_at: DateTime<Utc>,
}

impl MigrationImpactReport {
    /// Iterates verdicts of one permission kind.
    pub fn impacts_of_kind(
        &self,
        kind: PermissionKind,
    ) -> impl Iterator<Item = &SelectablePermissionImpact> {
        self.impacts
            .iter()
            .filter(move |impact| impact.impact.kind == kind)
    }

    /// Finds the verdict of one permission row.
    #[must_use]
    pub fn impact(&self, permission_id: PermissionId) -> Option<&SelectablePermissionImpact> {
        self.impacts
            .iter()
            .find(|impact| impact.permission_id() == permission_id)
    }
}

/// Operator decision on which analyzed permissions survive a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationDecision {
    /// Keep exactly the listed permissions; every other analyzed row goes.
    PreserveSelected(BTreeSet<PermissionId>),
    /// Keep every preservable permission.
    PreserveAllPreservable,
    /// Delete every analyzed permission.
    RemoveAll,
}

impl MigrationDecision {
    /// Builds a decision from transport flags.
    ///
    /// The two flags are mutually exclusive and exclude an explicit selection.
    pub fn from_flags(
        preserve_permission_ids: BTreeSet<PermissionId>,
        preserve_all_preservable: bool,
        remove_all: bool,
    ) -> AppResult<Self> {
        match (preserve_all_preservable, remove_all) {
            (true, true) => Err(AppError::Validation(
                "preserve_all_preservable and remove_all are mutually exclusive".to_owned(),
            )),
            (true, false) | (false, true) if !preserve_permission_ids.is_empty() => {
                Err(AppError::Validation(
                    "explicit permission ids cannot be combined with preserve_all_preservable or remove_all"
                        .to_owned(),
                ))
            }
            (true, false) => Ok(Self::PreserveAllPreservable),
            (false, true) => Ok(Self::RemoveAll),
            (false, false) => Ok(Self::PreserveSelected(preserve_permission_ids)),
        }
    }
}

/// Input payload for applying a migration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ApplyMigrationInput {
    /// Configuration to migrate.
    pub item_type_configuration_id: ItemTypeConfigurationId,
    /// Target field set; `None` keeps the current one.
    pub new_field_set_id: Option<FieldSetId>,
    /// Target workflow; `None` keeps the current one.
    pub new_workflow_id: Option<WorkflowId>,
    /// Permissions to keep.
    #[serde(default)]
    pub preserve_permission_ids: BTreeSet<PermissionId>,
    /// Keep every preservable permission.
    #[serde(default)]
    pub preserve_all_preservable: bool,
    /// Delete every analyzed permission.
    #[serde(default)]
    pub remove_all: bool,
}

impl ApplyMigrationInput {
    /// Returns the proposal part of the input.
    #[must_use]
    pub fn proposal(&self) -> MigrationProposal {
        MigrationProposal {
            item_type_configuration_id: self.item_type_configuration_id,
            new_field_set_id: self.new_field_set_id,
            new_workflow_id: self.new_workflow_id,
        }
    }
}

/// Result of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationApplyResult {
    /// Migrated configuration.
    pub item_type_configuration_id: ItemTypeConfigurationId,
    /// Permissions evaluated by the re-run analysis.
    pub analyzed_permissions: usize,
    /// Permissions kept.
    pub preserved_permissions: usize,
    /// Prune counts.
    #[serde(flatten)]
    pub summary: PruneSummary,
}

/// Analyzes and applies field set and workflow migrations of a configuration.
#[derive(Clone)]
pub struct PermissionMigrationService {
    structure: StructureReader,
    permission_repository: Arc<dyn PermissionRepository>,
    pruner: PermissionPruner,
    audit_repository: Arc<dyn AuditRepository>,
}

impl PermissionMigrationService {
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

    /// Classifies every permission of the configuration as preservable or removable.
    ///
    /// Read-only. Fails with `Validation` when the proposal changes nothing.
    pub async fn analyze_migration(
        &self,
        actor: &UserIdentity,
        proposal: &MigrationProposal,
    ) -> AppResult<MigrationImpactReport> {
        let context = self.match_context(actor.tenant_id(), proposal).await?;
        self.analyze(actor.tenant_id(), &context).await
    }

    /// Re-runs the analysis and prunes every permission outside the decided preserve set.
    ///
    /// Rebinding the configuration itself is left to the caller.
    pub async fn apply_migration(
        &self,
        actor: &UserIdentity,
        input: ApplyMigrationInput,
    ) -> AppResult<MigrationApplyResult> {
        let proposal = input.proposal();
        let decision = MigrationDecision::from_flags(
            input.preserve_permission_ids,
            input.preserve_all_preservable,
            input.remove_all,
        )?;

        let tenant_id = actor.tenant_id();
        let context = self.match_context(tenant_id, &proposal).await?;
        let report = self.analyze(tenant_id, &context).await?;
        let preserved = resolve_preserve_set(&report, &decision)?;

        let mut plan = PrunePlan::default();
        for selectable in &report.impacts {
            let permission = selectable.impact.reference();
            if !preserved.contains(&selectable.permission_id()) {
                plan.targets
                    .push(prune_target(permission, &context.item_type_set));
                continue;
            }

            if let Some(key) = selectable.matched_key
                && key != selectable.impact.key
            {
                plan.rebinds.push(PermissionRebind { permission, key });
            }
        }

        let summary = self.pruner.prune(tenant_id, &plan).await?;

        info!(
            tenant_id = %tenant_id,
            item_type_configuration_id = %proposal.item_type_configuration_id,
            preserved = preserved.len(),
            removed = summary.deleted_permissions,
            rebound = summary.rebound_permissions,
            "applied permission migration"
        );

        self.audit_repository
            .append_event(AuditEvent {
                tenant_id,
                subject: actor.subject().to_owned(),
                action: AuditAction::PermissionMigrationApplied,
                resource_type: "item_type_configuration".to_owned(),
                resource_id: proposal.item_type_configuration_id.to_string(),
                detail: Some(format!(
                    "migration to field set '{}' and workflow '{}' kept {} and deleted {} permissions",
                    report.new_field_set_id,
                    report.new_workflow_id,
                    preserved.len(),
                    summary.deleted_permissions
                )),
            })
            .await?;

        Ok(MigrationApplyResult {
            item_type_configuration_id: proposal.item_type_configuration_id,
            analyzed_permissions: report.total_analyzed,
            preserved_permissions: preserved.len(),
            summary,
        })
    }

    async fn match_context(
        &self,
        tenant_id: TenantId,
        proposal: &MigrationProposal,
    ) -> AppResult<MatchContext> {
        let bound = self
            .structure
            .bound_structure(tenant_id, proposal.item_type_configuration_id)
            .await?;

        let new_field_set_id = proposal
            .new_field_set_id
            .unwrap_or(bound.configuration.field_set_id());
        let new_workflow_id = proposal
            .new_workflow_id
            .unwrap_or(bound.configuration.workflow_id());
        if new_field_set_id == bound.field_set.id() && new_workflow_id == bound.workflow.id() {
            return Err(AppError::Validation(format!(
                "no changes proposed for item type configuration '{}'",
                proposal.item_type_configuration_id
            )));
        }

        let new_field_set = if new_field_set_id == bound.field_set.id() {
            bound.field_set.clone()
        } else {
            self.structure.field_set(tenant_id, new_field_set_id).await?
        };
        let new_workflow = if new_workflow_id == bound.workflow.id() {
            bound.workflow.clone()
        } else {
            self.structure.workflow(tenant_id, new_workflow_id).await?
        };

        Ok(MatchContext {
            configuration: bound.configuration,
            item_type_set: bound.item_type_set,
            old_field_set: bound.field_set,
            new_field_set,
            old_workflow: bound.workflow,
            new_workflow,
        })
    }

    async fn analyze(
        &self,
        tenant_id: TenantId,
        context: &MatchContext,
    ) -> AppResult<MigrationImpactReport> {
        let permissions = self
            .permission_repository
            .list_permissions(tenant_id, context.configuration.id())
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
            configuration: &context.configuration,
            item_type_set: &context.item_type_set,
            workflow: &context.old_workflow,
            field_set: &context.old_field_set,
            assignments: &assignments,
        };

        let mut impacts = Vec::with_capacity(permissions.len());
        let mut claimed_keys = HashSet::new();
        for kind in PermissionKind::all() {
            let strategy = PermissionMatchStrategy::for_kind(*kind);
            for permission in permissions.iter().filter(|row| row.kind() == *kind) {
                let mut found = strategy.evaluate(context, permission.key());
                if let Some(matched) = &found
                    && !claimed_keys.insert(matched.key)
                {
                    warn!(
                        tenant_id = %tenant_id,
                        permission_id = %permission.id(),
                        "permission maps onto an element already claimed by another row"
                    );
                    found = None;
                }

                impacts.push(SelectablePermissionImpact {
                    impact: builder.impact(permission),
                    can_be_preserved: found.is_some(),
                    matched_key: found.as_ref().map(|matched| matched.key),
                    matched_element: found.map(|matched| matched.element),
                });
            }
        }

        let total_analyzed = impacts.len();
        let total_preservable = impacts
            .iter()
            .filter(|impact| impact.can_be_preserved)
            .count();
        let total_with_roles = impacts
            .iter()
            .filter(|impact| !impact.impact.assigned_roles.is_empty())
            .count();
        let total_removable_with_assignments = impacts
            .iter()
            .filter(|impact| !impact.can_be_preserved && impact.impact.has_assignments)
            .count();

        info!(
            tenant_id = %tenant_id,
            item_type_configuration_id = %context.configuration.id(),
            analyzed = total_analyzed,
            preservable = total_preservable,
            "analyzed permission migration"
        );

        Ok(MigrationImpactReport {
            item_type_configuration_id: context.configuration.id(),
            item_type_name: context.configuration.item_type_name().as_str().to_owned(),
            item_type_set_id: context.item_type_set.id(),
            old_field_set_id: context.old_field_set.id(),
            new_field_set_id: context.new_field_set.id(),
            old_workflow_id: context.old_workflow.id(),
            new_workflow_id: context.new_workflow.id(),
            impacts,
            total_analyzed,
            total_preservable,
            total_removable: total_analyzed - total_preservable,
            total_with_roles,
            total_removable_with_assignments,
            analyzed_at: Utc::now(),
        })
    }
}

/// Turns a decision into the concrete set of permission rows to keep.
fn resolve_preserve_set(
    report: &MigrationImpactReport,
    decision: &MigrationDecision,
) -> AppResult<BTreeSet<PermissionId>> {
    match decision {
        MigrationDecision::RemoveAll => Ok(BTreeSet::new()),
        MigrationDecision::PreserveAllPreservable => Ok(report
            .impacts
            .iter()
            .filter(|impact| impact.can_be_preserved)
            .map(SelectablePermissionImpact::permission_id)
            .collect()),
        MigrationDecision::PreserveSelected(permission_ids) => {
            for permission_id in permission_ids {
                let impact = report.impact(*permission_id).ok_or_else(|| {
                    AppError::NotFound(format!(
                        "permission '{permission_id}' is not part of the analyzed configuration"
                    ))
                })?;
                if !impact.can_be_preserved {
                    return Err(AppError::Validation(format!(
                        "permission '{permission_id}' has no counterpart in the proposed structure"
                    )));
                }
            }

            Ok(permission_ids.clone())
        }
    }
}
