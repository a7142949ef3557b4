use itemflow_domain::{
    FieldConfiguration, FieldConfigurationId, FieldSet, ItemTypeConfiguration, ItemTypeSet,
    PermissionKey, PermissionKind, Workflow, WorkflowStatus, WorkflowStatusId,
};

use crate::permission_impact::MatchedElement;

/// Old and new structure snapshots shared by every matching strategy.
#[derive(Debug, Clone)]
pub struct MatchContext {
    /// Migrated configuration.
    pub configuration: ItemTypeConfiguration,
    /// Set owning the configuration.
    pub item_type_set: ItemTypeSet,
    /// Currently bound field set.
    pub old_field_set: FieldSet,
    /// Proposed field set, equal to the old one when unchanged.
    pub new_field_set: FieldSet,
    /// Currently bound workflow.
    pub old_workflow: Workflow,
    /// Proposed workflow, equal to the old one when unchanged.
    pub new_workflow: Workflow,
}

impl MatchContext {
    /// Returns whether the proposal swaps the field set.
    #[must_use]
    pub fn field_set_changed(&self) -> bool {
        self.old_field_set.id() != self.new_field_set.id()
    }

    /// Returns whether the proposal swaps the workflow.
    #[must_use]
    pub fn workflow_changed(&self) -> bool {
        self.old_workflow.id() != self.new_workflow.id()
    }

    /// Finds the new status node standing for an old one, by tenant-level status.
    fn status_counterpart(
        &self,
        workflow_status_id: WorkflowStatusId,
    ) -> Option<&WorkflowStatus> {
        let old = self.old_workflow.workflow_status(workflow_status_id)?;
        self.new_workflow.node_for_status(old.status_id())
    }

    /// Finds the new field configuration standing for an old one, by field.
    fn field_counterpart(
        &self,
        field_configuration_id: FieldConfigurationId,
    ) -> Option<&FieldConfiguration> {
        let old = self.old_field_set.field_configuration(field_configuration_id)?;
        self.new_field_set.configuration_for_field(old.field_id())
    }
}

/// Where a preservable permission lands in the proposed structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatch {
    /// Matching element of the new structure.
    pub element: MatchedElement,
    /// Key the permission takes once rebound.
    pub key: PermissionKey,
}

/// Matching rule of one permission kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMatchStrategy {
    /// Always preserved onto the configuration.
    Worker,
    /// Always preserved onto the configuration.
    Creator,
    /// Matches on the tenant-level status.
    StatusOwner,
    /// Matches on the underlying field.
    FieldOwner,
    /// Matches on the (from, to) status pair.
    Executor,
    /// Requires both the field and the status to survive.
    FieldStatus,
}

impl PermissionMatchStrategy {
    /// Returns the strategy evaluating rows of `kind`.
    #[must_use]
    pub fn for_kind(kind: PermissionKind) -> Self {
        match kind {
            PermissionKind::Worker => Self::Worker,
            PermissionKind::Creator => Self::Creator,
            PermissionKind::StatusOwner => Self::StatusOwner,
            PermissionKind::FieldOwner => Self::FieldOwner,
            PermissionKind::Executor => Self::Executor,
            PermissionKind::FieldStatus => Self::FieldStatus,
        }
    }

    /// Returns the kind this strategy evaluates.
    #[must_use]
    pub fn kind(&self) -> PermissionKind {
        match self {
            Self::Worker => PermissionKind::Worker,
            Self::Creator => PermissionKind::Creator,
            Self::StatusOwner => PermissionKind::StatusOwner,
            Self::FieldOwner => PermissionKind::FieldOwner,
            Self::Executor => PermissionKind::Executor,
            Self::FieldStatus => PermissionKind::FieldStatus,
        }
    }

    /// Finds the counterpart of `key` in the proposed structure.
    ///
    /// Returns `None` when the key is orphaned by the proposal, when it does
    /// not resolve in the current structure, or when it belongs to another kind.
    #[must_use]
    pub fn evaluate(&self, context: &MatchContext, key: PermissionKey) -> Option<PermissionMatch> {
        match (self, key) {
            (Self::Worker, PermissionKey::Worker) | (Self::Creator, PermissionKey::Creator) => {
                Some(PermissionMatch {
                    element: MatchedElement::ItemTypeConfiguration {
                        id: context.configuration.id(),
                        name: context.configuration.item_type_name().as_str().to_owned(),
                    },
                    key,
                })
            }
            (Self::StatusOwner, PermissionKey::StatusOwner { workflow_status_id }) => {
                let status = context.status_counterpart(workflow_status_id)?;
                Some(PermissionMatch {
                    element: MatchedElement::WorkflowStatus {
                        id: status.id(),
                        name: status.status_name().as_str().to_owned(),
                    },
                    key: PermissionKey::StatusOwner {
                        workflow_status_id: status.id(),
                    },
                })
            }
            (
                Self::FieldOwner,
                PermissionKey::FieldOwner {
                    field_configuration_id,
                },
            ) => {
                let field = context.field_counterpart(field_configuration_id)?;
                Some(PermissionMatch {
                    element: MatchedElement::FieldConfiguration {
                        id: field.id(),
                        name: field.field_name().as_str().to_owned(),
                    },
                    key: PermissionKey::FieldOwner {
                        field_configuration_id: field.id(),
                    },
                })
            }
            (Self::Executor, PermissionKey::Executor { transition_id }) => {
                let old = context.old_workflow.transition(transition_id)?;
                let (from, to) = context.old_workflow.transition_endpoints(old)?;
                let transition =
                    context
                        .new_workflow
                        .transition_between(from, to, old.name().as_str())?;
                Some(PermissionMatch {
                    element: MatchedElement::Transition {
                        id: transition.id(),
                        name: transition.name().as_str().to_owned(),
                    },
                    key: PermissionKey::Executor {
                        transition_id: transition.id(),
                    },
                })
            }
            (
                Self::FieldStatus,
                PermissionKey::FieldStatus {
                    field_configuration_id,
                    workflow_status_id,
                    access,
                },
            ) => {
                let field = context.field_counterpart(field_configuration_id)?;
                let status = context.status_counterpart(workflow_status_id)?;
                Some(PermissionMatch {
                    element: MatchedElement::FieldStatus {
                        field_configuration_id: field.id(),
                        field_name: field.field_name().as_str().to_owned(),
                        workflow_status_id: status.id(),
                        status_name: status.status_name().as_str().to_owned(),
                    },
                    key: PermissionKey::FieldStatus {
                        field_configuration_id: field.id(),
                        workflow_status_id: status.id(),
                        access,
                    },
                })
            }
            _ => None,
        }
    }
}
