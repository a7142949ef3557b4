use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use itemflow_core::AppError;
use serde::{Deserialize, Serialize};

use crate::{
    FieldConfigurationId, FieldSet, ItemTypeConfigurationId, PermissionId, TransitionId, Workflow,
    WorkflowStatusId,
};

/// The six kinds of permissions derived from an item type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// Who may work on items of the configuration.
    Worker,
    /// Who may create items of the configuration.
    Creator,
    /// Who owns items while they sit in one workflow status.
    StatusOwner,
    /// Who owns one field of the configuration.
    FieldOwner,
    /// Who may execute one workflow transition.
    Executor,
    /// Who may edit or view one field while in one workflow status.
    FieldStatus,
}

impl PermissionKind {
    /// Returns the stable storage value, also used as assignment permission type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Creator => "creator",
            Self::StatusOwner => "status_owner",
            Self::FieldOwner => "field_owner",
            Self::Executor => "executor",
            Self::FieldStatus => "field_status",
        }
    }

    /// Returns a human-readable label.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Worker => "Workers",
            Self::Creator => "Creators",
            Self::StatusOwner => "Status owners",
            Self::FieldOwner => "Field owners",
            Self::Executor => "Transition executors",
            Self::FieldStatus => "Field editors/viewers per status",
        }
    }

    /// Returns all kinds in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionKind] = &[
            PermissionKind::Worker,
            PermissionKind::Creator,
            PermissionKind::StatusOwner,
            PermissionKind::FieldOwner,
            PermissionKind::Executor,
            PermissionKind::FieldStatus,
        ];

        ALL
    }
}

impl Display for PermissionKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "worker" => Ok(Self::Worker),
            "creator" => Ok(Self::Creator),
            "status_owner" => Ok(Self::StatusOwner),
            "field_owner" => Ok(Self::FieldOwner),
            "executor" => Ok(Self::Executor),
            "field_status" => Ok(Self::FieldStatus),
            _ => Err(AppError::Validation(format!(
                "unknown permission kind '{value}'"
            ))),
        }
    }
}

/// Access flavour of a field-status permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatusAccess {
    /// May edit the field in the status.
    Editors,
    /// May view the field in the status.
    Viewers,
}

impl FieldStatusAccess {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Editors => "editors",
            Self::Viewers => "viewers",
        }
    }

    /// Returns both access flavours.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Editors, Self::Viewers]
    }
}

impl FromStr for FieldStatusAccess {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "editors" => Ok(Self::Editors),
            "viewers" => Ok(Self::Viewers),
            _ => Err(AppError::Validation(format!(
                "unknown field status access '{value}'"
            ))),
        }
    }
}

/// Structural key a permission row is derived from, relative to its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionKey {
    /// Keyed by the configuration alone.
    Worker,
    /// Keyed by the configuration alone.
    Creator,
    /// Keyed by one workflow status node.
    StatusOwner {
        /// Status node of the bound workflow.
        workflow_status_id: WorkflowStatusId,
    },
    /// Keyed by one field configuration.
    FieldOwner {
        /// Field configuration of the bound field set.
        field_configuration_id: FieldConfigurationId,
    },
    /// Keyed by one transition.
    Executor {
        /// Transition of the bound workflow.
        transition_id: TransitionId,
    },
    /// Keyed by a field configuration, a status node and an access flavour.
    FieldStatus {
        /// Field configuration of the bound field set.
        field_configuration_id: FieldConfigurationId,
        /// Status node of the bound workflow.
        workflow_status_id: WorkflowStatusId,
        /// Editors or viewers.
        access: FieldStatusAccess,
    },
}

impl PermissionKey {
    /// Returns the permission kind of this key.
    #[must_use]
    pub fn kind(&self) -> PermissionKind {
        match self {
            Self::Worker => PermissionKind::Worker,
            Self::Creator => PermissionKind::Creator,
            Self::StatusOwner { .. } => PermissionKind::StatusOwner,
            Self::FieldOwner { .. } => PermissionKind::FieldOwner,
            Self::Executor { .. } => PermissionKind::Executor,
            Self::FieldStatus { .. } => PermissionKind::FieldStatus,
        }
    }

    /// Returns the status node the key depends on, if any.
    #[must_use]
    pub fn workflow_status_id(&self) -> Option<WorkflowStatusId> {
        match self {
            Self::StatusOwner { workflow_status_id }
            | Self::FieldStatus {
                workflow_status_id, ..
            } => Some(*workflow_status_id),
            _ => None,
        }
    }

    /// Returns the field configuration the key depends on, if any.
    #[must_use]
    pub fn field_configuration_id(&self) -> Option<FieldConfigurationId> {
        match self {
            Self::FieldOwner {
                field_configuration_id,
            }
            | Self::FieldStatus {
                field_configuration_id,
                ..
            } => Some(*field_configuration_id),
            _ => None,
        }
    }

    /// Returns the transition the key depends on, if any.
    #[must_use]
    pub fn transition_id(&self) -> Option<TransitionId> {
        match self {
            Self::Executor { transition_id } => Some(*transition_id),
            _ => None,
        }
    }

    /// Returns the field-status access flavour, if any.
    #[must_use]
    pub fn access(&self) -> Option<FieldStatusAccess> {
        match self {
            Self::FieldStatus { access, .. } => Some(*access),
            _ => None,
        }
    }
}

/// Reference to one permission row, unique across the six kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionRef {
    /// Permission kind, doubling as assignment permission type.
    pub kind: PermissionKind,
    /// Permission row identifier.
    pub id: PermissionId,
}

impl Display for PermissionRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.kind, self.id)
    }
}

/// Derived permission row of an item type configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypePermission {
    id: PermissionId,
    item_type_configuration_id: ItemTypeConfigurationId,
    key: PermissionKey,
}

impl ItemTypePermission {
    /// Creates a permission row value.
    #[must_use]
    pub fn new(
        id: PermissionId,
        item_type_configuration_id: ItemTypeConfigurationId,
        key: PermissionKey,
    ) -> Self {
        Self {
            id,
            item_type_configuration_id,
            key,
        }
    }

    /// Returns the row identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the owning configuration.
    #[must_use]
    pub fn item_type_configuration_id(&self) -> ItemTypeConfigurationId {
        self.item_type_configuration_id
    }

    /// Returns the structural key.
    #[must_use]
    pub fn key(&self) -> PermissionKey {
        self.key
    }

    /// Returns the permission kind.
    #[must_use]
    pub fn kind(&self) -> PermissionKind {
        self.key.kind()
    }

    /// Returns the cross-kind reference to this row.
    #[must_use]
    pub fn reference(&self) -> PermissionRef {
        PermissionRef {
            kind: self.key.kind(),
            id: self.id,
        }
    }
}

/// Returns every structural key implied by a workflow and field set binding.
///
/// Keys come out in catalog order: worker, creator, status owners, field
/// owners, executors, then field-status pairs (field x status x access).
#[must_use]
pub fn required_permission_keys(workflow: &Workflow, field_set: &FieldSet) -> Vec<PermissionKey> {
    let mut keys = vec![PermissionKey::Worker, PermissionKey::Creator];

    keys.extend(
        workflow
            .statuses()
            .iter()
            .map(|status| PermissionKey::StatusOwner {
                workflow_status_id: status.id(),
            }),
    );
    keys.extend(
        field_set
            .field_configurations()
            .map(|configuration| PermissionKey::FieldOwner {
                field_configuration_id: configuration.id(),
            }),
    );
    keys.extend(
        workflow
            .transitions()
            .iter()
            .map(|transition| PermissionKey::Executor {
                transition_id: transition.id(),
            }),
    );

    for configuration in field_set.field_configurations() {
        for status in workflow.statuses() {
            for access in FieldStatusAccess::all() {
                keys.push(PermissionKey::FieldStatus {
                    field_configuration_id: configuration.id(),
                    workflow_status_id: status.id(),
                    access: *access,
                });
            }
        }
    }

    keys
}

/// Returns the required keys not yet covered by an existing permission row.
#[must_use]
pub fn missing_permission_keys(
    existing: &[ItemTypePermission],
    workflow: &Workflow,
    field_set: &FieldSet,
) -> Vec<PermissionKey> {
    let covered: BTreeSet<PermissionKey> = existing.iter().map(ItemTypePermission::key).collect();

    required_permission_keys(workflow, field_set)
        .into_iter()
        .filter(|key| !covered.contains(key))
        .collect()
}
