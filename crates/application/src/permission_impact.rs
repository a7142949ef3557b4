use std::collections::HashMap;

use itemflow_domain::{
    FieldConfigurationId, FieldSet, FieldStatusAccess, ItemTypeConfiguration,
    ItemTypeConfigurationId, ItemTypePermission, ItemTypeSet, ItemTypeSetId, PermissionId,
    PermissionKey, PermissionKind, PermissionRef, TransitionId, Workflow, WorkflowStatusId,
};
use serde::Serialize;

use crate::permission_ports::AssignmentSummary;

/// Human-readable location of a permission inside the configuration hierarchy.
///
/// Names are resolved against the structure the permission currently
/// belongs to; a name is `None` when the referenced element no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionLocation {
    /// Owning configuration.
    pub item_type_configuration_id: ItemTypeConfigurationId,
    /// Item type name of the configuration.
    pub item_type_name: String,
    /// Owning item type set.
    pub item_type_set_id: ItemTypeSetId,
    /// Item type set name.
    pub item_type_set_name: String,
    /// Status node for status-based kinds.
    pub workflow_status_id: Option<WorkflowStatusId>,
    /// Status name for status-based kinds.
    pub status_name: Option<String>,
    /// Field configuration for field-based kinds.
    pub field_configuration_id: Option<FieldConfigurationId>,
    /// Field name for field-based kinds.
    pub field_name: Option<String>,
    /// Transition for executor permissions.
    pub transition_id: Option<TransitionId>,
    /// Transition name for executor permissions.
    pub transition_name: Option<String>,
    /// Source status name of the transition.
    pub from_status_name: Option<String>,
    /// Target status name of the transition.
    pub to_status_name: Option<String>,
    /// Editors or viewers for field-status permissions.
    pub access: Option<FieldStatusAccess>,
}

impl PermissionLocation {
    /// Resolves the location of a key against a configuration's structure.
    #[must_use]
    pub fn describe(
        configuration: &ItemTypeConfiguration,
        item_type_set: &ItemTypeSet,
        workflow: &Workflow,
        field_set: &FieldSet,
        key: PermissionKey,
    ) -> Self {
        let workflow_status_id = key.workflow_status_id();
        let field_configuration_id = key.field_configuration_id();
        let transition_id = key.transition_id();

        let status_name = workflow_status_id
            .and_then(|id| workflow.workflow_status(id))
            .map(|status| status.status_name().as_str().to_owned());
        let field_name = field_configuration_id
            .and_then(|id| field_set.field_configuration(id))
            .map(|configuration| configuration.field_name().as_str().to_owned());

        let transition = transition_id.and_then(|id| workflow.transition(id));
        let status_name_of = |id| {
            workflow
                .workflow_status(id)
                .map(|status| status.status_name().as_str().to_owned())
        };

        Self {
            item_type_configuration_id: configuration.id(),
            item_type_name: configuration.item_type_name().as_str().to_owned(),
            item_type_set_id: item_type_set.id(),
            item_type_set_name: item_type_set.name().as_str().to_owned(),
            workflow_status_id,
            status_name,
            field_configuration_id,
            field_name,
            transition_id,
            transition_name: transition.map(|transition| transition.name().as_str().to_owned()),
            from_status_name: transition.and_then(|transition| status_name_of(transition.from_status())),
            to_status_name: transition.and_then(|transition| status_name_of(transition.to_status())),
            access: key.access(),
        }
    }
}

/// One permission affected by a structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionImpact {
    /// Permission row identifier.
    pub permission_id: PermissionId,
    /// Permission kind.
    pub kind: PermissionKind,
    /// Structural key of the row.
    pub key: PermissionKey,
    /// Where the permission lives.
    pub location: PermissionLocation,
    /// Names of roles holding the permission, sorted.
    pub assigned_roles: Vec<String>,
    /// Whether any role or grant holds the permission.
    pub has_assignments: bool,
}

impl PermissionImpact {
    /// Builds an impact entry from a permission row and its assignments.
    #[must_use]
    pub fn new(
        permission: &ItemTypePermission,
        location: PermissionLocation,
        assignments: Option<&AssignmentSummary>,
    ) -> Self {
        Self {
            permission_id: permission.id(),
            kind: permission.kind(),
            key: permission.key(),
            location,
            assigned_roles: assignments
                .map(|summary| summary.role_names.iter().cloned().collect())
                .unwrap_or_default(),
            has_assignments: assignments.is_some_and(AssignmentSummary::has_assignments),
        }
    }

    /// Returns the cross-kind reference to the permission row.
    #[must_use]
    pub fn reference(&self) -> PermissionRef {
        PermissionRef {
            kind: self.kind,
            id: self.permission_id,
        }
    }
}

/// Element of the new structure a preservable permission maps onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchedElement {
    /// The configuration itself, for worker and creator permissions.
    ItemTypeConfiguration {
        /// Configuration identifier.
        id: ItemTypeConfigurationId,
        /// Item type name.
        name: String,
    },
    /// A status node of the new workflow.
    WorkflowStatus {
        /// Status node identifier.
        id: WorkflowStatusId,
        /// Status name.
        name: String,
    },
    /// A field configuration of the new field set.
    FieldConfiguration {
        /// Field configuration identifier.
        id: FieldConfigurationId,
        /// Field name.
        name: String,
    },
    /// A transition of the new workflow.
    Transition {
        /// Transition identifier.
        id: TransitionId,
        /// Transition name.
        name: String,
    },
    /// A (field configuration, status node) pair of the new structure.
    FieldStatus {
        /// Field configuration identifier.
        field_configuration_id: FieldConfigurationId,
        /// Field name.
        field_name: String,
        /// Status node identifier.
        workflow_status_id: WorkflowStatusId,
        /// Status name.
        status_name: String,
    },
}

impl MatchedElement {
    /// Returns the primary identifier of the matched element as text.
    ///
    /// Field-status pairs are identified by their field configuration.
    #[must_use]
    pub fn entity_id(&self) -> String {
        match self {
            Self::ItemTypeConfiguration { id, .. } => id.to_string(),
            Self::WorkflowStatus { id, .. } => id.to_string(),
            Self::FieldConfiguration { id, .. } => id.to_string(),
            Self::Transition { id, .. } => id.to_string(),
            Self::FieldStatus {
                field_configuration_id,
                ..
            } => field_configuration_id.to_string(),
        }
    }

    /// Returns a display name of the matched element.
    #[must_use]
    pub fn entity_name(&self) -> String {
        match self {
            Self::ItemTypeConfiguration { name, .. }
            | Self::WorkflowStatus { name, .. }
            | Self::FieldConfiguration { name, .. }
            | Self::Transition { name, .. } => name.clone(),
            Self::FieldStatus {
                field_name,
                status_name,
                ..
            } => format!("{field_name} @ {status_name}"),
        }
    }
}

/// Permission impact with the preservation verdict of a migration proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectablePermissionImpact {
    /// Impact details of the current row.
    #[serde(flatten)]
    pub impact: PermissionImpact,
    /// Whether an equivalent element exists in the proposed structure.
    pub can_be_preserved: bool,
    /// Matching element in the proposed structure, when preservable.
    pub matched_element: Option<MatchedElement>,
    /// Key the row takes when preserved, when preservable.
    pub matched_key: Option<PermissionKey>,
}

impl SelectablePermissionImpact {
    /// Returns the permission row identifier.
    #[must_use]
    pub fn permission_id(&self) -> PermissionId {
        self.impact.permission_id
    }

    /// Returns the textual id of the matching element, when preservable.
    #[must_use]
    pub fn matching_entity_id(&self) -> Option<String> {
        self.matched_element.as_ref().map(MatchedElement::entity_id)
    }

    /// Returns the display name of the matching element, when preservable.
    #[must_use]
    pub fn matching_entity_name(&self) -> Option<String> {
        self.matched_element.as_ref().map(MatchedElement::entity_name)
    }
}

/// Builds impact entries for permission rows of one configuration.
pub(crate) struct ImpactBuilder<'a> {
    pub(crate) configuration: &'a ItemTypeConfiguration,
    pub(crate) item_type_set: &'a ItemTypeSet,
    pub(crate) workflow: &'a Workflow,
    pub(crate) field_set: &'a FieldSet,
    pub(crate) assignments: &'a HashMap<PermissionRef, AssignmentSummary>,
}

impl ImpactBuilder<'_> {
    pub(crate) fn impact(&self, permission: &ItemTypePermission) -> PermissionImpact {
        let location = PermissionLocation::describe(
            self.configuration,
            self.item_type_set,
            self.workflow,
            self.field_set,
            permission.key(),
        );
        PermissionImpact::new(
            permission,
            location,
            self.assignments.get(&permission.reference()),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use itemflow_domain::{FieldConfigurationId, ItemTypeConfigurationId, WorkflowStatusId};

    use super::MatchedElement;
    use crate::permission_ports::AssignmentSummary;

    #[test]
    fn assignment_summary_counts_grants_without_roles() {
        let summary = AssignmentSummary {
            role_names: BTreeSet::new(),
            grant_count: 1,
            project_assignment_count: 0,
        };
        assert!(summary.has_assignments());
        assert!(!AssignmentSummary::default().has_assignments());
    }

    #[test]
    fn field_status_match_is_named_by_both_dimensions() {
        let field_configuration_id = FieldConfigurationId::new();
        let element = MatchedElement::FieldStatus {
            field_configuration_id,
            field_name: "Description".to_owned(),
            workflow_status_id: WorkflowStatusId::new(),
            status_name: "Open".to_owned(),
        };

        assert_eq!(element.entity_id(), field_configuration_id.to_string());
        assert_eq!(element.entity_name(), "Description @ Open");
    }

    #[test]
    fn matched_element_serializes_with_type_tag() {
        let element = MatchedElement::ItemTypeConfiguration {
            id: ItemTypeConfigurationId::new(),
            name: "Bug".to_owned(),
        };
        let value = serde_json::to_value(&element).unwrap_or_default();
        assert_eq!(value["type"], "item_type_configuration");
        assert_eq!(value["name"], "Bug");
    }
}
