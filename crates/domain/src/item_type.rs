use std::collections::BTreeSet;
use std::str::FromStr;

use itemflow_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{FieldSetId, ItemTypeConfigurationId, ItemTypeId, ItemTypeSetId, ProjectId, WorkflowId};

/// Visibility scope of an item type set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemTypeSetScope {
    /// Shared by every project of the tenant.
    Tenant,
    /// Owned by specific projects.
    Project,
    /// Built-in set available to all tenants.
    Global,
}

impl ItemTypeSetScope {
    /// Returns a stable storage value for the scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Project => "project",
            Self::Global => "global",
        }
    }
}

impl FromStr for ItemTypeSetScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tenant" => Ok(Self::Tenant),
            "project" => Ok(Self::Project),
            "global" => Ok(Self::Global),
            _ => Err(AppError::Validation(format!(
                "unknown item type set scope '{value}'"
            ))),
        }
    }
}

/// Group of item type configurations together with the projects using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeSet {
    id: ItemTypeSetId,
    name: NonEmptyString,
    scope: ItemTypeSetScope,
    project_ids: BTreeSet<ProjectId>,
}

impl ItemTypeSet {
    /// Creates a validated item type set snapshot.
    pub fn new(
        id: ItemTypeSetId,
        name: impl Into<String>,
        scope: ItemTypeSetScope,
        project_ids: BTreeSet<ProjectId>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            scope,
            project_ids,
        })
    }

    /// Returns the set identifier.
    #[must_use]
    pub fn id(&self) -> ItemTypeSetId {
        self.id
    }

    /// Returns the set display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the set scope.
    #[must_use]
    pub fn scope(&self) -> ItemTypeSetScope {
        self.scope
    }

    /// Returns every project associated with the set.
    #[must_use]
    pub fn project_ids(&self) -> &BTreeSet<ProjectId> {
        &self.project_ids
    }
}

/// Binding of one item type to one workflow and one field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeConfiguration {
    id: ItemTypeConfigurationId,
    item_type_id: ItemTypeId,
    item_type_name: NonEmptyString,
    item_type_set_id: ItemTypeSetId,
    workflow_id: WorkflowId,
    field_set_id: FieldSetId,
}

/// Input payload used to construct an item type configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTypeConfigurationInput {
    /// Configuration identifier.
    pub id: ItemTypeConfigurationId,
    /// Bound item type.
    pub item_type_id: ItemTypeId,
    /// Item type display name.
    pub item_type_name: String,
    /// Owning item type set.
    pub item_type_set_id: ItemTypeSetId,
    /// Bound workflow.
    pub workflow_id: WorkflowId,
    /// Bound field set.
    pub field_set_id: FieldSetId,
}

impl ItemTypeConfiguration {
    /// Creates a validated configuration snapshot.
    pub fn new(input: ItemTypeConfigurationInput) -> AppResult<Self> {
        let ItemTypeConfigurationInput {
            id,
            item_type_id,
            item_type_name,
            item_type_set_id,
            workflow_id,
            field_set_id,
        } = input;

        Ok(Self {
            id,
            item_type_id,
            item_type_name: NonEmptyString::new(item_type_name)?,
            item_type_set_id,
            workflow_id,
            field_set_id,
        })
    }

    /// Returns the configuration identifier.
    #[must_use]
    pub fn id(&self) -> ItemTypeConfigurationId {
        self.id
    }

    /// Returns the bound item type.
    #[must_use]
    pub fn item_type_id(&self) -> ItemTypeId {
        self.item_type_id
    }

    /// Returns the item type display name.
    #[must_use]
    pub fn item_type_name(&self) -> &NonEmptyString {
        &self.item_type_name
    }

    /// Returns the owning item type set.
    #[must_use]
    pub fn item_type_set_id(&self) -> ItemTypeSetId {
        self.item_type_set_id
    }

    /// Returns the bound workflow.
    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// Returns the bound field set.
    #[must_use]
    pub fn field_set_id(&self) -> FieldSetId {
        self.field_set_id
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ItemTypeConfiguration, ItemTypeConfigurationInput, ItemTypeSetScope};
    use crate::{FieldSetId, ItemTypeConfigurationId, ItemTypeId, ItemTypeSetId, WorkflowId};

    #[test]
    fn configuration_requires_item_type_name() {
        let configuration = ItemTypeConfiguration::new(ItemTypeConfigurationInput {
            id: ItemTypeConfigurationId::new(),
            item_type_id: ItemTypeId::new(),
            item_type_name: " ".to_owned(),
            item_type_set_id: ItemTypeSetId::new(),
            workflow_id: WorkflowId::new(),
            field_set_id: FieldSetId::new(),
        });

        assert!(configuration.is_err());
    }

    #[test]
    fn unknown_scope_is_rejected() {
        assert!(ItemTypeSetScope::from_str("galaxy").is_err());
        assert!(matches!(
            ItemTypeSetScope::from_str("project"),
            Ok(ItemTypeSetScope::Project)
        ));
    }
}
