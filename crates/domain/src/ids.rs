use std::fmt::{Display, Formatter};

use itemflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses a transport value into an identifier.
            pub fn parse(value: &str) -> AppResult<Self> {
                Uuid::parse_str(value.trim()).map(Self).map_err(|error| {
                    AppError::Validation(format!(
                        "invalid {} id '{value}': {error}",
                        $label
                    ))
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a work-item type.
    ItemTypeId,
    "item type"
);
uuid_identifier!(
    /// Identifier of an item type set.
    ItemTypeSetId,
    "item type set"
);
uuid_identifier!(
    /// Identifier of an item type configuration.
    ItemTypeConfigurationId,
    "item type configuration"
);
uuid_identifier!(
    /// Identifier of a project.
    ProjectId,
    "project"
);
uuid_identifier!(
    /// Identifier of a tenant-level status.
    StatusId,
    "status"
);
uuid_identifier!(
    /// Identifier of a workflow.
    WorkflowId,
    "workflow"
);
uuid_identifier!(
    /// Identifier of a status node inside one workflow.
    WorkflowStatusId,
    "workflow status"
);
uuid_identifier!(
    /// Identifier of a workflow transition.
    TransitionId,
    "transition"
);
uuid_identifier!(
    /// Identifier of a tenant-level field.
    FieldId,
    "field"
);
uuid_identifier!(
    /// Identifier of a field configuration.
    FieldConfigurationId,
    "field configuration"
);
uuid_identifier!(
    /// Identifier of a field set.
    FieldSetId,
    "field set"
);
uuid_identifier!(
    /// Identifier of a derived permission row.
    PermissionId,
    "permission"
);
uuid_identifier!(
    /// Identifier of a grant.
    GrantId,
    "grant"
);

#[cfg(test)]
mod tests {
    use super::{FieldSetId, WorkflowId};

    #[test]
    fn parse_accepts_surrounding_whitespace() {
        let id = WorkflowId::new();
        let parsed = WorkflowId::parse(format!(" {id} ").as_str());
        assert!(matches!(parsed, Ok(value) if value == id));
    }

    #[test]
    fn parse_rejects_garbage_with_label() {
        let parsed = FieldSetId::parse("not-a-uuid");
        let message = parsed.map(|_| String::new()).unwrap_or_else(|error| error.to_string());
        assert!(message.contains("field set"));
    }
}
