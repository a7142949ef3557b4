//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod field_set;
mod ids;
mod item_type;
mod permission;
mod security;
mod workflow;

pub use field_set::{FieldConfiguration, FieldSet, FieldSetEntry, FieldType};
pub use ids::{
    FieldConfigurationId, FieldId, FieldSetId, GrantId, ItemTypeConfigurationId, ItemTypeId,
    ItemTypeSetId, PermissionId, ProjectId, StatusId, TransitionId, WorkflowId, WorkflowStatusId,
};
pub use item_type::{
    ItemTypeConfiguration, ItemTypeConfigurationInput, ItemTypeSet, ItemTypeSetScope,
};
pub use permission::{
    FieldStatusAccess, ItemTypePermission, PermissionKey, PermissionKind, PermissionRef,
    missing_permission_keys, required_permission_keys,
};
pub use security::AuditAction;
pub use workflow::{Transition, Workflow, WorkflowStatus};
