mod audit;
mod grant_cleanup;
mod permissions;
mod structure;

pub use audit::{AuditEvent, AuditRepository};
pub use grant_cleanup::{GrantCleanup, GrantCleanupReport};
pub use permissions::{
    AssignmentSummary, PermissionRebind, PermissionRepository, ProjectScope, PruneOutcome,
    PrunePlan, PruneTarget,
};
pub use structure::StructureRepository;
