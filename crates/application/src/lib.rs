//! Application services and ports of the permission engine.

#![forbid(unsafe_code)]

mod permission_impact;
mod permission_migration_service;
mod permission_ports;
mod permission_provisioning_service;
mod pruning;
mod removal_impact_service;
mod structure_reader;

#[cfg(test)]
mod test_support;

pub use permission_impact::{
    MatchedElement, PermissionImpact, PermissionLocation, SelectablePermissionImpact,
};
pub use permission_migration_service::{
    ApplyMigrationInput, MatchContext, MigrationApplyResult, MigrationDecision,
    MigrationImpactReport, MigrationProposal, PermissionMatch, PermissionMatchStrategy,
    PermissionMigrationService,
};
pub use permission_ports::{
    AssignmentSummary, AuditEvent, AuditRepository, GrantCleanup, GrantCleanupReport,
    PermissionRebind, PermissionRepository, ProjectScope, PruneOutcome, PrunePlan, PruneTarget,
    StructureRepository,
};
pub use permission_provisioning_service::{PermissionProvisioningService, ProvisioningReport};
pub use pruning::PruneSummary;
pub use removal_impact_service::{
    RemovalApplyResult, RemovalImpactService, RemovedStatus, RemovedTransition,
    StatusRemovalImpact, TransitionRemovalImpact,
};
