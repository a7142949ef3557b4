//! PostgreSQL adapters for the permission engine ports.

#![forbid(unsafe_code)]

mod postgres_audit_repository;
mod postgres_grant_cleanup;
mod postgres_permission_repository;
mod postgres_structure_repository;
pub mod schema_contract;

#[cfg(test)]
mod test_fixtures;

pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_grant_cleanup::PostgresGrantCleanup;
pub use postgres_permission_repository::PostgresPermissionRepository;
pub use postgres_structure_repository::PostgresStructureRepository;
