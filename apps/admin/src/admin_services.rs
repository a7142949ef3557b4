use std::sync::Arc;

use itemflow_application::{
    AuditRepository, GrantCleanup, PermissionMigrationService, PermissionProvisioningService,
    PermissionRepository, RemovalImpactService, StructureRepository,
};
use itemflow_core::{AppError, AppResult};
use itemflow_infrastructure::{
    PostgresAuditRepository, PostgresGrantCleanup, PostgresPermissionRepository,
    PostgresStructureRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::admin_config::AdminConfig;

/// Application services wired to the PostgreSQL adapters.
#[derive(Clone)]
pub struct AdminServices {
    pub provisioning: PermissionProvisioningService,
    pub removal_impact: RemovalImpactService,
    pub migration: PermissionMigrationService,
}

impl AdminServices {
    pub fn build(pool: PgPool) -> Self {
        let structure: Arc<dyn StructureRepository> =
            Arc::new(PostgresStructureRepository::new(pool.clone()));
        let permissions: Arc<dyn PermissionRepository> =
            Arc::new(PostgresPermissionRepository::new(pool.clone()));
        let grant_cleanup: Arc<dyn GrantCleanup> =
            Arc::new(PostgresGrantCleanup::new(pool.clone()));
        let audit: Arc<dyn AuditRepository> = Arc::new(PostgresAuditRepository::new(pool));

        Self {
            provisioning: PermissionProvisioningService::new(
                structure.clone(),
                permissions.clone(),
                audit.clone(),
            ),
            removal_impact: RemovalImpactService::new(
                structure.clone(),
                permissions.clone(),
                grant_cleanup.clone(),
                audit.clone(),
            ),
            migration: PermissionMigrationService::new(structure, permissions, grant_cleanup, audit),
        }
    }
}

pub async fn connect_and_migrate(config: &AdminConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}
