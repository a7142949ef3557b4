use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use itemflow_application::{AuditEvent, AuditRepository};
use itemflow_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit log of permission engine mutations.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let action = event.action.as_str();
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                tenant_id,
                subject,
                action,
                resource_type,
                resource_id,
                detail
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.tenant_id.as_uuid())
        .bind(event.subject.as_str())
        .bind(action)
        .bind(event.resource_type.as_str())
        .bind(event.resource_id.as_str())
        .bind(event.detail.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append audit event '{action}': {error}"))
        })?;

        debug!(
            tenant_id = %event.tenant_id,
            action,
            resource_id = %event.resource_id,
            "audit event appended"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use itemflow_application::{AuditEvent, AuditRepository};
    use itemflow_domain::AuditAction;

    use super::PostgresAuditRepository;
    use crate::test_fixtures::{count_rows, seed_structure, test_pool};

    #[tokio::test]
    async fn appended_events_are_stored_with_their_action() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let seeded = seed_structure(&pool).await;
        let repository = PostgresAuditRepository::new(pool.clone());

        let appended = repository
            .append_event(AuditEvent {
                tenant_id: seeded.tenant_id,
                subject: "itemflow-admin".to_owned(),
                action: AuditAction::PermissionsProvisioned,
                resource_type: "item_type_configuration".to_owned(),
                resource_id: seeded.configuration_id.to_string(),
                detail: Some("created 6 permission rows".to_owned()),
            })
            .await;
        assert!(appended.is_ok());

        let stored = count_rows(
            &pool,
            r#"
            SELECT COUNT(*)
            FROM audit_log_entries
            WHERE tenant_id = $1
                AND action = 'permission.provisioned'
            "#,
            seeded.tenant_id.as_uuid(),
        )
        .await;
        assert_eq!(stored, 1);
    }
}
