use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use itemflow_application::{GrantCleanup, GrantCleanupReport};
use itemflow_core::TenantId;
use itemflow_domain::GrantId;

use crate::schema_contract::{GRANT_ASSOCIATION_TABLES, GRANT_MEMBERSHIP_TABLES};

/// Removes grants together with their membership and association rows.
///
/// Every call runs in a transaction of its own; each step is wrapped in a
/// savepoint so a failing step is skipped without losing the others.
#[derive(Clone)]
pub struct PostgresGrantCleanup {
    pool: PgPool,
}

impl PostgresGrantCleanup {
    /// Creates a cleanup orchestrator with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CleanupStep {
    label: String,
    statement: String,
    counts_removed_rows: bool,
}

/// Guards statements on tables without a tenant column.
const GRANT_OF_TENANT: &str =
    "EXISTS (SELECT 1 FROM grants WHERE grants.id = $1 AND grants.tenant_id = $2)";

fn cleanup_steps() -> Vec<CleanupStep> {
    let mut steps = Vec::new();

    for table in GRANT_MEMBERSHIP_TABLES {
        steps.push(CleanupStep {
            label: table.to_owned(),
            statement: format!("DELETE FROM {table} WHERE grant_id = $1 AND {GRANT_OF_TENANT}"),
            counts_removed_rows: true,
        });
    }

    for association in GRANT_ASSOCIATION_TABLES {
        steps.push(CleanupStep {
            label: association.table.to_owned(),
            statement: format!(
                "DELETE FROM {table} WHERE {column} = $1 AND {GRANT_OF_TENANT}",
                table = association.table,
                column = association.grant_column,
            ),
            counts_removed_rows: true,
        });
    }

    // An assignment left with neither roles nor a grant must not survive.
    steps.push(CleanupStep {
        label: "permission_assignments".to_owned(),
        statement: r#"
            DELETE FROM permission_assignments AS assignments
            WHERE assignments.grant_id = $1
                AND assignments.tenant_id = $2
                AND NOT EXISTS (
                    SELECT 1
                    FROM permission_assignment_roles AS assignment_roles
                    WHERE assignment_roles.assignment_id = assignments.id
                )
        "#
        .to_owned(),
        counts_removed_rows: true,
    });
    steps.push(CleanupStep {
        label: "permission_assignments.grant_id".to_owned(),
        statement: r#"
            UPDATE permission_assignments
            SET grant_id = NULL
            WHERE grant_id = $1
                AND tenant_id = $2
        "#
        .to_owned(),
        counts_removed_rows: false,
    });

    steps
}

async fn run_step(
    transaction: &mut Transaction<'_, Postgres>,
    step: &CleanupStep,
    tenant_id: TenantId,
    grant_id: GrantId,
) -> Result<u64, sqlx::Error> {
    let mut savepoint = sqlx::Connection::begin(&mut **transaction).await?;

    let executed = sqlx::query(step.statement.as_str())
        .bind(grant_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .execute(&mut *savepoint)
        .await;

    match executed {
        Ok(result) => {
            savepoint.commit().await?;
            Ok(result.rows_affected())
        }
        Err(error) => {
            if let Err(rollback_error) = savepoint.rollback().await {
                warn!(
                    step = %step.label,
                    error = %rollback_error,
                    "failed to roll back grant cleanup savepoint"
                );
            }
            Err(error)
        }
    }
}

#[async_trait]
impl GrantCleanup for PostgresGrantCleanup {
    async fn delete_grant_completely(
        &self,
        tenant_id: TenantId,
        grant_id: GrantId,
    ) -> GrantCleanupReport {
        let mut report = GrantCleanupReport::default();

        let mut transaction = match self.pool.begin().await {
            Ok(transaction) => transaction,
            Err(error) => {
                warn!(
                    tenant_id = %tenant_id,
                    grant_id = %grant_id,
                    error = %error,
                    "failed to begin grant cleanup transaction"
                );
                report.failed_steps.push("begin".to_owned());
                return report;
            }
        };

        for step in cleanup_steps() {
            match run_step(&mut transaction, &step, tenant_id, grant_id).await {
                Ok(rows) => {
                    if step.counts_removed_rows {
                        report.removed_rows += rows;
                    }
                }
                Err(error) => {
                    warn!(
                        tenant_id = %tenant_id,
                        grant_id = %grant_id,
                        step = %step.label,
                        error = %error,
                        "grant cleanup step failed"
                    );
                    report.failed_steps.push(step.label);
                }
            }
        }

        let grant_step = CleanupStep {
            label: "grants".to_owned(),
            statement: "DELETE FROM grants WHERE id = $1 AND tenant_id = $2".to_owned(),
            counts_removed_rows: true,
        };
        match run_step(&mut transaction, &grant_step, tenant_id, grant_id).await {
            Ok(rows) => {
                report.removed_rows += rows;
                report.grant_deleted = rows > 0;
            }
            Err(error) => {
                warn!(
                    tenant_id = %tenant_id,
                    grant_id = %grant_id,
                    error = %error,
                    "failed to delete grant row"
                );
                report.failed_steps.push(grant_step.label);
            }
        }

        if let Err(error) = transaction.commit().await {
            warn!(
                tenant_id = %tenant_id,
                grant_id = %grant_id,
                error = %error,
                "failed to commit grant cleanup"
            );
            report.failed_steps.push("commit".to_owned());
            report.removed_rows = 0;
            report.grant_deleted = false;
            return report;
        }

        debug!(
            tenant_id = %tenant_id,
            grant_id = %grant_id,
            removed_rows = report.removed_rows,
            grant_deleted = report.grant_deleted,
            failed_steps = report.failed_steps.len(),
            "grant cleanup finished"
        );

        report
    }
}
