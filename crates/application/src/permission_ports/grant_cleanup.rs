use async_trait::async_trait;
use itemflow_core::TenantId;
use itemflow_domain::GrantId;
use serde::Serialize;

/// Outcome of removing one grant and everything pointing at it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GrantCleanupReport {
    /// Rows removed across membership, association and grant tables.
    pub removed_rows: u64,
    /// Whether the grant row itself was deleted by this call.
    pub grant_deleted: bool,
    /// Cleanup steps that failed and were skipped.
    pub failed_steps: Vec<String>,
}

impl GrantCleanupReport {
    /// Returns whether every cleanup step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

/// Port removing grants completely, independent of the caller's transaction.
///
/// Implementations never fail: a step that cannot run is logged, recorded in
/// the report and treated as already absent.
#[async_trait]
pub trait GrantCleanup: Send + Sync {
    /// Deletes the grant, its membership and every association row referencing it.
    async fn delete_grant_completely(
        &self,
        tenant_id: TenantId,
        grant_id: GrantId,
    ) -> GrantCleanupReport;
}
