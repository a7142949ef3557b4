use serde::{Deserialize, Serialize};

use crate::TenantId;

/// Operator on whose behalf an engine operation runs.
///
/// Authentication happens upstream; the engine only needs the tenant scope
/// and a subject to attribute audit events to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    tenant_id: TenantId,
}

impl UserIdentity {
    /// Creates an identity for the given subject in a tenant.
    #[must_use]
    pub fn new(subject: impl Into<String>, tenant_id: TenantId) -> Self {
        Self {
            subject: subject.into(),
            tenant_id,
        }
    }

    /// Returns the stable subject of the operator.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the tenant the operator acts in.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
