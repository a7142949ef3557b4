//! Table and column names of the permission engine schema.
//!
//! Mirrors `migrations/0002_permission_engine.sql`. Queries that cannot be
//! written statically per kind build their SQL from these constants only.

use itemflow_domain::PermissionKind;

/// Storage layout of one permission kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStorage {
    /// Kind stored by these tables.
    pub kind: PermissionKind,
    /// Permission row table.
    pub permission_table: &'static str,
    /// Permission-to-role join table.
    pub role_table: &'static str,
    /// Column of both join tables referencing the permission row.
    pub permission_column: &'static str,
    /// Permission-to-grant join table.
    pub grant_table: &'static str,
}

/// Permission-to-grant association table removed by grant cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantAssociationTable {
    /// Table name.
    pub table: &'static str,
    /// Column referencing the permission row.
    pub permission_column: &'static str,
    /// Column referencing the grant.
    pub grant_column: &'static str,
}

/// Storage of the six permission kinds, in catalog order.
pub const PERMISSION_STORAGE: [PermissionStorage; 6] = [
    PermissionStorage {
        kind: PermissionKind::Worker,
        permission_table: "worker_permissions",
        role_table: "worker_permission_roles",
        permission_column: "worker_permission_id",
        grant_table: "worker_permission_grants",
    },
    PermissionStorage {
        kind: PermissionKind::Creator,
        permission_table: "creator_permissions",
        role_table: "creator_permission_roles",
        permission_column: "creator_permission_id",
        grant_table: "creator_permission_grants",
    },
    PermissionStorage {
        kind: PermissionKind::StatusOwner,
        permission_table: "status_owner_permissions",
        role_table: "status_owner_permission_roles",
        permission_column: "status_owner_permission_id",
        grant_table: "status_owner_permission_grants",
    },
    PermissionStorage {
        kind: PermissionKind::FieldOwner,
        permission_table: "field_owner_permissions",
        role_table: "field_owner_permission_roles",
        permission_column: "field_owner_permission_id",
        grant_table: "field_owner_permission_grants",
    },
    PermissionStorage {
        kind: PermissionKind::Executor,
        permission_table: "executor_permissions",
        role_table: "executor_permission_roles",
        permission_column: "executor_permission_id",
        grant_table: "executor_permission_grants",
    },
    PermissionStorage {
        kind: PermissionKind::FieldStatus,
        permission_table: "field_status_permissions",
        role_table: "field_status_permission_roles",
        permission_column: "field_status_permission_id",
        grant_table: "field_status_permission_grants",
    },
];

/// The six permission-to-grant association tables.
pub const GRANT_ASSOCIATION_TABLES: [GrantAssociationTable; 6] = [
    GrantAssociationTable {
        table: "worker_permission_grants",
        permission_column: "worker_permission_id",
        grant_column: "grant_id",
    },
    GrantAssociationTable {
        table: "creator_permission_grants",
        permission_column: "creator_permission_id",
        grant_column: "grant_id",
    },
    GrantAssociationTable {
        table: "status_owner_permission_grants",
        permission_column: "status_owner_permission_id",
        grant_column: "grant_id",
    },
    GrantAssociationTable {
        table: "field_owner_permission_grants",
        permission_column: "field_owner_permission_id",
        grant_column: "grant_id",
    },
    GrantAssociationTable {
        table: "executor_permission_grants",
        permission_column: "executor_permission_id",
        grant_column: "grant_id",
    },
    GrantAssociationTable {
        table: "field_status_permission_grants",
        permission_column: "field_status_permission_id",
        grant_column: "grant_id",
    },
];

/// Grant membership tables, each keyed by `grant_id`.
pub const GRANT_MEMBERSHIP_TABLES: [&str; 4] = [
    "grant_users",
    "grant_groups",
    "grant_negated_users",
    "grant_negated_groups",
];

/// Returns the storage layout of a permission kind.
#[must_use]
pub fn permission_storage(kind: PermissionKind) -> &'static PermissionStorage {
    match kind {
        PermissionKind::Worker => &PERMISSION_STORAGE[0],
        PermissionKind::Creator => &PERMISSION_STORAGE[1],
        PermissionKind::StatusOwner => &PERMISSION_STORAGE[2],
        PermissionKind::FieldOwner => &PERMISSION_STORAGE[3],
        PermissionKind::Executor => &PERMISSION_STORAGE[4],
        PermissionKind::FieldStatus => &PERMISSION_STORAGE[5],
    }
}

#[cfg(test)]
mod tests {
    use itemflow_domain::PermissionKind;
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;

    use super::{
        GRANT_ASSOCIATION_TABLES, GRANT_MEMBERSHIP_TABLES, PERMISSION_STORAGE, permission_storage,
    };

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    #[test]
    fn storage_is_indexed_by_kind() {
        for kind in PermissionKind::all() {
            let storage = permission_storage(*kind);
            assert_eq!(storage.kind, *kind);
            assert!(storage.permission_table.starts_with(kind.as_str()));
        }
    }

    #[test]
    fn grant_associations_match_permission_storage() {
        for (storage, association) in PERMISSION_STORAGE.iter().zip(GRANT_ASSOCIATION_TABLES) {
            assert_eq!(storage.grant_table, association.table);
            assert_eq!(storage.permission_column, association.permission_column);
        }
    }

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for schema contract tests: {error}");
        }

        Some(pool)
    }

    async fn column_exists(pool: &PgPool, table: &str, column: &str) -> bool {
        let found = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.columns
                WHERE table_schema = current_schema()
                    AND table_name = $1
                    AND column_name = $2
            )
            "#,
        )
        .bind(table)
        .bind(column)
        .fetch_one(pool)
        .await;

        matches!(found, Ok(true))
    }

    #[tokio::test]
    async fn migrations_provide_every_contract_column() {
        let Some(pool) = test_pool().await else {
            return;
        };

        for storage in PERMISSION_STORAGE {
            assert!(column_exists(&pool, storage.permission_table, "id").await);
            assert!(column_exists(&pool, storage.role_table, storage.permission_column).await);
            assert!(column_exists(&pool, storage.role_table, "role_id").await);
        }
        for association in GRANT_ASSOCIATION_TABLES {
            assert!(
                column_exists(&pool, association.table, association.permission_column).await
            );
            assert!(column_exists(&pool, association.table, association.grant_column).await);
        }
        for table in GRANT_MEMBERSHIP_TABLES {
            assert!(column_exists(&pool, table, "grant_id").await);
        }
    }
}
