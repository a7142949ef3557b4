use itemflow_core::TenantId;
use itemflow_domain::{
    FieldConfigurationId, FieldSetId, GrantId, ItemTypeConfigurationId, ItemTypeSetId,
    PermissionRef, ProjectId, TransitionId, WorkflowId, WorkflowStatusId,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub(crate) async fn test_pool() -> Option<PgPool> {
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
        panic!("failed to run migrations for postgres adapter tests: {error}");
    }

    Some(pool)
}

async fn insert_named(pool: &PgPool, table: &str, tenant_id: TenantId, name: &str) -> Uuid {
    let inserted = sqlx::query_scalar::<_, Uuid>(&format!(
        "INSERT INTO {table} (tenant_id, name) VALUES ($1, $2) RETURNING id"
    ))
    .bind(tenant_id.as_uuid())
    .bind(name)
    .fetch_one(pool)
    .await;

    inserted.unwrap_or_else(|error| panic!("failed to seed {table}: {error}"))
}

async fn execute(
    pool: &PgPool,
    query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
) {
    let executed = query.execute(pool).await;
    assert!(executed.is_ok(), "seed statement failed: {executed:?}");
}

/// Configuration "Bug" in a project-scoped set shared by two projects.
///
/// Workflow: Open -> In Progress ("Start"), In Progress -> Done ("Finish").
/// Field set: Summary, Description.
pub(crate) struct SeededStructure {
    pub tenant_id: TenantId,
    pub project_ids: Vec<ProjectId>,
    pub item_type_set_id: ItemTypeSetId,
    pub configuration_id: ItemTypeConfigurationId,
    pub workflow_id: WorkflowId,
    pub workflow_status_ids: Vec<WorkflowStatusId>,
    pub transition_ids: Vec<TransitionId>,
    pub field_set_id: FieldSetId,
    pub field_configuration_ids: Vec<FieldConfigurationId>,
}

pub(crate) async fn seed_structure(pool: &PgPool) -> SeededStructure {
    let tenant_id = TenantId::new();
    execute(
        pool,
        sqlx::query("INSERT INTO tenants (id, name) VALUES ($1, $2)")
            .bind(tenant_id.as_uuid())
            .bind(format!("Tenant {tenant_id}")),
    )
    .await;

    let mut project_ids = Vec::new();
    for name in ["Alpha", "Beta"] {
        project_ids.push(insert_named(pool, "projects", tenant_id, name).await);
    }

    let item_type_id = insert_named(pool, "item_types", tenant_id, "Bug").await;
    let item_type_set_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO item_type_sets (tenant_id, name, scope) VALUES ($1, 'Software', 'project') RETURNING id",
    )
    .bind(tenant_id.as_uuid())
    .fetch_one(pool)
    .await
    .unwrap_or_else(|error| panic!("failed to seed item type set: {error}"));
    for project_id in &project_ids {
        execute(
            pool,
            sqlx::query(
                "INSERT INTO item_type_set_projects (item_type_set_id, project_id) VALUES ($1, $2)",
            )
            .bind(item_type_set_id)
            .bind(*project_id),
        )
        .await;
    }

    let workflow_id = insert_named(pool, "workflows", tenant_id, "Delivery").await;
    let mut workflow_status_ids = Vec::new();
    for (position, name) in ["Open", "In Progress", "Done"].into_iter().enumerate() {
        let status_id = insert_named(pool, "statuses", tenant_id, name).await;
        let node_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO workflow_statuses (workflow_id, status_id, position) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(workflow_id)
        .bind(status_id)
        .bind(i32::try_from(position).unwrap_or_else(|_| unreachable!()))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|error| panic!("failed to seed workflow status: {error}"));
        workflow_status_ids.push(node_id);
    }

    let mut transition_ids = Vec::new();
    for (name, from, to, offset) in [
        ("Start", workflow_status_ids[0], workflow_status_ids[1], 2),
        ("Finish", workflow_status_ids[1], workflow_status_ids[2], 1),
    ] {
        let transition_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO transitions (workflow_id, name, from_workflow_status_id, to_workflow_status_id, created_at)
            VALUES ($1, $2, $3, $4, now() - make_interval(secs => $5))
            RETURNING id
            "#,
        )
        .bind(workflow_id)
        .bind(name)
        .bind(from)
        .bind(to)
        .bind(f64::from(offset))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|error| panic!("failed to seed transition: {error}"));
        transition_ids.push(TransitionId::from_uuid(transition_id));
    }

    let field_set_id = insert_named(pool, "field_sets", tenant_id, "Default fields").await;
    let mut field_configuration_ids = Vec::new();
    for (order_index, (name, field_type)) in [("Summary", "text"), ("Description", "text_area")]
        .into_iter()
        .enumerate()
    {
        let field_id = insert_named(pool, "fields", tenant_id, name).await;
        let configuration_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO field_configurations (tenant_id, field_id, name, field_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(field_id)
        .bind(format!("{name} (default)"))
        .bind(field_type)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|error| panic!("failed to seed field configuration: {error}"));
        execute(
            pool,
            sqlx::query(
                "INSERT INTO field_set_entries (field_set_id, field_configuration_id, order_index) VALUES ($1, $2, $3)",
            )
            .bind(field_set_id)
            .bind(configuration_id)
            .bind(i32::try_from(order_index).unwrap_or_else(|_| unreachable!())),
        )
        .await;
        field_configuration_ids.push(FieldConfigurationId::from_uuid(configuration_id));
    }

    let configuration_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO item_type_configurations (tenant_id, item_type_id, item_type_set_id, workflow_id, field_set_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(item_type_id)
    .bind(item_type_set_id)
    .bind(workflow_id)
    .bind(field_set_id)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|error| panic!("failed to seed item type configuration: {error}"));

    SeededStructure {
        tenant_id,
        project_ids: project_ids.into_iter().map(ProjectId::from_uuid).collect(),
        item_type_set_id: ItemTypeSetId::from_uuid(item_type_set_id),
        configuration_id: ItemTypeConfigurationId::from_uuid(configuration_id),
        workflow_id: WorkflowId::from_uuid(workflow_id),
        workflow_status_ids: workflow_status_ids
            .into_iter()
            .map(WorkflowStatusId::from_uuid)
            .collect(),
        transition_ids,
        field_set_id: FieldSetId::from_uuid(field_set_id),
        field_configuration_ids,
    }
}

pub(crate) async fn seed_role(pool: &PgPool, tenant_id: TenantId, name: &str) -> Uuid {
    insert_named(pool, "roles", tenant_id, name).await
}

/// Grant with one allowed user and one negated group.
pub(crate) async fn seed_grant(pool: &PgPool, tenant_id: TenantId) -> GrantId {
    let grant_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO grants (tenant_id) VALUES ($1) RETURNING id",
    )
    .bind(tenant_id.as_uuid())
    .fetch_one(pool)
    .await
    .unwrap_or_else(|error| panic!("failed to seed grant: {error}"));

    execute(
        pool,
        sqlx::query("INSERT INTO grant_users (grant_id, user_subject) VALUES ($1, 'alice')")
            .bind(grant_id),
    )
    .await;
    let group_id = insert_named(pool, "user_groups", tenant_id, &format!("Group {grant_id}")).await;
    execute(
        pool,
        sqlx::query("INSERT INTO grant_negated_groups (grant_id, group_id) VALUES ($1, $2)")
            .bind(grant_id)
            .bind(group_id),
    )
    .await;

    GrantId::from_uuid(grant_id)
}

/// Creates a tenant or project assignment and returns its id.
pub(crate) async fn seed_assignment(
    pool: &PgPool,
    structure: &SeededStructure,
    permission: PermissionRef,
    project_id: Option<ProjectId>,
    role_id: Option<Uuid>,
    grant_id: Option<GrantId>,
) -> Uuid {
    let assignment_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO permission_assignments (tenant_id, permission_type, permission_id, scope, grant_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(structure.tenant_id.as_uuid())
    .bind(permission.kind.as_str())
    .bind(permission.id.as_uuid())
    .bind(if project_id.is_some() { "project" } else { "tenant" })
    .bind(grant_id.map(|grant_id| grant_id.as_uuid()))
    .fetch_one(pool)
    .await
    .unwrap_or_else(|error| panic!("failed to seed assignment: {error}"));

    if let Some(role_id) = role_id {
        execute(
            pool,
            sqlx::query(
                "INSERT INTO permission_assignment_roles (assignment_id, role_id) VALUES ($1, $2)",
            )
            .bind(assignment_id)
            .bind(role_id),
        )
        .await;
    }

    if let Some(project_id) = project_id {
        execute(
            pool,
            sqlx::query(
                r#"
                INSERT INTO project_permission_assignments (tenant_id, project_id, item_type_set_id, assignment_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(structure.tenant_id.as_uuid())
            .bind(project_id.as_uuid())
            .bind(structure.item_type_set_id.as_uuid())
            .bind(assignment_id),
        )
        .await;
    }

    assignment_id
}

pub(crate) async fn count_rows(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|error| panic!("failed to count rows: {error}"))
}
