use std::env;

use itemflow_core::{AppError, AppResult, TenantId, UserIdentity};
use tracing_subscriber::EnvFilter;

const DEFAULT_ACTOR_SUBJECT: &str = "itemflow-admin";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Runtime settings of the admin binary, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub database_url: String,
    pub tenant_id: TenantId,
    pub actor_subject: String,
    pub max_connections: u32,
}

impl AdminConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = required_env(&lookup, "DATABASE_URL")?;

        let tenant_value = required_env(&lookup, "ITEMFLOW_TENANT_ID")?;
        let tenant_id = uuid::Uuid::parse_str(tenant_value.trim())
            .map(TenantId::from_uuid)
            .map_err(|error| {
                AppError::Validation(format!("invalid ITEMFLOW_TENANT_ID: {error}"))
            })?;

        let actor_subject = lookup("ITEMFLOW_ACTOR_SUBJECT")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR_SUBJECT.to_owned());

        let max_connections = parse_env_u32(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        if max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            tenant_id,
            actor_subject,
            max_connections,
        })
    }

    /// Identity every command acts as.
    pub fn actor(&self) -> UserIdentity {
        UserIdentity::new(self.actor_subject.as_str(), self.tenant_id)
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> AppResult<String> {
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u32,
) -> AppResult<u32> {
    match lookup(name) {
        Some(value) => value.trim().parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
