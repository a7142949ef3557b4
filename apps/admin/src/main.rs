//! Itemflow permission engine admin commands.

#![forbid(unsafe_code)]

mod admin_command;
mod admin_config;
mod admin_services;

use clap::Parser;
use itemflow_application::{ApplyMigrationInput, MigrationProposal};
use itemflow_core::{AppError, AppResult, UserIdentity};
use serde::Serialize;
use tracing::info;

use crate::admin_command::{AdminCli, AdminCommand};
use crate::admin_config::{AdminConfig, init_tracing};
use crate::admin_services::{AdminServices, connect_and_migrate};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = AdminCli::parse().command;
    let config = AdminConfig::load()?;
    let pool = connect_and_migrate(&config).await?;

    if command == AdminCommand::Migrate {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let actor = config.actor();
    info!(
        tenant_id = %actor.tenant_id(),
        subject = %actor.subject(),
        command = ?command,
        "itemflow-admin started"
    );

    let services = AdminServices::build(pool);
    run(&services, &actor, command).await
}

async fn run(services: &AdminServices, actor: &UserIdentity, command: AdminCommand) -> AppResult<()> {
    match command {
        AdminCommand::Migrate => Ok(()),
        AdminCommand::Provision {
            item_type_configuration_id,
        } => print_json(
            &services
                .provisioning
                .provision(actor, item_type_configuration_id)
                .await?,
        ),
        AdminCommand::ProvisionWorkflow { workflow_id } => print_json(
            &services
                .provisioning
                .provision_workflow(actor, workflow_id)
                .await?,
        ),
        AdminCommand::ProvisionFieldSet { field_set_id } => print_json(
            &services
                .provisioning
                .provision_field_set(actor, field_set_id)
                .await?,
        ),
        AdminCommand::AnalyzeStatusRemoval {
            workflow_id,
            status_ids,
        } => print_json(
            &services
                .removal_impact
                .analyze_status_removal(actor, workflow_id, &status_ids)
                .await?,
        ),
        AdminCommand::AnalyzeTransitionRemoval {
            workflow_id,
            transition_ids,
        } => print_json(
            &services
                .removal_impact
                .analyze_transition_removal(actor, workflow_id, &transition_ids)
                .await?,
        ),
        AdminCommand::ConfirmStatusRemoval {
            workflow_id,
            status_ids,
        } => print_json(
            &services
                .removal_impact
                .confirm_status_removal(actor, workflow_id, &status_ids)
                .await?,
        ),
        AdminCommand::ConfirmTransitionRemoval {
            workflow_id,
            transition_ids,
        } => print_json(
            &services
                .removal_impact
                .confirm_transition_removal(actor, workflow_id, &transition_ids)
                .await?,
        ),
        AdminCommand::AnalyzeMigration {
            item_type_configuration_id,
            field_set,
            workflow,
        } => {
            let proposal = MigrationProposal {
                item_type_configuration_id,
                new_field_set_id: field_set,
                new_workflow_id: workflow,
            };
            print_json(&services.migration.analyze_migration(actor, &proposal).await?)
        }
        AdminCommand::ApplyMigration { input: path } => {
            let raw = std::fs::read_to_string(&path).map_err(|error| {
                AppError::Validation(format!(
                    "failed to read migration input '{}': {error}",
                    path.display()
                ))
            })?;
            let input = serde_json::from_str::<ApplyMigrationInput>(raw.as_str()).map_err(
                |error| AppError::Validation(format!("invalid migration input: {error}")),
            )?;

            print_json(&services.migration.apply_migration(actor, input).await?)
        }
    }
}

fn print_json(value: &impl Serialize) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Internal(format!("failed to render report: {error}")))?;
    println!("{rendered}");
    Ok(())
}
