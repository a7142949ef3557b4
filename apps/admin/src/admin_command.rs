use std::path::PathBuf;

use clap::{Parser, Subcommand};
use itemflow_domain::{FieldSetId, ItemTypeConfigurationId, StatusId, TransitionId, WorkflowId};

/// Permission maintenance for one tenant, configured through the environment.
#[derive(Debug, Parser)]
#[command(name = "itemflow-admin", version)]
pub struct AdminCli {
    #[command(subcommand)]
    pub command: AdminCommand,
}

/// One admin invocation.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum AdminCommand {
    /// Apply pending database migrations and exit.
    Migrate,
    /// Create the missing permission rows of an item type configuration.
    Provision {
        #[arg(value_parser = ItemTypeConfigurationId::parse)]
        item_type_configuration_id: ItemTypeConfigurationId,
    },
    /// Provision every configuration bound to a workflow.
    ProvisionWorkflow {
        #[arg(value_parser = WorkflowId::parse)]
        workflow_id: WorkflowId,
    },
    /// Provision every configuration bound to a field set.
    ProvisionFieldSet {
        #[arg(value_parser = FieldSetId::parse)]
        field_set_id: FieldSetId,
    },
    /// Report the permissions lost by removing statuses.
    AnalyzeStatusRemoval {
        #[arg(value_parser = WorkflowId::parse)]
        workflow_id: WorkflowId,
        #[arg(value_name = "STATUS_ID", required = true, num_args = 1.., value_parser = StatusId::parse)]
        status_ids: Vec<StatusId>,
    },
    /// Report the permissions lost by removing transitions.
    AnalyzeTransitionRemoval {
        #[arg(value_parser = WorkflowId::parse)]
        workflow_id: WorkflowId,
        #[arg(value_name = "TRANSITION_ID", required = true, num_args = 1.., value_parser = TransitionId::parse)]
        transition_ids: Vec<TransitionId>,
    },
    /// Prune the permissions of removed statuses and their transitions.
    ConfirmStatusRemoval {
        #[arg(value_parser = WorkflowId::parse)]
        workflow_id: WorkflowId,
        #[arg(value_name = "STATUS_ID", required = true, num_args = 1.., value_parser = StatusId::parse)]
        status_ids: Vec<StatusId>,
    },
    /// Prune the permissions of removed transitions.
    ConfirmTransitionRemoval {
        #[arg(value_parser = WorkflowId::parse)]
        workflow_id: WorkflowId,
        #[arg(value_name = "TRANSITION_ID", required = true, num_args = 1.., value_parser = TransitionId::parse)]
        transition_ids: Vec<TransitionId>,
    },
    /// Classify permissions for a field set and/or workflow swap.
    AnalyzeMigration {
        #[arg(value_parser = ItemTypeConfigurationId::parse)]
        item_type_configuration_id: ItemTypeConfigurationId,
        /// Field set the configuration moves to.
        #[arg(long, value_parser = FieldSetId::parse)]
        field_set: Option<FieldSetId>,
        /// Workflow the configuration moves to.
        #[arg(long, value_parser = WorkflowId::parse)]
        workflow: Option<WorkflowId>,
    },
    /// Apply a migration described by a JSON input file.
    ApplyMigration {
        #[arg(value_name = "INPUT_JSON")]
        input: PathBuf,
    },
}
