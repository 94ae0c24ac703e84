//! Error handling for image publishing
//!
//! This module provides the error taxonomy for a publish invocation with
//! recovery guidance, using the thiserror crate for ergonomic error handling.

use crate::core::traits::ValidationError;
use crate::security::command_executor::CommandError;
use thiserror::Error;

/// Main error type for image publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("invalid configuration: {}", join_errors(.errors))]
    Configuration { errors: Vec<ValidationError> },

    // Authentication errors
    #[error("[{registry}] {method} authentication failed{}: {output}", exit_suffix(.exit_code))]
    Authentication {
        registry: String,
        method: String,
        exit_code: Option<i32>,
        output: String,
    },

    // Image errors
    #[error("failed to tag image {target}{}: {output}", exit_suffix(.exit_code))]
    Tag {
        target: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("failed to push image {target}{}: {output}", exit_suffix(.exit_code))]
    Push {
        target: String,
        exit_code: Option<i32>,
        output: String,
    },

    // Execution errors
    #[error("`{command}` was interrupted: {reason}")]
    Cancelled { command: String, reason: String },

    #[error("could not run `{command}`: {message}")]
    Command { command: String, message: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn exit_suffix(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

impl PublishError {
    /// Wrap a runner failure for `command`, an already masked command line
    pub fn from_command_error(command: String, error: CommandError) -> Self {
        match error {
            CommandError::Cancelled | CommandError::DeadlineExceeded => Self::Cancelled {
                command,
                reason: error.to_string(),
            },
            other => Self::Command {
                command,
                message: other.to_string(),
            },
        }
    }

    /// Output captured from the failing external tool, if any
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Self::Authentication { output, .. }
            | Self::Tag { output, .. }
            | Self::Push { output, .. } => Some(output),
            Self::Configuration { .. } | Self::Cancelled { .. } | Self::Command { .. } => None,
        }
    }

    /// Check if re-running the same invocation could succeed
    ///
    /// Configuration problems need a config change; everything else may be
    /// transient. Re-pushing an already pushed tag is harmless.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration { .. })
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Configuration { .. } => vec![
                "Fix the reported configuration fields",
                "auth.method must be azure_cli, service_principal, admin or managed_identity",
            ],
            Self::Authentication { .. } => vec![
                "Check the credentials for the selected auth method",
                "Run `az login` first when using azure_cli",
                "Confirm the registry name is correct",
            ],
            Self::Tag { .. } => vec![
                "Check that source_image exists locally (`docker image ls`)",
                "Check that the target reference is a valid image name",
            ],
            Self::Push { .. } => vec![
                "Check that the identity has AcrPush permission on the registry",
                "Check network connectivity to the registry",
                "Re-run the release; already pushed tags are overwritten in place",
            ],
            Self::Cancelled { .. } => {
                vec!["Increase the timeout or re-run the release"]
            }
            Self::Command { .. } => vec![
                "Check that the Azure CLI and Docker are installed and on PATH",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_FAILED",
            Self::Tag { .. } => "TAG_FAILED",
            Self::Push { .. } => "PUSH_FAILED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Command { .. } => "COMMAND_ERROR",
        }
    }
}
