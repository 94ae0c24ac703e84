//! Core traits and types for the host plugin surface
//!
//! This module defines the request/response shapes exchanged with the release
//! orchestrator, the validation report, and the `ReleasePlugin` trait every
//! registry integration implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::error::PublishError;
use crate::security::command_executor::ExecutionContext;

/// Raw, loosely typed configuration map handed over by the host.
pub type RawConfig = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Validation
// ============================================================================

/// Validation error with field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    #[serde(default = "default_error_severity")]
    pub severity: String, // Always "error"
}

fn default_error_severity() -> String {
    "error".to_string()
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: default_error_severity(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)
    }
}

/// Result of configuration validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

// ============================================================================
// Release context
// ============================================================================

/// Release metadata supplied by the host for a single release event.
///
/// Only ever read; it feeds tag template substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseContext {
    pub version: String,
    pub previous_version: String,
    pub tag_name: String,
    pub branch: String,
    pub release_type: String,
}

// ============================================================================
// Plugin surface
// ============================================================================

/// Lifecycle hooks a plugin can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    PrePublish,
    PostPublish,
    OnSuccess,
    OnError,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::PrePublish => "pre_publish",
            Hook::PostPublish => "post_publish",
            Hook::OnSuccess => "on_success",
            Hook::OnError => "on_error",
        }
    }
}

/// Plugin metadata reported to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub hooks: Vec<Hook>,
}

/// A single hook invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub hook: Hook,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub config: RawConfig,
    #[serde(default)]
    pub context: ReleaseContext,
}

/// Response returned to the host after a successful hook invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub outputs: HashMap<String, serde_json::Value>,
}

/// Main trait for release plugin implementations
///
/// The host calls `validate` ahead of the release and `execute` once per
/// registered hook. Failures surface as `PublishError` so the host can report
/// the tool's diagnostics verbatim.
#[async_trait]
pub trait ReleasePlugin: Send + Sync {
    /// Plugin metadata (name, version, hooks)
    fn info(&self) -> PluginInfo;

    /// Check the raw configuration, collecting every violation
    fn validate(&self, config: &RawConfig) -> ValidationResult;

    /// Run the plugin for one hook
    async fn execute(
        &self,
        request: ExecuteRequest,
        ctx: &ExecutionContext,
    ) -> Result<ExecuteResponse, PublishError>;
}
