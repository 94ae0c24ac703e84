//! Configuration parsing and loading for acr-publisher
//!
//! `ConfigParser` turns the host's raw map into a validated `PublishConfig`,
//! collecting every violation in one pass. `ConfigLoader` reads that raw map
//! from a YAML, TOML or JSON file for the command-line entry point.

use super::config::*;
use crate::core::error::PublishError;
use crate::core::traits::{RawConfig, ValidationError, ValidationResult};
use crate::security::SecureTokenManager;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

static ENV_VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ENV_VAR_PATTERN).expect("ENV_VAR_PATTERN is a valid regex"));

// ============================================================================
// Parser
// ============================================================================

/// Schema-validating parser for the host configuration map
#[derive(Debug, Default)]
pub struct ConfigParser {
    tokens: SecureTokenManager,
}

impl ConfigParser {
    /// Parser whose credential fallbacks read the process environment
    pub fn new() -> Self {
        Self::with_token_manager(SecureTokenManager::new())
    }

    pub fn with_token_manager(tokens: SecureTokenManager) -> Self {
        Self { tokens }
    }

    /// Build the immutable publish configuration
    pub fn parse(&self, raw: &RawConfig) -> Result<PublishConfig, PublishError> {
        self.build(raw)
            .map_err(|errors| PublishError::Configuration { errors })
    }

    /// Report every configuration violation without building anything
    pub fn validate(&self, raw: &RawConfig) -> ValidationResult {
        match self.build(raw) {
            Ok(_) => ValidationResult::from_errors(Vec::new()),
            Err(errors) => ValidationResult::from_errors(errors),
        }
    }

    fn build(&self, raw: &RawConfig) -> Result<PublishConfig, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let registry = string_field(raw, "registry", "registry", &mut errors).unwrap_or_default();
        if registry.is_empty() {
            errors.push(ValidationError::new(
                "registry",
                "ACR registry name is required",
            ));
        }

        let repository = string_field(raw, "repository", "repository", &mut errors)
            .filter(|repository| !repository.is_empty());

        let image = string_field(raw, "image", "image", &mut errors).unwrap_or_default();
        if image.is_empty() {
            errors.push(ValidationError::new("image", "image name is required"));
        }

        let source_image =
            string_field(raw, "source_image", "source_image", &mut errors).unwrap_or_default();
        if source_image.is_empty() {
            errors.push(ValidationError::new(
                "source_image",
                "source image is required",
            ));
        }

        let tags = tags_field(raw, &mut errors);
        let dry_run = bool_field(raw, "dry_run", &mut errors);
        let credentials = self.credentials(raw, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        // Every path that leaves `credentials` empty has pushed an error
        let Some(credentials) = credentials else {
            return Err(errors);
        };

        Ok(PublishConfig {
            registry,
            repository,
            image,
            source_image,
            tags,
            dry_run,
            credentials,
        })
    }

    fn credentials(
        &self,
        raw: &RawConfig,
        errors: &mut Vec<ValidationError>,
    ) -> Option<CredentialBundle> {
        let empty = RawConfig::new();
        let auth = match raw.get("auth") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(auth)) => auth,
            // Rejected instead of falling back to azure_cli
            Some(_) => {
                errors.push(ValidationError::new("auth", "auth must be a mapping"));
                return None;
            }
        };

        let selector = string_field(auth, "method", "auth.method", errors).unwrap_or_default();
        let Some(method) = AuthMethod::parse(&selector) else {
            errors.push(ValidationError::new(
                "auth.method",
                "auth method must be 'azure_cli', 'service_principal', 'admin', or 'managed_identity'",
            ));
            return None;
        };

        match method {
            AuthMethod::AzureCli => Some(CredentialBundle::AzureCli),
            AuthMethod::ManagedIdentity => Some(CredentialBundle::ManagedIdentity),
            AuthMethod::ServicePrincipal => {
                let client_id = self.plain_credential(auth, "client_id", errors);
                let client_secret = self.secret_credential(auth, "client_secret", errors);
                let tenant_id = self.plain_credential(auth, "tenant_id", errors);
                match (client_id, client_secret, tenant_id) {
                    (Some(client_id), Some(client_secret), Some(tenant_id)) => {
                        Some(CredentialBundle::ServicePrincipal {
                            client_id,
                            client_secret,
                            tenant_id,
                        })
                    }
                    _ => {
                        errors.push(ValidationError::new(
                            "auth",
                            "service principal requires client_id, client_secret, and tenant_id",
                        ));
                        None
                    }
                }
            }
            AuthMethod::Admin => {
                let username = self.plain_credential(auth, "username", errors);
                let password = self.secret_credential(auth, "password", errors);
                match (username, password) {
                    (Some(username), Some(password)) => {
                        Some(CredentialBundle::Admin { username, password })
                    }
                    _ => {
                        errors.push(ValidationError::new(
                            "auth",
                            "admin auth requires username and password",
                        ));
                        None
                    }
                }
            }
        }
    }

    /// Configured value, else the environment fallback; empty counts as unset
    fn plain_credential(
        &self,
        auth: &RawConfig,
        field: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<String> {
        self.secret_credential(auth, field, errors)
            .map(|value| value.expose_secret().to_string())
    }

    fn secret_credential(
        &self,
        auth: &RawConfig,
        field: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<SecretString> {
        let path = format!("auth.{}", field);
        match string_field(auth, field, &path, errors) {
            Some(value) if !value.is_empty() => Some(SecretString::from(value)),
            _ => self.tokens.credential(field),
        }
    }
}

/// A string value; absent and null are `None`, other types are an error
fn string_field(
    map: &RawConfig,
    key: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            errors.push(ValidationError::new(path, format!("{} must be a string", path)));
            None
        }
    }
}

fn tags_field(map: &RawConfig, errors: &mut Vec<ValidationError>) -> Vec<String> {
    let tags = match map.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(tag)) => vec![tag.clone()],
        Some(Value::Array(items)) => {
            let tags: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            tags.unwrap_or_else(|| {
                errors.push(ValidationError::new("tags", "tags must be a list of strings"));
                Vec::new()
            })
        }
        Some(_) => {
            errors.push(ValidationError::new("tags", "tags must be a list of strings"));
            Vec::new()
        }
    };

    if tags.is_empty() {
        vec![DEFAULT_TAG_TEMPLATE.to_string()]
    } else {
        tags
    }
}

fn bool_field(map: &RawConfig, key: &str, errors: &mut Vec<ValidationError>) -> bool {
    match map.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(value)) => *value,
        Some(Value::String(value)) if value == "true" => true,
        Some(Value::String(value)) if value == "false" => false,
        Some(_) => {
            errors.push(ValidationError::new(key, format!("{} must be a boolean", key)));
            false
        }
    }
}

/// Format validation result as human-readable string
pub fn format_validation_result(result: &ValidationResult) -> String {
    let mut lines = Vec::new();

    if result.valid {
        lines.push("✅ Configuration validation succeeded".to_string());
    } else {
        lines.push("❌ Configuration has errors".to_string());
        lines.push("\n🔴 Errors:".to_string());
        for error in &result.errors {
            lines.push(format!("  - [{}] {}", error.field, error.message));
        }
    }

    lines.join("\n")
}

// ============================================================================
// File loader
// ============================================================================

/// Errors while reading a configuration file
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config file format: {0} (expected .yaml, .yml, .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config file {0} must contain a mapping at the top level")]
    NotAMapping(PathBuf),
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a raw configuration map from a file
    ///
    /// The format follows the extension. `${VAR_NAME}` references inside
    /// string values are expanded from `env`; unknown variables are left as is.
    pub async fn load_file(
        path: &Path,
        env: &HashMap<String, String>,
    ) -> Result<RawConfig, ConfigFileError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigFileError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let parse_error = |message: String| ConfigFileError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);

        let value: Value = match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            _ => return Err(ConfigFileError::UnsupportedFormat(path.to_path_buf())),
        };

        match Self::expand_env_vars(value, env) {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigFileError::NotAMapping(path.to_path_buf())),
        }
    }

    /// Expand environment variables in every string of a value tree
    fn expand_env_vars(value: Value, env: &HashMap<String, String>) -> Value {
        match value {
            Value::String(text) => Value::String(Self::expand_string(&text, env)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| Self::expand_env_vars(item, env))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Self::expand_env_vars(item, env)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_REGEX.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                warn!(variable = var_name, "environment variable not found");
            }
        }

        result
    }
}
