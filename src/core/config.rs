//! Configuration structures and types for acr-publisher
//!
//! This module provides the validated, immutable publish configuration. It is
//! built from the host's raw map by `ConfigParser` and never mutated afterwards.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag template used when `tags` is absent or empty
pub const DEFAULT_TAG_TEMPLATE: &str = "{{version}}";

/// Authentication strategy selector (`auth.method`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Reuse the ambient `az` CLI session
    #[default]
    AzureCli,
    ServicePrincipal,
    /// Registry admin user
    Admin,
    ManagedIdentity,
}

impl AuthMethod {
    pub const ALL: [AuthMethod; 4] = [
        AuthMethod::AzureCli,
        AuthMethod::ServicePrincipal,
        AuthMethod::Admin,
        AuthMethod::ManagedIdentity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::AzureCli => "azure_cli",
            AuthMethod::ServicePrincipal => "service_principal",
            AuthMethod::Admin => "admin",
            AuthMethod::ManagedIdentity => "managed_identity",
        }
    }

    /// Parse a selector; an empty string selects the default
    pub fn parse(selector: &str) -> Option<Self> {
        if selector.is_empty() {
            return Some(AuthMethod::default());
        }
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == selector)
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for the selected authentication strategy
///
/// Secrets are held as `SecretString`; `Debug` never prints them.
#[derive(Debug, Clone)]
pub enum CredentialBundle {
    AzureCli,
    ServicePrincipal {
        client_id: String,
        client_secret: SecretString,
        tenant_id: String,
    },
    Admin {
        username: String,
        password: SecretString,
    },
    ManagedIdentity,
}

impl CredentialBundle {
    pub fn method(&self) -> AuthMethod {
        match self {
            CredentialBundle::AzureCli => AuthMethod::AzureCli,
            CredentialBundle::ServicePrincipal { .. } => AuthMethod::ServicePrincipal,
            CredentialBundle::Admin { .. } => AuthMethod::Admin,
            CredentialBundle::ManagedIdentity => AuthMethod::ManagedIdentity,
        }
    }

    /// Secrets that must be masked in tool output
    pub fn secrets(&self) -> Vec<&SecretString> {
        match self {
            CredentialBundle::ServicePrincipal { client_secret, .. } => vec![client_secret],
            CredentialBundle::Admin { password, .. } => vec![password],
            CredentialBundle::AzureCli | CredentialBundle::ManagedIdentity => Vec::new(),
        }
    }
}

/// Validated publish configuration for one invocation
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Registry name or fully qualified host, as configured
    pub registry: String,

    /// Repository namespace placed before the image name (optional)
    pub repository: Option<String>,

    /// Image name inside the registry
    pub image: String,

    /// Local image reference to tag from
    pub source_image: String,

    /// Ordered tag templates, never empty
    pub tags: Vec<String>,

    pub dry_run: bool,

    pub credentials: CredentialBundle,
}

impl PublishConfig {
    /// `repository/image`, or just `image` without a namespace
    pub fn image_path(&self) -> String {
        match self.repository.as_deref() {
            Some(repository) if !repository.is_empty() => {
                format!("{}/{}", repository, self.image)
            }
            _ => self.image.clone(),
        }
    }
}
