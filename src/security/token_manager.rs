//! Secure token manager with memory-safe handling and masking capabilities
//!
//! This module resolves registry credentials from the environment and masks
//! secrets in tool output, using the `secrecy` crate to prevent accidental
//! exposure in logs or error messages.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;

/// Credential fields under `auth` with the environment variable used when the
/// field is absent from the configuration
const CREDENTIAL_ENV_VARS: &[(&str, &str)] = &[
    ("client_id", "AZURE_CLIENT_ID"),
    ("client_secret", "AZURE_CLIENT_SECRET"),
    ("tenant_id", "AZURE_TENANT_ID"),
    ("username", "ACR_USERNAME"),
    ("password", "ACR_PASSWORD"),
];

/// Secure token manager for registry authentication
///
/// The environment is captured once at construction so lookups are
/// deterministic for the lifetime of an invocation.
///
/// # Examples
///
/// ```
/// use acr_publisher::security::SecureTokenManager;
/// use secrecy::ExposeSecret;
/// use std::collections::HashMap;
///
/// let env = HashMap::from([("ACR_PASSWORD".to_string(), "hunter2-hunter2".to_string())]);
/// let manager = SecureTokenManager::with_env(env);
/// let password = manager.credential("password").unwrap();
/// assert_eq!(manager.mask_token(password.expose_secret()), "hun...er2");
/// ```
#[derive(Default)]
pub struct SecureTokenManager {
    env: HashMap<String, String>,
}

impl SecureTokenManager {
    /// Creates a manager backed by the current process environment
    pub fn new() -> Self {
        Self::with_env(env::vars().collect())
    }

    /// Creates a manager backed by an explicit environment map
    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self { env }
    }

    /// Retrieves a non-empty environment value as a secret
    pub fn get_token(&self, var_name: &str) -> Option<SecretString> {
        self.env
            .get(var_name)
            .filter(|value| !value.is_empty())
            .map(|value| SecretString::from(value.clone()))
    }

    /// Fallback value for an `auth` credential field
    ///
    /// Returns `None` if the field has no fallback variable or it is unset.
    pub fn credential(&self, field: &str) -> Option<SecretString> {
        self.get_token(Self::env_var_for(field)?)
    }

    /// Gets the environment variable name for an `auth` credential field
    ///
    /// # Examples
    ///
    /// ```
    /// use acr_publisher::security::SecureTokenManager;
    ///
    /// assert_eq!(SecureTokenManager::env_var_for("tenant_id"), Some("AZURE_TENANT_ID"));
    /// assert_eq!(SecureTokenManager::env_var_for("method"), None);
    /// ```
    pub fn env_var_for(field: &str) -> Option<&'static str> {
        CREDENTIAL_ENV_VARS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, var)| *var)
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    pub fn mask_token(&self, token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks every given secret inside a string
    ///
    /// Empty secrets are ignored; each occurrence of a non-empty secret is
    /// replaced with its masked form.
    pub fn mask_secrets_in_string(&self, text: &str, secrets: &[&SecretString]) -> String {
        let mut masked = text.to_string();

        for secret in secrets {
            let secret_str = secret.expose_secret();
            if secret_str.is_empty() {
                continue;
            }
            if let Ok(regex) = Regex::new(&regex::escape(secret_str)) {
                let masked_token = self.mask_token(secret_str);
                masked = regex
                    .replace_all(&masked, masked_token.as_str())
                    .to_string();
            }
        }

        masked
    }
}

impl std::fmt::Debug for SecureTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureTokenManager")
            .field("env", &format_args!("<{} entries>", self.env.len()))
            .finish()
    }
}
