//! ACR client - registry endpoint resolution and authentication
//!
//! Each `CredentialBundle` variant has exactly one login sequence:
//!
//! | method             | invocations                                                   |
//! |--------------------|---------------------------------------------------------------|
//! | `azure_cli`        | `az acr login --name <registry>`                              |
//! | `service_principal`| `az login --service-principal ...`, then `az acr login ...`   |
//! | `admin`            | `docker login <host> -u <username> --password-stdin`          |
//! | `managed_identity` | `az acr login --name <registry>`                              |

use crate::core::config::{AuthMethod, CredentialBundle};
use crate::core::error::PublishError;
use crate::security::command_executor::{CommandRunner, ExecutionContext, Invocation};
use crate::security::SecureTokenManager;
use secrecy::SecretString;
use tracing::{debug, info, warn};

/// Domain suffix of every Azure Container Registry login server
pub const REGISTRY_SUFFIX: &str = ".azurecr.io";

/// Fully qualified registry host for a short registry name
///
/// Names already ending in the ACR suffix are returned unchanged, so the
/// function is idempotent.
pub fn resolve_registry_host(registry: &str) -> String {
    if registry.ends_with(REGISTRY_SUFFIX) {
        registry.to_string()
    } else {
        format!("{}{}", registry, REGISTRY_SUFFIX)
    }
}

/// Authenticates the local container tooling against one registry
pub struct AcrClient<'r> {
    registry: String,
    runner: &'r dyn CommandRunner,
    tokens: SecureTokenManager,
}

impl<'r> AcrClient<'r> {
    pub fn new(registry: impl Into<String>, runner: &'r dyn CommandRunner) -> Self {
        Self {
            registry: registry.into(),
            runner,
            tokens: SecureTokenManager::default(),
        }
    }

    /// Registry name exactly as configured
    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn registry_host(&self) -> String {
        resolve_registry_host(&self.registry)
    }

    /// Run the login sequence for `credentials`
    pub async fn authenticate(
        &self,
        credentials: &CredentialBundle,
        ctx: &ExecutionContext,
    ) -> Result<(), PublishError> {
        let method = credentials.method();
        info!(registry = %self.registry, method = %method, "authenticating");

        match credentials {
            CredentialBundle::AzureCli | CredentialBundle::ManagedIdentity => {
                self.acr_login(credentials, ctx).await
            }
            CredentialBundle::ServicePrincipal {
                client_id,
                client_secret,
                tenant_id,
            } => {
                let login = Invocation::new("az")
                    .args(["login", "--service-principal", "-u", client_id.as_str(), "-p"])
                    .secret_arg(client_secret.clone())
                    .args(["--tenant", tenant_id.as_str()]);
                self.login_step(&login, credentials, ctx).await?;

                self.acr_login(credentials, ctx).await
            }
            CredentialBundle::Admin { username, password } => {
                let login = Invocation::new("docker")
                    .args([
                        "login",
                        self.registry_host().as_str(),
                        "-u",
                        username.as_str(),
                        "--password-stdin",
                    ])
                    .stdin(password.clone());
                self.login_step(&login, credentials, ctx).await
            }
        }
    }

    /// `az acr login`, which picks up the current az session or the
    /// managed identity of the host
    async fn acr_login(
        &self,
        credentials: &CredentialBundle,
        ctx: &ExecutionContext,
    ) -> Result<(), PublishError> {
        let login = Invocation::new("az").args(["acr", "login", "--name", self.registry.as_str()]);
        self.login_step(&login, credentials, ctx).await
    }

    async fn login_step(
        &self,
        invocation: &Invocation,
        credentials: &CredentialBundle,
        ctx: &ExecutionContext,
    ) -> Result<(), PublishError> {
        let command = invocation.to_string();
        debug!(%command, "running login step");

        let output = self
            .runner
            .run(invocation, ctx)
            .await
            .map_err(|e| PublishError::from_command_error(command.clone(), e))?;

        if output.success {
            return Ok(());
        }

        let method: AuthMethod = credentials.method();
        let secrets: Vec<&SecretString> = credentials.secrets();
        let masked = self
            .tokens
            .mask_secrets_in_string(&output.combined, &secrets);
        warn!(%command, exit_code = ?output.exit_code, "login step failed");

        Err(PublishError::Authentication {
            registry: self.registry.clone(),
            method: method.to_string(),
            exit_code: output.exit_code,
            output: masked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingRunner;
    use crate::security::command_executor::CommandError;

    fn service_principal() -> CredentialBundle {
        CredentialBundle::ServicePrincipal {
            client_id: "client-id".to_string(),
            client_secret: SecretString::from("client-secret-value"),
            tenant_id: "tenant-id".to_string(),
        }
    }

    #[test]
    fn test_resolve_registry_host() {
        let tests = [
            ("myregistry", "myregistry.azurecr.io"),
            ("myregistry.azurecr.io", "myregistry.azurecr.io"),
            ("test-registry", "test-registry.azurecr.io"),
        ];

        for (registry, expected) in tests {
            assert_eq!(resolve_registry_host(registry), expected);
        }
    }

    #[test]
    fn test_resolve_registry_host_is_idempotent() {
        for registry in ["a", "my.registry", "x.azurecr.io", "", "team-01"] {
            let once = resolve_registry_host(registry);
            assert_eq!(resolve_registry_host(&once), once);
            assert!(once.ends_with(REGISTRY_SUFFIX));
            if !registry.ends_with(REGISTRY_SUFFIX) {
                assert!(once.starts_with(registry));
            }
        }
    }

    #[tokio::test]
    async fn test_azure_cli_uses_configured_name() {
        let runner = RecordingRunner::new();
        let client = AcrClient::new("myregistry", &runner);

        client
            .authenticate(&CredentialBundle::AzureCli, &ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(runner.commands(), vec!["az acr login --name myregistry"]);
    }

    #[tokio::test]
    async fn test_managed_identity_matches_azure_cli() {
        let runner = RecordingRunner::new();
        let client = AcrClient::new("myregistry.azurecr.io", &runner);

        client
            .authenticate(&CredentialBundle::ManagedIdentity, &ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(
            runner.commands(),
            vec!["az acr login --name myregistry.azurecr.io"]
        );
    }

    #[tokio::test]
    async fn test_service_principal_logs_in_then_acr_login() {
        let runner = RecordingRunner::new();
        let client = AcrClient::new("myregistry", &runner);

        client
            .authenticate(&service_principal(), &ExecutionContext::new())
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].argv,
            vec![
                "az",
                "login",
                "--service-principal",
                "-u",
                "client-id",
                "-p",
                "client-secret-value",
                "--tenant",
                "tenant-id"
            ]
        );
        assert!(!calls[0].display.contains("client-secret-value"));
        assert_eq!(calls[1].display, "az acr login --name myregistry");
    }

    #[tokio::test]
    async fn test_service_principal_failure_skips_acr_login() {
        let runner = RecordingRunner::new().fail_when(
            "az login",
            1,
            "AADSTS7000215: Invalid client secret provided: client-secret-value",
        );
        let client = AcrClient::new("myregistry", &runner);

        let error = client
            .authenticate(&service_principal(), &ExecutionContext::new())
            .await
            .unwrap_err();

        assert_eq!(runner.calls().len(), 1);
        match error {
            PublishError::Authentication {
                registry,
                method,
                exit_code,
                output,
            } => {
                assert_eq!(registry, "myregistry");
                assert_eq!(method, "service_principal");
                assert_eq!(exit_code, Some(1));
                assert!(output.contains("AADSTS7000215"));
                assert!(!output.contains("client-secret-value"));
            }
            other => panic!("expected authentication error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_password_goes_through_stdin() {
        let runner = RecordingRunner::new();
        let client = AcrClient::new("myregistry", &runner);
        let credentials = CredentialBundle::Admin {
            username: "admin-user".to_string(),
            password: SecretString::from("admin-password"),
        };

        client
            .authenticate(&credentials, &ExecutionContext::new())
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].argv,
            vec![
                "docker",
                "login",
                "myregistry.azurecr.io",
                "-u",
                "admin-user",
                "--password-stdin"
            ]
        );
        assert_eq!(calls[0].stdin.as_deref(), Some("admin-password"));
    }

    #[tokio::test]
    async fn test_acr_login_failure() {
        let runner = RecordingRunner::new().fail_when(
            "az acr login",
            1,
            "Please run 'az login' to setup account.",
        );
        let client = AcrClient::new("myregistry", &runner);

        let error = client
            .authenticate(&CredentialBundle::AzureCli, &ExecutionContext::new())
            .await
            .unwrap_err();

        assert_eq!(error.code(), "AUTHENTICATION_FAILED");
        assert_eq!(
            error.tool_output(),
            Some("Please run 'az login' to setup account.")
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_error() {
        let runner = RecordingRunner::new().error_when("az acr login", || {
            CommandError::ExecutionFailed("No such file or directory".to_string())
        });
        let client = AcrClient::new("myregistry", &runner);

        let error = client
            .authenticate(&CredentialBundle::ManagedIdentity, &ExecutionContext::new())
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::Command { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_context_runs_nothing() {
        let runner = RecordingRunner::new();
        let client = AcrClient::new("myregistry", &runner);
        let (ctx, handle) = ExecutionContext::cancellable();
        handle.cancel();

        let error = client
            .authenticate(&CredentialBundle::AzureCli, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::Cancelled { ref reason, .. } if reason == "cancelled"));
        assert!(runner.calls().is_empty());
    }
}
