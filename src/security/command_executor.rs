//! SafeCommandExecutor: whitelisted, cancellable execution of external tools
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only the cloud CLI and container tools can execute
//! - **Injection prevention**: Uses `tokio::process::Command`, never a shell
//! - **Secret arguments**: Marked arguments are rendered as `****` in logs and errors
//! - **Stdin payloads**: Passwords are piped to the child instead of passed as arguments
//! - **Cancellation**: In-flight processes are killed when the context is cancelled
//!   or its deadline passes
//!
//! # Example
//!
//! ```rust,no_run
//! use acr_publisher::security::command_executor::{
//!     CommandRunner, ExecutionContext, Invocation, SafeCommandExecutor,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), acr_publisher::CommandError> {
//! let executor = SafeCommandExecutor::new();
//! let ctx = ExecutionContext::new().with_timeout(Duration::from_secs(30));
//!
//! let output = executor
//!     .run(&Invocation::new("docker").arg("version"), &ctx)
//!     .await?;
//! println!("{}", output.combined);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Allowed commands whitelist for security.
///
/// Matched against the file name of the program, so absolute paths to these
/// binaries are accepted too.
const ALLOWED_COMMANDS: &[&str] = &["az", "docker", "podman"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Command could not be started or its pipes failed
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// The execution context was cancelled while the command was running
    #[error("cancelled")]
    Cancelled,

    /// The execution context deadline passed while the command was running
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

// ============================================================================
// Execution context
// ============================================================================

/// Why an execution context stopped accepting work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

impl From<Interruption> for CommandError {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => CommandError::Cancelled,
            Interruption::DeadlineExceeded => CommandError::DeadlineExceeded,
        }
    }
}

/// Cancels every `ExecutionContext` created from the same `CancelHandle`.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Caller-supplied deadline and cancellation signal for external processes.
///
/// Cloning is cheap; clones observe the same signal and deadline.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// A context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self {
            cancel: None,
            deadline: None,
        }
    }

    /// A context paired with a handle that cancels it
    pub fn cancellable() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        let ctx = Self {
            cancel: Some(receiver),
            deadline: None,
        };
        (ctx, CancelHandle { sender })
    }

    /// Bound the whole context by a deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Non-blocking check, used before starting a new process
    pub fn interruption(&self) -> Option<Interruption> {
        if let Some(cancel) = &self.cancel
            && *cancel.borrow()
        {
            return Some(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interruption::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Never resolves for a plain `ExecutionContext::new()`.
    pub async fn interrupted(&self) -> Interruption {
        let cancelled = async {
            match &self.cancel {
                Some(receiver) => {
                    let mut receiver = receiver.clone();
                    let closed = receiver.wait_for(|cancelled| *cancelled).await.is_err();
                    // A dropped handle can never cancel
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancelled => Interruption::Cancelled,
            _ = expired => Interruption::DeadlineExceeded,
        }
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// A single command-line argument
#[derive(Debug, Clone)]
pub enum Arg {
    Plain(String),
    /// Never shown in logs or error messages
    Secret(SecretString),
}

impl Arg {
    fn expose(&self) -> &str {
        match self {
            Arg::Plain(value) => value,
            Arg::Secret(value) => value.expose_secret(),
        }
    }
}

/// A fully described external tool invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    program: String,
    args: Vec<Arg>,
    stdin: Option<SecretString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(value.into()));
        self
    }

    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(values.into_iter().map(|value| Arg::Plain(value.into())));
        self
    }

    pub fn secret_arg(mut self, value: SecretString) -> Self {
        self.args.push(Arg::Secret(value));
        self
    }

    /// Write `input` to the child's standard input, then close it
    pub fn stdin(mut self, input: SecretString) -> Self {
        self.stdin = Some(input);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument values as passed to the process (secrets exposed)
    pub fn exposed_args(&self) -> Vec<&str> {
        self.args.iter().map(Arg::expose).collect()
    }

    pub fn stdin_payload(&self) -> Option<&SecretString> {
        self.stdin.as_ref()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Plain(value) => write!(f, " {}", value)?,
                Arg::Secret(_) => write!(f, " ****")?,
            }
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub combined: String,
}

// ============================================================================
// Runner
// ============================================================================

/// Seam between the registry clients and process execution
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion under `ctx`.
    ///
    /// A non-zero exit is reported through `CommandOutput::success`, not as an
    /// error; errors mean the process could not run to completion.
    async fn run(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
    ) -> Result<CommandOutput, CommandError>;
}

/// Safe command executor with security controls
///
/// This struct provides a secure way to execute external commands with:
/// - Whitelist validation
/// - Cancellation and deadline enforcement
/// - Injection prevention through `tokio::process::Command`
#[derive(Debug, Default)]
pub struct SafeCommandExecutor {
    _private: (),
}

impl SafeCommandExecutor {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn is_allowed(program: &str) -> bool {
        Path::new(program)
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| {
                let name = name.strip_suffix(".exe").unwrap_or(name);
                ALLOWED_COMMANDS.contains(&name)
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl CommandRunner for SafeCommandExecutor {
    async fn run(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
    ) -> Result<CommandOutput, CommandError> {
        // Whitelist validation: Only pre-approved commands
        if !Self::is_allowed(invocation.program()) {
            return Err(CommandError::CommandNotAllowed(
                invocation.program().to_string(),
            ));
        }

        if let Some(interruption) = ctx.interruption() {
            return Err(interruption.into());
        }

        debug!(command = %invocation, "executing");

        // Windows-specific: az is shipped as az.cmd
        #[cfg(target_os = "windows")]
        let command_name = if invocation.program() == "az" {
            "az.cmd".to_string()
        } else {
            invocation.program().to_string()
        };

        #[cfg(not(target_os = "windows"))]
        let command_name = invocation.program().to_string();

        let mut child = Command::new(&command_name)
            .args(invocation.exposed_args())
            .stdin(if invocation.stdin_payload().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        let stdin = child.stdin.take();
        let completion = async {
            if let (Some(payload), Some(mut stdin)) = (invocation.stdin_payload(), stdin) {
                match stdin.write_all(payload.expose_secret().as_bytes()).await {
                    Ok(()) => {}
                    // The child quit without reading; its output says why
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(CommandError::ExecutionFailed(e.to_string())),
                }
                // Dropping the pipe signals EOF to the child
                drop(stdin);
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
        };

        // Dropping `completion` on interruption drops the child, which kills
        // it (kill_on_drop).
        let output = tokio::select! {
            output = completion => output?,
            interruption = ctx.interrupted() => return Err(interruption.into()),
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist() {
        assert!(SafeCommandExecutor::is_allowed("az"));
        assert!(SafeCommandExecutor::is_allowed("docker"));
        assert!(SafeCommandExecutor::is_allowed("/usr/local/bin/podman"));
        assert!(!SafeCommandExecutor::is_allowed("rm"));
        assert!(!SafeCommandExecutor::is_allowed("sh"));
        assert!(!SafeCommandExecutor::is_allowed(""));
    }

    #[tokio::test]
    async fn test_rejected_command_rm() {
        let executor = SafeCommandExecutor::new();
        let result = executor
            .run(
                &Invocation::new("rm").args(["-rf", "/"]),
                &ExecutionContext::new(),
            )
            .await;
        assert!(
            matches!(result, Err(CommandError::CommandNotAllowed(_))),
            "rm should be rejected as not in whitelist"
        );
    }

    #[tokio::test]
    async fn test_cancelled_context_refuses_to_start() {
        let (ctx, handle) = ExecutionContext::cancellable();
        handle.cancel();

        let executor = SafeCommandExecutor::new();
        let result = executor
            .run(&Invocation::new("docker").arg("version"), &ctx)
            .await;
        assert!(matches!(result, Err(CommandError::Cancelled)));
    }

    #[tokio::test]
    async fn test_expired_deadline_refuses_to_start() {
        let ctx = ExecutionContext::new().with_deadline(Instant::now() - Duration::from_secs(1));

        let executor = SafeCommandExecutor::new();
        let result = executor
            .run(&Invocation::new("az").arg("version"), &ctx)
            .await;
        assert!(matches!(result, Err(CommandError::DeadlineExceeded)));
    }

    #[test]
    fn test_invocation_display_masks_secrets() {
        let invocation = Invocation::new("az")
            .args(["login", "--service-principal", "-u", "my-client-id", "-p"])
            .secret_arg(SecretString::from("super-secret"))
            .args(["--tenant", "my-tenant"]);

        let rendered = invocation.to_string();
        assert_eq!(
            rendered,
            "az login --service-principal -u my-client-id -p **** --tenant my-tenant"
        );
        assert!(invocation.exposed_args().contains(&"super-secret"));
    }

    #[test]
    fn test_with_deadline_keeps_earliest() {
        let now = Instant::now();
        let ctx = ExecutionContext::new()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(60));
        assert_eq!(ctx.deadline, Some(now + Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_interrupted_by_cancel_handle() {
        let (ctx, handle) = ExecutionContext::cancellable();
        assert!(ctx.interruption().is_none());

        let waiter = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.interrupted().await }
        });
        handle.cancel();

        assert_eq!(waiter.await.unwrap(), Interruption::Cancelled);
        assert_eq!(ctx.interruption(), Some(Interruption::Cancelled));
    }

    #[cfg(unix)]
    fn fake_docker(dir: &tempfile::TempDir, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deadline_kills_running_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = fake_docker(&dir, "exec sleep 30");
        let ctx = ExecutionContext::new().with_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let result = SafeCommandExecutor::new()
            .run(&Invocation::new(program).arg("push"), &ctx)
            .await;

        assert!(matches!(result, Err(CommandError::DeadlineExceeded)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_running_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = fake_docker(&dir, "exec sleep 30");
        let (ctx, handle) = ExecutionContext::cancellable();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.cancel();
        });

        let started = std::time::Instant::now();
        let result = SafeCommandExecutor::new()
            .run(&Invocation::new(program).arg("push"), &ctx)
            .await;

        assert!(matches!(result, Err(CommandError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_ignoring_stdin_keeps_its_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = fake_docker(&dir, "echo 'login refused' >&2\nexit 1");
        // Larger than a pipe buffer, so the write cannot finish before exit
        let payload = SecretString::from("x".repeat(1 << 20));

        let output = SafeCommandExecutor::new()
            .run(
                &Invocation::new(program)
                    .args(["login", "-u", "admin", "--password-stdin"])
                    .stdin(payload),
                &ExecutionContext::new().with_timeout(Duration::from_secs(10)),
            )
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(1));
        assert!(output.combined.contains("login refused"));
    }

    #[tokio::test]
    async fn test_interrupted_by_deadline() {
        let ctx = ExecutionContext::new().with_timeout(Duration::from_millis(20));
        assert_eq!(ctx.interrupted().await, Interruption::DeadlineExceeded);
    }
}
