//! Docker client - local image tagging and pushing

use crate::core::error::PublishError;
use crate::security::command_executor::{
    CommandOutput, CommandRunner, ExecutionContext, Invocation,
};
use tracing::{debug, warn};

pub struct DockerClient<'r> {
    runner: &'r dyn CommandRunner,
}

impl<'r> DockerClient<'r> {
    pub fn new(runner: &'r dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// `docker tag <source> <target>`
    pub async fn tag(
        &self,
        source: &str,
        target: &str,
        ctx: &ExecutionContext,
    ) -> Result<(), PublishError> {
        let invocation = Invocation::new("docker").args(["tag", source, target]);
        let output = self.run(&invocation, ctx).await?;
        if output.success {
            return Ok(());
        }

        warn!(%source, %target, exit_code = ?output.exit_code, "docker tag failed");
        Err(PublishError::Tag {
            target: target.to_string(),
            exit_code: output.exit_code,
            output: output.combined,
        })
    }

    /// `docker push <target>`
    pub async fn push(&self, target: &str, ctx: &ExecutionContext) -> Result<(), PublishError> {
        let invocation = Invocation::new("docker").args(["push", target]);
        let output = self.run(&invocation, ctx).await?;
        if output.success {
            return Ok(());
        }

        warn!(%target, exit_code = ?output.exit_code, "docker push failed");
        Err(PublishError::Push {
            target: target.to_string(),
            exit_code: output.exit_code,
            output: output.combined,
        })
    }

    async fn run(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
    ) -> Result<CommandOutput, PublishError> {
        let command = invocation.to_string();
        debug!(%command, "running");
        self.runner
            .run(invocation, ctx)
            .await
            .map_err(|e| PublishError::from_command_error(command, e))
    }
}
