//! ACR Plugin - Azure Container Registry publishing implementation

use crate::core::config_loader::ConfigParser;
use crate::core::error::PublishError;
use crate::core::traits::{
    ExecuteRequest, ExecuteResponse, Hook, PluginInfo, RawConfig, ReleasePlugin,
    ValidationResult,
};
use crate::orchestration::image_publisher::{ImagePublisher, PublishOptions};
use crate::security::command_executor::{CommandRunner, ExecutionContext, SafeCommandExecutor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Plugin version, overridable at build time through `ACR_PUBLISHER_VERSION`
pub const PLUGIN_VERSION: &str = match option_env!("ACR_PUBLISHER_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

const PLUGIN_NAME: &str = "acr";

/// Azure Container Registry plugin
pub struct AcrPlugin {
    parser: ConfigParser,
    publisher: ImagePublisher,
}

impl Default for AcrPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl AcrPlugin {
    /// Plugin backed by real `az`/`docker` processes and the process environment
    pub fn new() -> Self {
        Self::with_parts(ConfigParser::new(), Arc::new(SafeCommandExecutor::new()))
    }

    pub fn with_parts(parser: ConfigParser, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            parser,
            publisher: ImagePublisher::new(runner),
        }
    }
}

#[async_trait]
impl ReleasePlugin for AcrPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME.to_string(),
            version: PLUGIN_VERSION.to_string(),
            description: "Push container images to Azure Container Registry (ACR)".to_string(),
            hooks: vec![Hook::PostPublish],
        }
    }

    fn validate(&self, config: &RawConfig) -> ValidationResult {
        self.parser.validate(config)
    }

    async fn execute(
        &self,
        request: ExecuteRequest,
        ctx: &ExecutionContext,
    ) -> Result<ExecuteResponse, PublishError> {
        if !self.info().hooks.contains(&request.hook) {
            return Ok(ExecuteResponse {
                success: true,
                message: format!("Hook {} not handled by the acr plugin", request.hook.as_str()),
                outputs: HashMap::new(),
            });
        }

        let config = self.parser.parse(&request.config)?;
        let options = PublishOptions {
            dry_run: request.dry_run,
        };

        let report = self
            .publisher
            .publish(&config, &request.context, &options, ctx)
            .await?;

        let count = report.pushed_images.len();
        let message = if report.dry_run {
            format!("Dry run: would push {} image(s) to ACR", count)
        } else {
            format!("Successfully pushed {} image(s) to ACR", count)
        };
        info!(invocation_id = %report.invocation_id, "{}", message);

        Ok(ExecuteResponse {
            success: true,
            message,
            outputs: report.to_outputs(),
        })
    }
}
