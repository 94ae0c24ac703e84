//! Image Publisher - Main orchestrator for pushing an image to ACR
//!
//! Manages the complete publishing workflow:
//! - Dry-run flag merging
//! - Tag template resolution
//! - Registry authentication (skipped in dry-run)
//! - Sequential tag and push per resolved tag, stopping at the first failure
//!
//! Pushes that already happened are never rolled back.

use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::traits::ReleaseContext;
use crate::orchestration::tag_resolver::resolve_tags;
use crate::plugins::acr_client::AcrClient;
use crate::plugins::docker_client::DockerClient;
use crate::security::command_executor::{CommandRunner, ExecutionContext};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// Per-invocation options supplied by the host or CLI
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Log the intended actions instead of running them.
    /// Combined with the configuration's own `dry_run` by OR.
    pub dry_run: bool,
}

/// Outcome of a successful publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub invocation_id: Uuid,
    /// Fully qualified registry host
    pub registry: String,
    /// Repository namespace, empty when none is configured
    pub repository: String,
    pub tags: Vec<String>,
    /// Fully qualified references, in push order
    pub pushed_images: Vec<String>,
    pub dry_run: bool,
    pub published_at: chrono::DateTime<chrono::Utc>,
    /// Milliseconds
    pub duration: u64,
}

impl PublishReport {
    /// Output map handed back to the host
    pub fn to_outputs(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("registry".to_string(), self.registry.clone().into()),
            ("repository".to_string(), self.repository.clone().into()),
            ("tags".to_string(), self.tags.clone().into()),
            ("pushed_images".to_string(), self.pushed_images.clone().into()),
        ])
    }
}

/// Main image publisher orchestrator
pub struct ImagePublisher {
    runner: Arc<dyn CommandRunner>,
}

impl ImagePublisher {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Publish `config.source_image` under every resolved tag
    #[instrument(skip_all, fields(registry = %config.registry, image = %config.image))]
    pub async fn publish(
        &self,
        config: &PublishConfig,
        context: &ReleaseContext,
        options: &PublishOptions,
        ctx: &ExecutionContext,
    ) -> Result<PublishReport, PublishError> {
        let start_time = Instant::now();
        let invocation_id = Uuid::new_v4();
        let dry_run = config.dry_run || options.dry_run;

        let tags = resolve_tags(&config.tags, context);
        let acr = AcrClient::new(config.registry.as_str(), self.runner.as_ref());
        let host = acr.registry_host();

        let mut report = PublishReport {
            invocation_id,
            registry: host.clone(),
            repository: config.repository.clone().unwrap_or_default(),
            tags: tags.clone(),
            pushed_images: Vec::with_capacity(tags.len()),
            dry_run,
            published_at: chrono::Utc::now(),
            duration: 0,
        };

        if !dry_run {
            acr.authenticate(&config.credentials, ctx).await?;
        }

        let docker = DockerClient::new(self.runner.as_ref());
        let image_path = config.image_path();

        for tag in &tags {
            let target = format!("{}/{}:{}", host, image_path, tag);

            if dry_run {
                info!(source = %config.source_image, %target, "[dry-run] would tag image");
                info!(%target, "[dry-run] would push image");
            } else {
                docker.tag(&config.source_image, &target, ctx).await?;
                docker.push(&target, ctx).await?;
                info!(%target, "pushed");
            }

            report.pushed_images.push(target);
        }

        report.published_at = chrono::Utc::now();
        report.duration = start_time.elapsed().as_millis() as u64;
        info!(
            %invocation_id,
            count = report.pushed_images.len(),
            dry_run,
            duration_ms = report.duration,
            "publish finished"
        );

        Ok(report)
    }
}
