pub mod core;
pub mod orchestration;
pub mod plugins;
pub mod security;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod fakes;

pub use crate::core::*;
pub use orchestration::{ImagePublisher, PublishOptions, PublishReport};
pub use plugins::{AcrPlugin, resolve_registry_host};
pub use security::{
    CommandError, CommandRunner, ExecutionContext, SafeCommandExecutor, SecureTokenManager,
};
