pub mod acr_client;
pub mod acr_plugin;
pub mod docker_client;

pub use acr_client::{AcrClient, REGISTRY_SUFFIX, resolve_registry_host};
pub use acr_plugin::{AcrPlugin, PLUGIN_VERSION};
pub use docker_client::DockerClient;
