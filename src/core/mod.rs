pub mod config;
pub mod config_loader;
pub mod error;
pub mod traits;

pub use config::*;
pub use config_loader::{ConfigFileError, ConfigLoader, ConfigParser, format_validation_result};
pub use error::*;
pub use traits::*;
