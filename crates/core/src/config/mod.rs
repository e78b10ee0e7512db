pub mod container_config;
pub mod validation;

pub use container_config::{ConfigSource, ContainerConfig};
pub use validation::ConfigError;
