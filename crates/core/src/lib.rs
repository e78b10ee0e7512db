extern crate self as lazyproxy_core;

pub mod config;
pub mod container;
pub mod errors;
pub mod lazy;

// Re-export key types for convenience
pub use config::{ConfigSource, ContainerConfig};
pub use config::validation::ConfigError;
pub use container::{
    ContainerHooks, Injectable, InjectionSpec, IocContainer, Override, Overrides, RegistrationName,
    ResolveContext, ServiceId, ServiceScope, Upcast,
};
pub use errors::CoreError;
pub use lazy::{
    Closing, ContractDescriptor, ContractKind, Deferred, LazyContract, LazyProxy, LazyServiceBinder,
    MemberDescriptor, MemberKind, ProxyGenerator, ProxyState, Visibility,
};
pub use lazyproxy_core_derive::{injectable, lazy_contract};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
