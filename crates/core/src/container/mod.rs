pub mod autowiring;
pub mod descriptor;
pub mod hooks;
pub mod ioc_container;
pub mod overrides;
pub mod scope;

pub use autowiring::{Injectable, InjectionSpec, ResolveContext, Upcast};
pub use descriptor::{HiddenKey, Instance, RegistrationName, ServiceDescriptor, ServiceId};
pub use hooks::{ContainerHooks, FallbackRequest, HookActivator, HookFallback};
pub use ioc_container::{IocContainer, WeakIocContainer};
pub use overrides::{Override, Overrides};
pub use scope::{
    LifetimeManager, LifetimePolicy, ScopeId, ScopedLifetime, ServiceScope, SingletonLifetime,
    TransientLifetime,
};
