use std::sync::Arc;

use crate::container::autowiring::{Injectable, InjectionSpec, Upcast};
use crate::container::descriptor::{Instance, RegistrationName, ServiceId};
use crate::container::overrides::Overrides;
use crate::container::scope::LifetimeManager;
use crate::errors::CoreError;

/// Builds an instance inside the scope that issued the resolve call
pub type HookActivator<H> = Arc<dyn Fn(&H, &Overrides) -> Result<Instance, CoreError> + Send + Sync>;

/// Consulted when a lookup misses every registration in a scope chain.
///
/// Receives the scope the fallback was installed in and returns `true` once it
/// registered something for the request in that scope.
pub type HookFallback<H> = Arc<dyn Fn(&H, &FallbackRequest) -> Result<bool, CoreError> + Send + Sync>;

/// A lookup that found no registration
#[derive(Debug, Clone)]
pub struct FallbackRequest {
    pub service_id: ServiceId,
}

/// Capabilities the lazy-proxy layer needs from a host container
pub trait ContainerHooks: Clone + Send + Sync + 'static {
    /// Handle that does not keep a scope alive
    type WeakScope: Clone + Send + Sync + 'static;

    /// Register implementation `I` for contract `C` under `name`
    fn register_type<C, I>(
        &self,
        name: RegistrationName,
        lifetime: Box<dyn LifetimeManager>,
        injection: InjectionSpec,
    ) -> Result<(), CoreError>
    where
        C: ?Sized + Upcast<I>,
        I: Injectable;

    /// Register a custom activator for contract `C` under `name`
    fn register_activator<C>(
        &self,
        name: RegistrationName,
        lifetime: Box<dyn LifetimeManager>,
        activator: HookActivator<Self>,
    ) -> Result<(), CoreError>
    where
        C: ?Sized + Send + Sync + 'static;

    /// Install a fallback for lookups of `name` that find nothing
    fn register_fallback(&self, name: RegistrationName, fallback: HookFallback<Self>) -> Result<(), CoreError>;

    /// Resolve a registration, hidden ones included, with the given overrides
    fn resolve_registration<C>(&self, name: &RegistrationName, overrides: &Overrides) -> Result<Arc<C>, CoreError>
    where
        C: ?Sized + Send + Sync + 'static;

    fn create_child_scope(&self) -> Self;

    fn downgrade(&self) -> Self::WeakScope;

    /// `None` once every owning handle of the scope is gone
    fn upgrade(scope: &Self::WeakScope) -> Option<Self>;

    /// Whether `service_id` is registered directly in this scope
    fn has_registration(&self, service_id: &ServiceId) -> Result<bool, CoreError>;

    /// Whether realizations should be logged at debug level
    fn trace_realization(&self) -> bool {
        false
    }
}
