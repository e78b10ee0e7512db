use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use uuid::Uuid;

use crate::config::ContainerConfig;
use crate::container::autowiring::{Frame, Injectable, InjectionSpec, ResolveContext, Upcast};
use crate::container::descriptor::{
    erase, Activator, Instance, RegistrationName, ServiceDescriptor, ServiceId,
};
use crate::container::hooks::{ContainerHooks, FallbackRequest, HookActivator, HookFallback};
use crate::container::overrides::Overrides;
use crate::container::scope::{LifetimeManager, LifetimePolicy, ScopeId, ServiceScope};
use crate::errors::CoreError;

struct FallbackEntry {
    name: RegistrationName,
    handler: HookFallback<IocContainer>,
}

struct ScopeState {
    id: ScopeId,
    parent: Option<IocContainer>,
    config: Arc<ContainerConfig>,
    registrations: RwLock<HashMap<ServiceId, Arc<ServiceDescriptor>>>,
    fallbacks: RwLock<Vec<FallbackEntry>>,
    /// Held while fallbacks of this scope run
    closing: Mutex<()>,
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        if let Err(error) = release_from_ancestors(&self.id, self.parent.as_ref()) {
            tracing::warn!(scope = %self.id, error = %error, "failed to release instances of dropped scope");
        }
    }
}

/// Drop whatever ancestor registrations cached on behalf of scope `id`
fn release_from_ancestors(id: &ScopeId, parent: Option<&IocContainer>) -> Result<(), CoreError> {
    for ancestor in std::iter::successors(parent, |scope| scope.inner.parent.as_ref()) {
        for descriptor in ancestor.descriptors()? {
            descriptor.lifetime.release(id)?;
        }
    }
    Ok(())
}

/// Hierarchical IoC container.
///
/// Handles are cheap to clone and share one scope. Child scopes see every
/// registration of their ancestors, while registrations made in a child stay
/// invisible to the parent.
#[derive(Clone)]
pub struct IocContainer {
    inner: Arc<ScopeState>,
}

/// Handle to a scope that does not keep it alive
#[derive(Debug, Clone)]
pub struct WeakIocContainer {
    inner: Weak<ScopeState>,
}

impl WeakIocContainer {
    pub fn upgrade(&self) -> Option<IocContainer> {
        self.inner.upgrade().map(|inner| IocContainer { inner })
    }
}

impl IocContainer {
    /// Create a new root container with default configuration
    pub fn new() -> Self {
        Self::root(Arc::new(ContainerConfig::default()))
    }

    /// Create a new root container with an explicit configuration
    pub fn with_config(config: ContainerConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self::root(Arc::new(config)))
    }

    fn root(config: Arc<ContainerConfig>) -> Self {
        Self::scope(None, config)
    }

    fn scope(parent: Option<IocContainer>, config: Arc<ContainerConfig>) -> Self {
        Self {
            inner: Arc::new(ScopeState {
                id: Uuid::new_v4(),
                parent,
                config,
                registrations: RwLock::new(HashMap::new()),
                fallbacks: RwLock::new(Vec::new()),
                closing: Mutex::new(()),
            }),
        }
    }

    /// Create a child scope inheriting this scope's registrations
    pub fn create_child_scope(&self) -> Self {
        let child = Self::scope(Some(self.clone()), self.inner.config.clone());
        tracing::debug!(parent = %self.inner.id, scope = %child.inner.id, "created child scope");
        child
    }

    pub fn scope_id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn parent(&self) -> Option<&IocContainer> {
        self.inner.parent.as_ref()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// Register implementation `I` for contract `C`.
    ///
    /// Injection values are validated against the parameters `I` declares.
    pub fn register_type<C, I>(
        &self,
        name: Option<&str>,
        lifetime: impl LifetimePolicy,
        injection: InjectionSpec,
    ) -> Result<&Self, CoreError>
    where
        C: ?Sized + Upcast<I>,
        I: Injectable,
    {
        let descriptor = Self::type_descriptor::<C, I>(
            ServiceId::with_name::<C>(RegistrationName::from_option(name)),
            lifetime.create(),
            injection,
        )?;
        self.add_service_descriptor(descriptor)?;
        Ok(self)
    }

    /// Register an existing instance for contract `C`
    pub fn register_instance<C>(&self, name: Option<&str>, instance: Arc<C>) -> Result<&Self, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let service_id = ServiceId::with_name::<C>(RegistrationName::from_option(name));
        let activator: Activator = Arc::new(move |_ctx: &mut ResolveContext| Ok(erase(instance.clone())));
        self.add_service_descriptor(ServiceDescriptor::new(
            service_id,
            std::any::type_name::<C>(),
            ServiceScope::Transient.lifetime_manager(),
            activator,
        ))?;
        Ok(self)
    }

    /// Register a factory closure for contract `C`
    pub fn register_factory<C, F>(
        &self,
        name: Option<&str>,
        lifetime: impl LifetimePolicy,
        factory: F,
    ) -> Result<&Self, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(&mut ResolveContext) -> Result<Arc<C>, CoreError> + Send + Sync + 'static,
    {
        let service_id = ServiceId::with_name::<C>(RegistrationName::from_option(name));
        let activator: Activator = Arc::new(move |ctx: &mut ResolveContext| factory(ctx).map(erase));
        self.add_service_descriptor(ServiceDescriptor::new(
            service_id,
            std::any::type_name::<F>(),
            lifetime.create(),
            activator,
        ))?;
        Ok(self)
    }

    pub(crate) fn type_descriptor<C, I>(
        service_id: ServiceId,
        lifetime: Box<dyn LifetimeManager>,
        injection: InjectionSpec,
    ) -> Result<ServiceDescriptor, CoreError>
    where
        C: ?Sized + Upcast<I>,
        I: Injectable,
    {
        injection.validate::<I>()?;
        let activator: Activator = Arc::new(move |ctx: &mut ResolveContext| -> Result<Instance, CoreError> {
            let instance = ctx.with_frame(Frame::of::<I>(injection.clone()), I::create)?;
            Ok(erase::<C>(C::upcast(Arc::new(instance))))
        });
        Ok(ServiceDescriptor::new(
            service_id,
            std::any::type_name::<I>(),
            lifetime,
            activator,
        ))
    }

    /// Add a descriptor to this scope. The last registration for a key wins.
    pub fn add_service_descriptor(&self, descriptor: ServiceDescriptor) -> Result<(), CoreError> {
        let mut registrations = self
            .inner
            .registrations
            .write()
            .map_err(|_| CoreError::lock("registrations"))?;

        tracing::debug!(
            service = %descriptor.service_id,
            implementation = descriptor.implementation,
            lifetime = %descriptor.lifetime.scope(),
            scope = %self.inner.id,
            "registered service"
        );

        let service_id = descriptor.service_id.clone();
        if registrations.insert(service_id, Arc::new(descriptor)).is_some() {
            tracing::trace!(scope = %self.inner.id, "replaced existing registration");
        }
        Ok(())
    }

    fn add_fallback(&self, name: RegistrationName, handler: HookFallback<IocContainer>) -> Result<(), CoreError> {
        let mut fallbacks = self
            .inner
            .fallbacks
            .write()
            .map_err(|_| CoreError::lock("fallbacks"))?;
        fallbacks.push(FallbackEntry { name, handler });
        Ok(())
    }

    /// Resolve the default registration of `C`
    pub fn resolve<C>(&self) -> Result<Arc<C>, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with::<C>(None, Overrides::new())
    }

    /// Resolve a named registration of `C`
    pub fn resolve_named<C>(&self, name: &str) -> Result<Arc<C>, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with::<C>(Some(name), Overrides::new())
    }

    /// Resolve `C` with resolve-time overrides applying to the whole graph
    pub fn resolve_with<C>(&self, name: Option<&str>, overrides: Overrides) -> Result<Arc<C>, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let service_id = ServiceId::with_name::<C>(RegistrationName::from_option(name));
        self.resolve_key::<C>(&service_id, &overrides)
    }

    /// Try to resolve a service, returning None if it cannot be built
    pub fn try_resolve<C>(&self) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<C>().ok()
    }

    pub(crate) fn resolve_key<C>(&self, service_id: &ServiceId, overrides: &Overrides) -> Result<Arc<C>, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let mut ctx = ResolveContext::new(self.clone(), overrides.clone());
        ctx.resolve_id::<C>(service_id)
    }

    /// Materialize `service_id` for a resolve issued from this scope
    pub(crate) fn resolve_in(&self, service_id: &ServiceId, ctx: &mut ResolveContext) -> Result<Instance, CoreError> {
        let descriptor = self.lookup(service_id)?.ok_or_else(|| {
            CoreError::resolution_failed(
                service_id.type_name,
                service_id.name.to_string(),
                "no registration in this scope or its ancestors",
            )
        })?;

        if let Some(instance) = descriptor.lifetime.lookup(&self.inner.id)? {
            return Ok(instance);
        }

        ctx.enter(service_id, self.inner.config.max_resolution_depth)?;
        let created = (descriptor.activator)(ctx);
        ctx.leave();

        descriptor.lifetime.store(&self.inner.id, created?)
    }

    fn local(&self, service_id: &ServiceId) -> Result<Option<Arc<ServiceDescriptor>>, CoreError> {
        let registrations = self
            .inner
            .registrations
            .read()
            .map_err(|_| CoreError::lock("registrations"))?;
        Ok(registrations.get(service_id).cloned())
    }

    fn descriptors(&self) -> Result<Vec<Arc<ServiceDescriptor>>, CoreError> {
        let registrations = self
            .inner
            .registrations
            .read()
            .map_err(|_| CoreError::lock("registrations"))?;
        Ok(registrations.values().cloned().collect())
    }

    fn ancestry(&self) -> impl Iterator<Item = &IocContainer> {
        std::iter::successors(Some(self), |scope| scope.inner.parent.as_ref())
    }

    /// Find a registration in this scope or its ancestors, consulting
    /// fallbacks once no explicit registration matched.
    ///
    /// Fallbacks of one scope run one at a time; a lookup that waited for
    /// another one checks again before running them itself.
    fn lookup(&self, service_id: &ServiceId) -> Result<Option<Arc<ServiceDescriptor>>, CoreError> {
        for scope in self.ancestry() {
            if let Some(descriptor) = scope.local(service_id)? {
                return Ok(Some(descriptor));
            }
        }

        if service_id.name.is_hidden() {
            return Ok(None);
        }

        let request = FallbackRequest {
            service_id: service_id.clone(),
        };
        for scope in self.ancestry() {
            let handlers: Vec<HookFallback<IocContainer>> = {
                let fallbacks = scope
                    .inner
                    .fallbacks
                    .read()
                    .map_err(|_| CoreError::lock("fallbacks"))?;
                fallbacks
                    .iter()
                    .rev()
                    .filter(|entry| entry.name == service_id.name)
                    .map(|entry| entry.handler.clone())
                    .collect()
            };
            if handlers.is_empty() {
                continue;
            }

            let _closing = scope
                .inner
                .closing
                .lock()
                .map_err(|_| CoreError::lock("fallbacks"))?;
            if let Some(descriptor) = scope.local(service_id)? {
                return Ok(Some(descriptor));
            }

            for handler in handlers {
                if handler(scope, &request)? {
                    if let Some(descriptor) = scope.local(service_id)? {
                        return Ok(Some(descriptor));
                    }
                }
            }
        }

        Ok(None)
    }

    /// Check whether `C` is registered in this scope or an ancestor
    pub fn is_registered<C: ?Sized + 'static>(&self, name: Option<&str>) -> bool {
        let service_id = ServiceId::with_name::<C>(RegistrationName::from_option(name));
        self.ancestry()
            .any(|scope| matches!(scope.local(&service_id), Ok(Some(_))))
    }

    /// Number of registrations made directly in this scope
    pub fn registration_count(&self) -> usize {
        self.inner
            .registrations
            .read()
            .map(|registrations| registrations.len())
            .unwrap_or(0)
    }

    /// Release every instance cached on behalf of this scope.
    ///
    /// Dropping the last handle of a child scope releases its instances from
    /// the ancestors as well. Singleton proxies keep the scope that issued
    /// them alive until disposed.
    pub fn dispose(&self) -> Result<(), CoreError> {
        for descriptor in self.descriptors()? {
            descriptor.lifetime.clear()?;
        }
        release_from_ancestors(&self.inner.id, self.inner.parent.as_ref())?;

        tracing::debug!(scope = %self.inner.id, "disposed scope");
        Ok(())
    }
}

impl Default for IocContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IocContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IocContainer")
            .field("scope_id", &self.inner.id)
            .field("depth", &(self.ancestry().count() - 1))
            .field("registrations", &self.registration_count())
            .finish()
    }
}

impl ContainerHooks for IocContainer {
    type WeakScope = WeakIocContainer;

    fn register_type<C, I>(
        &self,
        name: RegistrationName,
        lifetime: Box<dyn LifetimeManager>,
        injection: InjectionSpec,
    ) -> Result<(), CoreError>
    where
        C: ?Sized + Upcast<I>,
        I: Injectable,
    {
        let descriptor = Self::type_descriptor::<C, I>(ServiceId::with_name::<C>(name), lifetime, injection)?;
        self.add_service_descriptor(descriptor)
    }

    fn register_activator<C>(
        &self,
        name: RegistrationName,
        lifetime: Box<dyn LifetimeManager>,
        activator: HookActivator<Self>,
    ) -> Result<(), CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let wrapped: Activator =
            Arc::new(move |ctx: &mut ResolveContext| activator(ctx.scope(), ctx.overrides()));
        self.add_service_descriptor(ServiceDescriptor::new(
            ServiceId::with_name::<C>(name),
            std::any::type_name::<C>(),
            lifetime,
            wrapped,
        ))
    }

    fn register_fallback(&self, name: RegistrationName, fallback: HookFallback<Self>) -> Result<(), CoreError> {
        self.add_fallback(name, fallback)
    }

    fn resolve_registration<C>(&self, name: &RegistrationName, overrides: &Overrides) -> Result<Arc<C>, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.resolve_key::<C>(&ServiceId::with_name::<C>(name.clone()), overrides)
    }

    fn create_child_scope(&self) -> Self {
        IocContainer::create_child_scope(self)
    }

    fn downgrade(&self) -> WeakIocContainer {
        WeakIocContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn upgrade(scope: &WeakIocContainer) -> Option<Self> {
        scope.upgrade()
    }

    fn has_registration(&self, service_id: &ServiceId) -> Result<bool, CoreError> {
        Ok(self.local(service_id)?.is_some())
    }

    fn trace_realization(&self) -> bool {
        self.inner.config.trace_realization
    }
}
