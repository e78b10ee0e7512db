use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::autowiring::{Injectable, InjectionSpec, Upcast};
use crate::container::descriptor::{erase, HiddenKey, Instance, RegistrationName};
use crate::container::hooks::{ContainerHooks, HookActivator};
use crate::container::overrides::Overrides;
use crate::container::scope::{LifetimePolicy, ServiceScope};
use crate::errors::CoreError;
use crate::lazy::bridge::{LifetimeBridge, ResolutionSnapshot};
use crate::lazy::contract::LazyContract;
use crate::lazy::open::{Closing, OpenLazyBindingBuilder};
use crate::lazy::template::ProxyGenerator;

/// Outcome of a lazy registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyRegistration {
    /// Display name of the contract, including type arguments
    pub contract: String,
    /// Name callers resolve the proxy by
    pub name: RegistrationName,
    /// Key of the hidden target registration
    pub(crate) hidden: HiddenKey,
    pub lifetime: ServiceScope,
}

/// Lazy registration surface for any container implementing [`ContainerHooks`]
pub trait LazyServiceBinder: ContainerHooks {
    /// Register `I` lazily for `C`, unnamed and transient
    fn register_lazy<C, I>(&self) -> Result<&Self, CoreError>
    where
        C: ?Sized + LazyContract + Upcast<I>,
        I: Injectable,
    {
        self.bind_lazy::<C, I>().register()?;
        Ok(self)
    }

    /// Start a lazy registration with name, lifetime and injection options
    fn bind_lazy<C, I>(&self) -> LazyBindingBuilder<'_, Self, C, I>
    where
        C: ?Sized + LazyContract + Upcast<I>,
        I: Injectable,
    {
        LazyBindingBuilder::new(self)
    }

    /// Start a lazy registration for a generic contract family.
    ///
    /// `closer` is invoked when a lookup misses; it lists the closings it
    /// supports through [`Closing::close`]. Closers installed in one scope
    /// run one at a time and must not resolve from the container.
    fn bind_lazy_open<F>(&self, closer: F) -> OpenLazyBindingBuilder<'_, Self>
    where
        F: Fn(&mut Closing<'_, Self>) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        OpenLazyBindingBuilder::new(self, Arc::new(closer))
    }
}

impl<H: ContainerHooks> LazyServiceBinder for H {}

/// Builder for a single lazy registration
pub struct LazyBindingBuilder<'a, H, C: ?Sized, I> {
    host: &'a H,
    name: RegistrationName,
    lifetime: LifetimeBridge,
    injection: InjectionSpec,
    generator: &'a ProxyGenerator,
    _types: PhantomData<(fn() -> Arc<C>, fn() -> I)>,
}

impl<'a, H, C, I> LazyBindingBuilder<'a, H, C, I>
where
    H: ContainerHooks,
    C: ?Sized + LazyContract + Upcast<I>,
    I: Injectable,
{
    fn new(host: &'a H) -> Self {
        Self {
            host,
            name: RegistrationName::Default,
            lifetime: LifetimeBridge::new(ServiceScope::Transient),
            injection: InjectionSpec::default(),
            generator: ProxyGenerator::global(),
            _types: PhantomData,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = RegistrationName::Named(name.into());
        self
    }

    /// Lifetime policy; each half of the registration gets its own manager
    pub fn with_lifetime(mut self, policy: impl LifetimePolicy + 'static) -> Self {
        self.lifetime = LifetimeBridge::new(policy);
        self
    }

    pub fn with_injection(mut self, injection: InjectionSpec) -> Self {
        self.injection = injection;
        self
    }

    /// Use a dedicated generator instead of the process-wide one
    pub fn with_generator(mut self, generator: &'a ProxyGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn register(self) -> Result<LazyRegistration, CoreError> {
        bind_pair::<H, C, I>(
            self.host,
            self.generator,
            self.name,
            &self.lifetime,
            self.injection,
        )
    }
}

/// Register the hidden target and the public proxy for `C`
pub(crate) fn bind_pair<H, C, I>(
    host: &H,
    generator: &ProxyGenerator,
    name: RegistrationName,
    lifetime: &LifetimeBridge,
    injection: InjectionSpec,
) -> Result<LazyRegistration, CoreError>
where
    H: ContainerHooks,
    C: ?Sized + LazyContract + Upcast<I>,
    I: Injectable,
{
    let template = generator.template::<C>()?;
    let contract = template.descriptor().display_name();
    let hidden = HiddenKey::new();

    let hidden_lifetime = lifetime.hidden_lifetime();
    let scope = hidden_lifetime.scope();
    host.register_type::<C, I>(RegistrationName::Hidden(hidden), hidden_lifetime, injection)?;

    let proxy_contract = contract.clone();
    // scoped proxies are cached per issuing scope and must not keep it alive
    let detached = scope.is_scoped();
    let activator: HookActivator<H> = Arc::new(move |issuing: &H, overrides: &Overrides| -> Result<Instance, CoreError> {
        let snapshot = if detached {
            ResolutionSnapshot::capture_detached(issuing, overrides)
        } else {
            ResolutionSnapshot::capture(issuing, overrides)
        };
        let proxy = template.bind(snapshot.defer::<C>(hidden, proxy_contract.clone()));
        Ok(erase::<C>(proxy))
    });
    host.register_activator::<C>(name.clone(), lifetime.public_lifetime(), activator)?;

    tracing::debug!(
        contract = %contract,
        name = %name,
        hidden = %hidden,
        lifetime = %scope,
        implementation = std::any::type_name::<I>(),
        "registered lazy service"
    );

    Ok(LazyRegistration {
        contract,
        name,
        hidden,
        lifetime: scope,
    })
}
