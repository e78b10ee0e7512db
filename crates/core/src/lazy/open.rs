use std::any::TypeId;
use std::sync::Arc;

use crate::container::autowiring::{Injectable, InjectionSpec, Upcast};
use crate::container::descriptor::{RegistrationName, ServiceId};
use crate::container::hooks::{ContainerHooks, FallbackRequest, HookFallback};
use crate::container::scope::{LifetimePolicy, ServiceScope};
use crate::errors::CoreError;
use crate::lazy::binding::bind_pair;
use crate::lazy::bridge::LifetimeBridge;
use crate::lazy::contract::LazyContract;
use crate::lazy::template::ProxyGenerator;

/// Enumerates the closings an open lazy registration supports
pub type Closer<H> = Arc<dyn Fn(&mut Closing<'_, H>) -> Result<(), CoreError> + Send + Sync>;

/// A lookup miss offered to an open lazy registration.
///
/// The closer calls [`Closing::close`] once per supported closing; the one
/// matching the requested contract type is registered as a regular lazy
/// pair in the scope that owns the open registration.
pub struct Closing<'a, H> {
    host: &'a H,
    request: &'a FallbackRequest,
    name: &'a RegistrationName,
    lifetime: &'a LifetimeBridge,
    injection: &'a InjectionSpec,
    generator: &'a ProxyGenerator,
    closed: bool,
}

impl<'a, H: ContainerHooks> Closing<'a, H> {
    /// Service the lookup asked for
    pub fn requested(&self) -> &ServiceId {
        &self.request.service_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Offer the closing `C` implemented by `I`
    pub fn close<C, I>(&mut self) -> Result<&mut Self, CoreError>
    where
        C: ?Sized + LazyContract + Upcast<I>,
        I: Injectable,
    {
        if self.closed || self.request.service_id.type_id != TypeId::of::<C>() {
            return Ok(self);
        }
        if self.host.has_registration(&ServiceId::with_name::<C>(self.name.clone()))? {
            self.closed = true;
            return Ok(self);
        }

        let registration = bind_pair::<H, C, I>(
            self.host,
            self.generator,
            self.name.clone(),
            self.lifetime,
            self.injection.clone(),
        )?;
        tracing::debug!(
            contract = %registration.contract,
            name = %registration.name,
            "closed open lazy registration"
        );
        self.closed = true;
        Ok(self)
    }
}

/// Builder for a lazy registration over a generic contract family
pub struct OpenLazyBindingBuilder<'a, H> {
    host: &'a H,
    closer: Closer<H>,
    name: RegistrationName,
    lifetime: LifetimeBridge,
    injection: InjectionSpec,
    generator: &'static ProxyGenerator,
}

impl<'a, H: ContainerHooks> OpenLazyBindingBuilder<'a, H> {
    pub(crate) fn new(host: &'a H, closer: Closer<H>) -> Self {
        Self {
            host,
            closer,
            name: RegistrationName::Default,
            lifetime: LifetimeBridge::new(ServiceScope::Transient),
            injection: InjectionSpec::default(),
            generator: ProxyGenerator::global(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = RegistrationName::Named(name.into());
        self
    }

    /// Lifetime policy applied to every closing
    pub fn with_lifetime(mut self, policy: impl LifetimePolicy + 'static) -> Self {
        self.lifetime = LifetimeBridge::new(policy);
        self
    }

    /// Injection values applied to every closing
    pub fn with_injection(mut self, injection: InjectionSpec) -> Self {
        self.injection = injection;
        self
    }

    pub fn with_generator(mut self, generator: &'static ProxyGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn register(self) -> Result<(), CoreError> {
        let Self {
            host,
            closer,
            name,
            lifetime,
            injection,
            generator,
        } = self;

        let closing_name = name.clone();
        let fallback: HookFallback<H> = Arc::new(
            move |owner: &H, request: &FallbackRequest| -> Result<bool, CoreError> {
                let mut closing = Closing {
                    host: owner,
                    request,
                    name: &closing_name,
                    lifetime: &lifetime,
                    injection: &injection,
                    generator,
                    closed: false,
                };
                closer(&mut closing)?;
                Ok(closing.is_closed())
            },
        );

        tracing::debug!(name = %name, "registered open lazy service");
        host.register_fallback(name, fallback)
    }
}
