use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use crate::errors::CoreError;
use crate::lazy::contract::{ContractDescriptor, LazyContract, MemberDescriptor};
use crate::lazy::deferred::Deferred;
use crate::lazy::proxy::LazyProxy;

/// Per-family template shared by every closing of a generic contract
#[derive(Debug)]
pub struct OpenTemplate {
    family: &'static str,
    name: &'static str,
    generic_params: &'static [&'static str],
    members: &'static [MemberDescriptor],
    closings: AtomicUsize,
}

impl OpenTemplate {
    fn new(descriptor: &ContractDescriptor) -> Self {
        Self {
            family: descriptor.family,
            name: descriptor.name,
            generic_params: descriptor.generic_params,
            members: descriptor.members,
            closings: AtomicUsize::new(0),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn members(&self) -> &'static [MemberDescriptor] {
        self.members
    }

    /// Number of closed templates derived from this one
    pub fn closings(&self) -> usize {
        self.closings.load(Ordering::Relaxed)
    }

    fn close<C: ?Sized + LazyContract>(
        self: &Arc<Self>,
        descriptor: ContractDescriptor,
    ) -> Result<ProxyTemplate<C>, CoreError> {
        if descriptor.generic_params != self.generic_params || descriptor.members != self.members {
            return Err(CoreError::unsupported_contract(
                descriptor.display_name(),
                format!("does not match the shape of contract family {}", self.family),
            ));
        }

        self.closings.fetch_add(1, Ordering::Relaxed);
        Ok(ProxyTemplate {
            open: self.clone(),
            descriptor,
            _contract: PhantomData,
        })
    }
}

/// Closed proxy template for one contract type
pub struct ProxyTemplate<C: ?Sized> {
    open: Arc<OpenTemplate>,
    descriptor: ContractDescriptor,
    _contract: PhantomData<fn() -> Arc<C>>,
}

impl<C: ?Sized + LazyContract> ProxyTemplate<C> {
    pub fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    pub fn open_template(&self) -> &Arc<OpenTemplate> {
        &self.open
    }

    /// Create a proxy instance forwarding to `target`
    pub fn bind(&self, target: Deferred<Arc<C>>) -> Arc<C> {
        C::bind(LazyProxy::new(target))
    }
}

impl<C: ?Sized> fmt::Debug for ProxyTemplate<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyTemplate")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Builds and caches proxy templates.
///
/// A template is built at most once per contract family and closed at most
/// once per concrete contract type, for the lifetime of the generator.
#[derive(Default)]
pub struct ProxyGenerator {
    open: RwLock<HashMap<&'static str, Arc<OpenTemplate>>>,
    closed: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    templates_built: AtomicUsize,
}

static GLOBAL_GENERATOR: OnceLock<ProxyGenerator> = OnceLock::new();

impl ProxyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide generator used by the binding surface
    pub fn global() -> &'static ProxyGenerator {
        GLOBAL_GENERATOR.get_or_init(ProxyGenerator::new)
    }

    /// Get the closed template for contract `C`, building it on first use
    pub fn template<C: ?Sized + LazyContract>(&self) -> Result<Arc<ProxyTemplate<C>>, CoreError> {
        let key = TypeId::of::<C>();
        {
            let closed = self.closed.read().map_err(|_| CoreError::lock("proxy_templates"))?;
            if let Some(template) = closed.get(&key) {
                return Self::downcast(template.clone());
            }
        }

        let descriptor = C::descriptor();
        descriptor.validate()?;

        let open = self.open_template(&descriptor)?;
        let template: Arc<dyn Any + Send + Sync> = Arc::new(open.close::<C>(descriptor)?);

        let mut closed = self.closed.write().map_err(|_| CoreError::lock("proxy_templates"))?;
        let winner = closed.entry(key).or_insert(template).clone();
        Self::downcast(winner)
    }

    fn open_template(&self, descriptor: &ContractDescriptor) -> Result<Arc<OpenTemplate>, CoreError> {
        {
            let open = self.open.read().map_err(|_| CoreError::lock("proxy_templates"))?;
            if let Some(template) = open.get(descriptor.family) {
                return Ok(template.clone());
            }
        }

        let mut open = self.open.write().map_err(|_| CoreError::lock("proxy_templates"))?;
        let template = open.entry(descriptor.family).or_insert_with(|| {
            self.templates_built.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                family = descriptor.family,
                members = descriptor.members.len(),
                "built proxy template"
            );
            Arc::new(OpenTemplate::new(descriptor))
        });
        Ok(template.clone())
    }

    fn downcast<C: ?Sized + LazyContract>(
        template: Arc<dyn Any + Send + Sync>,
    ) -> Result<Arc<ProxyTemplate<C>>, CoreError> {
        template.downcast::<ProxyTemplate<C>>().map_err(|_| {
            CoreError::unsupported_contract(
                std::any::type_name::<C>(),
                "cached template belongs to another contract",
            )
        })
    }

    /// Number of open templates built so far
    pub fn templates_built(&self) -> usize {
        self.templates_built.load(Ordering::Relaxed)
    }

    /// Number of distinct contract types with a closed template
    pub fn closed_templates(&self) -> usize {
        self.closed.read().map(|closed| closed.len()).unwrap_or(0)
    }

    /// Open template of a contract family, if one was built
    pub fn family(&self, family: &str) -> Option<Arc<OpenTemplate>> {
        self.open.read().ok()?.get(family).cloned()
    }
}

impl fmt::Debug for ProxyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyGenerator")
            .field("templates_built", &self.templates_built())
            .field("closed_templates", &self.closed_templates())
            .finish()
    }
}
