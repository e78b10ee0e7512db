use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use uuid::Uuid;

use crate::container::descriptor::Instance;
use crate::errors::CoreError;

/// Identifier of a container scope
pub type ScopeId = Uuid;

/// Service scope enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceScope {
    /// Single instance per registration, shared with every descendant scope
    Singleton,
    /// New instance created for each resolve call
    #[default]
    Transient,
    /// One instance per container scope
    Scoped,
}

impl ServiceScope {
    /// Check if the scope is singleton
    pub fn is_singleton(&self) -> bool {
        matches!(self, ServiceScope::Singleton)
    }

    /// Check if the scope is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceScope::Transient)
    }

    /// Check if the scope is scoped
    pub fn is_scoped(&self) -> bool {
        matches!(self, ServiceScope::Scoped)
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceScope::Singleton => "singleton",
            ServiceScope::Transient => "transient",
            ServiceScope::Scoped => "scoped",
        }
    }

    /// Create a fresh lifetime manager implementing this scope
    pub fn lifetime_manager(&self) -> Box<dyn LifetimeManager> {
        match self {
            ServiceScope::Singleton => Box::new(SingletonLifetime::default()),
            ServiceScope::Transient => Box::new(TransientLifetime),
            ServiceScope::Scoped => Box::new(ScopedLifetime::default()),
        }
    }
}

impl fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ServiceScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(ServiceScope::Singleton),
            "transient" => Ok(ServiceScope::Transient),
            "scoped" => Ok(ServiceScope::Scoped),
            _ => Err(CoreError::invalid_descriptor(format!(
                "unknown service scope '{}'",
                s
            ))),
        }
    }
}

/// Instance cache attached to a single registration
pub trait LifetimeManager: Send + Sync + fmt::Debug {
    /// Reuse rule implemented by this manager
    fn scope(&self) -> ServiceScope;

    /// Cached instance visible to a resolve issued from `scope`
    fn lookup(&self, scope: &ScopeId) -> Result<Option<Instance>, CoreError>;

    /// Cache a freshly built instance and return the one callers must use.
    ///
    /// When two resolves race, the first stored instance wins.
    fn store(&self, scope: &ScopeId, instance: Instance) -> Result<Instance, CoreError>;

    /// Drop whatever is cached for `scope`
    fn release(&self, scope: &ScopeId) -> Result<(), CoreError>;

    /// Drop every cached instance
    fn clear(&self) -> Result<(), CoreError>;
}

/// Produces independent lifetime managers, one per invocation
pub trait LifetimePolicy: Send + Sync {
    fn create(&self) -> Box<dyn LifetimeManager>;
}

impl LifetimePolicy for ServiceScope {
    fn create(&self) -> Box<dyn LifetimeManager> {
        self.lifetime_manager()
    }
}

impl<F> LifetimePolicy for F
where
    F: Fn() -> Box<dyn LifetimeManager> + Send + Sync,
{
    fn create(&self) -> Box<dyn LifetimeManager> {
        self()
    }
}

/// Never caches
#[derive(Debug, Default)]
pub struct TransientLifetime;

impl LifetimeManager for TransientLifetime {
    fn scope(&self) -> ServiceScope {
        ServiceScope::Transient
    }

    fn lookup(&self, _scope: &ScopeId) -> Result<Option<Instance>, CoreError> {
        Ok(None)
    }

    fn store(&self, _scope: &ScopeId, instance: Instance) -> Result<Instance, CoreError> {
        Ok(instance)
    }

    fn release(&self, _scope: &ScopeId) -> Result<(), CoreError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Caches one instance for the registration, whatever scope asks
#[derive(Default)]
pub struct SingletonLifetime {
    slot: RwLock<Option<Instance>>,
}

impl fmt::Debug for SingletonLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.slot.read().map(|slot| slot.is_some()).unwrap_or(false);
        f.debug_struct("SingletonLifetime")
            .field("cached", &cached)
            .finish()
    }
}

impl LifetimeManager for SingletonLifetime {
    fn scope(&self) -> ServiceScope {
        ServiceScope::Singleton
    }

    fn lookup(&self, _scope: &ScopeId) -> Result<Option<Instance>, CoreError> {
        let slot = self.slot.read().map_err(|_| CoreError::lock("singleton_lifetime"))?;
        Ok(slot.clone())
    }

    fn store(&self, _scope: &ScopeId, instance: Instance) -> Result<Instance, CoreError> {
        let mut slot = self.slot.write().map_err(|_| CoreError::lock("singleton_lifetime"))?;
        Ok(slot.get_or_insert(instance).clone())
    }

    fn release(&self, _scope: &ScopeId) -> Result<(), CoreError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        let released = {
            let mut slot = self.slot.write().map_err(|_| CoreError::lock("singleton_lifetime"))?;
            slot.take()
        };
        drop(released);
        Ok(())
    }
}

/// Caches one instance per issuing scope
#[derive(Default)]
pub struct ScopedLifetime {
    instances: RwLock<HashMap<ScopeId, Instance>>,
}

impl fmt::Debug for ScopedLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes = self.instances.read().map(|map| map.len()).unwrap_or(0);
        f.debug_struct("ScopedLifetime")
            .field("scopes", &scopes)
            .finish()
    }
}

impl LifetimeManager for ScopedLifetime {
    fn scope(&self) -> ServiceScope {
        ServiceScope::Scoped
    }

    fn lookup(&self, scope: &ScopeId) -> Result<Option<Instance>, CoreError> {
        let instances = self.instances.read().map_err(|_| CoreError::lock("scoped_lifetime"))?;
        Ok(instances.get(scope).cloned())
    }

    fn store(&self, scope: &ScopeId, instance: Instance) -> Result<Instance, CoreError> {
        let mut instances = self.instances.write().map_err(|_| CoreError::lock("scoped_lifetime"))?;
        Ok(instances.entry(*scope).or_insert(instance).clone())
    }

    fn release(&self, scope: &ScopeId) -> Result<(), CoreError> {
        // instances are dropped after the lock is released; their drop may
        // release further scopes
        let released = {
            let mut instances = self.instances.write().map_err(|_| CoreError::lock("scoped_lifetime"))?;
            instances.remove(scope)
        };
        drop(released);
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        let released: Vec<Instance> = {
            let mut instances = self.instances.write().map_err(|_| CoreError::lock("scoped_lifetime"))?;
            instances.drain().map(|(_, instance)| instance).collect()
        };
        drop(released);
        Ok(())
    }
}
