use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::container::autowiring::ResolveContext;
use crate::container::scope::LifetimeManager;
use crate::errors::CoreError;

/// Synthetic key of a hidden registration.
///
/// Minted fresh for every lazy registration call and never derived from the
/// public registration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HiddenKey(Uuid);

impl HiddenKey {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for HiddenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hidden:{}", self.0)
    }
}

/// Name part of a registration key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistrationName {
    /// The unnamed registration of a type
    Default,
    /// A registration under a caller-chosen name
    Named(String),
    /// An internal registration that public resolve calls cannot address
    Hidden(HiddenKey),
}

impl RegistrationName {
    /// Map an optional public name to a registration name
    pub fn from_option(name: Option<&str>) -> Self {
        match name {
            Some(name) => RegistrationName::Named(name.to_string()),
            None => RegistrationName::Default,
        }
    }

    /// Check if this is a hidden registration name
    pub fn is_hidden(&self) -> bool {
        matches!(self, RegistrationName::Hidden(_))
    }
}

impl fmt::Display for RegistrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationName::Default => write!(f, "default"),
            RegistrationName::Named(name) => write!(f, "{}", name),
            RegistrationName::Hidden(key) => write!(f, "{}", key),
        }
    }
}

/// Service identifier combining type and registration name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub name: RegistrationName,
}

impl ServiceId {
    /// Create the default service ID for a type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::with_name::<T>(RegistrationName::Default)
    }

    /// Create a named service ID for a type
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::with_name::<T>(RegistrationName::Named(name.into()))
    }

    /// Create a service ID for a type with an explicit registration name
    pub fn with_name<T: ?Sized + 'static>(name: RegistrationName) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name,
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name, self.name)
    }
}

/// Type-erased service instance.
///
/// Always holds an `Arc<C>` for the registered contract `C`, which lets
/// unsized trait-object contracts travel through `Any`.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Erase a contract instance for storage
pub fn erase<C: ?Sized + Send + Sync + 'static>(service: Arc<C>) -> Instance {
    Arc::new(service)
}

/// Recover a contract instance stored with [`erase`]
pub fn downcast<C: ?Sized + Send + Sync + 'static>(
    instance: &Instance,
    service_id: &ServiceId,
) -> Result<Arc<C>, CoreError> {
    instance.downcast_ref::<Arc<C>>().cloned().ok_or_else(|| {
        CoreError::resolution_failed(
            service_id.type_name,
            service_id.name.to_string(),
            format!(
                "registered instance is not a {}",
                std::any::type_name::<C>()
            ),
        )
    })
}

/// Factory function materializing a registration inside a resolve call
pub type Activator =
    Arc<dyn Fn(&mut ResolveContext) -> Result<Instance, CoreError> + Send + Sync>;

/// Service descriptor containing all metadata for a registration
pub struct ServiceDescriptor {
    /// Service identifier (type + registration name)
    pub service_id: ServiceId,
    /// Implementation type name, for diagnostics
    pub implementation: &'static str,
    /// Lifetime manager owned by this registration
    pub lifetime: Box<dyn LifetimeManager>,
    /// Strategy for creating instances
    pub(crate) activator: Activator,
}

impl ServiceDescriptor {
    pub fn new(
        service_id: ServiceId,
        implementation: &'static str,
        lifetime: Box<dyn LifetimeManager>,
        activator: Activator,
    ) -> Self {
        Self {
            service_id,
            implementation,
            lifetime,
            activator,
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service_id", &self.service_id)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("activator", &"<activator_fn>")
            .finish()
    }
}
