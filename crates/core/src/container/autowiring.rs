use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::container::descriptor::{downcast, Instance, RegistrationName, ServiceId};
use crate::container::ioc_container::IocContainer;
use crate::container::overrides::Overrides;
use crate::errors::CoreError;

/// Trait for services that can be constructed by the IoC container.
///
/// `create` pulls each constructor input through the [`ResolveContext`], which
/// applies resolve-time overrides, registration-time injection values and
/// container registrations in that order.
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Names of the constructor parameters, used to validate injection specs
    fn parameter_names() -> &'static [&'static str] {
        &[]
    }

    /// Create an instance of this service
    fn create(ctx: &mut ResolveContext) -> Result<Self, CoreError>;
}

/// Conversion from a concrete implementation to the contract it is registered for.
///
/// Implemented for every `dyn Contract` by `#[lazy_contract]`; hand-written
/// contracts implement it themselves.
pub trait Upcast<I>: Send + Sync + 'static {
    fn upcast(instance: Arc<I>) -> Arc<Self>;
}

#[derive(Clone)]
struct InjectedValue {
    value: Instance,
    value_type: &'static str,
}

/// Registration-time values for constructor parameters and properties
#[derive(Clone, Default)]
pub struct InjectionSpec {
    parameters: Arc<HashMap<String, InjectedValue>>,
    properties: Arc<HashMap<String, InjectedValue>>,
}

impl InjectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a value for a constructor parameter
    pub fn parameter<V: Send + Sync + 'static>(mut self, name: impl Into<String>, value: V) -> Self {
        Arc::make_mut(&mut self.parameters).insert(
            name.into(),
            InjectedValue {
                value: Arc::new(value),
                value_type: std::any::type_name::<V>(),
            },
        );
        self
    }

    /// Supply a value for a property
    pub fn property<V: Send + Sync + 'static>(mut self, name: impl Into<String>, value: V) -> Self {
        Arc::make_mut(&mut self.properties).insert(
            name.into(),
            InjectedValue {
                value: Arc::new(value),
                value_type: std::any::type_name::<V>(),
            },
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.properties.is_empty()
    }

    /// Reject parameters the implementation does not declare
    pub(crate) fn validate<I: Injectable>(&self) -> Result<(), CoreError> {
        let declared = I::parameter_names();
        let mut unknown: Vec<&str> = self
            .parameters
            .keys()
            .map(String::as_str)
            .filter(|name| !declared.contains(name))
            .collect();

        if unknown.is_empty() {
            return Ok(());
        }

        unknown.sort_unstable();
        Err(CoreError::invalid_descriptor(format!(
            "{} has no constructor parameter(s) [{}]; declared: [{}]",
            std::any::type_name::<I>(),
            unknown.join(", "),
            declared.join(", ")
        )))
    }
}

/// Construction target currently being built
#[derive(Clone)]
pub(crate) struct Frame {
    target: TypeId,
    target_name: &'static str,
    injection: InjectionSpec,
}

impl Frame {
    pub(crate) fn of<I: 'static>(injection: InjectionSpec) -> Self {
        Self {
            target: TypeId::of::<I>(),
            target_name: std::any::type_name::<I>(),
            injection,
        }
    }
}

/// State of one resolve call, handed to every constructor in the graph
pub struct ResolveContext {
    scope: IocContainer,
    overrides: Overrides,
    path: Vec<ServiceId>,
    frame: Option<Frame>,
}

impl ResolveContext {
    pub(crate) fn new(scope: IocContainer, overrides: Overrides) -> Self {
        Self {
            scope,
            overrides,
            path: Vec::new(),
            frame: None,
        }
    }

    /// The scope that issued the resolve call
    pub fn scope(&self) -> &IocContainer {
        &self.scope
    }

    /// Overrides supplied to the resolve call
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Type name of the implementation under construction
    pub fn target_name(&self) -> Option<&'static str> {
        self.frame.as_ref().map(|frame| frame.target_name)
    }

    fn target(&self) -> Option<TypeId> {
        self.frame.as_ref().map(|frame| frame.target)
    }

    /// Resolve the default registration of `C`, honoring dependency overrides
    pub fn resolve<C: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<C>, CoreError> {
        let service_id = ServiceId::of::<C>();
        if let Some(value) = self.overrides.dependency(service_id.type_id, self.target()) {
            return downcast::<C>(value, &service_id);
        }
        self.resolve_id(&service_id)
    }

    /// Resolve a named registration of `C`
    pub fn resolve_named<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        name: &str,
    ) -> Result<Arc<C>, CoreError> {
        let service_id = ServiceId::with_name::<C>(RegistrationName::Named(name.to_string()));
        self.resolve_id(&service_id)
    }

    pub(crate) fn resolve_id<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        service_id: &ServiceId,
    ) -> Result<Arc<C>, CoreError> {
        let scope = self.scope.clone();
        let instance = scope.resolve_in(service_id, self)?;
        downcast::<C>(&instance, service_id)
    }

    /// Service-typed constructor parameter
    pub fn dependency<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        parameter: &str,
    ) -> Result<Arc<C>, CoreError> {
        let target = self.target();
        if let Some(found) = self.overrides.parameter(parameter, target) {
            if let Some(service) = found.get::<Arc<C>>() {
                return Ok(service);
            }
            return Err(self.mismatch(parameter, found.value_type, std::any::type_name::<C>()));
        }

        if let Some(injected) = self.injected_parameter(parameter) {
            return match injected.value.downcast_ref::<Arc<C>>() {
                Some(service) => Ok(service.clone()),
                None => Err(self.mismatch(parameter, injected.value_type, std::any::type_name::<C>())),
            };
        }

        self.resolve::<C>()
    }

    /// Service-typed parameter that is `None` when `C` is not registered
    pub fn optional_dependency<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        parameter: &str,
    ) -> Result<Option<Arc<C>>, CoreError> {
        match self.dependency::<C>(parameter) {
            Ok(service) => Ok(Some(service)),
            Err(CoreError::ResolutionFailed { service_type, .. })
                if service_type == std::any::type_name::<C>() =>
            {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Value-typed constructor parameter.
    ///
    /// Falls back to a registered instance of `V` when neither an override
    /// nor an injected value is present.
    pub fn parameter<V: Clone + Send + Sync + 'static>(&mut self, parameter: &str) -> Result<V, CoreError> {
        let target = self.target();
        if let Some(found) = self.overrides.parameter(parameter, target) {
            return found
                .get::<V>()
                .ok_or_else(|| self.mismatch(parameter, found.value_type, std::any::type_name::<V>()));
        }

        if let Some(injected) = self.injected_parameter(parameter) {
            return match injected.value.downcast_ref::<V>() {
                Some(value) => Ok(value.clone()),
                None => Err(self.mismatch(parameter, injected.value_type, std::any::type_name::<V>())),
            };
        }

        match self.resolve::<V>() {
            Ok(value) => Ok(V::clone(&value)),
            Err(error) if is_unregistered::<V>(&error) => Err(self.missing(parameter, "parameter")),
            Err(error) => Err(error),
        }
    }

    /// Property value for the implementation under construction
    pub fn property<V: Clone + Send + Sync + 'static>(&mut self, property: &str) -> Result<V, CoreError> {
        let target = self.target();
        if let Some(found) = self.overrides.property(property, target) {
            return found
                .get::<V>()
                .ok_or_else(|| self.mismatch(property, found.value_type, std::any::type_name::<V>()));
        }

        let injected = self
            .frame
            .as_ref()
            .and_then(|frame| frame.injection.properties.get(property).cloned());
        if let Some(injected) = injected {
            return match injected.value.downcast_ref::<V>() {
                Some(value) => Ok(value.clone()),
                None => Err(self.mismatch(property, injected.value_type, std::any::type_name::<V>())),
            };
        }

        match self.resolve::<V>() {
            Ok(value) => Ok(V::clone(&value)),
            Err(error) if is_unregistered::<V>(&error) => Err(self.missing(property, "property")),
            Err(error) => Err(error),
        }
    }

    /// Optional property; `None` when nothing supplies it
    pub fn optional_property<V: Clone + Send + Sync + 'static>(
        &mut self,
        property: &str,
    ) -> Result<Option<V>, CoreError> {
        match self.property::<V>(property) {
            Ok(value) => Ok(Some(value)),
            Err(CoreError::ResolutionFailed { service_type, name, .. })
                if name == property && Some(service_type.as_str()) == self.target_name() =>
            {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Build an unregistered implementation with the current overrides
    pub fn build<I: Injectable>(&mut self) -> Result<I, CoreError> {
        self.with_frame(Frame::of::<I>(InjectionSpec::default()), I::create)
    }

    pub(crate) fn with_frame<R>(
        &mut self,
        frame: Frame,
        build: impl FnOnce(&mut Self) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let outer = self.frame.replace(frame);
        let result = build(self);
        self.frame = outer;
        result
    }

    /// Push `service_id` on the resolution path
    pub(crate) fn enter(&mut self, service_id: &ServiceId, max_depth: usize) -> Result<(), CoreError> {
        if self.path.contains(service_id) {
            let mut path: Vec<String> = self.path.iter().map(ToString::to_string).collect();
            path.push(service_id.to_string());
            return Err(CoreError::cyclic_resolution(
                service_id.type_name,
                path.join(" -> "),
            ));
        }
        if self.path.len() >= max_depth {
            return Err(CoreError::resolution_failed(
                service_id.type_name,
                service_id.name.to_string(),
                format!("maximum resolution depth {} exceeded", max_depth),
            ));
        }
        self.path.push(service_id.clone());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }

    fn injected_parameter(&self, parameter: &str) -> Option<InjectedValue> {
        self.frame
            .as_ref()
            .and_then(|frame| frame.injection.parameters.get(parameter).cloned())
    }

    fn mismatch(&self, member: &str, supplied: &str, expected: &str) -> CoreError {
        CoreError::construction(
            self.target_name().unwrap_or("<unknown>"),
            format!("'{}' was supplied a {} but expects {}", member, supplied, expected),
        )
    }

    fn missing(&self, member: &str, kind: &str) -> CoreError {
        CoreError::resolution_failed(
            self.target_name().unwrap_or("<unknown>"),
            member,
            format!("no override, injected value or registration for {} '{}'", kind, member),
        )
    }
}

/// `error` reports that `V` itself has no registration, not one of its dependencies
fn is_unregistered<V: ?Sized + 'static>(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::ResolutionFailed { service_type, .. } if service_type == std::any::type_name::<V>()
    )
}
