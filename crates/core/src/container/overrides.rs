use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::container::descriptor::{erase, Instance};

/// Resolve-time replacement of an injected value
#[derive(Clone)]
pub enum Override {
    /// Replaces a constructor parameter by name
    Parameter {
        name: String,
        value: Instance,
        value_type: &'static str,
    },
    /// Replaces every dependency of the given service type
    Dependency {
        service_type: TypeId,
        type_name: &'static str,
        value: Instance,
    },
    /// Replaces a property by name
    Property {
        name: String,
        value: Instance,
        value_type: &'static str,
    },
    /// Applies the inner override only while constructing `target`
    ForType {
        target: TypeId,
        target_name: &'static str,
        inner: Box<Override>,
    },
}

impl Override {
    pub fn parameter<V: Send + Sync + 'static>(name: impl Into<String>, value: V) -> Self {
        Override::Parameter {
            name: name.into(),
            value: Arc::new(value),
            value_type: std::any::type_name::<V>(),
        }
    }

    pub fn dependency<C: ?Sized + Send + Sync + 'static>(service: Arc<C>) -> Self {
        Override::Dependency {
            service_type: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            value: erase(service),
        }
    }

    pub fn property<V: Send + Sync + 'static>(name: impl Into<String>, value: V) -> Self {
        Override::Property {
            name: name.into(),
            value: Arc::new(value),
            value_type: std::any::type_name::<V>(),
        }
    }

    /// Restrict `inner` to the construction of `T`
    pub fn for_type<T: ?Sized + 'static>(inner: Override) -> Self {
        Override::ForType {
            target: TypeId::of::<T>(),
            target_name: std::any::type_name::<T>(),
            inner: Box::new(inner),
        }
    }

    /// The override that applies while constructing `target`, if any
    fn applicable(&self, target: Option<TypeId>) -> Option<&Override> {
        match self {
            Override::ForType {
                target: scoped,
                inner,
                ..
            } => {
                if target == Some(*scoped) {
                    inner.applicable(target)
                } else {
                    None
                }
            }
            other => Some(other),
        }
    }

    fn is_type_scoped(&self) -> bool {
        matches!(self, Override::ForType { .. })
    }
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Override::Parameter { name, value_type, .. } => f
                .debug_struct("Parameter")
                .field("name", name)
                .field("value_type", value_type)
                .finish(),
            Override::Dependency { type_name, .. } => f
                .debug_struct("Dependency")
                .field("type_name", type_name)
                .finish(),
            Override::Property { name, value_type, .. } => f
                .debug_struct("Property")
                .field("name", name)
                .field("value_type", value_type)
                .finish(),
            Override::ForType {
                target_name, inner, ..
            } => f
                .debug_struct("ForType")
                .field("target", target_name)
                .field("inner", inner)
                .finish(),
        }
    }
}

/// Value found for an override lookup
pub(crate) struct OverrideValue<'a> {
    pub value: &'a Instance,
    pub value_type: &'static str,
}

impl OverrideValue<'_> {
    pub fn get<V: Clone + 'static>(&self) -> Option<V> {
        let value: &(dyn Any + Send + Sync) = self.value.as_ref();
        value.downcast_ref::<V>().cloned()
    }
}

/// Immutable snapshot of the overrides supplied to one resolve call.
///
/// Cloning is cheap; the same snapshot flows through the whole object graph
/// built by that call, including lazy proxies realized later.
#[derive(Clone, Default)]
pub struct Overrides {
    entries: Arc<Vec<Override>>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an override. Later entries win over earlier ones.
    pub fn with(mut self, entry: Override) -> Self {
        Arc::make_mut(&mut self.entries).push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Override> {
        self.entries.iter()
    }

    /// Type-scoped matches first, then untargeted ones, latest first
    fn candidates(&self, target: Option<TypeId>) -> impl Iterator<Item = &Override> {
        let scoped = self
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.is_type_scoped())
            .filter_map(move |entry| entry.applicable(target));
        let untargeted = self.entries.iter().rev().filter(|entry| !entry.is_type_scoped());
        scoped.chain(untargeted)
    }

    pub(crate) fn parameter(&self, name: &str, target: Option<TypeId>) -> Option<OverrideValue<'_>> {
        self.candidates(target).find_map(|entry| match entry {
            Override::Parameter {
                name: candidate,
                value,
                value_type,
            } if candidate == name => Some(OverrideValue {
                value,
                value_type: *value_type,
            }),
            _ => None,
        })
    }

    pub(crate) fn property(&self, name: &str, target: Option<TypeId>) -> Option<OverrideValue<'_>> {
        self.candidates(target).find_map(|entry| match entry {
            Override::Property {
                name: candidate,
                value,
                value_type,
            } if candidate == name => Some(OverrideValue {
                value,
                value_type: *value_type,
            }),
            _ => None,
        })
    }

    pub(crate) fn dependency(&self, service_type: TypeId, target: Option<TypeId>) -> Option<&Instance> {
        self.candidates(target).find_map(|entry| match entry {
            Override::Dependency {
                service_type: candidate,
                value,
                ..
            } if *candidate == service_type => Some(value),
            _ => None,
        })
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl FromIterator<Override> for Overrides {
    fn from_iter<T: IntoIterator<Item = Override>>(iter: T) -> Self {
        Self {
            entries: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl From<Vec<Override>> for Overrides {
    fn from(entries: Vec<Override>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }
}
