use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use crate::container::descriptor::{HiddenKey, RegistrationName};
use crate::container::hooks::ContainerHooks;
use crate::container::overrides::Overrides;
use crate::container::scope::{LifetimeManager, LifetimePolicy};
use crate::errors::CoreError;
use crate::lazy::deferred::Deferred;

#[derive(Clone)]
enum ScopeHandle<H: ContainerHooks> {
    Owned(H),
    Detached(H::WeakScope),
}

/// Scope and overrides in effect when a proxy was constructed.
///
/// Realizing the proxy replays the hidden resolution against this snapshot,
/// so later resolve calls with different overrides never leak into it.
#[derive(Clone)]
pub struct ResolutionSnapshot<H: ContainerHooks> {
    scope: ScopeHandle<H>,
    overrides: Overrides,
}

impl<H: ContainerHooks> ResolutionSnapshot<H> {
    /// Snapshot that keeps the issuing scope alive
    pub fn capture(scope: &H, overrides: &Overrides) -> Self {
        Self {
            scope: ScopeHandle::Owned(scope.clone()),
            overrides: overrides.clone(),
        }
    }

    /// Snapshot that lets the issuing scope go; replaying fails once it has
    /// been dropped
    pub fn capture_detached(scope: &H, overrides: &Overrides) -> Self {
        Self {
            scope: ScopeHandle::Detached(scope.downgrade()),
            overrides: overrides.clone(),
        }
    }

    /// Issuing scope, if it is still alive
    pub fn scope(&self) -> Option<H> {
        match &self.scope {
            ScopeHandle::Owned(scope) => Some(scope.clone()),
            ScopeHandle::Detached(weak) => H::upgrade(weak),
        }
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Resolve the hidden registration in the captured scope
    pub fn replay<C>(&self, hidden: HiddenKey) -> Result<Arc<C>, CoreError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let name = RegistrationName::Hidden(hidden);
        let scope = self.scope().ok_or_else(|| {
            CoreError::resolution_failed(
                std::any::type_name::<C>(),
                name.to_string(),
                "the scope that issued this proxy has been dropped",
            )
        })?;
        scope.resolve_registration::<C>(&name, &self.overrides)
    }

    /// Deferred target that replays the hidden resolution on first access
    pub fn defer<C>(self, hidden: HiddenKey, contract: String) -> Deferred<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let trace = self.scope().map(|scope| scope.trace_realization()).unwrap_or(false);
        Deferred::new(move || {
            let _realizing = Realizing::enter(hidden, &contract)?;
            let target = self.replay::<C>(hidden);
            match &target {
                Ok(_) if trace => tracing::debug!(contract = %contract, hidden = %hidden, "realized lazy target"),
                Ok(_) => tracing::trace!(contract = %contract, hidden = %hidden, "realized lazy target"),
                Err(error) => tracing::debug!(contract = %contract, error = %error, "lazy target realization failed"),
            }
            target
        })
    }
}

thread_local! {
    static REALIZING: RefCell<Vec<HiddenKey>> = const { RefCell::new(Vec::new()) };
}

/// Marks a hidden registration as being realized on the current thread.
///
/// Each realization replays in a fresh resolve context, so a target that
/// touches a proxy of its own registration is caught here instead.
#[derive(Debug)]
struct Realizing(HiddenKey);

impl Realizing {
    fn enter(hidden: HiddenKey, contract: &str) -> Result<Self, CoreError> {
        REALIZING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&hidden) {
                let mut path: Vec<String> = stack.iter().map(ToString::to_string).collect();
                path.push(hidden.to_string());
                return Err(CoreError::cyclic_resolution(contract, path.join(" -> ")));
            }
            stack.push(hidden);
            Ok(Realizing(hidden))
        })
    }
}

impl Drop for Realizing {
    fn drop(&mut self) {
        REALIZING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|key| *key == self.0) {
                stack.remove(position);
            }
        });
    }
}

impl<H: ContainerHooks> fmt::Debug for ResolutionSnapshot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionSnapshot")
            .field("detached", &matches!(self.scope, ScopeHandle::Detached(_)))
            .field("overrides", &self.overrides)
            .finish()
    }
}

/// Lifetime policy applied to both halves of a lazy registration.
///
/// Each half receives its own manager, so the hidden target and the public
/// proxy are cached independently under the same reuse rule.
#[derive(Clone)]
pub struct LifetimeBridge {
    policy: Arc<dyn LifetimePolicy>,
}

impl LifetimeBridge {
    pub fn new(policy: impl LifetimePolicy + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn from_shared(policy: Arc<dyn LifetimePolicy>) -> Self {
        Self { policy }
    }

    /// Manager for the hidden target registration
    pub fn hidden_lifetime(&self) -> Box<dyn LifetimeManager> {
        self.policy.create()
    }

    /// Manager for the public proxy registration
    pub fn public_lifetime(&self) -> Box<dyn LifetimeManager> {
        self.policy.create()
    }
}

impl fmt::Debug for LifetimeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeBridge")
            .field("scope", &self.policy.create().scope())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::scope::ServiceScope;
    use crate::container::IocContainer;
    use uuid::Uuid;

    #[test]
    fn test_bridge_creates_independent_managers() {
        let bridge = LifetimeBridge::new(ServiceScope::Singleton);
        let hidden = bridge.hidden_lifetime();
        let public = bridge.public_lifetime();
        let scope = Uuid::new_v4();

        hidden.store(&scope, Arc::new(1u8)).unwrap();
        assert!(hidden.lookup(&scope).unwrap().is_some());
        assert!(public.lookup(&scope).unwrap().is_none());
        assert_eq!(public.scope(), ServiceScope::Singleton);
    }

    #[test]
    fn test_snapshot_keeps_overrides() {
        let container = IocContainer::new();
        let overrides = Overrides::new().with(crate::container::Override::parameter("x", 1u8));
        let snapshot = ResolutionSnapshot::capture(&container, &overrides);
        assert_eq!(snapshot.overrides().len(), 1);
        assert_eq!(snapshot.scope().unwrap().scope_id(), container.scope_id());
    }

    #[test]
    fn test_detached_snapshot_fails_after_scope_drop() {
        let root = IocContainer::new();
        let child = root.create_child_scope();
        let snapshot = ResolutionSnapshot::capture_detached(&child, &Overrides::new());
        assert!(snapshot.scope().is_some());

        drop(child);
        assert!(snapshot.scope().is_none());
        let err = snapshot.replay::<String>(HiddenKey::new()).unwrap_err();
        assert!(err.is_resolution_failed());
        assert!(err.to_string().contains("dropped"));
    }

    #[test]
    fn test_deferred_replay_reports_missing_hidden_registration() {
        let container = IocContainer::new();
        let snapshot = ResolutionSnapshot::capture(&container, &Overrides::new());
        let deferred = snapshot.defer::<String>(HiddenKey::new(), "String".to_string());
        assert!(deferred.get().unwrap_err().is_resolution_failed());
    }

    #[test]
    fn test_nested_realization_of_same_registration_is_cyclic() {
        let hidden = HiddenKey::new();
        let outer = Realizing::enter(hidden, "Loop").unwrap();
        assert!(Realizing::enter(hidden, "Loop").unwrap_err().is_cyclic());
        drop(outer);
        assert!(Realizing::enter(hidden, "Loop").is_ok());
    }
}
