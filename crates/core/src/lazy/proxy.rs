use std::fmt;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::lazy::deferred::{Deferred, ProxyState};

/// Stand-in for a contract instance whose target is built on first use.
///
/// Contract implementations for `LazyProxy<C>` are emitted by
/// `#[lazy_contract]`; every forwarded member calls [`LazyProxy::target`]
/// and then invokes the same member on the realized instance.
pub struct LazyProxy<C: ?Sized + 'static> {
    target: Deferred<Arc<C>>,
}

impl<C: ?Sized + Send + Sync + 'static> LazyProxy<C> {
    pub fn new(target: Deferred<Arc<C>>) -> Self {
        Self { target }
    }

    /// Realize the target if needed and borrow it
    pub fn target(&self) -> Result<&Arc<C>, CoreError> {
        self.target.get()
    }

    pub fn state(&self) -> ProxyState {
        self.target.state()
    }

    pub fn is_realized(&self) -> bool {
        self.target.is_realized()
    }
}

impl<C: ?Sized + Send + Sync + 'static> fmt::Debug for LazyProxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyProxy")
            .field("contract", &std::any::type_name::<C>())
            .field("state", &self.state())
            .finish()
    }
}
