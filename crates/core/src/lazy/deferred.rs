use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

use crate::errors::CoreError;

/// Observable state of a deferred value or the proxy wrapping it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    NotTouched,
    Resolving,
    Touched,
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyState::NotTouched => write!(f, "not_touched"),
            ProxyState::Resolving => write!(f, "resolving"),
            ProxyState::Touched => write!(f, "touched"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Idle,
    Resolving(ThreadId),
}

#[derive(Debug)]
struct GateState {
    gate: Gate,
    /// Incremented every time an attempt finishes
    generation: u64,
    /// Error of the attempt numbered by the first field
    last_failure: Option<(u64, CoreError)>,
}

type Factory<T> = Box<dyn Fn() -> Result<T, CoreError> + Send + Sync>;

/// A value produced by a factory on first access, at most once on success.
///
/// Concurrent first accesses run the factory once; the other callers block
/// and observe the same value or the same error. A failed attempt leaves the
/// value unrealized so the next access retries. Re-entering `get` from the
/// factory on the same thread fails with [`CoreError::CyclicResolution`]
/// instead of deadlocking.
pub struct Deferred<T> {
    value: OnceLock<T>,
    state: Mutex<GateState>,
    finished: Condvar,
    factory: Factory<T>,
    attempts: AtomicUsize,
}

impl<T> Deferred<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<T, CoreError> + Send + Sync + 'static,
    {
        Self {
            value: OnceLock::new(),
            state: Mutex::new(GateState {
                gate: Gate::Idle,
                generation: 0,
                last_failure: None,
            }),
            finished: Condvar::new(),
            factory: Box::new(factory),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Get the value, running the factory if it has not produced one yet
    pub fn get(&self) -> Result<&T, CoreError> {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let current = thread::current().id();
        let mut state = self.lock()?;
        loop {
            if let Some(value) = self.value.get() {
                return Ok(value);
            }

            match state.gate {
                Gate::Idle => break,
                Gate::Resolving(owner) if owner == current => {
                    return Err(CoreError::cyclic_resolution(
                        std::any::type_name::<T>(),
                        "deferred value re-entered by its own factory",
                    ));
                }
                Gate::Resolving(_) => {
                    let awaited = state.generation;
                    while matches!(state.gate, Gate::Resolving(_)) && state.generation == awaited {
                        state = self
                            .finished
                            .wait(state)
                            .map_err(|_| CoreError::lock("deferred_value"))?;
                    }
                    if let Some((generation, error)) = &state.last_failure {
                        if *generation == awaited {
                            return Err(error.clone());
                        }
                    }
                }
            }
        }

        state.gate = Gate::Resolving(current);
        drop(state);

        let attempt = Attempt { owner: self };
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let outcome = (self.factory)();
        attempt.finish(outcome)
    }

    /// Whether the factory has produced a value
    pub fn is_realized(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn state(&self) -> ProxyState {
        if self.is_realized() {
            return ProxyState::Touched;
        }
        match self.lock_unpoisoned().gate {
            Gate::Resolving(_) => ProxyState::Resolving,
            Gate::Idle if self.is_realized() => ProxyState::Touched,
            Gate::Idle => ProxyState::NotTouched,
        }
    }

    /// Number of times the factory has been invoked
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, GateState>, CoreError> {
        self.state.lock().map_err(|_| CoreError::lock("deferred_value"))
    }

    /// The gate is never held while user code runs, so a poisoned lock still
    /// holds consistent state.
    fn lock_unpoisoned(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reopens the gate when an attempt ends, including by unwinding
struct Attempt<'a, T> {
    owner: &'a Deferred<T>,
}

impl<'a, T> Attempt<'a, T> {
    fn finish(self, outcome: Result<T, CoreError>) -> Result<&'a T, CoreError> {
        let owner = self.owner;
        std::mem::forget(self);

        let mut state = owner.lock_unpoisoned();
        let generation = state.generation;
        state.generation += 1;
        state.gate = Gate::Idle;

        let result = match outcome {
            Ok(value) => {
                // The gate admits a single attempt, so the slot is still empty.
                let _ = owner.value.set(value);
                state.last_failure = None;
                Ok(())
            }
            Err(error) => {
                state.last_failure = Some((generation, error.clone()));
                Err(error)
            }
        };
        drop(state);
        owner.finished.notify_all();

        result?;
        owner
            .value
            .get()
            .ok_or_else(|| CoreError::lock("deferred_value"))
    }
}

impl<T> Drop for Attempt<'_, T> {
    fn drop(&mut self) {
        let mut state = self.owner.lock_unpoisoned();
        let generation = state.generation;
        state.generation += 1;
        state.gate = Gate::Idle;
        state.last_failure = Some((
            generation,
            CoreError::construction(std::any::type_name::<T>(), "factory panicked"),
        ));
        drop(state);
        self.owner.finished.notify_all();
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .field("value", &self.value.get())
            .field("attempts", &self.attempts())
            .finish()
    }
}
