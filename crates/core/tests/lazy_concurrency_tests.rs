//! Concurrent first touches of shared proxies

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use lazyproxy_core::{
    lazy_contract, CoreError, Injectable, IocContainer, LazyServiceBinder, ResolveContext, ServiceScope,
};

#[derive(Default)]
struct Builds(AtomicUsize);

#[lazy_contract]
pub trait Catalog {
    fn size(&self) -> Result<usize, CoreError>;
}

struct SlowCatalog {
    size: usize,
}

impl Injectable for SlowCatalog {
    fn create(ctx: &mut ResolveContext) -> Result<Self, CoreError> {
        let builds = ctx.resolve::<Builds>()?;
        thread::sleep(Duration::from_millis(20));
        let size = builds.0.fetch_add(1, Ordering::SeqCst) + 100;
        Ok(Self { size })
    }
}

impl Catalog for SlowCatalog {
    fn size(&self) -> Result<usize, CoreError> {
        Ok(self.size)
    }
}

#[test]
fn test_concurrent_first_touch_realizes_once() {
    let container = IocContainer::new();
    let builds = Arc::new(Builds::default());
    container.register_instance(None, builds.clone()).unwrap();
    container.register_lazy::<dyn Catalog, SlowCatalog>().unwrap();

    let catalog = container.resolve::<dyn Catalog>().unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                catalog.size().unwrap()
            })
        })
        .collect();

    let sizes: Vec<usize> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert!(sizes.iter().all(|size| *size == 100));
    assert_eq!(builds.0.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_resolves_of_singleton_share_one_target() {
    let container = IocContainer::new();
    let builds = Arc::new(Builds::default());
    container.register_instance(None, builds.clone()).unwrap();
    container
        .bind_lazy::<dyn Catalog, SlowCatalog>()
        .with_lifetime(ServiceScope::Singleton)
        .register()
        .unwrap();

    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let scope = container.create_child_scope();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                scope.resolve::<dyn Catalog>().unwrap().size().unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 100);
    }
    assert_eq!(builds.0.load(Ordering::SeqCst), 1);
}

struct Unavailable;

impl Injectable for Unavailable {
    fn create(ctx: &mut ResolveContext) -> Result<Self, CoreError> {
        ctx.resolve::<Builds>()?.0.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Err(CoreError::construction("Unavailable", "backend offline"))
    }
}

impl Catalog for Unavailable {
    fn size(&self) -> Result<usize, CoreError> {
        Ok(0)
    }
}

#[test]
fn test_concurrent_callers_share_failure_then_retry() {
    let container = IocContainer::new();
    let builds = Arc::new(Builds::default());
    container.register_instance(None, builds.clone()).unwrap();
    container.register_lazy::<dyn Catalog, Unavailable>().unwrap();

    let catalog = container.resolve::<dyn Catalog>().unwrap();
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                catalog.size().unwrap_err()
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap();
        assert!(matches!(err, CoreError::Construction { .. }));
    }

    let first_round = builds.0.load(Ordering::SeqCst);
    assert!(first_round >= 1);

    assert!(catalog.size().is_err());
    assert_eq!(builds.0.load(Ordering::SeqCst), first_round + 1);
}
