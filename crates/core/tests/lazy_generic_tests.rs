//! Closed and open generic lazy registrations

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use lazyproxy_core::{
    injectable, lazy_contract, Closing, CoreError, Injectable, InjectionSpec, IocContainer, LazyContract,
    LazyServiceBinder, ProxyGenerator, ResolveContext, ServiceScope,
};

#[lazy_contract]
pub trait Repository<T> {
    fn find(&self, id: u32) -> Result<Option<T>, CoreError>;

    #[lazy(getter)]
    fn label(&self) -> Result<String, CoreError>;
}

#[injectable]
pub struct MemoryRepository<T> {
    label: String,
    _entity: PhantomData<T>,
}

impl<T: From<u32> + Send + Sync + 'static> Repository<T> for MemoryRepository<T> {
    fn find(&self, id: u32) -> Result<Option<T>, CoreError> {
        if id == 0 {
            return Ok(None);
        }
        Ok(Some(T::from(id)))
    }

    fn label(&self) -> Result<String, CoreError> {
        Ok(self.label.clone())
    }
}

fn labelled(label: &str) -> InjectionSpec {
    InjectionSpec::new().parameter("label", label.to_string())
}

fn static_generator() -> &'static ProxyGenerator {
    Box::leak(Box::new(ProxyGenerator::new()))
}

fn register_open(container: &IocContainer, generator: &'static ProxyGenerator) {
    container
        .bind_lazy_open(|closing: &mut Closing<'_, IocContainer>| {
            closing
                .close::<dyn Repository<u64>, MemoryRepository<u64>>()?
                .close::<dyn Repository<i64>, MemoryRepository<i64>>()?;
            Ok(())
        })
        .with_lifetime(ServiceScope::Singleton)
        .with_injection(labelled("open"))
        .with_generator(generator)
        .register()
        .unwrap();
}

#[test]
fn test_closed_generic_registration() {
    let generator = ProxyGenerator::new();
    let container = IocContainer::new();
    let registration = container
        .bind_lazy::<dyn Repository<u64>, MemoryRepository<u64>>()
        .with_injection(labelled("users"))
        .with_generator(&generator)
        .register()
        .unwrap();

    assert_eq!(registration.contract, "Repository<u64>");

    let repository = container.resolve::<dyn Repository<u64>>().unwrap();
    assert_eq!(repository.find(7).unwrap(), Some(7));
    assert_eq!(repository.find(0).unwrap(), None);
    assert_eq!(repository.label().unwrap(), "users");
    assert!(container.resolve::<dyn Repository<i64>>().is_err());
}

#[test]
fn test_closings_share_one_open_template() {
    let generator = ProxyGenerator::new();
    let container = IocContainer::new();
    container
        .bind_lazy::<dyn Repository<u64>, MemoryRepository<u64>>()
        .with_injection(labelled("unsigned"))
        .with_generator(&generator)
        .register()
        .unwrap();
    container
        .bind_lazy::<dyn Repository<i64>, MemoryRepository<i64>>()
        .with_injection(labelled("signed"))
        .with_generator(&generator)
        .register()
        .unwrap();

    let family = <dyn Repository<u64> as LazyContract>::descriptor().family;
    assert_eq!(generator.templates_built(), 1);
    assert_eq!(generator.closed_templates(), 2);
    assert_eq!(generator.family(family).unwrap().closings(), 2);

    let descriptor = <dyn Repository<i64> as LazyContract>::descriptor();
    assert!(descriptor.is_generic());
    assert_eq!(descriptor.generic_params, &["T"]);
    assert_eq!(descriptor.forwarded_members().count(), 2);
}

#[test]
fn test_open_generic_registration_closes_on_demand() {
    let generator = static_generator();
    let container = IocContainer::new();
    register_open(&container, generator);

    assert!(!container.is_registered::<dyn Repository<u64>>(None));
    assert_eq!(generator.closed_templates(), 0);

    let unsigned = container.resolve::<dyn Repository<u64>>().unwrap();
    assert_eq!(unsigned.find(3).unwrap(), Some(3));
    assert_eq!(unsigned.label().unwrap(), "open");
    assert!(container.is_registered::<dyn Repository<u64>>(None));

    let signed = container.resolve::<dyn Repository<i64>>().unwrap();
    assert_eq!(signed.find(4).unwrap(), Some(4));

    assert_eq!(generator.templates_built(), 1);
    assert_eq!(generator.closed_templates(), 2);
}

#[test]
fn test_open_generic_keeps_lifetime_across_scopes() {
    let container = IocContainer::new();
    register_open(&container, static_generator());

    let child = container.create_child_scope();
    let from_child = child.resolve::<dyn Repository<u64>>().unwrap();
    let from_root = container.resolve::<dyn Repository<u64>>().unwrap();

    assert!(Arc::ptr_eq(&from_child, &from_root));
    assert_eq!(child.registration_count(), 0);
}

#[test]
fn test_open_generic_unsupported_closing_fails() {
    let container = IocContainer::new();
    register_open(&container, static_generator());

    let err = container.resolve::<dyn Repository<f64>>().err().unwrap();
    assert!(err.is_resolution_failed());
}

#[test]
fn test_closed_registration_wins_over_open() {
    let container = IocContainer::new();
    register_open(&container, static_generator());
    container
        .bind_lazy::<dyn Repository<u64>, MemoryRepository<u64>>()
        .with_injection(labelled("closed"))
        .register()
        .unwrap();

    let repository = container.resolve::<dyn Repository<u64>>().unwrap();
    assert_eq!(repository.label().unwrap(), "closed");
}

#[test]
fn test_open_generic_named_registrations() {
    let container = IocContainer::new();
    container
        .bind_lazy_open(|closing: &mut Closing<'_, IocContainer>| {
            closing.close::<dyn Repository<u64>, MemoryRepository<u64>>()?;
            Ok(())
        })
        .named("archive")
        .with_injection(labelled("archive"))
        .register()
        .unwrap();

    assert!(container.resolve::<dyn Repository<u64>>().is_err());

    let archive = container.resolve_named::<dyn Repository<u64>>("archive").unwrap();
    assert_eq!(archive.label().unwrap(), "archive");

    let again = container.resolve_named::<dyn Repository<u64>>("archive").unwrap();
    assert!(!Arc::ptr_eq(&archive, &again));
}

static ISSUED: AtomicUsize = AtomicUsize::new(0);

#[lazy_contract]
pub trait Sequence<T> {
    fn id(&self) -> Result<usize, CoreError>;
}

pub struct Sequenced<T> {
    id: usize,
    _entity: PhantomData<T>,
}

impl<T: Send + Sync + 'static> Injectable for Sequenced<T> {
    fn create(_ctx: &mut ResolveContext) -> Result<Self, CoreError> {
        Ok(Self {
            id: ISSUED.fetch_add(1, Ordering::SeqCst),
            _entity: PhantomData,
        })
    }
}

impl<T: Send + Sync + 'static> Sequence<T> for Sequenced<T> {
    fn id(&self) -> Result<usize, CoreError> {
        Ok(self.id)
    }
}

#[test]
fn test_racing_open_resolves_share_one_singleton() {
    let container = IocContainer::new();
    let closer_calls = Arc::new(AtomicUsize::new(0));
    let calls = closer_calls.clone();
    container
        .bind_lazy_open(move |closing: &mut Closing<'_, IocContainer>| {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            closing.close::<dyn Sequence<u64>, Sequenced<u64>>()?;
            Ok(())
        })
        .with_lifetime(ServiceScope::Singleton)
        .register()
        .unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.resolve::<dyn Sequence<u64>>().unwrap().id().unwrap()
            })
        })
        .collect();

    let ids: Vec<usize> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]), "ids: {:?}", ids);
    assert_eq!(closer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(container.registration_count(), 2);
}
